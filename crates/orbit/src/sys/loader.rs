use crate::controller::ChildLoader;
use crate::events::AppEvent;
use crate::menu::{LoadRequest, LoadResult};
use crate::providers::Provider;
use async_channel::Sender;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Runs `load_children` on Tokio's blocking pool and posts the result back to
/// the event loop as [`AppEvent::ChildrenLoaded`]. Prewarms take the same path
/// and finish with an [`AppEvent::ContentChanged`] for the provider's root nodes.
pub struct TokioLoader {
    handle: Handle,
    tx: Sender<AppEvent>,
}

impl TokioLoader {
    pub fn new(handle: Handle, tx: Sender<AppEvent>) -> Self {
        Self { handle, tx }
    }
}

impl ChildLoader for TokioLoader {
    fn load(&self, request: LoadRequest, provider: Arc<dyn Provider>) {
        let tx = self.tx.clone();
        self.handle.spawn(async move {
            let node = request.node.clone();
            let nodes = match tokio::task::spawn_blocking(move || provider.load_children(&node)).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    log::error!("Loading children of '{}' failed: {}", request.node.id, e);
                    Vec::new()
                }
            };
            let _ = tx
                .send(AppEvent::ChildrenLoaded(LoadResult { request, nodes }))
                .await;
        });
    }

    fn prewarm(&self, provider: Arc<dyn Provider>) {
        let tx = self.tx.clone();
        let provider_id = provider.provider_id();
        self.handle.spawn(async move {
            if let Err(e) = tokio::task::spawn_blocking(move || provider.prewarm()).await {
                log::error!("Prewarming '{provider_id}' failed: {e}");
                return;
            }
            let _ = tx
                .send(AppEvent::ContentChanged {
                    provider_id,
                    content_id: None,
                })
                .await;
        });
    }
}
