use crate::events::AppEvent;
use async_channel::Sender;
use std::thread;
use tokio::runtime::{Handle, Runtime};

/// Starts the control socket and config watcher on a background Tokio runtime.
/// The returned handle is what child loads and ticks are spawned on.
pub fn start_background_services(tx: Sender<AppEvent>) -> std::io::Result<Handle> {
    let rt = Runtime::new()?;
    let handle = rt.handle().clone();

    thread::Builder::new()
        .name("orbit-services".into())
        .spawn(move || {
            rt.block_on(async {
                {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        crate::sys::server::run_server(tx).await;
                    });
                }

                {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        crate::config::run_async_watcher(tx).await;
                    });
                }

                std::future::pending::<()>().await;
            });
        })?;

    Ok(handle)
}
