//! Pluggable content sources. Providers are built once per ring configuration,
//! outlive show/hide cycles and cache their own state.

use crate::config::ProviderConfig;
use crate::menu::{ContentId, FunctionNode, NodeType, ProviderId, TypingMode};
use crate::sys::store::FavoritesStore;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub mod apps;
pub mod commands;
pub mod folder;

pub use apps::AppsProvider;
pub use commands::CommandsProvider;
pub use folder::FolderProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    /// Show folder-type children as a list panel instead of a ring.
    pub prefer_panel: bool,
    /// Above this many children a ring falls back to a panel.
    pub max_ring_items: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            prefer_panel: false,
            max_ring_items: crate::menu::MAX_RING_ITEMS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Ignored,
    /// Handled; the panel stays open and reloads.
    KeepOpen,
    /// Handled; the menu closes.
    Close,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Watch(#[from] notify::Error),
    #[error("node '{0}' has no path")]
    NoPath(String),
}

/// Callback through which mutable providers report `(provider, content)` changes.
#[derive(Clone)]
pub struct ChangeSink(Arc<dyn Fn(ProviderId, Option<ContentId>) + Send + Sync>);

impl ChangeSink {
    pub fn new(notify: impl Fn(ProviderId, Option<ContentId>) + Send + Sync + 'static) -> Self {
        Self(Arc::new(notify))
    }

    pub fn notify(&self, provider_id: ProviderId, content_id: Option<ContentId>) {
        (self.0)(provider_id, content_id)
    }
}

impl fmt::Debug for ChangeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangeSink")
    }
}

pub trait Provider: Send + Sync {
    fn provider_id(&self) -> ProviderId;

    fn provider_name(&self) -> &str;

    fn default_typing_mode(&self) -> TypingMode {
        TypingMode::None
    }

    /// Typing mode of a panel showing `node`'s children.
    fn typing_mode_for(&self, _node: &FunctionNode) -> TypingMode {
        self.default_typing_mode()
    }

    fn panel_config(&self) -> PanelConfig {
        PanelConfig::default()
    }

    fn prefers_panel_for(&self, node: &FunctionNode) -> bool {
        self.panel_config().prefer_panel && node.node_type == NodeType::Folder
    }

    /// Whether the provider pushes live updates through its [`ChangeSink`].
    fn is_mutable(&self) -> bool {
        false
    }

    /// Root nodes. Called on the event loop, so it only reads caches.
    fn provide_nodes(&self) -> Vec<FunctionNode>;

    /// Children of a dynamic node. May block; never called on the event loop.
    fn load_children(&self, node: &FunctionNode) -> Vec<FunctionNode> {
        node.child_nodes().to_vec()
    }

    /// Whether `provide_nodes` reads a cache that [`Provider::prewarm`] fills.
    fn needs_prewarm(&self) -> bool {
        false
    }

    /// Refills the cache behind `provide_nodes`. May block; never called on the event loop.
    fn prewarm(&self) {}

    /// Marks cached state out of date. Called on the event loop, so it must not block.
    fn clear_cache(&self) {}

    fn watch(&self, _sink: ChangeSink) {}

    fn submit_input(&self, _content_id: &ContentId, _text: &str) -> InputOutcome {
        InputOutcome::Ignored
    }
}

/// Providers of one ring configuration, in display order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` unless its id is already taken.
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> bool {
        let id = provider.provider_id();
        if self.get(&id).is_some() {
            log::warn!("skipping provider '{id}': id already registered");
            return false;
        }
        self.providers.push(provider);
        true
    }

    pub fn get(&self, id: &ProviderId) -> Option<&Arc<dyn Provider>> {
        self.providers.iter().find(|p| &p.provider_id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn clear_caches(&self) {
        self.providers.iter().for_each(|p| p.clear_cache());
    }

    pub fn watch_all(&self, sink: &ChangeSink) {
        self.providers
            .iter()
            .filter(|p| p.is_mutable())
            .for_each(|p| p.watch(sink.clone()));
    }

    pub fn from_config(configs: &[ProviderConfig], store: &Arc<dyn FavoritesStore>) -> Self {
        let mut registry = Self::new();
        for config in configs {
            registry.register(build(config, store));
        }
        registry
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.provider_id()))
            .finish()
    }
}

pub fn build(config: &ProviderConfig, store: &Arc<dyn FavoritesStore>) -> Arc<dyn Provider> {
    match config {
        ProviderConfig::Apps(apps) => Arc::new(AppsProvider::from_config(apps, store.clone())),
        ProviderConfig::Folder(folder) => Arc::new(FolderProvider::from_config(folder)),
        ProviderConfig::Commands(commands) => Arc::new(CommandsProvider::from_config(commands)),
    }
}
