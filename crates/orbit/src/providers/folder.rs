use super::{ChangeSink, PanelConfig, Provider, ProviderError};
use crate::config::FolderConfig;
use crate::menu::node::META_PATH;
use crate::menu::{
    Action, ClickBehavior, ContentId, DragProvider, FunctionNode, GestureKind, IconRef, Modifiers,
    ProviderId, TypingMode,
};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use orbitctl::icon::{self, IconName};
use orbitctl::wm;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// A directory tree, browsed lazily and watched while it is on screen.
pub struct FolderProvider {
    inner: Arc<Inner>,
}

struct Inner {
    id: ProviderId,
    name: String,
    root: PathBuf,
    panel: PanelConfig,
    show_hidden: bool,
    listings: RwLock<HashMap<PathBuf, Vec<FunctionNode>>>,
    watchers: Mutex<HashMap<PathBuf, RecommendedWatcher>>,
    sink: RwLock<Option<ChangeSink>>,
}

impl FolderProvider {
    pub fn from_config(config: &FolderConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: config.provider_id(),
                name: config.display_name(),
                root: config.path.clone(),
                panel: PanelConfig {
                    prefer_panel: config.prefer_panel,
                    max_ring_items: config.max_ring_items,
                },
                show_hidden: config.show_hidden,
                listings: RwLock::new(HashMap::new()),
                watchers: Mutex::new(HashMap::new()),
                sink: RwLock::new(None),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }
}

fn content_id(dir: &Path) -> ContentId {
    ContentId::new(dir.to_string_lossy())
}

impl Inner {
    fn read_listing(&self, dir: &Path) -> Result<Vec<FunctionNode>, ProviderError> {
        let read_err = |source| ProviderError::Read {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries: Vec<(bool, String, PathBuf)> = Vec::new();
        for entry in fs_err::read_dir(dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') && !self.show_hidden {
                continue;
            }
            let path = entry.path();
            entries.push((path.is_dir(), name, path));
        }
        entries.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.to_lowercase().cmp(&b.1.to_lowercase()))
        });
        Ok(entries
            .into_iter()
            .map(|(is_dir, name, path)| self.entry_node(&name, path, is_dir))
            .collect())
    }

    fn entry_node(&self, name: &str, path: PathBuf, is_dir: bool) -> FunctionNode {
        let id = path.to_string_lossy().into_owned();
        let open = {
            let path = path.clone();
            Action::new(format!("open {}", path.display()), move || Ok(wm::open_path(&path)?))
        };
        let drag = ClickBehavior::Drag(DragProvider::files(name, vec![path.clone()]));

        let node = if is_dir {
            FunctionNode::folder(id, name, &self.id)
                .with_dynamic_loading()
                .with_icon(IconRef::Named(IconName::from("folder")))
                .on(GestureKind::LeftClick, Modifiers::CTRL, ClickBehavior::Execute(open))
        } else {
            let icon_name = icon::icon_for_file(&path);
            let is_image = icon_name.as_str() == "image-x-generic";
            let node = FunctionNode::leaf(id, name, &self.id)
                .with_icon(IconRef::Named(icon_name))
                .on(GestureKind::LeftClick, Modifiers::empty(), ClickBehavior::Execute(open));
            if is_image {
                node.with_preview(path.clone())
            } else {
                node
            }
        };
        node.on(GestureKind::LeftClick, Modifiers::ALT, drag)
            .with_meta(META_PATH, path)
    }

    /// Drops the cached listing of `dir` and reports the change.
    fn invalidate(&self, dir: &Path) {
        self.listings.write().remove(dir);
        if let Some(sink) = self.sink.read().as_ref() {
            sink.notify(self.id.clone(), Some(content_id(dir)));
        }
    }

    fn ensure_watch(self: &Arc<Self>, dir: &Path) {
        if self.sink.read().is_none() || self.watchers.lock().contains_key(dir) {
            return;
        }
        match self.watch_dir(dir) {
            Ok(watcher) => {
                log::debug!("watching {}", dir.display());
                self.watchers.lock().insert(dir.to_path_buf(), watcher);
            }
            Err(e) => log::warn!("Failed to watch {}: {}", dir.display(), e),
        }
    }

    fn watch_dir(self: &Arc<Self>, dir: &Path) -> Result<RecommendedWatcher, ProviderError> {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let watched = dir.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event)
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_)
                    ) =>
                {
                    if let Some(inner) = weak.upgrade() {
                        inner.invalidate(&watched);
                    }
                }
                Ok(_) => {}
                Err(e) => log::error!("Watch error: {}", e),
            },
            notify::Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}

impl Provider for FolderProvider {
    fn provider_id(&self) -> ProviderId {
        self.inner.id.clone()
    }

    fn provider_name(&self) -> &str {
        &self.inner.name
    }

    fn default_typing_mode(&self) -> TypingMode {
        TypingMode::TypeAhead
    }

    fn panel_config(&self) -> PanelConfig {
        self.inner.panel
    }

    fn is_mutable(&self) -> bool {
        true
    }

    fn provide_nodes(&self) -> Vec<FunctionNode> {
        let inner = &self.inner;
        vec![
            FunctionNode::folder(content_id(&inner.root).as_str(), &inner.name, &inner.id)
                .with_dynamic_loading()
                .with_icon(IconRef::Named(IconName::from("folder")))
                .with_meta(META_PATH, inner.root.clone()),
        ]
    }

    fn load_children(&self, node: &FunctionNode) -> Vec<FunctionNode> {
        let Some(dir) = node.path().map(Path::to_path_buf) else {
            log::warn!("{}", ProviderError::NoPath(node.id.to_string()));
            return Vec::new();
        };
        if let Some(cached) = self.inner.listings.read().get(&dir) {
            return cached.clone();
        }
        match self.inner.read_listing(&dir) {
            Ok(nodes) => {
                self.inner.listings.write().insert(dir.clone(), nodes.clone());
                self.inner.ensure_watch(&dir);
                nodes
            }
            Err(e) => {
                log::error!("{}", e);
                Vec::new()
            }
        }
    }

    fn clear_cache(&self) {
        self.inner.watchers.lock().clear();
        self.inner.listings.write().clear();
    }

    fn watch(&self, sink: ChangeSink) {
        *self.inner.sink.write() = Some(sink);
    }
}
