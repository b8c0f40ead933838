use super::{ChangeSink, Provider};
use crate::config::{AppEntry, AppsConfig};
use crate::menu::node::META_RUNNING;
use crate::menu::{Action, ClickBehavior, FunctionNode, GestureKind, IconRef, Modifiers, ProviderId};
use crate::sys::store::FavoritesStore;
use orbitctl::desktop::{self, AppInfo, AppQuery};
use orbitctl::wm::{self, WindowClass};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

const ALL_APPS_ID: &str = "all-apps";

/// Installed applications. `true` asks for a rescan of the desktop entries first.
type Catalog = Box<dyn Fn(bool) -> Vec<AppInfo> + Send + Sync>;
type RunningClasses = Box<dyn Fn() -> Vec<WindowClass> + Send + Sync>;

/// What `provide_nodes` reads. Filled by `prewarm`, off the event loop.
#[derive(Default)]
struct Snapshot {
    catalog: Vec<AppInfo>,
    running: Vec<WindowClass>,
}

/// Favorite applications plus an optional "All Applications" category.
pub struct AppsProvider {
    inner: Arc<Inner>,
}

struct Inner {
    id: ProviderId,
    name: String,
    /// Class/exec overrides from the config, keyed by lowercased query.
    overrides: HashMap<String, AppEntry>,
    favorites: RwLock<Vec<AppQuery>>,
    all_apps: bool,
    store: Arc<dyn FavoritesStore>,
    sink: RwLock<Option<ChangeSink>>,
    catalog: Catalog,
    running: RunningClasses,
    snapshot: RwLock<Snapshot>,
    /// Set by `clear_cache`; the next prewarm rescans the desktop entries.
    stale: AtomicBool,
}

impl AppsProvider {
    pub fn from_config(config: &AppsConfig, store: Arc<dyn FavoritesStore>) -> Self {
        Self::with_sources(
            config,
            store,
            Box::new(|rescan: bool| {
                if rescan {
                    desktop::refresh_cache();
                }
                desktop::all_entries()
            }),
            Box::new(wm::get_active_classes),
        )
    }

    pub fn with_sources(
        config: &AppsConfig,
        store: Arc<dyn FavoritesStore>,
        catalog: Catalog,
        running: RunningClasses,
    ) -> Self {
        let favorites = match store.load(&config.id) {
            Ok(Some(saved)) => saved.into_iter().map(AppQuery::new).collect(),
            Ok(None) => config.favorites.iter().map(|e| e.app.clone()).collect(),
            Err(e) => {
                log::warn!("Failed to load favorites for '{}': {}", config.id, e);
                config.favorites.iter().map(|e| e.app.clone()).collect()
            }
        };
        let overrides = config
            .favorites
            .iter()
            .map(|e| (e.app.to_lowercase(), e.clone()))
            .collect();

        Self {
            inner: Arc::new(Inner {
                id: config.id.clone(),
                name: config.name.clone(),
                overrides,
                favorites: RwLock::new(favorites),
                all_apps: config.all_apps,
                store,
                sink: RwLock::new(None),
                catalog,
                running,
                snapshot: RwLock::new(Snapshot::default()),
                stale: AtomicBool::new(false),
            }),
        }
    }

    pub fn favorites(&self) -> Vec<AppQuery> {
        self.inner.favorites.read().clone()
    }
}

impl Inner {
    /// Desktop entry for `query` with the config's class/exec overrides applied.
    fn resolve(&self, query: &AppQuery, catalog: &[AppInfo]) -> Option<AppInfo> {
        let base = desktop::find_desktop_entry_in_list(query, catalog);
        let entry = self.overrides.get(&query.to_lowercase());
        let exec = entry
            .and_then(|e| e.exec.clone())
            .or_else(|| base.as_ref().map(|b| b.exec.clone()))?;
        let class = entry
            .and_then(|e| e.class.clone())
            .or_else(|| base.as_ref().map(|b| b.class.clone()))
            .unwrap_or_else(|| WindowClass::new(query.as_str()));

        Some(match base {
            Some(base) => AppInfo { class, exec, ..base },
            None => AppInfo {
                id: desktop::DesktopId::new(format!("{query}.desktop")),
                name: desktop::AppName::new(query.as_str()),
                icon: orbitctl::icon::IconName::new(query.as_str()),
                class,
                exec,
            },
        })
    }

    /// The favorites entry that resolves to `app`, if any.
    fn favorite_for(&self, app: &AppInfo, catalog: &[AppInfo]) -> Option<AppQuery> {
        self.favorites
            .read()
            .iter()
            .find(|q| self.resolve(q, catalog).is_some_and(|fav| fav.id == app.id))
            .cloned()
    }

    fn toggle_favorite(&self, query: &AppQuery) -> anyhow::Result<()> {
        let snapshot: Vec<String> = {
            let mut favorites = self.favorites.write();
            let key = query.to_lowercase();
            match favorites.iter().position(|f| f.to_lowercase() == key) {
                Some(at) => {
                    favorites.remove(at);
                }
                None => favorites.push(query.clone()),
            }
            favorites.iter().map(ToString::to_string).collect()
        };
        log::debug!("favorites for {} now {:?}", self.id, snapshot);
        self.store.save(&self.id, &snapshot)?;
        if let Some(sink) = self.sink.read().as_ref() {
            sink.notify(self.id.clone(), None);
        }
        Ok(())
    }

    fn toggle_action(self: &Arc<Self>, query: AppQuery) -> ClickBehavior {
        let weak: Weak<Inner> = Arc::downgrade(self);
        ClickBehavior::ExecuteKeepOpen(Action::new(format!("toggle favorite {query}"), move || {
            match weak.upgrade() {
                Some(inner) => inner.toggle_favorite(&query),
                None => Ok(()),
            }
        }))
    }

    fn app_node(
        self: &Arc<Self>,
        node_id: String,
        app: &AppInfo,
        favorite: AppQuery,
        active: &[WindowClass],
    ) -> FunctionNode {
        let running = wm::is_running(&app.class, active);
        let (class, exec) = (app.class.clone(), app.exec.clone());

        let raise = {
            let (class, exec) = (class.clone(), exec.clone());
            Action::new(format!("run or raise {class}"), move || {
                Ok(wm::run_or_raise(&class, &exec)?)
            })
        };
        let new_instance = {
            let exec = exec.clone();
            Action::new(format!("launch {exec}"), move || Ok(wm::spawn_shell(&exec)?))
        };

        let mut node = FunctionNode::leaf(node_id, app.name.as_str(), &self.id)
            .with_meta(META_RUNNING, running)
            .on(GestureKind::LeftClick, Modifiers::empty(), ClickBehavior::Execute(raise.clone()))
            .on(GestureKind::LeftClick, Modifiers::CTRL, ClickBehavior::ExecuteKeepOpen(raise))
            .on(GestureKind::LeftClick, Modifiers::SHIFT, ClickBehavior::Execute(new_instance))
            .on(GestureKind::MiddleClick, Modifiers::empty(), self.toggle_action(favorite));
        if !app.icon.is_empty() {
            node = node.with_icon(IconRef::Named(app.icon.clone()));
        }
        if running {
            node = node.on(
                GestureKind::RightClick,
                Modifiers::empty(),
                ClickBehavior::Execute(Action::new(format!("close {class}"), move || {
                    Ok(wm::close_window(&class)?)
                })),
            );
        }
        node
    }

    /// A favorite with no desktop entry and no exec: it can only be removed.
    fn unresolved_node(self: &Arc<Self>, query: &AppQuery) -> FunctionNode {
        FunctionNode::leaf(format!("fav:{query}"), query.as_str(), &self.id)
            .with_icon(IconRef::Named(orbitctl::icon::IconName::from("dialog-question")))
            .on(
                GestureKind::MiddleClick,
                Modifiers::empty(),
                self.toggle_action(query.clone()),
            )
    }
}

impl Provider for AppsProvider {
    fn provider_id(&self) -> ProviderId {
        self.inner.id.clone()
    }

    fn provider_name(&self) -> &str {
        &self.inner.name
    }

    fn is_mutable(&self) -> bool {
        true
    }

    fn provide_nodes(&self) -> Vec<FunctionNode> {
        let inner = &self.inner;
        let snapshot = inner.snapshot.read();
        let (catalog, active) = (&snapshot.catalog, &snapshot.running);

        let mut nodes: Vec<FunctionNode> = inner
            .favorites
            .read()
            .iter()
            .map(|query| match inner.resolve(query, catalog) {
                Some(app) => inner.app_node(format!("fav:{query}"), &app, query.clone(), active),
                None => inner.unresolved_node(query),
            })
            .collect();

        if inner.all_apps {
            nodes.push(
                FunctionNode::category(ALL_APPS_ID, "All Applications", &inner.id)
                    .with_dynamic_loading()
                    .with_icon(IconRef::Named(orbitctl::icon::IconName::from(
                        "view-app-grid",
                    ))),
            );
        }
        nodes
    }

    fn load_children(&self, node: &FunctionNode) -> Vec<FunctionNode> {
        if node.id.as_str() != ALL_APPS_ID {
            return node.child_nodes().to_vec();
        }
        // off the loop, so this is a good moment to catch up
        self.prewarm();
        let inner = &self.inner;
        let snapshot = inner.snapshot.read();
        let (catalog, active) = (&snapshot.catalog, &snapshot.running);
        catalog
            .iter()
            .map(|app| {
                let key = inner.favorite_for(app, catalog).unwrap_or_else(|| {
                    AppQuery::new(app.id.trim_end_matches(".desktop"))
                });
                inner.app_node(format!("app:{}", app.id), app, key, active)
            })
            .collect()
    }

    fn needs_prewarm(&self) -> bool {
        true
    }

    fn prewarm(&self) {
        let inner = &self.inner;
        let rescan = inner.stale.swap(false, Ordering::AcqRel);
        let catalog = (inner.catalog)(rescan);
        let running = (inner.running)();
        log::debug!(
            "{}: {} apps installed, {} classes running{}",
            inner.id,
            catalog.len(),
            running.len(),
            if rescan { " (rescanned)" } else { "" }
        );
        *inner.snapshot.write() = Snapshot { catalog, running };
    }

    fn clear_cache(&self) {
        self.inner.stale.store(true, Ordering::Release);
    }

    fn watch(&self, sink: ChangeSink) {
        *self.inner.sink.write() = Some(sink);
    }
}

impl std::fmt::Debug for AppsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppsProvider")
            .field("id", &self.inner.id)
            .field("favorites", &*self.inner.favorites.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::ContentId;
    use crate::sys::store::MemoryFavoritesStore;
    use orbitctl::desktop::{AppName, DesktopId};
    use orbitctl::icon::IconName;
    use orbitctl::wm::ShellCommand;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn app(id: &str, name: &str, class: &str) -> AppInfo {
        AppInfo {
            id: DesktopId::new(format!("{id}.desktop")),
            name: AppName::from(name),
            icon: IconName::from(id),
            class: WindowClass::from(class),
            exec: ShellCommand::from(id),
        }
    }

    fn config(favorites: &[&str]) -> AppsConfig {
        AppsConfig {
            id: ProviderId::from("apps"),
            name: "Applications".into(),
            favorites: favorites
                .iter()
                .map(|q| AppEntry {
                    app: AppQuery::from(*q),
                    class: None,
                    exec: None,
                })
                .collect(),
            all_apps: true,
        }
    }

    fn provider(favorites: &[&str], store: Arc<dyn FavoritesStore>) -> AppsProvider {
        AppsProvider::with_sources(
            &config(favorites),
            store,
            Box::new(|_: bool| vec![app("firefox", "Firefox", "firefox"), app("kitty", "Kitty", "kitty")]),
            Box::new(|| vec![WindowClass::from("firefox")]),
        )
    }

    fn warm(favorites: &[&str], store: Arc<dyn FavoritesStore>) -> AppsProvider {
        let p = provider(favorites, store);
        p.prewarm();
        p
    }

    fn middle_click(node: &FunctionNode) {
        match node.resolve(GestureKind::MiddleClick, Modifiers::empty()) {
            ClickBehavior::ExecuteKeepOpen(action) => action.run().unwrap(),
            other => panic!("expected a keep-open toggle, got {}", other.kind()),
        }
    }

    #[test]
    fn favorites_resolve_and_flag_running_apps() {
        let p = warm(&["firefox", "ghost", "kitty"], Arc::new(MemoryFavoritesStore::default()));
        let nodes = p.provide_nodes();
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["fav:firefox", "fav:ghost", "fav:kitty", ALL_APPS_ID]);

        assert!(nodes[0].is_running());
        assert!(!nodes[2].is_running());
        assert!(!nodes[0].resolve(GestureKind::RightClick, Modifiers::empty()).is_none());
        assert!(nodes[2].resolve(GestureKind::RightClick, Modifiers::empty()).is_none());
        assert!(matches!(
            nodes[0].resolve(GestureKind::LeftClick, Modifiers::CTRL),
            ClickBehavior::ExecuteKeepOpen(_)
        ));
        // unresolved favorites only offer removal
        assert!(nodes[1].resolve(GestureKind::LeftClick, Modifiers::empty()).is_none());
        assert!(nodes[3].needs_dynamic_loading);
    }

    #[test]
    fn toggling_a_favorite_persists_and_notifies() {
        let store = Arc::new(MemoryFavoritesStore::default());
        let p = warm(&["firefox", "ghost"], store.clone());
        let seen: Arc<Mutex<Vec<(ProviderId, Option<ContentId>)>>> = Arc::default();
        let sink_seen = seen.clone();
        p.watch(ChangeSink::new(move |pid, cid| sink_seen.lock().push((pid, cid))));

        let ghost = p.provide_nodes().remove(1);
        middle_click(&ghost);
        assert_eq!(p.favorites(), vec![AppQuery::from("firefox")]);
        assert_eq!(
            store.load(&ProviderId::from("apps")).unwrap(),
            Some(vec!["firefox".to_string()])
        );
        assert_eq!(seen.lock().as_slice(), &[(ProviderId::from("apps"), None)]);

        // adding from the full list
        let all = p.provide_nodes().pop().unwrap();
        let children = p.load_children(&all);
        assert_eq!(children.len(), 2);
        middle_click(&children[1]);
        assert_eq!(p.favorites(), vec![AppQuery::from("firefox"), AppQuery::from("kitty")]);
        // and removing again through the same entry
        middle_click(&p.load_children(&all)[0]);
        assert_eq!(p.favorites(), vec![AppQuery::from("kitty")]);
    }

    #[test]
    fn root_nodes_only_read_the_prewarmed_snapshot() {
        let scans = Arc::new(AtomicUsize::new(0));
        let rescans = Arc::new(AtomicUsize::new(0));
        let polls = Arc::new(AtomicUsize::new(0));
        let p = {
            let (scans, rescans, polls) = (scans.clone(), rescans.clone(), polls.clone());
            AppsProvider::with_sources(
                &config(&["firefox"]),
                Arc::new(MemoryFavoritesStore::default()),
                Box::new(move |rescan: bool| {
                    scans.fetch_add(1, Ordering::SeqCst);
                    if rescan {
                        rescans.fetch_add(1, Ordering::SeqCst);
                    }
                    vec![app("firefox", "Firefox", "firefox")]
                }),
                Box::new(move || {
                    polls.fetch_add(1, Ordering::SeqCst);
                    vec![WindowClass::from("firefox")]
                }),
            )
        };
        assert!(p.needs_prewarm());

        // cold: nothing to resolve against, and no source touched
        let cold = p.provide_nodes();
        assert!(cold[0].resolve(GestureKind::LeftClick, Modifiers::empty()).is_none());
        assert_eq!((scans.load(Ordering::SeqCst), polls.load(Ordering::SeqCst)), (0, 0));

        p.prewarm();
        let nodes = p.provide_nodes();
        p.provide_nodes();
        assert!(nodes[0].is_running());
        assert!(!nodes[0].resolve(GestureKind::LeftClick, Modifiers::empty()).is_none());
        assert_eq!((scans.load(Ordering::SeqCst), polls.load(Ordering::SeqCst)), (1, 1));
        assert_eq!(rescans.load(Ordering::SeqCst), 0);

        // a cleared cache rescans the desktop entries once
        p.clear_cache();
        assert_eq!(scans.load(Ordering::SeqCst), 1);
        p.prewarm();
        p.prewarm();
        assert_eq!(scans.load(Ordering::SeqCst), 3);
        assert_eq!(rescans.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn saved_favorites_win_over_the_config() {
        let store = Arc::new(MemoryFavoritesStore::default());
        store
            .save(&ProviderId::from("apps"), &["kitty".to_string()])
            .unwrap();
        let p = provider(&["firefox"], store);
        assert_eq!(p.favorites(), vec![AppQuery::from("kitty")]);
    }
}
