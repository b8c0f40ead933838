use orbit::config;
use orbit::controller::{CircularUiManager, Services, UiEffect};
use orbit::events::AppEvent;
use orbit::providers::ChangeSink;
use orbit::sys::loader::TokioLoader;
use orbit::sys::runtime;
use orbit::sys::store::{FavoritesStore, MemoryFavoritesStore, TomlFavoritesStore};
use orbit::sys::ticker::TokioTicker;
use orbitctl::wm::{self, Point};
use std::sync::Arc;
use std::time::Instant;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = config::load_or_setup();
    let (tx, rx) = async_channel::unbounded();

    // Start Background Services
    let handle = runtime::start_background_services(tx.clone())?;

    let store: Arc<dyn FavoritesStore> = match TomlFavoritesStore::in_data_dir() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::warn!("Favorites will not persist: {}", e);
            Arc::new(MemoryFavoritesStore::default())
        }
    };
    let sink = {
        let tx = tx.clone();
        ChangeSink::new(move |provider_id, content_id| {
            let _ = tx.try_send(AppEvent::ContentChanged {
                provider_id,
                content_id,
            });
        })
    };
    let services = Services {
        loader: Box::new(TokioLoader::new(handle.clone(), tx.clone())),
        ticker: Box::new(TokioTicker::new(handle, tx.clone())),
        store,
        sink,
    };
    let mut ui = CircularUiManager::new(config, services);

    while let Ok(event) = rx.recv_blocking() {
        dispatch(&mut ui, event);
        for effect in ui.drain_effects() {
            present(&ui, effect);
        }
    }
    Ok(())
}

fn cursor() -> Point {
    wm::get_cursor_pos_on_active_monitor().unwrap_or_default()
}

fn dispatch(ui: &mut CircularUiManager, event: AppEvent) {
    match event {
        AppEvent::Show { expand: None } => ui.show(cursor()),
        AppEvent::Show {
            expand: Some(provider_id),
        } => ui.show_expanding(cursor(), &provider_id),
        AppEvent::ShowConfig(config_id) => ui.show_config(config_id, cursor()),
        AppEvent::Hide => ui.hide(),
        AppEvent::ExecuteSelected => ui.execute_selected(),
        AppEvent::Input(raw) => {
            let disposition = ui.handle_raw(&raw, Instant::now());
            log::trace!("{raw:?} -> {disposition:?}");
        }
        AppEvent::DragFinished { success } => ui.drag_finished(success),
        AppEvent::Tick => ui.tick(),
        AppEvent::ChildrenLoaded(result) => ui.children_loaded(result),
        AppEvent::ContentChanged {
            provider_id,
            content_id,
        } => ui.content_changed(provider_id, content_id),
        AppEvent::ConfigReload => ui.reconfigure(config::load_or_setup()),
    }
}

fn present(ui: &CircularUiManager, effect: UiEffect) {
    match effect {
        UiEffect::Show => log::info!("Menu shown"),
        UiEffect::Hide => log::info!("Menu hidden"),
        UiEffect::Redraw => log::debug!("{:#?}", ui.view()),
        UiEffect::StartDrag(drag) => log::info!("Drag requested for '{}'", drag.label),
        UiEffect::RingChanged(diff) => log::debug!(
            "ring {} changed: added {:?}, removed {:?}, kept {}",
            diff.level,
            diff.added,
            diff.removed,
            diff.persisted.len()
        ),
    }
}
