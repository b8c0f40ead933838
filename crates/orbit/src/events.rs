use crate::input::RawEvent;
use crate::menu::{ConfigId, ContentId, LoadResult, ProviderId};

/// Everything the event loop reacts to. Background services only ever send these.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Show { expand: Option<ProviderId> },
    ShowConfig(ConfigId),
    Hide,
    ExecuteSelected,
    Input(RawEvent),
    DragFinished { success: bool },
    /// Hover polling tick.
    Tick,
    ChildrenLoaded(LoadResult),
    ContentChanged {
        provider_id: ProviderId,
        content_id: Option<ContentId>,
    },
    ConfigReload,
}
