//! Ring and panel navigation: the content model, the ring stack, the panel
//! cascade and the view-models handed to the presentation layer.

use std::f64::consts::PI;

pub mod behavior;
pub mod geometry;
pub mod manager;
pub mod node;
pub mod panel;
pub mod view;

pub use behavior::{
    Action, BehaviorTable, ClickBehavior, DragPayload, DragProvider, GestureKind, Modifiers,
    NodeBehaviors,
};
pub use geometry::{Rect, RingLayout, RingShape};
pub use manager::{
    Applied, Expansion, FunctionManager, HitItem, LoadPurpose, LoadRequest, LoadResult, LoadTicket,
    Ring, RingDiff,
};
pub use node::{
    ConfigId, ContentId, FunctionNode, IconRef, MetaValue, NodeId, NodeKey, NodeType, ProviderId,
};
pub use panel::{
    ListPanelManager, Panel, PanelAnchor, PanelSpec, PushOutcome, SubmittedInput, TypingMode,
};
pub use view::{ItemState, ItemView, MenuView, PanelView, RingView, RowView};

pub const CLOSE_ZONE_RADIUS: f64 = 48.0; // pointer back inside this closes the menu
pub const RING_THICKNESS: f64 = 80.0;
pub const RING_GAP: f64 = 6.0;
pub const START_OFFSET: f64 = -PI / 2.0; // first root item points north
pub const CHILD_SLICE_ANGLE: f64 = PI / 6.0;
pub const MAX_RING_ITEMS: usize = 12;

// Panel metrics, in the same logical pixels as ring radii
pub const PANEL_WIDTH: f64 = 260.0;
pub const PANEL_ROW_HEIGHT: f64 = 28.0;
pub const PANEL_HEADER_HEIGHT: f64 = 32.0;
pub const PANEL_VISIBLE_ROWS: usize = 12;
pub const PANEL_SPACING: f64 = 8.0;
