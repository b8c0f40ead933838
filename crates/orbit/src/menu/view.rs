//! Plain snapshots of the ring and panel stacks for whatever draws them.

use super::geometry::{Rect, RingShape};
use super::manager::{FunctionManager, Ring};
use super::node::{FunctionNode, IconRef, NodeKey, NodeType};
use super::panel::{ListPanelManager, Panel, TypingMode};
use super::{GestureKind, Modifiers};
use orbitctl::wm::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// Nothing happens on a left click and there is nothing to open.
    Broken,
    Hovered,
    Selected,
    Running,
    Idle,
}

impl ItemState {
    fn of(node: &FunctionNode, hovered: bool, selected: bool) -> Self {
        if hovered {
            Self::Hovered
        } else if selected {
            Self::Selected
        } else if node.resolve(GestureKind::LeftClick, Modifiers::empty()).is_none()
            && !node.can_expand()
        {
            Self::Broken
        } else if node.is_running() {
            Self::Running
        } else {
            Self::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemView {
    pub key: NodeKey,
    pub name: String,
    pub icon: IconRef,
    pub node_type: NodeType,
    pub state: ItemState,
    /// Screen position of the slice center.
    pub position: Point,
    pub expandable: bool,
    /// Children of this item are being fetched.
    pub loading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RingView {
    pub level: usize,
    pub shape: RingShape,
    pub items: Vec<ItemView>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub key: NodeKey,
    pub name: String,
    pub icon: IconRef,
    pub state: ItemState,
    pub has_children: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub level: usize,
    pub title: String,
    pub region: Rect,
    /// Only the rows inside the scroll window.
    pub rows: Vec<RowView>,
    pub first_row: usize,
    pub total_rows: usize,
    pub typing_mode: TypingMode,
    pub query: String,
    pub input_text: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MenuView {
    pub visible: bool,
    pub center: Point,
    pub active_level: usize,
    pub rings: Vec<RingView>,
    pub panels: Vec<PanelView>,
}

impl MenuView {
    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn build(center: Point, rings: &FunctionManager, panels: &ListPanelManager) -> Self {
        let loading = rings.pending().map(|p| p.node.key());
        let regions = panels.panel_regions(center);
        Self {
            visible: true,
            center,
            active_level: rings.active_level(),
            rings: rings
                .rings()
                .iter()
                .map(|ring| ring_view(ring, center, rings.active_level(), loading.as_ref()))
                .collect(),
            panels: panels
                .panels()
                .iter()
                .zip(regions)
                .map(|(panel, region)| panel_view(panel, region))
                .collect(),
        }
    }
}

fn ring_view(ring: &Ring, center: Point, active_level: usize, loading: Option<&NodeKey>) -> RingView {
    let items = ring
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let key = node.key();
            ItemView {
                state: ItemState::of(
                    node,
                    ring.hovered_index() == Some(i),
                    ring.selected_index() == Some(i),
                ),
                position: ring.shape.slice_center(i, center),
                expandable: node.can_expand(),
                loading: loading == Some(&key),
                name: node.name.clone(),
                icon: node.icon.clone(),
                node_type: node.node_type,
                key,
            }
        })
        .collect();
    RingView {
        level: ring.level,
        shape: ring.shape,
        items,
        active: ring.level == active_level,
    }
}

fn panel_view(panel: &Panel, region: Rect) -> PanelView {
    let first_row = panel.scroll_offset();
    let rows = panel
        .rows()
        .enumerate()
        .skip(first_row)
        .take(super::PANEL_VISIBLE_ROWS)
        .map(|(row, node)| RowView {
            key: node.key(),
            name: node.name.clone(),
            icon: node.icon.clone(),
            state: ItemState::of(node, panel.hovered_row() == Some(row), false),
            has_children: node.can_expand(),
        })
        .collect();
    PanelView {
        level: panel.level,
        title: panel.title.clone(),
        region,
        rows,
        first_row,
        total_rows: panel.row_count(),
        typing_mode: panel.typing_mode,
        query: panel.search.query.clone(),
        input_text: panel.input_text.clone(),
    }
}
