//! Cascading list panels, an independent stack next to the rings for content
//! that is too large or too linear for a radial layout.

use super::geometry::Rect;
use super::node::{ContentId, FunctionNode, NodeKey, ProviderId};
use super::{PANEL_HEADER_HEIGHT, PANEL_ROW_HEIGHT, PANEL_SPACING, PANEL_VISIBLE_ROWS, PANEL_WIDTH};
use orbitctl::wm::Point;
use serde::Serialize;
use serde_with::DeserializeFromStr;
use strum::{Display as StrumDisplay, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    DeserializeFromStr,
    EnumString,
    StrumDisplay,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum TypingMode {
    #[default]
    None,
    /// Keystrokes filter the rows without taking focus from the rings.
    TypeAhead,
    /// Keystrokes are literal text for the provider.
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelAnchor {
    /// Beside a ring slice, `radius` out from the menu center.
    Ring { level: usize, angle: f64, radius: f64 },
    /// Next to row `row` of panel `level`.
    Panel { level: usize, row: usize },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    /// Indices into `items` that match `query`, in display order.
    pub matches: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelSpec {
    pub title: String,
    pub items: Vec<FunctionNode>,
    pub anchor: PanelAnchor,
    pub source_node: Option<NodeKey>,
    /// The node whose children these are, reloaded on content changes.
    pub origin: Option<FunctionNode>,
    pub typing_mode: TypingMode,
}

impl PanelSpec {
    pub fn from_origin(origin: &FunctionNode, items: Vec<FunctionNode>, anchor: PanelAnchor) -> Self {
        Self {
            title: origin.name.clone(),
            items,
            anchor,
            source_node: Some(origin.key()),
            origin: Some(origin.clone()),
            typing_mode: TypingMode::None,
        }
    }

    pub fn typing(mut self, mode: TypingMode) -> Self {
        self.typing_mode = mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub level: usize,
    pub title: String,
    pub items: Vec<FunctionNode>,
    pub anchor: PanelAnchor,
    pub source_node: Option<NodeKey>,
    pub origin: Option<FunctionNode>,
    pub provider_id: Option<ProviderId>,
    pub content_id: Option<ContentId>,
    pub typing_mode: TypingMode,
    pub search: SearchState,
    pub input_text: String,
    hovered_row: Option<usize>,
    scroll_offset: usize,
}

impl Panel {
    fn new(level: usize, spec: PanelSpec) -> Self {
        let mut panel = Self {
            level,
            title: spec.title,
            items: spec.items,
            anchor: spec.anchor,
            source_node: spec.source_node,
            provider_id: spec.origin.as_ref().map(|o| o.provider_id.clone()),
            content_id: spec.origin.as_ref().map(FunctionNode::content_id),
            origin: spec.origin,
            typing_mode: spec.typing_mode,
            search: SearchState::default(),
            input_text: String::new(),
            hovered_row: None,
            scroll_offset: 0,
        };
        panel.refilter();
        panel
    }

    pub fn hovered_row(&self) -> Option<usize> {
        self.hovered_row
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn row_count(&self) -> usize {
        self.search.matches.len()
    }

    pub fn row_node(&self, row: usize) -> Option<&FunctionNode> {
        self.search.matches.get(row).and_then(|&i| self.items.get(i))
    }

    pub fn rows(&self) -> impl Iterator<Item = &FunctionNode> {
        self.search.matches.iter().filter_map(|&i| self.items.get(i))
    }

    pub fn hovered_node(&self) -> Option<&FunctionNode> {
        self.hovered_row.and_then(|row| self.row_node(row))
    }

    fn row_of(&self, key: &NodeKey) -> Option<usize> {
        self.rows().position(|n| n.key() == *key)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.items.iter().any(|n| n.key() == *key)
    }

    fn refilter(&mut self) {
        let query = self.search.query.to_lowercase();
        self.search.matches = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, n)| query.is_empty() || n.name.to_lowercase().contains(&query))
            .map(|(i, _)| i)
            .collect();
        self.hovered_row = self.hovered_row.filter(|&row| row < self.row_count());
        self.clamp_scroll();
    }

    fn max_scroll(&self) -> usize {
        self.row_count().saturating_sub(PANEL_VISIBLE_ROWS)
    }

    fn clamp_scroll(&mut self) {
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    fn visible_rows(&self) -> usize {
        self.row_count().min(PANEL_VISIBLE_ROWS)
    }

    fn height(&self) -> f64 {
        PANEL_HEADER_HEIGHT + self.visible_rows() as f64 * PANEL_ROW_HEIGHT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The same source already has its cascade open.
    Unchanged,
    Pushed { level: usize },
    /// Parent missing, or the source node is no longer in it.
    Rejected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedInput {
    pub level: usize,
    pub provider_id: Option<ProviderId>,
    pub content_id: Option<ContentId>,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct ListPanelManager {
    panels: Vec<Panel>,
}

impl ListPanelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn panel(&self, level: usize) -> Option<&Panel> {
        self.panels.get(level)
    }

    pub fn is_open(&self) -> bool {
        !self.panels.is_empty()
    }

    /// The deepest panel, which receives typing.
    pub fn top(&self) -> Option<&Panel> {
        self.panels.last()
    }

    /// Opens panel 0, closing any existing cascade.
    pub fn show(&mut self, spec: PanelSpec) {
        log::debug!("showing panel '{}'", spec.title);
        self.panels = vec![Panel::new(0, spec)];
    }

    pub fn push_panel(&mut self, parent_level: usize, spec: PanelSpec) -> PushOutcome {
        let Some(parent) = self.panels.get(parent_level) else {
            return PushOutcome::Rejected;
        };
        if let Some(source) = &spec.source_node {
            if !parent.contains(source) {
                return PushOutcome::Rejected;
            }
            if self.is_cascade_open(parent_level + 1, source) {
                return PushOutcome::Unchanged;
            }
        }
        self.pop_to_level(parent_level);
        let level = parent_level + 1;
        self.panels.push(Panel::new(level, spec));
        PushOutcome::Pushed { level }
    }

    pub fn pop_to_level(&mut self, level: usize) {
        self.panels.truncate(level + 1);
    }

    /// Pops the deepest panel. Returns false when there was none.
    pub fn pop(&mut self) -> bool {
        self.panels.pop().is_some()
    }

    pub fn is_cascade_open(&self, level: usize, source: &NodeKey) -> bool {
        self.panels
            .get(level)
            .is_some_and(|p| p.source_node.as_ref() == Some(source))
    }

    pub fn hover_row(&mut self, level: usize, row: Option<usize>) -> bool {
        let Some(panel) = self.panels.get_mut(level) else {
            return false;
        };
        if row.is_some_and(|r| r >= panel.row_count()) || panel.hovered_row == row {
            return false;
        }
        panel.hovered_row = row;
        true
    }

    /// Moves hover on the deepest panel, scrolling it into view.
    pub fn step_hover(&mut self, delta: isize) -> bool {
        let Some(panel) = self.panels.last_mut() else {
            return false;
        };
        let count = panel.row_count() as isize;
        if count == 0 {
            return false;
        }
        let row = match panel.hovered_row {
            Some(r) => (r as isize + delta).clamp(0, count - 1),
            None => 0,
        } as usize;
        panel.hovered_row = Some(row);
        if row < panel.scroll_offset {
            panel.scroll_offset = row;
        } else if row >= panel.scroll_offset + PANEL_VISIBLE_ROWS {
            panel.scroll_offset = row + 1 - PANEL_VISIBLE_ROWS;
        }
        true
    }

    pub fn scroll(&mut self, level: usize, delta: isize) -> bool {
        let Some(panel) = self.panels.get_mut(level) else {
            return false;
        };
        let before = panel.scroll_offset;
        panel.scroll_offset = before.saturating_add_signed(delta).min(panel.max_scroll());
        panel.scroll_offset != before
    }

    pub fn type_char(&mut self, c: char) -> bool {
        let Some(panel) = self.panels.last_mut() else {
            return false;
        };
        match panel.typing_mode {
            TypingMode::None => return false,
            TypingMode::TypeAhead => {
                panel.search.query.push(c);
                panel.refilter();
                panel.hovered_row = (panel.row_count() > 0).then_some(0);
                panel.scroll_offset = 0;
            }
            TypingMode::Input => panel.input_text.push(c),
        }
        true
    }

    pub fn backspace(&mut self) -> bool {
        let Some(panel) = self.panels.last_mut() else {
            return false;
        };
        let removed = match panel.typing_mode {
            TypingMode::None => None,
            TypingMode::TypeAhead => panel.search.query.pop(),
            TypingMode::Input => panel.input_text.pop(),
        };
        if removed.is_some() && panel.typing_mode == TypingMode::TypeAhead {
            panel.refilter();
        }
        removed.is_some()
    }

    /// Takes the text typed into the deepest input panel.
    pub fn submit_input(&mut self) -> Option<SubmittedInput> {
        let panel = self.panels.last_mut()?;
        if panel.typing_mode != TypingMode::Input || panel.input_text.trim().is_empty() {
            return None;
        }
        Some(SubmittedInput {
            level: panel.level,
            provider_id: panel.provider_id.clone(),
            content_id: panel.content_id.clone(),
            text: std::mem::take(&mut panel.input_text),
        })
    }

    /// Swaps in fresh items for every panel showing `(provider_id, content_id)`,
    /// keeping it open and its hovered row on the same node. Cascades whose
    /// source vanished are closed. Returns the reloaded levels.
    pub fn reload_content(
        &mut self,
        provider_id: &ProviderId,
        content_id: &ContentId,
        nodes: &[FunctionNode],
    ) -> Vec<usize> {
        let levels: Vec<usize> = self
            .panels
            .iter()
            .filter(|p| {
                p.provider_id.as_ref() == Some(provider_id) && p.content_id.as_ref() == Some(content_id)
            })
            .map(|p| p.level)
            .collect();

        for &level in levels.iter().rev() {
            let Some(panel) = self.panels.get_mut(level) else {
                continue;
            };
            let hovered = panel.hovered_node().map(FunctionNode::key);
            panel.items = nodes.to_vec();
            panel.refilter();
            panel.hovered_row = hovered.and_then(|k| panel.row_of(&k));

            let child_is_stale = self
                .panels
                .get(level + 1)
                .and_then(|child| child.source_node.as_ref())
                .is_some_and(|source| !self.panels[level].contains(source));
            if child_is_stale {
                self.pop_to_level(level);
            }
        }
        if !levels.is_empty() {
            log::debug!("reloaded panels {levels:?} for {provider_id}/{content_id}");
        }
        levels
    }

    /// Closes everything when panel 0's source node is no longer valid.
    pub fn prune_stale(&mut self, is_valid: impl Fn(&NodeKey) -> bool) -> bool {
        let stale = self
            .panels
            .first()
            .and_then(|p| p.source_node.as_ref())
            .is_some_and(|source| !is_valid(source));
        if stale {
            self.reset();
        }
        stale
    }

    pub fn reset(&mut self) {
        self.panels.clear();
    }

    /// Screen rectangle of each panel, in level order.
    pub fn panel_regions(&self, center: Point) -> Vec<Rect> {
        let mut regions: Vec<Rect> = Vec::with_capacity(self.panels.len());
        let mut leftward = false;
        for panel in &self.panels {
            let origin = match panel.anchor {
                PanelAnchor::Ring { angle, radius, .. } => {
                    let anchor = center.polar(angle, radius);
                    leftward = angle.cos() < 0.0;
                    let x = if leftward {
                        anchor.x - PANEL_SPACING - PANEL_WIDTH
                    } else {
                        anchor.x + PANEL_SPACING
                    };
                    Point::new(x, anchor.y - PANEL_HEADER_HEIGHT / 2.0)
                }
                PanelAnchor::Panel { level, row } => {
                    match (regions.get(level), self.panels.get(level)) {
                        (Some(parent), Some(parent_panel)) => {
                            let x = if leftward {
                                parent.origin.x - PANEL_SPACING - PANEL_WIDTH
                            } else {
                                parent.right() + PANEL_SPACING
                            };
                            let visible = row.saturating_sub(parent_panel.scroll_offset);
                            Point::new(
                                x,
                                parent.origin.y + PANEL_HEADER_HEIGHT + visible as f64 * PANEL_ROW_HEIGHT,
                            )
                        }
                        _ => center,
                    }
                }
            };
            regions.push(Rect::new(origin, PANEL_WIDTH, panel.height()));
        }
        regions
    }

    /// `(level, row)` under `point`, deepest panel first.
    pub fn row_at(&self, point: Point, center: Point) -> Option<(usize, usize)> {
        let regions = self.panel_regions(center);
        regions.iter().enumerate().rev().find_map(|(level, rect)| {
            if !rect.contains(point) {
                return None;
            }
            let y = point.y - rect.origin.y - PANEL_HEADER_HEIGHT;
            if y < 0.0 {
                return None;
            }
            let panel = &self.panels[level];
            let row = (y / PANEL_ROW_HEIGHT) as usize + panel.scroll_offset;
            (row < panel.row_count()).then_some((level, row))
        })
    }

    /// Whether `point` is over any panel at all, header included.
    pub fn contains_point(&self, point: Point, center: Point) -> bool {
        self.panel_regions(center).iter().any(|r| r.contains(point))
    }
}
