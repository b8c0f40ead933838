//! The ring stack and its navigation transitions.
//!
//! Level 0 is always the root. Every index stored here is checked against the
//! ring it points into, so a gesture that raced an async load or a reset
//! simply finds no item.

use super::geometry::{RingLayout, RingShape, pointer_angle};
use super::node::{ContentId, FunctionNode, NodeKey, ProviderId};
use crate::providers::ProviderRegistry;
use orbitctl::wm::Point;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    pub level: usize,
    pub nodes: Vec<FunctionNode>,
    hovered_index: Option<usize>,
    selected_index: Option<usize>,
    /// `None` for the mixed root aggregating several providers.
    pub provider_id: Option<ProviderId>,
    /// Which instance of dynamic content this ring shows.
    pub content_id: Option<ContentId>,
    pub seed: Option<FunctionNode>,
    /// Drilled into (full circle) rather than branched out (arc).
    pub drilled: bool,
    pub shape: RingShape,
}

impl Ring {
    fn root(nodes: Vec<FunctionNode>, provider_id: Option<ProviderId>) -> Self {
        Self {
            level: 0,
            nodes,
            hovered_index: None,
            selected_index: None,
            provider_id,
            content_id: None,
            seed: None,
            drilled: false,
            shape: RingShape::full(0.0, 0.0, 0.0, 0),
        }
    }

    fn child(level: usize, seed: &FunctionNode, nodes: Vec<FunctionNode>, drilled: bool) -> Self {
        Self {
            level,
            nodes,
            hovered_index: None,
            selected_index: None,
            provider_id: Some(seed.provider_id.clone()),
            content_id: seed.needs_dynamic_loading.then(|| seed.content_id()),
            seed: Some(seed.clone()),
            drilled,
            shape: RingShape::full(0.0, 0.0, 0.0, 0),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn hovered_index(&self) -> Option<usize> {
        self.hovered_index
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn node(&self, index: usize) -> Option<&FunctionNode> {
        self.nodes.get(index)
    }

    pub fn hovered_node(&self) -> Option<&FunctionNode> {
        self.hovered_index.and_then(|i| self.nodes.get(i))
    }

    pub fn selected_node(&self) -> Option<&FunctionNode> {
        self.selected_index.and_then(|i| self.nodes.get(i))
    }

    pub fn position_of(&self, key: &NodeKey) -> Option<usize> {
        self.nodes.iter().position(|n| n.provider_id == key.provider_id && n.id == key.node_id)
    }

    pub fn seed_key(&self) -> Option<NodeKey> {
        self.seed.as_ref().map(FunctionNode::key)
    }

    fn checked(&self, index: Option<usize>) -> Option<Option<usize>> {
        match index {
            Some(i) if i >= self.nodes.len() => None,
            other => Some(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub serial: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPurpose {
    /// Children become a new arc at `level + 1`.
    Expand { level: usize, index: usize },
    NavigateInto { level: usize, index: usize },
    /// Children open as the root panel anchored to a ring slice.
    RingPanel { level: usize, index: usize },
    /// Children open as a panel cascading from a panel row.
    PanelCascade { parent_level: usize, row: usize },
    /// Fresh contents for an open ring or panel.
    Refresh,
}

/// An async `load_children` call, to be run off the event loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub purpose: LoadPurpose,
    pub node: FunctionNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub request: LoadRequest,
    pub nodes: Vec<FunctionNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    Expanded { level: usize },
    /// The node already seeds the next ring; focus moved there.
    AlreadyExpanded { level: usize },
    Pending(LoadRequest),
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Expanded { level: usize },
    /// The load came back empty; the stack was collapsed to `level`.
    Collapsed { level: usize },
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RingDiff {
    pub level: usize,
    pub added: Vec<NodeKey>,
    pub removed: Vec<NodeKey>,
    pub persisted: Vec<NodeKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HitItem {
    pub level: usize,
    pub index: usize,
    pub node: FunctionNode,
}

#[derive(Debug, Clone)]
struct Snapshot {
    rings: Vec<Ring>,
    active_level: usize,
}

#[derive(Debug)]
pub struct FunctionManager {
    layout: RingLayout,
    rings: Vec<Ring>,
    active_level: usize,
    history: Vec<Snapshot>,
    generation: u64,
    serial: u64,
    /// Ring expansion, drill-down or ring panel load.
    pending: Option<LoadRequest>,
    /// Cascade out of a panel row. Tracked apart so the two kinds never supersede each other.
    pending_cascade: Option<LoadRequest>,
}

impl FunctionManager {
    pub fn new(layout: RingLayout) -> Self {
        Self {
            layout,
            rings: Vec::new(),
            active_level: 0,
            history: Vec::new(),
            generation: 0,
            serial: 0,
            pending: None,
            pending_cascade: None,
        }
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn ring(&self, level: usize) -> Option<&Ring> {
        self.rings.get(level)
    }

    pub fn active_level(&self) -> usize {
        self.active_level
    }

    pub fn active_ring(&self) -> Option<&Ring> {
        self.rings.get(self.active_level)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending(&self) -> Option<&LoadRequest> {
        self.pending.as_ref()
    }

    pub fn pending_cascade(&self) -> Option<&LoadRequest> {
        self.pending_cascade.as_ref()
    }

    fn slot(&mut self, purpose: LoadPurpose) -> &mut Option<LoadRequest> {
        match purpose {
            LoadPurpose::PanelCascade { .. } => &mut self.pending_cascade,
            _ => &mut self.pending,
        }
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn shapes(&self) -> Vec<RingShape> {
        self.rings.iter().map(|r| r.shape).collect()
    }

    pub fn layout(&self) -> &RingLayout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: RingLayout) {
        self.layout = layout;
        self.relayout();
    }

    pub fn node_at(&self, level: usize, index: usize) -> Option<&FunctionNode> {
        self.rings.get(level)?.node(index)
    }

    /// Rebuilds the mixed root from every provider.
    pub fn load_functions(&mut self, registry: &ProviderRegistry) {
        let nodes = registry.iter().flat_map(|p| p.provide_nodes()).collect();
        self.start_stack(Ring::root(nodes, None));
    }

    /// Root ring holding only `provider_id`'s nodes. Returns false for an unknown provider.
    pub fn load_single_provider(
        &mut self,
        registry: &ProviderRegistry,
        provider_id: &ProviderId,
    ) -> bool {
        let Some(provider) = registry.get(provider_id) else {
            log::warn!("no provider '{provider_id}' to expand");
            return false;
        };
        self.start_stack(Ring::root(provider.provide_nodes(), Some(provider_id.clone())));
        true
    }

    fn start_stack(&mut self, root: Ring) {
        log::debug!("root ring loaded with {} nodes", root.len());
        self.rings = vec![root];
        self.history.clear();
        self.pending = None;
        self.pending_cascade = None;
        self.active_level = 0;
        self.relayout();
    }

    /// Empties the stack and invalidates every in-flight load.
    pub fn reset(&mut self) {
        self.rings.clear();
        self.history.clear();
        self.pending = None;
        self.pending_cascade = None;
        self.active_level = 0;
        self.generation += 1;
    }

    fn ticket(&mut self) -> LoadTicket {
        self.serial += 1;
        LoadTicket {
            generation: self.generation,
            serial: self.serial,
        }
    }

    /// A navigation load. Supersedes whatever load of the same kind was pending.
    fn request(&mut self, purpose: LoadPurpose, node: FunctionNode) -> LoadRequest {
        let request = LoadRequest {
            ticket: self.ticket(),
            purpose,
            node,
        };
        log::debug!("loading children of '{}' for {:?}", request.node.id, purpose);
        *self.slot(purpose) = Some(request.clone());
        request
    }

    /// A background reload of `node`'s children. Only the generation is checked on return.
    pub fn refresh_request(&mut self, node: FunctionNode) -> LoadRequest {
        LoadRequest {
            ticket: self.ticket(),
            purpose: LoadPurpose::Refresh,
            node,
        }
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    fn truncate_to(&mut self, level: usize) {
        self.rings.truncate(level + 1);
        if let Some(ring) = self.rings.get_mut(level) {
            ring.selected_index = None;
        }
        if self
            .pending
            .as_ref()
            .and_then(|p| ring_origin(p.purpose))
            .is_some_and(|(l, _)| l >= level)
        {
            self.pending = None;
        }
        self.active_level = level.min(self.rings.len().saturating_sub(1));
    }

    fn push_child(&mut self, level: usize, seed: &FunctionNode, nodes: Vec<FunctionNode>, drilled: bool) {
        self.rings.push(Ring::child(level + 1, seed, nodes, drilled));
        self.active_level = level + 1;
        self.relayout();
    }

    pub fn expand_category(&mut self, level: usize, index: usize) -> Expansion {
        let Some(node) = self.node_at(level, index).cloned() else {
            return Expansion::Unchanged;
        };
        if !node.can_expand() {
            log::debug!("'{}' has nothing to expand", node.id);
            return Expansion::Unchanged;
        }

        let key = node.key();
        if let Some(child) = self.rings.get(level + 1)
            && !child.drilled
            && child.seed_key().as_ref() == Some(&key)
        {
            self.truncate_to(level + 1);
            self.rings[level].selected_index = Some(index);
            return Expansion::AlreadyExpanded { level: level + 1 };
        }
        if let Some(pending) = &self.pending
            && pending.purpose == (LoadPurpose::Expand { level, index })
            && pending.node.key() == key
        {
            return Expansion::Unchanged;
        }

        self.truncate_to(level);
        self.rings[level].selected_index = Some(index);

        if node.needs_dynamic_loading {
            return Expansion::Pending(self.request(LoadPurpose::Expand { level, index }, node));
        }
        let children = node.child_nodes().to_vec();
        self.push_child(level, &node, children, false);
        Expansion::Expanded { level: level + 1 }
    }

    /// Drill down: one full ring of the folder's contents replaces everything past `level`.
    pub fn navigate_into_folder(&mut self, level: usize, index: usize) -> Expansion {
        let Some(node) = self.node_at(level, index).cloned() else {
            return Expansion::Unchanged;
        };
        if !node.can_expand() {
            return Expansion::Unchanged;
        }

        self.history.push(Snapshot {
            rings: self.rings.clone(),
            active_level: self.active_level,
        });
        self.truncate_to(level);
        self.rings[level].selected_index = Some(index);

        if node.needs_dynamic_loading {
            return Expansion::Pending(self.request(LoadPurpose::NavigateInto { level, index }, node));
        }
        let children = node.child_nodes().to_vec();
        self.push_child(level, &node, children, true);
        Expansion::Expanded { level: level + 1 }
    }

    /// Restores the stack as it was before the last drill-down.
    pub fn navigate_back(&mut self) -> bool {
        let Some(snapshot) = self.history.pop() else {
            return false;
        };
        self.rings = snapshot.rings;
        self.active_level = snapshot.active_level.min(self.rings.len().saturating_sub(1));
        self.pending = None;
        self.relayout();
        true
    }

    pub fn collapse_to_ring(&mut self, level: usize) {
        if level >= self.rings.len() {
            return;
        }
        log::debug!("collapsing to ring {level}");
        self.truncate_to(level);
    }

    /// Starts a load whose children will open as a panel anchored to a ring slice.
    pub fn request_panel_load(&mut self, level: usize, index: usize) -> Option<LoadRequest> {
        let node = self.node_at(level, index)?.clone();
        self.truncate_to(level);
        self.rings[level].selected_index = Some(index);
        Some(self.request(LoadPurpose::RingPanel { level, index }, node))
    }

    pub fn request_cascade_load(
        &mut self,
        parent_level: usize,
        row: usize,
        node: FunctionNode,
    ) -> LoadRequest {
        self.request(LoadPurpose::PanelCascade { parent_level, row }, node)
    }

    /// Checks a navigation result against the pending request of its kind and,
    /// when it is still current, clears it. Ring-anchored results also need the
    /// seed node to sit where it was.
    pub fn take_load(&mut self, result: &LoadResult) -> bool {
        let request = &result.request;
        let current = self.is_current(request.ticket)
            && ring_origin(request.purpose).is_none_or(|(level, index)| {
                self.node_at(level, index).map(FunctionNode::key) == Some(request.node.key())
            });
        let slot = self.slot(request.purpose);
        let current = current && slot.as_ref().is_some_and(|p| p.ticket == request.ticket);
        if current {
            *slot = None;
        } else {
            log::debug!("dropping stale load for '{}'", request.node.id);
        }
        current
    }

    /// Applies an expand or navigate-into result.
    pub fn apply_loaded(&mut self, result: LoadResult) -> Applied {
        let (level, drilled) = match result.request.purpose {
            LoadPurpose::Expand { level, .. } => (level, false),
            LoadPurpose::NavigateInto { level, .. } => (level, true),
            _ => return Applied::Stale,
        };
        if !self.take_load(&result) {
            return Applied::Stale;
        }
        if result.nodes.is_empty() {
            self.truncate_to(level);
            if drilled {
                self.history.pop();
            }
            return Applied::Collapsed { level };
        }
        self.rings.truncate(level + 1);
        self.push_child(level, &result.request.node, result.nodes, drilled);
        Applied::Expanded { level: level + 1 }
    }

    /// Replaces the nodes a provider contributed to the ring showing
    /// `(provider_id, content_id)`. Hover and selection follow node identity.
    pub fn update_ring(
        &mut self,
        provider_id: &ProviderId,
        content_id: Option<&ContentId>,
        nodes: Vec<FunctionNode>,
    ) -> Option<RingDiff> {
        let level = self.rings.iter().position(|ring| match content_id {
            Some(content) => {
                ring.provider_id.as_ref() == Some(provider_id)
                    && ring.content_id.as_ref() == Some(content)
            }
            None => {
                ring.level == 0
                    && (ring.provider_id.is_none() || ring.provider_id.as_ref() == Some(provider_id))
            }
        })?;

        let ring = &mut self.rings[level];
        let hovered = ring.hovered_node().map(FunctionNode::key);
        let selected = ring.selected_node().map(FunctionNode::key);

        let owned = |n: &FunctionNode| &n.provider_id == provider_id;
        let old_keys: Vec<NodeKey> = ring.nodes.iter().filter(|n| owned(n)).map(FunctionNode::key).collect();
        let new_keys: Vec<NodeKey> = nodes.iter().map(FunctionNode::key).collect();

        if ring.provider_id.is_none() {
            // the provider's block stays where its first node was
            let at = ring.nodes.iter().position(owned).unwrap_or(ring.nodes.len());
            ring.nodes.retain(|n| !owned(n));
            let tail = ring.nodes.split_off(at);
            ring.nodes.extend(nodes);
            ring.nodes.extend(tail);
        } else {
            ring.nodes = nodes;
        }

        let old_set: BTreeSet<&NodeKey> = old_keys.iter().collect();
        let new_set: BTreeSet<&NodeKey> = new_keys.iter().collect();
        let diff = RingDiff {
            level,
            added: new_keys.iter().filter(|k| !old_set.contains(k)).cloned().collect(),
            removed: old_keys.iter().filter(|k| !new_set.contains(k)).cloned().collect(),
            persisted: new_keys.iter().filter(|k| old_set.contains(k)).cloned().collect(),
        };

        ring.hovered_index = hovered.and_then(|k| ring.position_of(&k));
        let new_selected = selected.as_ref().and_then(|k| ring.position_of(k));
        ring.selected_index = new_selected;

        let pending_index = self.pending.as_ref().and_then(|p| match ring_origin(p.purpose) {
            Some((l, _)) if l == level => Some(self.rings[level].position_of(&p.node.key())),
            _ => None,
        });
        match pending_index {
            Some(Some(index)) => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.purpose = pending.purpose.moved_to(index);
                }
            }
            Some(None) => self.pending = None,
            None => {}
        }

        if selected.is_some() && new_selected.is_none() {
            self.rings.truncate(level + 1);
            self.active_level = self.active_level.min(level);
        }
        self.relayout();
        log::debug!(
            "ring {level} updated: +{} -{} ={}",
            diff.added.len(),
            diff.removed.len(),
            diff.persisted.len()
        );
        Some(diff)
    }

    /// Deepest ring first.
    pub fn get_item_at(&self, position: Point, center: Point) -> Option<HitItem> {
        let distance = position.distance_to(center);
        let angle = pointer_angle(position, center);
        self.rings.iter().rev().find_map(|ring| {
            if !ring.shape.contains_radius(distance) {
                return None;
            }
            let index = ring.shape.slice_at_angle(angle)?;
            Some(HitItem {
                level: ring.level,
                index,
                node: ring.node(index)?.clone(),
            })
        })
    }

    /// Hovers `index` on `level` and clears hover elsewhere. Returns whether anything changed.
    pub fn set_hovered(&mut self, level: usize, index: Option<usize>) -> bool {
        let Some(index) = self.rings.get(level).and_then(|r| r.checked(index)) else {
            return false;
        };
        let mut changed = false;
        for ring in &mut self.rings {
            let wanted = if ring.level == level { index } else { None };
            if ring.hovered_index != wanted {
                ring.hovered_index = wanted;
                changed = true;
            }
        }
        changed
    }

    pub fn clear_hover(&mut self) -> bool {
        let mut changed = false;
        for ring in &mut self.rings {
            changed |= ring.hovered_index.take().is_some();
        }
        changed
    }

    pub fn select(&mut self, level: usize, index: Option<usize>) -> bool {
        match self.rings.get_mut(level) {
            Some(ring) => match ring.checked(index) {
                Some(index) => {
                    ring.selected_index = index;
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Moves hover around the active ring, wrapping at the ends.
    pub fn step_hover(&mut self, delta: isize) -> bool {
        let level = self.active_level;
        let Some(ring) = self.rings.get(level) else {
            return false;
        };
        if ring.is_empty() {
            return false;
        }
        let len = ring.len() as isize;
        let next = match ring.hovered_index {
            Some(i) => (i as isize + delta).rem_euclid(len),
            None if delta >= 0 => 0,
            None => len - 1,
        };
        self.set_hovered(level, Some(next as usize))
    }

    /// Deepest hovered item.
    pub fn hovered_item(&self) -> Option<HitItem> {
        self.rings.iter().rev().find_map(|ring| {
            let index = ring.hovered_index?;
            Some(HitItem {
                level: ring.level,
                index,
                node: ring.node(index)?.clone(),
            })
        })
    }

    /// Selection on the active ring.
    pub fn selected_item(&self) -> Option<HitItem> {
        let ring = self.active_ring()?;
        let index = ring.selected_index?;
        Some(HitItem {
            level: ring.level,
            index,
            node: ring.node(index)?.clone(),
        })
    }

    fn relayout(&mut self) {
        for level in 0..self.rings.len() {
            let count = self.rings[level].len();
            let shape = match level.checked_sub(1).map(|p| &self.rings[p]) {
                None => self.layout.root_shape(count),
                Some(parent) => {
                    let index = parent.selected_index.unwrap_or(0);
                    if self.rings[level].drilled {
                        self.layout.drill_shape(level, count, &parent.shape, index)
                    } else {
                        self.layout.child_shape(level, count, &parent.shape, index)
                    }
                }
            };
            let ring = &mut self.rings[level];
            ring.level = level;
            ring.shape = shape;
        }
    }
}

/// Ring position a navigation load hangs off, if it has one.
fn ring_origin(purpose: LoadPurpose) -> Option<(usize, usize)> {
    match purpose {
        LoadPurpose::Expand { level, index }
        | LoadPurpose::NavigateInto { level, index }
        | LoadPurpose::RingPanel { level, index } => Some((level, index)),
        LoadPurpose::PanelCascade { .. } | LoadPurpose::Refresh => None,
    }
}

impl LoadPurpose {
    fn moved_to(self, index: usize) -> Self {
        match self {
            Self::Expand { level, .. } => Self::Expand { level, index },
            Self::NavigateInto { level, .. } => Self::NavigateInto { level, index },
            Self::RingPanel { level, .. } => Self::RingPanel { level, index },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::StaticProvider;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn pid(id: &str) -> ProviderId {
        ProviderId::from(id)
    }

    fn leaf(id: &str, provider: &str) -> FunctionNode {
        FunctionNode::leaf(id, id, &pid(provider))
    }

    fn category(id: &str, provider: &str, children: &[&str]) -> FunctionNode {
        FunctionNode::category(id, id, &pid(provider))
            .with_children(children.iter().map(|c| leaf(c, provider)).collect())
    }

    fn dynamic(id: &str, provider: &str) -> FunctionNode {
        FunctionNode::category(id, id, &pid(provider)).with_dynamic_loading()
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StaticProvider::new(
            "apps",
            vec![
                category("games", "apps", &["chess", "go", "tetris"]),
                category("tools", "apps", &["calc", "term"]),
                leaf("empty", "apps"),
                dynamic("recent", "apps"),
            ],
        )));
        registry.register(Arc::new(StaticProvider::new(
            "files",
            vec![dynamic("home", "files")],
        )));
        registry
    }

    fn loaded() -> FunctionManager {
        let mut manager = FunctionManager::new(RingLayout::default());
        manager.load_functions(&registry());
        manager
    }

    fn assert_indices_valid(manager: &FunctionManager) {
        for (level, ring) in manager.rings().iter().enumerate() {
            assert_eq!(ring.level, level);
            assert!(ring.hovered_index().is_none_or(|i| i < ring.len()));
            assert!(ring.selected_index().is_none_or(|i| i < ring.len()));
        }
        if !manager.rings().is_empty() {
            assert!(manager.active_level() < manager.rings().len());
        }
    }

    #[test]
    fn mixed_root_aggregates_providers_in_order() {
        let manager = loaded();
        let root = manager.ring(0).unwrap();
        assert_eq!(root.provider_id, None);
        let ids: Vec<_> = root.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["games", "tools", "empty", "recent", "home"]);
        assert!(root.shape.full_circle);
    }

    #[test]
    fn expanding_a_node_without_children_changes_nothing() {
        let mut manager = loaded();
        assert_eq!(manager.expand_category(0, 2), Expansion::Unchanged);
        assert_eq!(manager.rings().len(), 1);
        assert_eq!(manager.active_level(), 0);
        assert_eq!(manager.ring(0).unwrap().selected_index(), None);
    }

    #[test]
    fn preloaded_children_open_a_child_arc() {
        let mut manager = loaded();
        assert_eq!(manager.expand_category(0, 0), Expansion::Expanded { level: 1 });
        assert_eq!(manager.active_level(), 1);
        let child = manager.ring(1).unwrap();
        assert_eq!(child.len(), 3);
        assert_eq!(child.provider_id, Some(pid("apps")));
        assert_eq!(child.content_id, None);
        assert!(!child.shape.full_circle);
        assert_eq!(manager.ring(0).unwrap().selected_index(), Some(0));
    }

    #[test]
    fn expanding_the_same_node_only_refocuses() {
        let mut manager = loaded();
        manager.expand_category(0, 0);
        let before = manager.ring(1).cloned();
        manager.collapse_to_ring(1);
        assert_eq!(manager.expand_category(0, 0), Expansion::AlreadyExpanded { level: 1 });
        assert_eq!(manager.ring(1).cloned(), before);
    }

    #[test]
    fn expanding_a_sibling_replaces_the_branch() {
        let mut manager = loaded();
        manager.expand_category(0, 0);
        assert_eq!(manager.expand_category(0, 1), Expansion::Expanded { level: 1 });
        assert_eq!(manager.rings().len(), 2);
        assert_eq!(manager.ring(1).unwrap().len(), 2);
    }

    #[test]
    fn dynamic_load_applies_when_current() {
        let mut manager = loaded();
        let Expansion::Pending(request) = manager.expand_category(0, 3) else {
            panic!("expected a pending load");
        };
        assert_eq!(manager.rings().len(), 1);
        let result = LoadResult {
            request,
            nodes: vec![leaf("a", "apps"), leaf("b", "apps")],
        };
        assert_eq!(manager.apply_loaded(result), Applied::Expanded { level: 1 });
        let ring = manager.ring(1).unwrap();
        assert_eq!(ring.content_id, Some(ContentId::from("recent")));
        assert!(manager.pending().is_none());
    }

    #[test]
    fn load_completing_after_reset_is_dropped() {
        let mut manager = loaded();
        let Expansion::Pending(request) = manager.expand_category(0, 3) else {
            panic!("expected a pending load");
        };
        manager.reset();
        let result = LoadResult {
            request,
            nodes: vec![leaf("a", "apps"), leaf("b", "apps"), leaf("c", "apps")],
        };
        assert_eq!(manager.apply_loaded(result), Applied::Stale);
        assert!(manager.rings().is_empty());
    }

    #[test]
    fn superseded_load_is_dropped() {
        let mut manager = loaded();
        let Expansion::Pending(first) = manager.expand_category(0, 3) else {
            panic!("expected a pending load");
        };
        let Expansion::Pending(_second) = manager.expand_category(0, 4) else {
            panic!("expected a pending load");
        };
        let stale = LoadResult {
            request: first,
            nodes: vec![leaf("a", "apps")],
        };
        assert_eq!(manager.apply_loaded(stale), Applied::Stale);
        assert_eq!(manager.rings().len(), 1);
    }

    #[test]
    fn cascade_and_ring_loads_do_not_supersede_each_other() {
        let mut manager = loaded();
        let Expansion::Pending(ring) = manager.expand_category(0, 3) else {
            panic!("expected a pending load");
        };
        let cascade = manager.request_cascade_load(0, 1, dynamic("docs", "files"));
        assert_eq!(manager.pending().map(|p| p.ticket), Some(ring.ticket));
        assert_eq!(manager.pending_cascade().map(|p| p.ticket), Some(cascade.ticket));

        let cascade_result = LoadResult {
            request: cascade,
            nodes: vec![leaf("notes", "files")],
        };
        assert!(manager.take_load(&cascade_result));
        assert!(manager.pending_cascade().is_none());

        let ring_result = LoadResult {
            request: ring,
            nodes: vec![leaf("a", "apps")],
        };
        assert_eq!(manager.apply_loaded(ring_result), Applied::Expanded { level: 1 });
        assert!(manager.pending().is_none());

        // a second cascade still replaces the first
        let first = manager.request_cascade_load(0, 1, dynamic("docs", "files"));
        let _second = manager.request_cascade_load(0, 2, dynamic("music", "files"));
        assert!(!manager.take_load(&LoadResult {
            request: first,
            nodes: Vec::new(),
        }));
    }

    #[test]
    fn empty_load_collapses_back() {
        let mut manager = loaded();
        let Expansion::Pending(request) = manager.expand_category(0, 3) else {
            panic!("expected a pending load");
        };
        let result = LoadResult {
            request,
            nodes: Vec::new(),
        };
        assert_eq!(manager.apply_loaded(result), Applied::Collapsed { level: 0 });
        assert_eq!(manager.rings().len(), 1);
        assert_eq!(manager.active_level(), 0);
        assert_eq!(manager.ring(0).unwrap().selected_index(), None);
    }

    #[test]
    fn load_is_dropped_when_its_seed_moved_away() {
        let mut manager = loaded();
        let Expansion::Pending(request) = manager.expand_category(0, 4) else {
            panic!("expected a pending load");
        };
        manager.update_ring(&pid("files"), None, Vec::new());
        let result = LoadResult {
            request,
            nodes: vec![leaf("x", "files")],
        };
        assert_eq!(manager.apply_loaded(result), Applied::Stale);
    }

    #[test]
    fn navigate_into_and_back() {
        let mut manager = loaded();
        manager.expand_category(0, 0);
        assert_eq!(manager.navigate_into_folder(0, 1), Expansion::Expanded { level: 1 });
        let drilled = manager.ring(1).unwrap();
        assert!(drilled.drilled);
        assert!(drilled.shape.full_circle);
        assert_eq!(drilled.len(), 2);
        assert!(manager.navigate_back());
        assert_eq!(manager.ring(1).unwrap().len(), 3);
        assert!(!manager.navigate_back());
    }

    #[test]
    fn collapse_then_expand_matches_a_fresh_expand() {
        let mut fresh = loaded();
        fresh.expand_category(0, 1);

        let mut used = loaded();
        used.expand_category(0, 0);
        used.set_hovered(1, Some(2));
        used.collapse_to_ring(0);
        used.expand_category(0, 1);

        assert_eq!(used.rings(), fresh.rings());
        assert_eq!(used.active_level(), fresh.active_level());
    }

    #[test]
    fn update_keeps_hover_on_the_same_node() {
        let mut manager = loaded();
        manager.set_hovered(0, Some(4));
        let diff = manager
            .update_ring(&pid("apps"), None, vec![leaf("new", "apps"), category("tools", "apps", &["calc"])])
            .unwrap();
        let root = manager.ring(0).unwrap();
        assert_eq!(root.hovered_node().map(|n| n.id.as_str()), Some("home"));
        assert_eq!(root.len(), 3);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.removed.len(), 3);
        assert_eq!(diff.persisted.len(), 1);
    }

    #[test]
    fn update_clears_hover_when_the_node_goes_away() {
        let mut manager = loaded();
        manager.set_hovered(0, Some(0));
        manager.update_ring(&pid("apps"), None, vec![leaf("tools", "apps")]);
        assert_eq!(manager.ring(0).unwrap().hovered_index(), None);
    }

    #[test]
    fn removing_the_selected_seed_drops_its_branch() {
        let mut manager = loaded();
        manager.expand_category(0, 0);
        manager.update_ring(&pid("apps"), None, vec![leaf("tools", "apps")]);
        assert_eq!(manager.rings().len(), 1);
        assert_eq!(manager.active_level(), 0);
    }

    #[test]
    fn dynamic_rings_update_by_content() {
        let mut manager = loaded();
        let Expansion::Pending(request) = manager.expand_category(0, 4) else {
            panic!("expected a pending load");
        };
        manager.apply_loaded(LoadResult {
            request,
            nodes: vec![leaf("a", "files"), leaf("b", "files")],
        });
        manager.set_hovered(1, Some(1));
        let diff = manager
            .update_ring(&pid("files"), Some(&ContentId::from("home")), vec![leaf("b", "files")])
            .unwrap();
        assert_eq!(diff.level, 1);
        assert_eq!(manager.ring(1).unwrap().hovered_index(), Some(0));
        assert!(
            manager
                .update_ring(&pid("files"), Some(&ContentId::from("elsewhere")), vec![])
                .is_none()
        );
    }

    #[test]
    fn hit_testing_is_reflexive() {
        let mut manager = loaded();
        manager.expand_category(0, 0);
        let center = Point::new(640.0, 360.0);
        for ring in manager.rings() {
            for index in 0..ring.len() {
                let hit = manager.get_item_at(ring.shape.slice_center(index, center), center).unwrap();
                assert_eq!((hit.level, hit.index), (ring.level, index));
                assert_eq!(&hit.node, ring.node(index).unwrap());
            }
        }
        assert!(manager.get_item_at(center, center).is_none());
    }

    #[test]
    fn out_of_range_lookups_are_no_ops() {
        let mut manager = loaded();
        assert!(!manager.set_hovered(0, Some(99)));
        assert!(!manager.select(5, Some(0)));
        assert_eq!(manager.expand_category(3, 0), Expansion::Unchanged);
        assert_eq!(manager.navigate_into_folder(0, 42), Expansion::Unchanged);
        assert!(manager.request_panel_load(0, 42).is_none());
    }

    #[test]
    fn step_hover_wraps_around_the_active_ring() {
        let mut manager = loaded();
        assert!(manager.step_hover(-1));
        assert_eq!(manager.ring(0).unwrap().hovered_index(), Some(4));
        manager.step_hover(1);
        assert_eq!(manager.ring(0).unwrap().hovered_index(), Some(0));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Expand(usize, usize),
        Navigate(usize, usize),
        Collapse(usize),
        Hover(usize, usize),
        DropApps(usize),
        Back,
        Reset,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 0..6usize).prop_map(|(l, i)| Op::Expand(l, i)),
            (0..3usize, 0..6usize).prop_map(|(l, i)| Op::Navigate(l, i)),
            (0..3usize).prop_map(Op::Collapse),
            (0..3usize, 0..6usize).prop_map(|(l, i)| Op::Hover(l, i)),
            (0..4usize).prop_map(Op::DropApps),
            Just(Op::Back),
            Just(Op::Reset),
        ]
    }

    proptest! {
        #[test]
        fn indices_stay_valid(ops in proptest::collection::vec(op(), 1..40)) {
            let registry = registry();
            let mut manager = FunctionManager::new(RingLayout::default());
            manager.load_functions(&registry);
            for op in ops {
                match op {
                    Op::Expand(l, i) => { manager.expand_category(l, i); }
                    Op::Navigate(l, i) => { manager.navigate_into_folder(l, i); }
                    Op::Collapse(l) => manager.collapse_to_ring(l),
                    Op::Hover(l, i) => { manager.set_hovered(l, Some(i)); }
                    Op::DropApps(keep) => {
                        let nodes = registry.get(&pid("apps")).unwrap().provide_nodes();
                        manager.update_ring(&pid("apps"), None, nodes.into_iter().take(keep).collect());
                    }
                    Op::Back => { manager.navigate_back(); }
                    Op::Reset => {
                        manager.reset();
                        manager.load_functions(&registry);
                    }
                }
                assert_indices_valid(&manager);
            }
        }
    }
}
