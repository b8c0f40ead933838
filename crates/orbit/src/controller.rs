//! The interaction orchestrator: routes gestures and tracker output to the ring
//! and panel managers, dispatches async child loads and queues effects for the
//! presentation layer.

use crate::config::Config;
use crate::input::{
    Disposition, GestureClassifier, GestureEvent, KeyName, MouseButton, MouseTracker, RawEvent,
    TickScheduler, TrackerEvent,
};
use crate::menu::{
    Action, Applied, ClickBehavior, ConfigId, ContentId, DragProvider, Expansion, FunctionManager,
    FunctionNode, GestureKind, HitItem, ListPanelManager, LoadPurpose, LoadRequest, LoadResult,
    MenuView, Modifiers, PanelAnchor, PanelSpec, ProviderId, PushOutcome, RingDiff,
};
use crate::providers::{ChangeSink, InputOutcome, Provider, ProviderRegistry};
use crate::sys::store::FavoritesStore;
use orbitctl::wm::Point;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Runs `Provider::load_children` off the event loop and reports back with
/// [`CircularUiManager::children_loaded`].
pub trait ChildLoader {
    fn load(&self, request: LoadRequest, provider: Arc<dyn Provider>);

    /// Runs `Provider::prewarm` off the event loop, then reports a root change
    /// for the provider through [`CircularUiManager::content_changed`].
    fn prewarm(&self, provider: Arc<dyn Provider>);
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEffect {
    Redraw,
    Show,
    Hide,
    StartDrag(DragProvider),
    /// A ring's contents were replaced in place; the keys let the renderer animate the delta.
    RingChanged(RingDiff),
}

pub struct Services {
    pub loader: Box<dyn ChildLoader>,
    pub ticker: Box<dyn TickScheduler>,
    pub store: Arc<dyn FavoritesStore>,
    /// Where mutable providers report content changes.
    pub sink: ChangeSink,
}

/// Something a gesture landed on.
#[derive(Debug, Clone)]
enum Target {
    Ring(HitItem),
    Row {
        level: usize,
        row: usize,
        node: FunctionNode,
    },
}

impl Target {
    fn node(&self) -> &FunctionNode {
        match self {
            Self::Ring(hit) => &hit.node,
            Self::Row { node, .. } => node,
        }
    }
}

pub struct CircularUiManager {
    config: Config,
    services: Services,
    registries: HashMap<ConfigId, ProviderRegistry>,
    active_config: Option<ConfigId>,
    rings: FunctionManager,
    panels: ListPanelManager,
    tracker: MouseTracker,
    classifier: GestureClassifier,
    visible: bool,
    center: Point,
    pointer: Point,
    modifiers: Modifiers,
    /// Trigger whose release runs the hovered item.
    hold: Option<ConfigId>,
    dragging: bool,
    refresh_queue: Vec<(ProviderId, Option<ContentId>)>,
    effects: Vec<UiEffect>,
}

impl CircularUiManager {
    pub fn new(config: Config, services: Services) -> Self {
        Self {
            rings: FunctionManager::new(config.layout.clone()),
            panels: ListPanelManager::new(),
            tracker: MouseTracker::new(config.tracker.clone()),
            classifier: GestureClassifier::new(config.gestures.clone(), config.triggers()),
            config,
            services,
            registries: HashMap::new(),
            active_config: None,
            visible: false,
            center: Point::default(),
            pointer: Point::default(),
            modifiers: Modifiers::empty(),
            hold: None,
            dragging: false,
            refresh_queue: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn active_config(&self) -> Option<&ConfigId> {
        self.active_config.as_ref()
    }

    pub fn rings(&self) -> &FunctionManager {
        &self.rings
    }

    pub fn panels(&self) -> &ListPanelManager {
        &self.panels
    }

    pub fn tracker(&self) -> &MouseTracker {
        &self.tracker
    }

    /// Uses `registry` for `config_id` instead of building one from the config.
    pub fn install_registry(&mut self, config_id: ConfigId, registry: ProviderRegistry) {
        registry.watch_all(&self.services.sink);
        self.prewarm(&registry);
        self.registries.insert(config_id, registry);
    }

    fn prewarm(&self, registry: &ProviderRegistry) {
        for provider in registry.iter().filter(|p| p.needs_prewarm()) {
            self.services.loader.prewarm(provider.clone());
        }
    }

    fn registry_for(&mut self, config_id: &ConfigId) -> Option<ProviderRegistry> {
        if let Some(registry) = self.registries.get(config_id) {
            return Some(registry.clone());
        }
        let ring = self.config.ring(config_id)?;
        let registry = ProviderRegistry::from_config(&ring.providers, &self.services.store);
        registry.watch_all(&self.services.sink);
        self.prewarm(&registry);
        self.registries.insert(config_id.clone(), registry.clone());
        Some(registry)
    }

    fn registry(&self) -> ProviderRegistry {
        self.active_config
            .as_ref()
            .and_then(|id| self.registries.get(id))
            .cloned()
            .unwrap_or_default()
    }

    fn provider(&self, id: &ProviderId) -> Option<Arc<dyn Provider>> {
        self.active_config
            .as_ref()
            .and_then(|c| self.registries.get(c))
            .and_then(|r| r.get(id))
            .cloned()
    }

    fn emit(&mut self, effect: UiEffect) {
        if effect == UiEffect::Redraw && self.effects.last() == Some(&UiEffect::Redraw) {
            return;
        }
        self.effects.push(effect);
    }

    pub fn drain_effects(&mut self) -> Vec<UiEffect> {
        std::mem::take(&mut self.effects)
    }

    pub fn view(&self) -> MenuView {
        if !self.visible {
            return MenuView::hidden();
        }
        MenuView::build(self.center, &self.rings, &self.panels)
    }

    // Lifecycle

    /// Shows the first ring configuration around `center`.
    pub fn show(&mut self, center: Point) {
        match self.config.default_ring().map(|r| r.id.clone()) {
            Some(id) => self.show_config(id, center),
            None => log::warn!("No ring configured"),
        }
    }

    pub fn show_config(&mut self, config_id: ConfigId, center: Point) {
        let Some(registry) = self.registry_for(&config_id) else {
            log::warn!("Unknown ring '{config_id}'");
            return;
        };
        self.open(config_id, center);
        self.rings.load_functions(&registry);
        self.after_ring_change();
    }

    /// Shows only `provider_id`'s nodes, opening its category right away when it has just one.
    pub fn show_expanding(&mut self, center: Point, provider_id: &ProviderId) {
        let ring_ids: Vec<ConfigId> = self.config.rings.iter().map(|r| r.id.clone()).collect();
        let Some(config_id) = ring_ids
            .into_iter()
            .find(|id| {
                self.registry_for(id)
                    .is_some_and(|r| r.get(provider_id).is_some())
            })
            .or_else(|| self.config.default_ring().map(|r| r.id.clone()))
            .or_else(|| self.registries.keys().next().cloned())
        else {
            log::warn!("No ring configured");
            return;
        };
        let Some(registry) = self.registry_for(&config_id) else {
            return;
        };
        self.open(config_id, center);
        if !self.rings.load_single_provider(&registry, provider_id) {
            self.rings.load_functions(&registry);
        }
        self.after_ring_change();

        let expandable: Vec<usize> = self
            .rings
            .ring(0)
            .map(|root| {
                root.nodes
                    .iter()
                    .enumerate()
                    .filter(|(_, n)| n.can_expand())
                    .map(|(i, _)| i)
                    .collect()
            })
            .unwrap_or_default();
        if let [index] = expandable[..]
            && let Some(node) = self.rings.node_at(0, index).cloned()
        {
            self.expand(Target::Ring(HitItem {
                level: 0,
                index,
                node,
            }));
        }
    }

    fn open(&mut self, config_id: ConfigId, center: Point) {
        if self.visible {
            self.rings.reset();
            self.panels.reset();
            self.refresh_queue.clear();
        }
        log::debug!("showing ring '{config_id}' at {center:?}");
        self.active_config = Some(config_id);
        self.center = center;
        self.pointer = center;
        self.dragging = false;
        if !self.visible {
            self.visible = true;
            self.emit(UiEffect::Show);
        }
        self.tracker.start_tracking(self.services.ticker.as_ref());
    }

    pub fn hide(&mut self) {
        if !self.visible {
            return;
        }
        log::debug!("hiding menu");
        self.visible = false;
        self.hold = None;
        self.dragging = false;
        self.refresh_queue.clear();
        self.rings.reset();
        self.panels.reset();
        self.tracker.stop_tracking();
        let registry = self.registry();
        registry.clear_caches();
        self.prewarm(&registry);
        self.emit(UiEffect::Hide);
    }

    /// Runs the left-click behavior of the hovered item, else of the selection.
    pub fn execute_selected(&mut self) {
        if !self.visible {
            return;
        }
        if let Some(target) = self
            .hovered_target()
            .or_else(|| self.rings.selected_item().map(Target::Ring))
        {
            self.activate(target, GestureKind::LeftClick, Modifiers::empty());
        }
    }

    /// Swaps in a new configuration. Providers are rebuilt on next show.
    pub fn reconfigure(&mut self, config: Config) {
        self.hide();
        self.registries.clear();
        self.classifier.set_config(config.gestures.clone());
        self.classifier.set_triggers(config.triggers());
        self.classifier.reset();
        self.tracker.set_config(config.tracker.clone());
        self.rings.set_layout(config.layout.clone());
        self.config = config;
        log::info!("Configuration reloaded");
    }

    // Input

    pub fn handle_raw(&mut self, raw: &RawEvent, now: Instant) -> Disposition {
        self.modifiers = raw.modifiers();
        let classified = self.classifier.process(raw, now);
        let was_visible = self.visible;
        for event in classified.events {
            self.handle_gesture(event);
        }
        match raw {
            RawEvent::Moved { .. } => classified.disposition,
            _ if was_visible => Disposition::Consume,
            _ => classified.disposition,
        }
    }

    pub fn handle_gesture(&mut self, event: GestureEvent) {
        match event {
            GestureEvent::TriggerPressed { config_id } => self.trigger_pressed(config_id),
            GestureEvent::TriggerReleased { config_id } => self.trigger_released(&config_id),
            GestureEvent::Moved { position, .. } => self.pointer_moved(position),
            GestureEvent::MouseDown { .. } => {}
            GestureEvent::Click {
                button,
                position,
                modifiers,
            } => self.click(button, position, modifiers),
            GestureEvent::DragStarted {
                origin, modifiers, ..
            } => self.drag_started(origin, modifiers),
            GestureEvent::Scroll {
                delta,
                position,
                modifiers,
            } => self.scroll(delta, position, modifiers),
            GestureEvent::Key { key, modifiers } => self.key(&key, modifiers),
        }
    }

    fn trigger_pressed(&mut self, config_id: ConfigId) {
        if self.visible && self.active_config.as_ref() == Some(&config_id) {
            self.hide();
            return;
        }
        let center = self.classifier.last_position().unwrap_or(self.pointer);
        let hold = self.config.ring(&config_id).is_some_and(|r| r.hold);
        self.show_config(config_id.clone(), center);
        if self.visible && hold {
            self.hold = Some(config_id);
        }
    }

    /// Hold mode: activate whatever is hovered. Executing closes the menu as a
    /// click would, opening a category keeps it up for clicking. A release with
    /// nothing hovered leaves the menu open too.
    fn trigger_released(&mut self, config_id: &ConfigId) {
        if !self.visible || self.hold.as_ref() != Some(config_id) {
            return;
        }
        self.hold = None;
        let Some(target) = self.hovered_target() else {
            return;
        };
        let inert = target
            .node()
            .resolve(GestureKind::LeftClick, self.modifiers)
            .is_none();
        self.activate(target, GestureKind::LeftClick, self.modifiers);
        if inert {
            self.hide();
        }
    }

    fn click(&mut self, button: MouseButton, position: Point, modifiers: Modifiers) {
        if !self.visible {
            return;
        }
        self.pointer = position;
        let gesture = match button {
            MouseButton::Left => GestureKind::LeftClick,
            MouseButton::Right => GestureKind::RightClick,
            MouseButton::Middle => GestureKind::MiddleClick,
            MouseButton::Back => {
                self.go_back();
                return;
            }
            MouseButton::Forward => return,
        };
        match self.target_at(position) {
            Some(target) => {
                self.activate(target, gesture, modifiers);
                self.tracker.pause_until_movement(position);
            }
            None if self.panels.contains_point(position, self.center) => {}
            None => self.hide(),
        }
    }

    fn drag_started(&mut self, origin: Point, modifiers: Modifiers) {
        if !self.visible {
            return;
        }
        let Some(target) = self.target_at(origin) else {
            return;
        };
        let drag = match target.node().resolve(GestureKind::LeftClick, modifiers) {
            ClickBehavior::Drag(drag) => Some(drag),
            _ => target.node().behaviors.drag_provider().cloned(),
        };
        if let Some(drag) = drag {
            self.start_drag(drag);
        }
    }

    fn scroll(&mut self, delta: f64, position: Point, modifiers: Modifiers) {
        if !self.visible {
            return;
        }
        if let Some((level, _)) = self.panels.row_at(position, self.center) {
            let rows = if delta > 0.0 { 3 } else { -3 };
            if self.panels.scroll(level, rows) {
                self.emit(UiEffect::Redraw);
            }
            return;
        }
        if let Some(hit) = self.rings.get_item_at(position, self.center) {
            self.activate(Target::Ring(hit), GestureKind::BoundaryCross, modifiers);
        }
    }

    fn key(&mut self, key: &KeyName, modifiers: Modifiers) {
        if !self.visible {
            return;
        }
        match key.as_str() {
            "escape" => self.go_back(),
            "enter" => {
                let wants_input = self
                    .panels
                    .top()
                    .is_some_and(|p| p.typing_mode == crate::menu::TypingMode::Input);
                if wants_input {
                    self.submit_input();
                } else {
                    self.execute_selected();
                }
            }
            "backspace" => {
                if self.panels.backspace() {
                    self.emit(UiEffect::Redraw);
                }
            }
            "up" | "left" => self.step_hover(-1),
            "down" | "right" | "tab" => self.step_hover(1),
            _ => {
                if let Some(c) = key.as_char()
                    && modifiers.difference(Modifiers::SHIFT).is_empty()
                    && self.panels.type_char(c)
                {
                    self.emit(UiEffect::Redraw);
                }
            }
        }
    }

    fn step_hover(&mut self, delta: isize) {
        let changed = if self.panels.is_open() {
            self.panels.step_hover(delta)
        } else {
            self.rings.step_hover(delta)
        };
        if changed {
            self.emit(UiEffect::Redraw);
        }
    }

    /// Escape: close a panel, undo a drill-down, collapse a ring, or hide.
    fn go_back(&mut self) {
        if self.panels.pop() {
            self.emit(UiEffect::Redraw);
        } else if self.rings.navigate_back() {
            self.after_ring_change();
        } else if self.rings.active_level() > 0 {
            self.rings.collapse_to_ring(self.rings.active_level() - 1);
            self.after_ring_change();
        } else {
            self.hide();
        }
    }

    fn submit_input(&mut self) {
        let Some(submitted) = self.panels.submit_input() else {
            return;
        };
        let (Some(provider_id), Some(content_id)) = (&submitted.provider_id, &submitted.content_id)
        else {
            return;
        };
        let Some(provider) = self.provider(provider_id) else {
            return;
        };
        match provider.submit_input(content_id, &submitted.text) {
            InputOutcome::Close => self.hide(),
            InputOutcome::KeepOpen | InputOutcome::Ignored => self.emit(UiEffect::Redraw),
        }
    }

    // Pointer tracking

    pub fn pointer_moved(&mut self, position: Point) {
        self.pointer = position;
        if self.visible {
            self.evaluate_pointer();
        }
    }

    /// Polling tick: applies queued content changes and re-evaluates hover.
    pub fn tick(&mut self) {
        if !self.visible {
            return;
        }
        self.flush_refreshes();
        self.evaluate_pointer();
    }

    fn evaluate_pointer(&mut self) {
        let shapes = self.rings.shapes();
        let regions = self.panels.panel_regions(self.center);
        let events = self.tracker.update(
            self.pointer,
            self.center,
            &shapes,
            self.rings.active_level(),
            &regions,
        );
        for event in events {
            if !self.visible {
                return;
            }
            self.tracker_event(event);
        }
        if self.visible
            && let Some((level, row)) = self.panels.row_at(self.pointer, self.center)
        {
            self.hover_row(level, row);
        }
    }

    fn tracker_event(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::HoverChanged { level, index } => {
                if self.rings.set_hovered(level, index) {
                    self.emit(UiEffect::Redraw);
                }
            }
            TrackerEvent::CollapseIntent { to_level } => {
                // back over the slice that opened the deeper ring
                let over_parent = self
                    .rings
                    .ring(to_level)
                    .is_some_and(|r| r.hovered_index().is_some() && r.hovered_index() == r.selected_index());
                if !over_parent && to_level < self.rings.active_level() {
                    self.rings.collapse_to_ring(to_level);
                    self.after_ring_change();
                }
            }
            TrackerEvent::BoundaryCrossed { level, index } => {
                if let Some(node) = self.rings.node_at(level, index).cloned() {
                    let modifiers = self.modifiers;
                    self.activate(
                        Target::Ring(HitItem { level, index, node }),
                        GestureKind::BoundaryCross,
                        modifiers,
                    );
                }
            }
            TrackerEvent::CloseZoneEntered => {
                log::debug!("pointer back in the close zone");
                self.hide();
            }
            TrackerEvent::PanelHover(over) => {
                if over {
                    self.rings.clear_hover();
                }
                self.emit(UiEffect::Redraw);
            }
        }
    }

    /// Hovering a branch row opens its cascade; hovering a leaf closes deeper ones.
    fn hover_row(&mut self, level: usize, row: usize) {
        if !self.panels.hover_row(level, Some(row)) {
            return;
        }
        self.emit(UiEffect::Redraw);
        let Some(node) = self.panels.panel(level).and_then(|p| p.row_node(row)).cloned() else {
            return;
        };
        if node.can_expand() {
            self.cascade(level, row, node);
        } else {
            self.panels.pop_to_level(level);
        }
    }

    fn target_at(&self, position: Point) -> Option<Target> {
        if let Some((level, row)) = self.panels.row_at(position, self.center) {
            let node = self.panels.panel(level)?.row_node(row)?.clone();
            return Some(Target::Row { level, row, node });
        }
        self.rings.get_item_at(position, self.center).map(Target::Ring)
    }

    fn hovered_target(&self) -> Option<Target> {
        let row = self.panels.panels().iter().rev().find_map(|panel| {
            let row = panel.hovered_row()?;
            Some(Target::Row {
                level: panel.level,
                row,
                node: panel.row_node(row)?.clone(),
            })
        });
        row.or_else(|| self.rings.hovered_item().map(Target::Ring))
    }

    // Behaviors

    fn activate(&mut self, target: Target, gesture: GestureKind, modifiers: Modifiers) {
        let behavior = target.node().resolve(gesture, modifiers);
        log::debug!(
            "{gesture:?} on '{}' with {modifiers} -> {}",
            target.node().id,
            behavior.kind()
        );
        match behavior {
            ClickBehavior::Execute(action) => {
                run(&action);
                self.hide();
            }
            ClickBehavior::ExecuteKeepOpen(action) => {
                run(&action);
                self.emit(UiEffect::Redraw);
            }
            ClickBehavior::Expand => self.expand(target),
            ClickBehavior::NavigateInto => self.navigate(target),
            ClickBehavior::LaunchRing(config_id) => self.show_config(config_id, self.center),
            ClickBehavior::Drag(drag) => self.start_drag(drag),
            ClickBehavior::None => {}
        }
    }

    fn max_ring_items(&self, provider: &dyn Provider) -> usize {
        provider
            .panel_config()
            .max_ring_items
            .min(self.rings.layout().max_ring_items)
    }

    fn wants_panel(&self, node: &FunctionNode, child_count: Option<usize>) -> bool {
        self.provider(&node.provider_id).is_some_and(|provider| {
            provider.prefers_panel_for(node)
                || child_count.is_some_and(|n| n > self.max_ring_items(provider.as_ref()))
        })
    }

    fn preloaded_count(node: &FunctionNode) -> Option<usize> {
        (!node.needs_dynamic_loading).then(|| node.child_nodes().len())
    }

    fn expand(&mut self, target: Target) {
        match target {
            Target::Ring(hit) => {
                if self.wants_panel(&hit.node, Self::preloaded_count(&hit.node)) {
                    self.open_ring_panel(hit);
                    return;
                }
                let outcome = self.rings.expand_category(hit.level, hit.index);
                self.expansion(outcome);
            }
            Target::Row { level, row, node } => self.cascade(level, row, node),
        }
    }

    fn navigate(&mut self, target: Target) {
        match target {
            Target::Ring(hit) => {
                if self.wants_panel(&hit.node, Self::preloaded_count(&hit.node)) {
                    self.open_ring_panel(hit);
                    return;
                }
                let outcome = self.rings.navigate_into_folder(hit.level, hit.index);
                self.expansion(outcome);
            }
            Target::Row { level, row, node } => self.cascade(level, row, node),
        }
    }

    fn expansion(&mut self, outcome: Expansion) {
        match outcome {
            Expansion::Expanded { .. } | Expansion::AlreadyExpanded { .. } => self.after_ring_change(),
            Expansion::Pending(request) => {
                self.prune_panels();
                self.dispatch(request);
            }
            Expansion::Unchanged => {}
        }
    }

    fn open_ring_panel(&mut self, hit: HitItem) {
        if hit.node.needs_dynamic_loading {
            if let Some(request) = self.rings.request_panel_load(hit.level, hit.index) {
                self.prune_panels();
                self.dispatch(request);
            }
            return;
        }
        self.rings.collapse_to_ring(hit.level);
        self.rings.select(hit.level, Some(hit.index));
        let children = hit.node.child_nodes().to_vec();
        self.show_ring_panel(hit.level, hit.index, &hit.node, children);
    }

    fn show_ring_panel(&mut self, level: usize, index: usize, node: &FunctionNode, items: Vec<FunctionNode>) {
        let Some(ring) = self.rings.ring(level) else {
            return;
        };
        let anchor = PanelAnchor::Ring {
            level,
            angle: ring.shape.slice_center_angle(index),
            radius: ring.shape.outer_radius,
        };
        let typing = self
            .provider(&node.provider_id)
            .map(|p| p.typing_mode_for(node))
            .unwrap_or_default();
        self.panels
            .show(PanelSpec::from_origin(node, items, anchor).typing(typing));
        self.after_ring_change();
    }

    fn cascade(&mut self, level: usize, row: usize, node: FunctionNode) {
        if self.panels.is_cascade_open(level + 1, &node.key()) {
            return;
        }
        if node.needs_dynamic_loading {
            let request = self.rings.request_cascade_load(level, row, node);
            self.dispatch(request);
            return;
        }
        let children = node.child_nodes().to_vec();
        self.push_cascade(level, row, &node, children);
    }

    fn push_cascade(&mut self, level: usize, row: usize, node: &FunctionNode, items: Vec<FunctionNode>) {
        let typing = self
            .provider(&node.provider_id)
            .map(|p| p.typing_mode_for(node))
            .unwrap_or_default();
        let spec = PanelSpec::from_origin(node, items, PanelAnchor::Panel { level, row }).typing(typing);
        match self.panels.push_panel(level, spec) {
            PushOutcome::Pushed { .. } => {
                self.tracker.forget_hover();
                self.emit(UiEffect::Redraw);
            }
            PushOutcome::Unchanged => {}
            PushOutcome::Rejected => log::debug!("cascade from '{}' is stale", node.id),
        }
    }

    fn start_drag(&mut self, drag: DragProvider) {
        log::debug!("starting drag '{}'", drag.label);
        self.dragging = true;
        self.tracker.pause_for_drag();
        self.emit(UiEffect::StartDrag(drag));
    }

    /// A successful drop closes the menu; a cancelled one resumes tracking.
    pub fn drag_finished(&mut self, success: bool) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        if success {
            self.hide();
        } else {
            self.tracker.resume_from_drag();
            self.emit(UiEffect::Redraw);
        }
    }

    // Async loads and content changes

    fn dispatch(&mut self, request: LoadRequest) {
        let Some(provider) = self.provider(&request.node.provider_id) else {
            log::warn!("no provider '{}' for load", request.node.provider_id);
            return;
        };
        self.services.loader.load(request, provider);
        self.emit(UiEffect::Redraw);
    }

    pub fn children_loaded(&mut self, result: LoadResult) {
        if !self.visible {
            return;
        }
        let request = result.request.clone();
        match request.purpose {
            LoadPurpose::Expand { level, index } | LoadPurpose::NavigateInto { level, index } => {
                if self.wants_panel(&request.node, Some(result.nodes.len())) {
                    if self.rings.take_load(&result) {
                        self.rings.collapse_to_ring(level);
                        self.rings.select(level, Some(index));
                        self.show_ring_panel(level, index, &request.node, result.nodes);
                    }
                    return;
                }
                match self.rings.apply_loaded(result) {
                    Applied::Expanded { .. } | Applied::Collapsed { .. } => self.after_ring_change(),
                    Applied::Stale => {}
                }
            }
            LoadPurpose::RingPanel { level, index } => {
                if self.rings.take_load(&result) {
                    self.show_ring_panel(level, index, &request.node, result.nodes);
                }
            }
            LoadPurpose::PanelCascade { parent_level, row } => {
                if self.rings.take_load(&result) {
                    self.push_cascade(parent_level, row, &request.node, result.nodes);
                }
            }
            LoadPurpose::Refresh => {
                if !self.rings.is_current(request.ticket) {
                    return;
                }
                let provider_id = request.node.provider_id.clone();
                let content_id = request.node.content_id();
                let diff = self
                    .rings
                    .update_ring(&provider_id, Some(&content_id), result.nodes.clone());
                let reloaded = self
                    .panels
                    .reload_content(&provider_id, &content_id, &result.nodes);
                if let Some(diff) = diff {
                    self.ring_updated(diff);
                } else if !reloaded.is_empty() {
                    self.tracker.forget_hover();
                    self.emit(UiEffect::Redraw);
                }
            }
        }
    }

    /// Queues a refresh; applied on the next tick, after pending gestures.
    pub fn content_changed(&mut self, provider_id: ProviderId, content_id: Option<ContentId>) {
        if !self.visible {
            return;
        }
        let entry = (provider_id, content_id);
        if !self.refresh_queue.contains(&entry) {
            self.refresh_queue.push(entry);
        }
    }

    fn flush_refreshes(&mut self) {
        for (provider_id, content_id) in std::mem::take(&mut self.refresh_queue) {
            let Some(provider) = self.provider(&provider_id) else {
                continue;
            };
            match content_id {
                None => {
                    let nodes = provider.provide_nodes();
                    if let Some(diff) = self.rings.update_ring(&provider_id, None, nodes) {
                        self.ring_updated(diff);
                    }
                }
                Some(content_id) => {
                    for origin in self.origins_showing(&provider_id, &content_id) {
                        let request = self.rings.refresh_request(origin);
                        self.services.loader.load(request, provider.clone());
                    }
                }
            }
        }
    }

    /// Nodes whose children are on screen as `(provider_id, content_id)`.
    fn origins_showing(&self, provider_id: &ProviderId, content_id: &ContentId) -> Vec<FunctionNode> {
        let rings = self.rings.rings().iter().filter_map(|ring| {
            (ring.provider_id.as_ref() == Some(provider_id) && ring.content_id.as_ref() == Some(content_id))
                .then(|| ring.seed.clone())
                .flatten()
        });
        let panels = self.panels.panels().iter().filter_map(|panel| {
            (panel.provider_id.as_ref() == Some(provider_id) && panel.content_id.as_ref() == Some(content_id))
                .then(|| panel.origin.clone())
                .flatten()
        });
        let mut origins: Vec<FunctionNode> = Vec::new();
        for node in rings.chain(panels) {
            if !origins.iter().any(|o| o.key() == node.key()) {
                origins.push(node);
            }
        }
        origins
    }

    fn ring_updated(&mut self, diff: RingDiff) {
        self.emit(UiEffect::RingChanged(diff));
        self.after_ring_change();
    }

    fn after_ring_change(&mut self) {
        self.prune_panels();
        self.tracker.rings_changed();
        self.emit(UiEffect::Redraw);
    }

    /// Panels hang off a selected ring slice; they close once it is no longer selected.
    fn prune_panels(&mut self) {
        let rings = &self.rings;
        self.panels.prune_stale(|key| {
            rings
                .rings()
                .iter()
                .any(|r| r.selected_node().is_some_and(|n| n.key() == *key))
        });
    }
}

fn run(action: &Action) {
    log::debug!("running '{}'", action.label());
    if let Err(e) = action.run() {
        log::error!("Action '{}' failed: {:#}", action.label(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppsConfig, CommandsConfig, RingConfig};
    use crate::input::{TickGuard, TrackerState, TriggerInput};
    use crate::menu::{DragPayload, TypingMode};
    use crate::providers::{AppsProvider, CommandsProvider};
    use crate::providers::testing::StaticProvider;
    use crate::sys::store::MemoryFavoritesStore;
    use orbitctl::wm::ShellCommand;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Loads = Arc<Mutex<Vec<(LoadRequest, Arc<dyn Provider>)>>>;
    type Prewarms = Arc<Mutex<Vec<ProviderId>>>;

    struct RecordingLoader {
        loads: Loads,
        prewarms: Prewarms,
    }

    impl ChildLoader for RecordingLoader {
        fn load(&self, request: LoadRequest, provider: Arc<dyn Provider>) {
            self.loads.lock().push((request, provider));
        }

        fn prewarm(&self, provider: Arc<dyn Provider>) {
            provider.prewarm();
            self.prewarms.lock().push(provider.provider_id());
        }
    }

    struct NoTicks;

    impl TickScheduler for NoTicks {
        fn start(&self, _every: Duration) -> TickGuard {
            TickGuard::inert()
        }
    }

    struct Harness {
        ui: CircularUiManager,
        loads: Loads,
        prewarms: Prewarms,
    }

    impl Harness {
        /// Runs every recorded load and feeds the results back.
        fn finish_loads(&mut self) {
            let loads = std::mem::take(&mut *self.loads.lock());
            for (request, provider) in loads {
                let nodes = provider.load_children(&request.node);
                self.ui.children_loaded(LoadResult { request, nodes });
            }
        }

        fn slice(&self, level: usize, index: usize) -> Point {
            self.ui.rings().ring(level).unwrap().shape.slice_center(index, center())
        }

        fn index_of(&self, level: usize, id: &str) -> usize {
            self.ui
                .rings()
                .ring(level)
                .unwrap()
                .nodes
                .iter()
                .position(|n| n.id.as_str() == id)
                .unwrap()
        }

        fn click(&mut self, level: usize, id: &str, modifiers: Modifiers) {
            let position = self.slice(level, self.index_of(level, id));
            self.ui.handle_gesture(GestureEvent::Click {
                button: MouseButton::Left,
                position,
                modifiers,
            });
        }

        fn key(&mut self, name: &str) {
            self.ui.handle_gesture(GestureEvent::Key {
                key: KeyName::normalized(name),
                modifiers: Modifiers::empty(),
            });
        }

        fn raw(&mut self, line: &str) -> Disposition {
            let raw: RawEvent = line.parse().unwrap();
            self.ui.handle_raw(&raw, Instant::now())
        }
    }

    fn center() -> Point {
        Point::new(500.0, 500.0)
    }

    fn ring_config(id: &str, trigger: Option<&str>, hold: bool) -> RingConfig {
        RingConfig {
            id: ConfigId::from(id),
            name: None,
            trigger: trigger.map(|t| t.parse::<TriggerInput>().unwrap()),
            modifiers: if trigger.is_some() {
                Modifiers::SUPER
            } else {
                Modifiers::empty()
            },
            hold,
            providers: Vec::new(),
        }
    }

    fn harness(rings: Vec<(RingConfig, Vec<Arc<dyn Provider>>)>) -> Harness {
        let loads: Loads = Arc::default();
        let prewarms: Prewarms = Arc::default();
        let config = Config {
            rings: rings.iter().map(|(ring, _)| ring.clone()).collect(),
            ..Config::default()
        };
        let services = Services {
            loader: Box::new(RecordingLoader {
                loads: loads.clone(),
                prewarms: prewarms.clone(),
            }),
            ticker: Box::new(NoTicks),
            store: Arc::new(MemoryFavoritesStore::default()),
            sink: ChangeSink::new(|_, _| {}),
        };
        let mut ui = CircularUiManager::new(config, services);
        for (ring, providers) in rings {
            let mut registry = ProviderRegistry::new();
            for provider in providers {
                registry.register(provider);
            }
            ui.install_registry(ring.id, registry);
        }
        Harness { ui, loads, prewarms }
    }

    fn counting(counter: &Arc<AtomicUsize>) -> ClickBehavior {
        let counter = counter.clone();
        ClickBehavior::Execute(Action::new("count", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    fn leaf(id: &str) -> FunctionNode {
        FunctionNode::leaf(id, id, &ProviderId::from("apps"))
    }

    fn apps(ran: &Arc<AtomicUsize>) -> Arc<StaticProvider> {
        let pid = ProviderId::from("apps");
        Arc::new(
            StaticProvider::new(
                "apps",
                vec![
                    leaf("term").on(GestureKind::LeftClick, Modifiers::empty(), counting(ran)),
                    FunctionNode::category("games", "Games", &pid)
                        .with_children(vec![leaf("chess"), leaf("go")]),
                    FunctionNode::category("recent", "Recent", &pid).with_dynamic_loading(),
                    FunctionNode::category("many", "Many", &pid).with_dynamic_loading(),
                    leaf("photo").on(
                        GestureKind::LeftClick,
                        Modifiers::ALT,
                        ClickBehavior::Drag(DragProvider::files("photo", vec![PathBuf::from("/tmp/p.png")])),
                    ),
                ],
            )
            .with_children("recent", vec![leaf("doc"), leaf("sheet")])
            .with_children("many", (0..20).map(|i| leaf(&format!("item{i}"))).collect()),
        )
    }

    fn main_ring(provider: Arc<StaticProvider>) -> Harness {
        harness(vec![(
            ring_config("main", Some("button:middle"), true),
            vec![provider as Arc<dyn Provider>],
        )])
    }

    #[test]
    fn show_builds_the_root_ring() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        assert!(h.ui.is_visible());
        assert_eq!(h.ui.rings().rings().len(), 1);
        assert_eq!(h.ui.rings().ring(0).unwrap().len(), 5);
        assert_eq!(h.ui.tracker().state(), TrackerState::Tracking);
        assert_eq!(h.ui.drain_effects(), vec![UiEffect::Show, UiEffect::Redraw]);
        assert!(h.ui.view().visible);
    }

    #[test]
    fn clicking_a_category_opens_its_children() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        h.click(0, "games", Modifiers::empty());
        assert_eq!(h.ui.rings().rings().len(), 2);
        assert_eq!(h.ui.rings().active_level(), 1);
        assert_eq!(h.ui.rings().ring(1).unwrap().len(), 2);
        assert!(matches!(
            h.ui.tracker().state(),
            TrackerState::PausedUntilMovement { .. }
        ));
    }

    #[test]
    fn clicking_a_leaf_runs_it_and_hides() {
        let ran = Arc::new(AtomicUsize::new(0));
        let provider = apps(&ran);
        let mut h = main_ring(provider.clone());
        h.ui.show(center());
        h.click(0, "term", Modifiers::empty());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(!h.ui.is_visible());
        assert_eq!(*provider.cleared.lock(), 1);
        assert_eq!(h.ui.drain_effects().last(), Some(&UiEffect::Hide));
        assert!(!h.ui.view().visible);
    }

    #[test]
    fn clicking_outside_everything_hides() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        h.ui.handle_gesture(GestureEvent::Click {
            button: MouseButton::Left,
            position: Point::new(0.0, 0.0),
            modifiers: Modifiers::empty(),
        });
        assert!(!h.ui.is_visible());
    }

    #[test]
    fn hold_release_runs_the_hovered_item() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut h = main_ring(apps(&ran));
        assert_eq!(h.raw("down middle 500 500 global super"), Disposition::Consume);
        assert!(h.ui.is_visible());

        let term = h.slice(0, h.index_of(0, "term"));
        h.raw(&format!("move {} {}", term.x, term.y));
        assert_eq!(
            h.ui.rings().hovered_item().map(|hit| hit.node.id.to_string()),
            Some("term".to_string())
        );
        h.raw(&format!("up middle {} {} global super", term.x, term.y));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(!h.ui.is_visible());
    }

    #[test]
    fn hold_release_over_a_category_keeps_it_open() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut h = main_ring(apps(&ran));
        h.raw("down middle 500 500 global super");
        let games = h.slice(0, h.index_of(0, "games"));
        h.raw(&format!("move {} {}", games.x, games.y));
        h.raw(&format!("up middle {} {} global super", games.x, games.y));

        assert!(h.ui.is_visible());
        assert_eq!(h.ui.rings().rings().len(), 2);
        assert_eq!(h.ui.rings().ring(1).unwrap().nodes[0].id.as_str(), "chess");
        assert!(!h.ui.drain_effects().contains(&UiEffect::Hide));

        // the menu now behaves as if opened by a click
        h.click(0, "term", Modifiers::empty());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(!h.ui.is_visible());
    }

    #[test]
    fn hold_release_over_nothing_leaves_the_menu_open() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut h = main_ring(apps(&ran));
        h.raw("down middle 500 500 global super");
        h.raw("up middle 500 500 global super");
        assert!(h.ui.is_visible());
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        // pressing the trigger again toggles it away
        h.raw("down middle 500 500 global super");
        assert!(!h.ui.is_visible());
    }

    #[test]
    fn returning_to_the_center_closes_the_menu() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        // still inside the zone it opened in
        h.ui.pointer_moved(Point::new(505.0, 500.0));
        assert!(h.ui.is_visible());

        h.click(0, "games", Modifiers::empty());
        let chess = h.slice(1, h.index_of(1, "chess"));
        h.ui.pointer_moved(chess);
        assert!(h.ui.is_visible());
        h.ui.pointer_moved(center());
        assert!(!h.ui.is_visible());
        assert!(h.ui.rings().rings().is_empty());
        assert_eq!(h.ui.drain_effects().last(), Some(&UiEffect::Hide));
    }

    #[test]
    fn hidden_menu_passes_ordinary_input_through() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        assert_eq!(h.raw("down left 10 10 global"), Disposition::PassThrough);
        h.ui.show(center());
        assert_eq!(h.raw("up left 10 10 local"), Disposition::Consume);
    }

    #[test]
    fn dynamic_children_load_off_the_loop() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        h.click(0, "recent", Modifiers::empty());
        assert_eq!(h.ui.rings().rings().len(), 1);
        {
            let loads = h.loads.lock();
            assert_eq!(loads.len(), 1);
            assert!(matches!(loads[0].0.purpose, LoadPurpose::Expand { level: 0, .. }));
        }
        h.finish_loads();
        assert_eq!(h.ui.rings().rings().len(), 2);
        assert_eq!(h.ui.rings().ring(1).unwrap().nodes[0].id.as_str(), "doc");
    }

    #[test]
    fn loads_finishing_after_hide_are_dropped() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        h.click(0, "recent", Modifiers::empty());
        h.ui.hide();
        h.finish_loads();
        assert!(!h.ui.is_visible());
        assert!(h.ui.rings().rings().is_empty());

        // and after a fresh show
        h.ui.show(center());
        h.click(0, "recent", Modifiers::empty());
        let stale = std::mem::take(&mut *h.loads.lock());
        h.ui.hide();
        h.ui.show(center());
        for (request, provider) in stale {
            let nodes = provider.load_children(&request.node);
            h.ui.children_loaded(LoadResult { request, nodes });
        }
        assert_eq!(h.ui.rings().rings().len(), 1);
    }

    #[test]
    fn oversized_results_open_a_panel() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        h.click(0, "many", Modifiers::empty());
        h.finish_loads();

        assert_eq!(h.ui.rings().rings().len(), 1);
        let many = h.index_of(0, "many");
        assert_eq!(h.ui.rings().ring(0).unwrap().selected_index(), Some(many));
        let panel = h.ui.panels().panel(0).unwrap();
        assert_eq!(panel.row_count(), 20);
        assert_eq!(panel.title, "Many");
        assert_eq!(h.ui.view().panels.len(), 1);
    }

    #[test]
    fn escape_unwinds_one_step_at_a_time() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        h.click(0, "many", Modifiers::empty());
        h.finish_loads();
        h.click(0, "games", Modifiers::empty());
        assert_eq!(h.ui.rings().rings().len(), 2);
        assert!(!h.ui.panels().is_open());

        h.key("Escape");
        assert_eq!(h.ui.rings().rings().len(), 1);
        assert!(h.ui.is_visible());
        h.key("Escape");
        assert!(!h.ui.is_visible());
    }

    #[test]
    fn escape_closes_panels_before_rings() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        h.click(0, "many", Modifiers::empty());
        h.finish_loads();
        assert!(h.ui.panels().is_open());
        h.key("Escape");
        assert!(!h.ui.panels().is_open());
        assert!(h.ui.is_visible());
    }

    #[test]
    fn keyboard_hover_and_enter_execute() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        h.key("Down");
        assert!(h.ui.rings().hovered_item().is_some());
        let term = h.index_of(0, "term");
        while h.ui.rings().hovered_item().map(|hit| hit.index) != Some(term) {
            h.key("Tab");
        }
        h.key("Return");
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(!h.ui.is_visible());
    }

    #[test]
    fn root_changes_apply_on_the_next_tick() {
        let ran = Arc::default();
        let provider = apps(&ran);
        let mut h = main_ring(provider.clone());
        h.ui.show(center());
        provider.roots.lock().push(leaf("late"));

        h.ui.content_changed(ProviderId::from("apps"), None);
        h.ui.content_changed(ProviderId::from("apps"), None);
        assert_eq!(h.ui.rings().ring(0).unwrap().len(), 5);
        h.ui.tick();
        assert_eq!(h.ui.rings().ring(0).unwrap().len(), 6);
    }

    #[test]
    fn refreshes_report_the_ring_delta() {
        let ran = Arc::default();
        let provider = apps(&ran);
        let mut h = main_ring(provider.clone());
        h.ui.show(center());
        h.ui.drain_effects();
        {
            let mut roots = provider.roots.lock();
            roots.retain(|n| n.id.as_str() != "photo");
            roots.push(leaf("late"));
        }
        h.ui.content_changed(ProviderId::from("apps"), None);
        h.ui.tick();

        let diffs: Vec<RingDiff> = h
            .ui
            .drain_effects()
            .into_iter()
            .filter_map(|effect| match effect {
                UiEffect::RingChanged(diff) => Some(diff),
                _ => None,
            })
            .collect();
        let keys = |ids: &[&str]| ids.iter().map(|id| leaf(id).key()).collect::<Vec<_>>();
        assert_eq!(
            diffs,
            vec![RingDiff {
                level: 0,
                added: keys(&["late"]),
                removed: keys(&["photo"]),
                persisted: keys(&["term", "games", "recent", "many"]),
            }]
        );
    }

    #[test]
    fn open_dynamic_ring_reloads_on_change() {
        let ran = Arc::default();
        let provider = apps(&ran);
        let mut h = main_ring(provider.clone());
        h.ui.show(center());
        h.click(0, "recent", Modifiers::empty());
        h.finish_loads();
        assert_eq!(h.ui.rings().ring(1).unwrap().len(), 2);

        provider
            .children
            .lock()
            .insert("recent".into(), vec![leaf("doc"), leaf("sheet"), leaf("slides")]);
        h.ui.content_changed(ProviderId::from("apps"), Some(ContentId::from("recent")));
        h.ui.tick();
        assert!(matches!(h.loads.lock()[0].0.purpose, LoadPurpose::Refresh));
        h.ui.drain_effects();
        h.finish_loads();
        assert_eq!(h.ui.rings().ring(1).unwrap().len(), 3);
        match h.ui.drain_effects().first() {
            Some(UiEffect::RingChanged(diff)) => {
                assert_eq!(diff.level, 1);
                assert_eq!(diff.added, vec![leaf("slides").key()]);
                assert!(diff.removed.is_empty());
                assert_eq!(diff.persisted.len(), 2);
            }
            other => panic!("expected a ring delta, got {other:?}"),
        }
    }

    #[test]
    fn cached_providers_are_prewarmed_through_the_loader() {
        let polls = Arc::new(AtomicUsize::new(0));
        let desktop = {
            let polls = polls.clone();
            AppsProvider::with_sources(
                &AppsConfig {
                    id: ProviderId::from("desktop"),
                    name: "Applications".into(),
                    favorites: Vec::new(),
                    all_apps: true,
                },
                Arc::new(MemoryFavoritesStore::default()),
                Box::new(|_: bool| Vec::new()),
                Box::new(move || {
                    polls.fetch_add(1, Ordering::SeqCst);
                    Vec::new()
                }),
            )
        };
        let ran = Arc::default();
        let mut h = harness(vec![(
            ring_config("main", None, false),
            vec![Arc::new(desktop) as Arc<dyn Provider>, apps(&ran) as Arc<dyn Provider>],
        )]);
        assert_eq!(*h.prewarms.lock(), vec![ProviderId::from("desktop")]);
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        h.ui.show(center());
        assert_eq!(h.ui.rings().ring(0).unwrap().len(), 6);
        assert_eq!(polls.load(Ordering::SeqCst), 1);

        h.ui.hide();
        assert_eq!(h.prewarms.lock().len(), 2);
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn changes_while_hidden_are_ignored() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.content_changed(ProviderId::from("apps"), None);
        h.ui.show(center());
        h.ui.tick();
        assert!(h.loads.lock().is_empty());
    }

    #[test]
    fn drag_pauses_tracking_until_the_drop() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        h.ui.drain_effects();
        let photo = h.slice(0, h.index_of(0, "photo"));
        let drag = GestureEvent::DragStarted {
            button: MouseButton::Left,
            origin: photo,
            position: Point::new(photo.x + 20.0, photo.y),
            modifiers: Modifiers::ALT,
        };

        h.ui.handle_gesture(drag.clone());
        match h.ui.drain_effects().as_slice() {
            [UiEffect::StartDrag(provider)] => assert_eq!(
                provider.payload,
                DragPayload::Files(vec![PathBuf::from("/tmp/p.png")])
            ),
            other => panic!("expected a drag, got {other:?}"),
        }
        assert_eq!(h.ui.tracker().state(), TrackerState::PausedForDrag);
        h.ui.drag_finished(false);
        assert_eq!(h.ui.tracker().state(), TrackerState::Tracking);
        assert!(h.ui.is_visible());

        h.ui.handle_gesture(drag);
        h.ui.drag_finished(true);
        assert!(!h.ui.is_visible());
    }

    #[test]
    fn launch_ring_switches_configuration() {
        let pid = ProviderId::from("apps");
        let main = Arc::new(StaticProvider::new(
            "apps",
            vec![FunctionNode::leaf("work", "Work", &pid).on(
                GestureKind::LeftClick,
                Modifiers::empty(),
                ClickBehavior::LaunchRing(ConfigId::from("work")),
            )],
        ));
        let work = Arc::new(StaticProvider::new(
            "docs",
            vec![FunctionNode::leaf("a", "A", &ProviderId::from("docs"))],
        ));
        let mut h = harness(vec![
            (ring_config("main", None, false), vec![main as Arc<dyn Provider>]),
            (ring_config("work", None, false), vec![work as Arc<dyn Provider>]),
        ]);
        h.ui.show(center());
        h.click(0, "work", Modifiers::empty());
        assert!(h.ui.is_visible());
        assert_eq!(h.ui.active_config(), Some(&ConfigId::from("work")));
        assert_eq!(h.ui.rings().ring(0).unwrap().nodes[0].id.as_str(), "a");
    }

    #[test]
    fn show_expanding_opens_a_lone_category() {
        let pid = ProviderId::from("files");
        let files = Arc::new(
            StaticProvider::new(
                "files",
                vec![FunctionNode::category("home", "Home", &pid).with_dynamic_loading()],
            )
            .with_children("home", vec![FunctionNode::leaf("x", "x", &pid)]),
        );
        let ran = Arc::default();
        let mut h = harness(vec![(
            ring_config("main", None, false),
            vec![apps(&ran) as Arc<dyn Provider>, files as Arc<dyn Provider>],
        )]);
        h.ui.show_expanding(center(), &pid);
        assert_eq!(h.ui.rings().ring(0).unwrap().len(), 1);
        h.finish_loads();
        assert_eq!(h.ui.rings().rings().len(), 2);
    }

    #[test]
    fn typed_commands_go_to_the_provider() {
        let ran: Arc<Mutex<Vec<String>>> = Arc::default();
        let log = ran.clone();
        let commands = CommandsProvider::with_runner(
            &CommandsConfig {
                id: ProviderId::from("commands"),
                name: "Commands".into(),
                items: Vec::new(),
                prompt: true,
            },
            Arc::new(move |cmd: &ShellCommand| -> std::io::Result<()> {
                log.lock().push(cmd.to_string());
                Ok(())
            }),
        );
        let mut h = harness(vec![(
            ring_config("main", None, false),
            vec![Arc::new(commands) as Arc<dyn Provider>],
        )]);
        h.ui.show(center());
        let prompt = h.slice(0, 0);
        h.ui.handle_gesture(GestureEvent::Click {
            button: MouseButton::Left,
            position: prompt,
            modifiers: Modifiers::empty(),
        });
        h.finish_loads();
        assert_eq!(h.ui.panels().top().unwrap().typing_mode, TypingMode::Input);

        for key in ["l", "s"] {
            h.key(key);
        }
        h.key("Return");
        assert_eq!(ran.lock().as_slice(), ["ls"]);
        assert!(!h.ui.is_visible());
    }

    #[test]
    fn reconfigure_hides_and_rebuilds() {
        let ran = Arc::default();
        let mut h = main_ring(apps(&ran));
        h.ui.show(center());
        h.ui.reconfigure(Config::default());
        assert!(!h.ui.is_visible());
        h.ui.show(center());
        assert!(!h.ui.is_visible());
    }
}
