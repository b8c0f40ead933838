//! Hover tracking for the visible rings.
//!
//! [`MouseTracker`] is fed the pointer on every move and tick and reports what
//! changed: the hovered slice, a pull back toward a shallower ring, a crossing
//! of the active ring's outer edge, a return to the close zone at the center,
//! or the pointer entering a panel. It pauses after a ring opens under the
//! pointer and for the length of a drag.

use crate::menu::geometry::{Rect, RingShape, level_at_distance, pointer_angle};
use orbitctl::wm::Point;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackerState {
    Idle,
    Tracking,
    /// Ignores the pointer until it moves away from `anchor`.
    PausedUntilMovement { anchor: Point },
    PausedForDrag,
}

/// Cancels a repeating tick when dropped.
pub struct TickGuard {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TickGuard {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A guard with nothing to cancel.
    pub fn inert() -> Self {
        Self { cancel: None }
    }
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TickGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickGuard")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Drives the hover polling cadence. The daemon backs this with a tokio interval.
pub trait TickScheduler {
    fn start(&self, every: Duration) -> TickGuard;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    HoverChanged { level: usize, index: Option<usize> },
    /// The pointer went back to a shallower ring, or left the active ring outward
    /// where it has no slice.
    CollapseIntent { to_level: usize },
    /// The pointer left the active ring outward across slice `index`.
    BoundaryCrossed { level: usize, index: usize },
    CloseZoneEntered,
    PanelHover(bool),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub poll_interval_ms: u64,
    /// How far the pointer has to travel to end a `PausedUntilMovement`.
    pub movement_threshold: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 16,
            movement_threshold: 4.0,
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Continuous geometric evaluation of the pointer against the ring stack.
/// Reads ring geometry and reports; it never touches ring state.
#[derive(Debug)]
pub struct MouseTracker {
    config: TrackerConfig,
    state: TrackerState,
    tick: Option<TickGuard>,
    hovered: Option<(usize, usize)>,
    band_level: Option<usize>,
    over_panel: bool,
    in_close_zone: bool,
    /// The close zone only dismisses once the pointer has been outside it.
    close_zone_armed: bool,
    /// Slice the pointer was over when it last left the active ring outward.
    outside: Option<Option<usize>>,
}

impl MouseTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: TrackerState::Idle,
            tick: None,
            hovered: None,
            band_level: None,
            over_panel: false,
            in_close_zone: true,
            close_zone_armed: false,
            outside: None,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state != TrackerState::Idle
    }

    pub fn hovered(&self) -> Option<(usize, usize)> {
        self.hovered
    }

    pub fn set_config(&mut self, config: TrackerConfig) {
        self.config = config;
    }

    pub fn start_tracking(&mut self, scheduler: &dyn TickScheduler) {
        self.tick = None;
        self.clear_session();
        self.tick = Some(scheduler.start(self.config.poll_interval()));
        self.state = TrackerState::Tracking;
        log::debug!("hover tracking started");
    }

    pub fn stop_tracking(&mut self) {
        if self.state == TrackerState::Idle && self.tick.is_none() {
            return;
        }
        self.tick = None;
        self.state = TrackerState::Idle;
        self.clear_session();
        log::debug!("hover tracking stopped");
    }

    fn clear_session(&mut self) {
        self.hovered = None;
        self.band_level = None;
        self.over_panel = false;
        self.in_close_zone = true;
        self.close_zone_armed = false;
        self.outside = None;
    }

    pub fn pause_until_movement(&mut self, anchor: Point) {
        if self.state == TrackerState::Tracking {
            self.state = TrackerState::PausedUntilMovement { anchor };
        }
    }

    pub fn pause_for_drag(&mut self) {
        if self.state != TrackerState::Idle {
            self.state = TrackerState::PausedForDrag;
        }
    }

    pub fn resume_from_drag(&mut self) {
        if self.state == TrackerState::PausedForDrag {
            self.state = TrackerState::Tracking;
        }
    }

    /// The ring stack changed shape; re-evaluate edges on the next update.
    pub fn rings_changed(&mut self) {
        self.outside = None;
        self.band_level = None;
    }

    /// Forgets the reported hover so the next update republishes it.
    pub fn forget_hover(&mut self) {
        self.hovered = None;
    }

    pub fn update(
        &mut self,
        pointer: Point,
        center: Point,
        shapes: &[RingShape],
        active_level: usize,
        panels: &[Rect],
    ) -> Vec<TrackerEvent> {
        match self.state {
            TrackerState::Idle | TrackerState::PausedForDrag => return Vec::new(),
            TrackerState::PausedUntilMovement { anchor } => {
                if pointer.distance_to(anchor) <= self.config.movement_threshold {
                    return Vec::new();
                }
                self.state = TrackerState::Tracking;
            }
            TrackerState::Tracking => {}
        }

        let mut events = Vec::new();

        let over_panel = panels.iter().any(|r| r.contains(pointer));
        if over_panel != self.over_panel {
            self.over_panel = over_panel;
            events.push(TrackerEvent::PanelHover(over_panel));
        }
        if over_panel {
            return events;
        }

        let Some(root) = shapes.first() else {
            return events;
        };
        let active_level = active_level.min(shapes.len() - 1);
        let distance = pointer.distance_to(center);

        if distance <= root.inner_radius {
            if !self.in_close_zone {
                self.in_close_zone = true;
                if self.close_zone_armed {
                    events.push(TrackerEvent::CloseZoneEntered);
                }
            }
            self.band_level = None;
            self.outside = None;
            self.set_hover(None, &mut events);
            return events;
        }
        self.in_close_zone = false;
        self.close_zone_armed = true;

        let angle = pointer_angle(pointer, center);
        let active = &shapes[active_level];

        if distance > active.outer_radius {
            let index = active.slice_at_angle(angle);
            self.band_level = None;
            self.set_hover(index.map(|i| (active_level, i)), &mut events);
            if self.outside != Some(index) {
                self.outside = Some(index);
                match index {
                    Some(index) => events.push(TrackerEvent::BoundaryCrossed {
                        level: active_level,
                        index,
                    }),
                    None if active_level > 0 => events.push(TrackerEvent::CollapseIntent {
                        to_level: active_level - 1,
                    }),
                    None => {}
                }
            }
            return events;
        }
        self.outside = None;

        // Between two bands the previous hover stands.
        let Some(level) = level_at_distance(&shapes[..=active_level], distance) else {
            return events;
        };
        let index = shapes[level].slice_at_angle(angle);
        self.set_hover(index.map(|i| (level, i)), &mut events);

        if level < active_level && (self.band_level != Some(level) || events.iter().any(is_hover)) {
            events.push(TrackerEvent::CollapseIntent { to_level: level });
        }
        self.band_level = Some(level);
        events
    }

    fn set_hover(&mut self, hovered: Option<(usize, usize)>, events: &mut Vec<TrackerEvent>) {
        if self.hovered == hovered {
            return;
        }
        let event = match (hovered, self.hovered) {
            (Some((level, index)), _) => TrackerEvent::HoverChanged {
                level,
                index: Some(index),
            },
            (None, Some((level, _))) => TrackerEvent::HoverChanged { level, index: None },
            (None, None) => return,
        };
        self.hovered = hovered;
        events.push(event);
    }
}

fn is_hover(event: &TrackerEvent) -> bool {
    matches!(event, TrackerEvent::HoverChanged { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::geometry::RingLayout;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingScheduler {
        started: Arc<AtomicUsize>,
        cancelled: Arc<AtomicUsize>,
    }

    impl TickScheduler for CountingScheduler {
        fn start(&self, _every: Duration) -> TickGuard {
            self.started.fetch_add(1, Ordering::SeqCst);
            let cancelled = self.cancelled.clone();
            TickGuard::new(move || {
                cancelled.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    const CENTER: Point = Point { x: 500.0, y: 500.0 };

    fn at(angle_deg: f64, radius: f64) -> Point {
        CENTER.polar(angle_deg.to_radians(), radius)
    }

    fn tracking() -> MouseTracker {
        let mut tracker = MouseTracker::new(TrackerConfig::default());
        tracker.start_tracking(&CountingScheduler::default());
        tracker
    }

    fn five_slice_root() -> RingShape {
        RingShape::full(48.0, 128.0, 0.0, 5)
    }

    #[test]
    fn hover_follows_the_slice_under_the_pointer() {
        let mut tracker = tracking();
        let shapes = [five_slice_root()];
        let events = tracker.update(at(100.0, 90.0), CENTER, &shapes, 0, &[]);
        assert_eq!(
            events,
            vec![TrackerEvent::HoverChanged {
                level: 0,
                index: Some(1)
            }]
        );
        // same slice, nothing new
        assert!(tracker.update(at(110.0, 95.0), CENTER, &shapes, 0, &[]).is_empty());
    }

    #[test]
    fn empty_ring_reports_no_hover() {
        let mut tracker = tracking();
        let shapes = [RingShape::full(48.0, 128.0, 0.0, 0)];
        assert!(tracker.update(at(10.0, 90.0), CENTER, &shapes, 0, &[]).is_empty());
        assert_eq!(tracker.hovered(), None);
    }

    #[test]
    fn close_zone_needs_the_pointer_to_leave_first() {
        let mut tracker = tracking();
        let shapes = [five_slice_root()];
        // menu opens with the pointer in the middle
        assert!(tracker.update(CENTER, CENTER, &shapes, 0, &[]).is_empty());
        tracker.update(at(10.0, 90.0), CENTER, &shapes, 0, &[]);
        let events = tracker.update(at(10.0, 10.0), CENTER, &shapes, 0, &[]);
        assert!(events.contains(&TrackerEvent::CloseZoneEntered));
        assert!(events.contains(&TrackerEvent::HoverChanged { level: 0, index: None }));
    }

    #[test]
    fn panel_hover_suppresses_ring_evaluation() {
        let mut tracker = tracking();
        let shapes = [five_slice_root()];
        let panel = Rect::new(Point::new(600.0, 400.0), 200.0, 300.0);
        let events = tracker.update(at(0.0, 200.0), CENTER, &shapes, 0, &[panel]);
        assert_eq!(events, vec![TrackerEvent::PanelHover(true)]);
        let events = tracker.update(at(100.0, 90.0), CENTER, &shapes, 0, &[panel]);
        assert_eq!(events[0], TrackerEvent::PanelHover(false));
    }

    #[test]
    fn leaving_outward_crosses_the_hovered_slice_once() {
        let mut tracker = tracking();
        let shapes = [five_slice_root()];
        tracker.update(at(100.0, 90.0), CENTER, &shapes, 0, &[]);
        let events = tracker.update(at(100.0, 140.0), CENTER, &shapes, 0, &[]);
        assert_eq!(events, vec![TrackerEvent::BoundaryCrossed { level: 0, index: 1 }]);
        assert!(tracker.update(at(101.0, 150.0), CENTER, &shapes, 0, &[]).is_empty());
    }

    #[test]
    fn moving_back_to_a_shallower_ring_signals_collapse() {
        let layout = RingLayout::default();
        let root = layout.root_shape(4);
        let child = layout.child_shape(1, 2, &root, 1);
        let shapes = [root, child];
        let mut tracker = tracking();

        let in_child = CENTER.polar(child.slice_center_angle(0), child.mid_radius());
        tracker.update(in_child, CENTER, &shapes, 1, &[]);
        let in_root = CENTER.polar(root.slice_center_angle(2), root.mid_radius());
        let events = tracker.update(in_root, CENTER, &shapes, 1, &[]);
        assert!(events.contains(&TrackerEvent::CollapseIntent { to_level: 0 }));
    }

    #[test]
    fn off_arc_exit_collapses_the_child() {
        let layout = RingLayout::default();
        let root = layout.root_shape(4);
        let child = layout.child_shape(1, 2, &root, 0);
        let shapes = [root, child];
        let mut tracker = tracking();
        let opposite = child.slice_center_angle(0) + std::f64::consts::PI;
        let events = tracker.update(CENTER.polar(opposite, 260.0), CENTER, &shapes, 1, &[]);
        assert!(events.contains(&TrackerEvent::CollapseIntent { to_level: 0 }));
    }

    #[test]
    fn pause_until_movement_ignores_a_resting_pointer() {
        let mut tracker = tracking();
        let shapes = [five_slice_root()];
        let rest = at(100.0, 90.0);
        tracker.pause_until_movement(rest);
        assert!(tracker.update(rest, CENTER, &shapes, 0, &[]).is_empty());
        assert!(!tracker.update(at(100.0, 100.0), CENTER, &shapes, 0, &[]).is_empty());
        assert_eq!(tracker.state(), TrackerState::Tracking);
    }

    #[test]
    fn drag_pause_suspends_everything() {
        let mut tracker = tracking();
        let shapes = [five_slice_root()];
        tracker.pause_for_drag();
        assert!(tracker.update(at(100.0, 90.0), CENTER, &shapes, 0, &[]).is_empty());
        tracker.resume_from_drag();
        assert!(!tracker.update(at(100.0, 90.0), CENTER, &shapes, 0, &[]).is_empty());
    }

    #[test]
    fn stop_is_idempotent_and_cancels_the_tick() {
        let scheduler = CountingScheduler::default();
        let mut tracker = MouseTracker::new(TrackerConfig::default());
        tracker.start_tracking(&scheduler);
        tracker.stop_tracking();
        tracker.stop_tracking();
        assert_eq!(scheduler.started.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.cancelled.load(Ordering::SeqCst), 1);
        assert!(!tracker.is_tracking());
    }
}
