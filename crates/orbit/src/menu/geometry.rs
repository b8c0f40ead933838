//! Angular layout of rings and the hit-testing shared by the hover tracker and
//! the ring state machine. Angles are radians measured clockwise from +x (screen
//! coordinates), radii in logical pixels.

use super::{
    CHILD_SLICE_ANGLE, CLOSE_ZONE_RADIUS, MAX_RING_ITEMS, RING_GAP, RING_THICKNESS, START_OFFSET,
};
use orbitctl::wm::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

const FULL_CIRCLE_EPSILON: f64 = 1e-9;

pub fn pointer_angle(pointer: Point, center: Point) -> f64 {
    let (dx, dy) = pointer.offset_from(center);
    dy.atan2(dx)
}

pub fn normalize_angle(angle: f64) -> f64 {
    angle.rem_euclid(TAU)
}

/// Shortest unsigned distance between two angles.
pub fn angle_difference(a: f64, b: f64) -> f64 {
    ((a - b + PI).rem_euclid(TAU) - PI).abs()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RingShape {
    pub inner_radius: f64,
    pub outer_radius: f64,
    /// Leading edge of slice 0.
    pub start_angle: f64,
    pub slice_angle: f64,
    pub item_count: usize,
    pub full_circle: bool,
}

impl RingShape {
    pub fn full(inner_radius: f64, outer_radius: f64, start_angle: f64, item_count: usize) -> Self {
        Self {
            inner_radius,
            outer_radius,
            start_angle,
            slice_angle: TAU / item_count.max(1) as f64,
            item_count,
            full_circle: true,
        }
    }

    /// An arc of `item_count` slices centered on `center_angle`. Falls back to a
    /// full circle when the slices would not fit.
    pub fn arc(
        inner_radius: f64,
        outer_radius: f64,
        center_angle: f64,
        slice_angle: f64,
        item_count: usize,
    ) -> Self {
        let span = slice_angle * item_count as f64;
        if span >= TAU - FULL_CIRCLE_EPSILON {
            let slice = TAU / item_count.max(1) as f64;
            return Self::full(inner_radius, outer_radius, center_angle - slice / 2.0, item_count);
        }
        Self {
            inner_radius,
            outer_radius,
            start_angle: center_angle - span / 2.0,
            slice_angle,
            item_count,
            full_circle: false,
        }
    }

    /// Radial band `(inner, outer]`: on an exact boundary the inner ring wins.
    pub fn contains_radius(&self, distance: f64) -> bool {
        distance > self.inner_radius && distance <= self.outer_radius
    }

    pub fn slice_at_angle(&self, angle: f64) -> Option<usize> {
        if self.item_count == 0 || self.slice_angle <= 0.0 {
            return None;
        }
        let offset = normalize_angle(angle - self.start_angle);
        let index = (offset / self.slice_angle).floor() as usize;
        if self.full_circle {
            Some(index.min(self.item_count - 1))
        } else {
            (index < self.item_count).then_some(index)
        }
    }

    /// Slice under `pointer`, or `None` when it is outside the band or the arc.
    pub fn slice_at(&self, pointer: Point, center: Point) -> Option<usize> {
        self.contains_radius(pointer.distance_to(center))
            .then(|| self.slice_at_angle(pointer_angle(pointer, center)))?
    }

    pub fn slice_center_angle(&self, index: usize) -> f64 {
        self.start_angle + (index as f64 + 0.5) * self.slice_angle
    }

    pub fn mid_radius(&self) -> f64 {
        (self.inner_radius + self.outer_radius) / 2.0
    }

    pub fn slice_center(&self, index: usize, center: Point) -> Point {
        center.polar(self.slice_center_angle(index), self.mid_radius())
    }
}

/// Deepest ring whose radial band holds `distance`.
pub fn level_at_distance(shapes: &[RingShape], distance: f64) -> Option<usize> {
    shapes
        .iter()
        .enumerate()
        .rev()
        .find(|(_, shape)| shape.contains_radius(distance))
        .map(|(level, _)| level)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub origin: Point,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(origin: Point, width: f64, height: f64) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.origin.x
            && p.x < self.origin.x + self.width
            && p.y >= self.origin.y
            && p.y < self.origin.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.origin.x + self.width
    }
}

/// Configurable ring metrics; see `[layout]` in the config file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RingLayout {
    pub close_zone_radius: f64,
    pub ring_thickness: f64,
    pub ring_gap: f64,
    /// Direction of the first root item, in degrees clockwise from east.
    pub start_angle_deg: f64,
    pub child_slice_deg: f64,
    pub max_ring_items: usize,
}

impl Default for RingLayout {
    fn default() -> Self {
        Self {
            close_zone_radius: CLOSE_ZONE_RADIUS,
            ring_thickness: RING_THICKNESS,
            ring_gap: RING_GAP,
            start_angle_deg: START_OFFSET.to_degrees(),
            child_slice_deg: CHILD_SLICE_ANGLE.to_degrees(),
            max_ring_items: MAX_RING_ITEMS,
        }
    }
}

impl RingLayout {
    fn band(&self, level: usize) -> (f64, f64) {
        let inner = self.close_zone_radius + level as f64 * (self.ring_thickness + self.ring_gap);
        (inner, inner + self.ring_thickness)
    }

    pub fn root_shape(&self, item_count: usize) -> RingShape {
        let (inner, outer) = self.band(0);
        let slice = TAU / item_count.max(1) as f64;
        RingShape::full(inner, outer, self.start_angle_deg.to_radians() - slice / 2.0, item_count)
    }

    /// A child ring branching out of `parent`'s slice `parent_index`.
    pub fn child_shape(
        &self,
        level: usize,
        item_count: usize,
        parent: &RingShape,
        parent_index: usize,
    ) -> RingShape {
        let (inner, outer) = self.band(level);
        RingShape::arc(
            inner,
            outer,
            parent.slice_center_angle(parent_index),
            self.child_slice_deg.to_radians(),
            item_count,
        )
    }

    /// A drilled-down ring: a full circle whose first item faces the folder it came from.
    pub fn drill_shape(
        &self,
        level: usize,
        item_count: usize,
        parent: &RingShape,
        parent_index: usize,
    ) -> RingShape {
        let (inner, outer) = self.band(level);
        let slice = TAU / item_count.max(1) as f64;
        RingShape::full(
            inner,
            outer,
            parent.slice_center_angle(parent_index) - slice / 2.0,
            item_count,
        )
    }
}
