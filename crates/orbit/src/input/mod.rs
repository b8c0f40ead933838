//! Pointer and keyboard input: gesture classification and hover tracking.

pub mod gesture;
pub mod tracker;

pub use gesture::{
    Classified, Disposition, GestureClassifier, GestureConfig, GestureEvent, KeyName, MouseButton,
    RawEvent, Source, Trigger, TriggerInput,
};
pub use tracker::{MouseTracker, TickGuard, TickScheduler, TrackerConfig, TrackerEvent, TrackerState};
