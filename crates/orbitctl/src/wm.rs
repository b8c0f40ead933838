use derive_more::{AsRef, Deref, Display, From, Into};
use hyprland::data::{Clients, CursorPosition, Monitors};
use hyprland::dispatch::{Dispatch, DispatchType, WindowIdentifier};
use hyprland::error::HyprError;
use hyprland::prelude::*;
use hyprland::shared::Address;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::process::{Command, Stdio};
use thiserror::Error;

/// A position in overlay coordinates (logical pixels, y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset_from(self, origin: Point) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let (dx, dy) = self.offset_from(other);
        dx.hypot(dy)
    }

    /// Point at `radius` from `self` in direction `angle` (radians, clockwise from +x).
    pub fn polar(self, angle: f64, radius: f64) -> Point {
        Point::new(self.x + radius * angle.cos(), self.y + radius * angle.sin())
    }
}

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct WindowClass(String);

crate::impl_string_newtype!(WindowClass);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Deref, From, Into, AsRef)]
pub struct MonitorName(String);

crate::impl_string_newtype!(MonitorName);

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Deref, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct ShellCommand(String);

crate::impl_string_newtype!(ShellCommand);

#[derive(Debug, Error)]
pub enum RunOrRaiseError {
    #[error(transparent)]
    Hypr(#[from] HyprError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no command to launch '{0}'")]
    NothingToRun(WindowClass),
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug)]
pub enum MatchScore {
    NoMatch,
    Fuzzy,
    Component,
    Exact,
}

impl MatchScore {
    /// Scores how well a live window class matches the class we are looking for.
    pub fn of(window_class: &str, wanted: &str) -> Self {
        let (window, wanted) = (window_class.to_ascii_lowercase(), wanted.to_ascii_lowercase());
        if wanted.is_empty() || window.is_empty() {
            Self::NoMatch
        } else if window == wanted {
            Self::Exact
        } else if window.split('.').any(|part| part == wanted) {
            Self::Component
        } else if window.contains(&wanted) || wanted.contains(&window) {
            Self::Fuzzy
        } else {
            Self::NoMatch
        }
    }
}

pub fn get_active_classes() -> Vec<WindowClass> {
    Clients::get()
        .map(|clients| clients.into_iter().map(|c| WindowClass(c.class)).collect())
        .unwrap_or_default()
}

pub fn is_running(class: &WindowClass, active: &[WindowClass]) -> bool {
    active
        .iter()
        .any(|c| MatchScore::of(c, class) >= MatchScore::Component)
}

pub fn focus_window(address: &Address) -> Result<(), HyprError> {
    Dispatch::call(DispatchType::FocusWindow(WindowIdentifier::Address(
        address.clone(),
    )))
}

pub fn close_window(class: &WindowClass) -> Result<(), HyprError> {
    Dispatch::call(DispatchType::CloseWindow(
        WindowIdentifier::ClassRegularExpression(&class.0),
    ))
}

pub fn get_active_monitor() -> Option<MonitorName> {
    Monitors::get()
        .ok()?
        .into_iter()
        .find(|m| m.focused)
        .map(|m| MonitorName(m.name))
}

pub fn get_cursor_pos_on_active_monitor() -> Option<Point> {
    let cursor = CursorPosition::get().ok()?;
    let focused = Monitors::get().ok()?.into_iter().find(|m| m.focused)?;

    Some(Point::new(
        cursor.x as f64 - focused.x as f64,
        cursor.y as f64 - focused.y as f64,
    ))
}

/// Runs `command` through `sh -c`, detached from our stdio.
pub fn spawn_shell(command: &ShellCommand) -> std::io::Result<()> {
    spawn_detached("sh", ["-c", command.as_str()])
}

/// Opens a file or folder with the desktop's default handler.
pub fn open_path(path: impl AsRef<OsStr>) -> std::io::Result<()> {
    spawn_detached("xdg-open", [path.as_ref()])
}

fn spawn_detached<I, S>(program: &str, args: I) -> std::io::Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

/// Focuses the best matching window for `class`, or launches `exec` when none is open.
pub fn run_or_raise(class: &WindowClass, exec: &ShellCommand) -> Result<(), RunOrRaiseError> {
    let best = Clients::get()?
        .into_iter()
        .map(|c| (MatchScore::of(&c.class, class), c))
        .filter(|(score, _)| *score > MatchScore::NoMatch)
        .max_by_key(|(score, _)| *score);

    match best {
        Some((_, client)) => Ok(focus_window(&client.address)?),
        None if exec.is_empty() => Err(RunOrRaiseError::NothingToRun(class.clone())),
        None => Ok(spawn_shell(exec)?),
    }
}
