//! Per-gesture behavior tables and the modifier-aware resolver.
//!
//! Every discrete gesture ends up here: the table declared for the gesture is
//! looked up against the active modifier snapshot and yields exactly one
//! [`ClickBehavior`]. Lookup order is
//!
//! 1. an entry for exactly the active modifier set,
//! 2. single-modifier entries whose modifier is held, in [`SINGLE_MODIFIER_PRECEDENCE`] order,
//! 3. the unmodified default,
//!
//! and anything else resolves to [`ClickBehavior::None`].

use super::node::ConfigId;
use bitflags::bitflags;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Modifiers: u8 {
        const SHIFT = 1;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
    }
}

pub const SINGLE_MODIFIER_PRECEDENCE: [Modifiers; 4] =
    [Modifiers::SUPER, Modifiers::CTRL, Modifiers::ALT, Modifiers::SHIFT];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown modifier '{0}'")]
pub struct ParseModifierError(String);

impl FromStr for Modifiers {
    type Err = ParseModifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(['+', ','])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .try_fold(Modifiers::empty(), |acc, part| {
                let flag = match part.to_ascii_lowercase().as_str() {
                    "none" => Modifiers::empty(),
                    "shift" => Modifiers::SHIFT,
                    "ctrl" | "control" => Modifiers::CTRL,
                    "alt" | "option" | "opt" => Modifiers::ALT,
                    "super" | "cmd" | "command" | "meta" | "logo" | "win" => Modifiers::SUPER,
                    _ => return Err(ParseModifierError(part.to_string())),
                };
                Ok(acc | flag)
            })
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<_> = [
            (Modifiers::SUPER, "super"),
            (Modifiers::CTRL, "ctrl"),
            (Modifiers::ALT, "alt"),
            (Modifiers::SHIFT, "shift"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        write!(f, "{}", names.join("+"))
    }
}

impl<'de> Deserialize<'de> for Modifiers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Opaque callable attached to a node. It owns everything it needs and never
/// reaches into menu state.
#[derive(Clone)]
pub struct Action {
    label: String,
    run: Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>,
}

impl Action {
    pub fn new(
        label: impl Into<String>,
        run: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            run: Arc::new(run),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn run(&self) -> anyhow::Result<()> {
        (self.run)()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("label", &self.label).finish()
    }
}

// Identity comparison: two actions are equal when they share the same closure.
impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.run), Arc::as_ptr(&other.run))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragPayload {
    Files(Vec<PathBuf>),
    Text(String),
}

/// What an OS drag session carries when a node is dragged out of the menu.
#[derive(Debug, Clone, PartialEq)]
pub struct DragProvider {
    pub label: String,
    pub payload: DragPayload,
}

impl DragProvider {
    pub fn files(label: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            label: label.into(),
            payload: DragPayload::Files(files),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, strum::IntoStaticStr)]
pub enum ClickBehavior {
    /// Run and close the menu.
    Execute(Action),
    /// Run and leave the menu open.
    ExecuteKeepOpen(Action),
    /// Branch out: children open as a new ring (or panel) next to the node.
    Expand,
    /// Drill down: the node's contents replace everything past its ring.
    NavigateInto,
    LaunchRing(ConfigId),
    Drag(DragProvider),
    #[default]
    None,
}

impl ClickBehavior {
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorTable {
    entries: BTreeMap<Modifiers, ClickBehavior>,
}

impl BehaviorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with only the unmodified default.
    pub fn always(behavior: ClickBehavior) -> Self {
        Self::new().with(Modifiers::empty(), behavior)
    }

    pub fn with(mut self, modifiers: Modifiers, behavior: ClickBehavior) -> Self {
        self.insert(modifiers, behavior);
        self
    }

    pub fn insert(&mut self, modifiers: Modifiers, behavior: ClickBehavior) {
        self.entries.insert(modifiers, behavior);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn behaviors(&self) -> impl Iterator<Item = &ClickBehavior> {
        self.entries.values()
    }

    pub fn resolve(&self, active: Modifiers) -> ClickBehavior {
        self.entries
            .get(&active)
            .or_else(|| {
                SINGLE_MODIFIER_PRECEDENCE
                    .iter()
                    .filter(|single| active.contains(**single))
                    .find_map(|single| self.entries.get(single))
            })
            .or_else(|| self.entries.get(&Modifiers::empty()))
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    LeftClick,
    RightClick,
    MiddleClick,
    /// Scrolling, or the pointer leaving the ring outward across the item.
    BoundaryCross,
}

impl GestureKind {
    pub const ALL: [Self; 4] = [
        Self::LeftClick,
        Self::RightClick,
        Self::MiddleClick,
        Self::BoundaryCross,
    ];
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeBehaviors {
    pub on_left_click: BehaviorTable,
    pub on_right_click: BehaviorTable,
    pub on_middle_click: BehaviorTable,
    pub on_boundary_cross: BehaviorTable,
}

impl NodeBehaviors {
    pub fn table(&self, gesture: GestureKind) -> &BehaviorTable {
        match gesture {
            GestureKind::LeftClick => &self.on_left_click,
            GestureKind::RightClick => &self.on_right_click,
            GestureKind::MiddleClick => &self.on_middle_click,
            GestureKind::BoundaryCross => &self.on_boundary_cross,
        }
    }

    pub fn table_mut(&mut self, gesture: GestureKind) -> &mut BehaviorTable {
        match gesture {
            GestureKind::LeftClick => &mut self.on_left_click,
            GestureKind::RightClick => &mut self.on_right_click,
            GestureKind::MiddleClick => &mut self.on_middle_click,
            GestureKind::BoundaryCross => &mut self.on_boundary_cross,
        }
    }

    pub fn resolve(&self, gesture: GestureKind, modifiers: Modifiers) -> ClickBehavior {
        self.table(gesture).resolve(modifiers)
    }

    fn all(&self) -> impl Iterator<Item = &ClickBehavior> {
        GestureKind::ALL
            .into_iter()
            .flat_map(move |gesture| self.table(gesture).behaviors())
    }

    pub fn has_actionable(&self) -> bool {
        self.all().any(|b| {
            matches!(
                b,
                ClickBehavior::Execute(_)
                    | ClickBehavior::ExecuteKeepOpen(_)
                    | ClickBehavior::LaunchRing(_)
                    | ClickBehavior::Drag(_)
            )
        })
    }

    /// First drag declaration across all tables, used when a press turns into a drag.
    pub fn drag_provider(&self) -> Option<&DragProvider> {
        self.all().find_map(|b| match b {
            ClickBehavior::Drag(provider) => Some(provider),
            _ => None,
        })
    }
}
