//! Turns raw pointer and keyboard events into the canonical gesture stream.
//!
//! The same physical event may arrive twice, once from the global (background)
//! monitor and once from the overlay's local one. The classifier drops the
//! second copy when it lands within [`GestureConfig::dedupe_window_ms`].

use crate::menu::{ConfigId, Modifiers};
use derive_more::{AsRef, Deref, Display, From, Into};
use orbitctl::wm::Point;
use serde::{Deserialize, Serialize};
use serde_with::DeserializeFromStr;
use std::str::FromStr;
use std::time::{Duration, Instant};
use strum::{Display as StrumDisplay, EnumString};
use thiserror::Error;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, DeserializeFromStr, EnumString, StrumDisplay,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[strum(serialize = "left", serialize = "1")]
    Left,
    #[strum(serialize = "right", serialize = "3")]
    Right,
    #[strum(serialize = "middle", serialize = "2")]
    Middle,
    #[strum(serialize = "back", serialize = "8")]
    Back,
    #[strum(serialize = "forward", serialize = "9")]
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, StrumDisplay)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Source {
    Global,
    #[default]
    Local,
}

/// Lowercased key name, e.g. `escape`, `enter` or a single character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Deref, From, Into, AsRef)]
pub struct KeyName(String);

orbitctl::impl_string_newtype!(KeyName);

impl KeyName {
    pub fn normalized(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        Self(match lower.as_str() {
            "return" | "kp_enter" => "enter".to_owned(),
            "esc" => "escape".to_owned(),
            " " => "space".to_owned(),
            _ if name.chars().count() == 1 => name.to_owned(),
            _ => lower,
        })
    }

    /// The character this key types, if it types one.
    pub fn as_char(&self) -> Option<char> {
        if self.0 == "space" {
            return Some(' ');
        }
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_control() => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawEvent {
    ButtonDown {
        button: MouseButton,
        position: Option<Point>,
        modifiers: Modifiers,
        source: Source,
    },
    ButtonUp {
        button: MouseButton,
        position: Option<Point>,
        modifiers: Modifiers,
        source: Source,
    },
    Moved {
        position: Point,
        modifiers: Modifiers,
    },
    Scroll {
        delta: f64,
        position: Option<Point>,
        modifiers: Modifiers,
        source: Source,
    },
    KeyDown {
        key: KeyName,
        modifiers: Modifiers,
        source: Source,
    },
    KeyUp {
        key: KeyName,
        modifiers: Modifiers,
        source: Source,
    },
}

impl RawEvent {
    pub fn source(&self) -> Source {
        match self {
            Self::ButtonDown { source, .. }
            | Self::ButtonUp { source, .. }
            | Self::Scroll { source, .. }
            | Self::KeyDown { source, .. }
            | Self::KeyUp { source, .. } => *source,
            Self::Moved { .. } => Source::Local,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            Self::ButtonDown { modifiers, .. }
            | Self::ButtonUp { modifiers, .. }
            | Self::Moved { modifiers, .. }
            | Self::Scroll { modifiers, .. }
            | Self::KeyDown { modifiers, .. }
            | Self::KeyUp { modifiers, .. } => *modifiers,
        }
    }

    fn fingerprint(&self) -> Option<Fingerprint> {
        Some(match self {
            Self::ButtonDown { button, .. } => Fingerprint::Down(*button),
            Self::ButtonUp { button, .. } => Fingerprint::Up(*button),
            Self::Scroll { delta, .. } => Fingerprint::Scroll(delta.to_bits()),
            Self::KeyDown { key, .. } => Fingerprint::KeyDown(key.clone()),
            Self::KeyUp { key, .. } => Fingerprint::KeyUp(key.clone()),
            Self::Moved { .. } => return None,
        })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseRawEventError {
    #[error("empty event")]
    Empty,
    #[error("unknown event '{0}'")]
    UnknownEvent(String),
    #[error("missing {0}")]
    MissingArgument(&'static str),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("invalid button '{0}'")]
    InvalidButton(String),
    #[error(transparent)]
    InvalidModifiers(#[from] crate::menu::behavior::ParseModifierError),
    #[error("unexpected '{0}'")]
    Unexpected(String),
}

struct Tail {
    position: Option<Point>,
    source: Source,
    modifiers: Modifiers,
}

/// `[X Y] [global|local] [modifiers]`
fn parse_tail<'a>(mut rest: impl Iterator<Item = &'a str>) -> Result<Tail, ParseRawEventError> {
    let mut tail = Tail {
        position: None,
        source: Source::default(),
        modifiers: Modifiers::empty(),
    };
    let mut pending = rest.next();

    if let Some(x) = pending.and_then(|t| t.parse::<f64>().ok()) {
        let y = rest
            .next()
            .ok_or(ParseRawEventError::MissingArgument("y coordinate"))?;
        let y = y
            .parse::<f64>()
            .map_err(|_| ParseRawEventError::InvalidNumber(y.to_string()))?;
        tail.position = Some(Point::new(x, y));
        pending = rest.next();
    }
    if let Some(source) = pending.and_then(|t| t.parse::<Source>().ok()) {
        tail.source = source;
        pending = rest.next();
    }
    if let Some(mods) = pending {
        tail.modifiers = mods.parse()?;
        pending = rest.next();
    }
    match pending {
        Some(extra) => Err(ParseRawEventError::Unexpected(extra.to_string())),
        None => Ok(tail),
    }
}

fn number(token: Option<&str>, what: &'static str) -> Result<f64, ParseRawEventError> {
    let token = token.ok_or(ParseRawEventError::MissingArgument(what))?;
    token
        .parse()
        .map_err(|_| ParseRawEventError::InvalidNumber(token.to_string()))
}

fn button(token: Option<&str>) -> Result<MouseButton, ParseRawEventError> {
    let token = token.ok_or(ParseRawEventError::MissingArgument("button"))?;
    token
        .parse()
        .map_err(|_| ParseRawEventError::InvalidButton(token.to_string()))
}

impl FromStr for RawEvent {
    type Err = ParseRawEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let verb = tokens.next().ok_or(ParseRawEventError::Empty)?;

        match verb.to_ascii_lowercase().as_str() {
            "move" => {
                let x = number(tokens.next(), "x coordinate")?;
                let y = number(tokens.next(), "y coordinate")?;
                let modifiers = match tokens.next() {
                    Some(mods) => mods.parse()?,
                    None => Modifiers::empty(),
                };
                Ok(Self::Moved {
                    position: Point::new(x, y),
                    modifiers,
                })
            }
            "down" | "up" => {
                let button = button(tokens.next())?;
                let Tail {
                    position,
                    source,
                    modifiers,
                } = parse_tail(tokens)?;
                Ok(if verb.eq_ignore_ascii_case("down") {
                    Self::ButtonDown {
                        button,
                        position,
                        modifiers,
                        source,
                    }
                } else {
                    Self::ButtonUp {
                        button,
                        position,
                        modifiers,
                        source,
                    }
                })
            }
            "scroll" => {
                let delta = number(tokens.next(), "scroll delta")?;
                let Tail {
                    position,
                    source,
                    modifiers,
                } = parse_tail(tokens)?;
                Ok(Self::Scroll {
                    delta,
                    position,
                    modifiers,
                    source,
                })
            }
            "key" | "release" => {
                let key = KeyName::normalized(
                    tokens
                        .next()
                        .ok_or(ParseRawEventError::MissingArgument("key name"))?,
                );
                let Tail {
                    source, modifiers, ..
                } = parse_tail(tokens)?;
                Ok(if verb.eq_ignore_ascii_case("key") {
                    Self::KeyDown {
                        key,
                        modifiers,
                        source,
                    }
                } else {
                    Self::KeyUp {
                        key,
                        modifiers,
                        source,
                    }
                })
            }
            _ => Err(ParseRawEventError::UnknownEvent(verb.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    MouseDown {
        button: MouseButton,
        position: Point,
        modifiers: Modifiers,
    },
    Click {
        button: MouseButton,
        position: Point,
        modifiers: Modifiers,
    },
    DragStarted {
        button: MouseButton,
        origin: Point,
        position: Point,
        modifiers: Modifiers,
    },
    Scroll {
        delta: f64,
        position: Point,
        modifiers: Modifiers,
    },
    Moved {
        position: Point,
        modifiers: Modifiers,
    },
    TriggerPressed {
        config_id: ConfigId,
    },
    TriggerReleased {
        config_id: ConfigId,
    },
    Key {
        key: KeyName,
        modifiers: Modifiers,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Swallow the event so it never reaches another application.
    Consume,
    PassThrough,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub events: Vec<GestureEvent>,
    pub disposition: Disposition,
}

impl Classified {
    fn pass(events: Vec<GestureEvent>) -> Self {
        Self {
            events,
            disposition: Disposition::PassThrough,
        }
    }

    fn consume(events: Vec<GestureEvent>) -> Self {
        Self {
            events,
            disposition: Disposition::Consume,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, DeserializeFromStr)]
pub enum TriggerInput {
    Button(MouseButton),
    Key(KeyName),
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid trigger '{0}', expected 'button:NAME' or 'key:NAME'")]
pub struct ParseTriggerError(String);

impl FromStr for TriggerInput {
    type Err = ParseTriggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTriggerError(s.to_string());
        let (kind, name) = s.trim().split_once(':').ok_or_else(err)?;
        match kind.to_ascii_lowercase().as_str() {
            "button" | "mouse" => name.parse().map(Self::Button).map_err(|_| err()),
            "key" if !name.is_empty() => Ok(Self::Key(KeyName::normalized(name))),
            _ => Err(err()),
        }
    }
}

/// A shortcut that shows a ring configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub config_id: ConfigId,
    pub input: TriggerInput,
    pub modifiers: Modifiers,
}

impl Trigger {
    fn matches_press(&self, input: &TriggerInput, modifiers: Modifiers) -> bool {
        &self.input == input && self.modifiers == modifiers
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Pointer travel, with a button held, that turns a press into a drag.
    pub drag_threshold: f64,
    pub dedupe_window_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 6.0,
            dedupe_window_ms: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Fingerprint {
    Down(MouseButton),
    Up(MouseButton),
    Scroll(u64),
    KeyDown(KeyName),
    KeyUp(KeyName),
}

#[derive(Debug)]
struct Recent {
    fingerprint: Fingerprint,
    source: Source,
    at: Instant,
    disposition: Disposition,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    button: MouseButton,
    origin: Point,
    modifiers: Modifiers,
    dragging: bool,
}

#[derive(Debug, Default)]
pub struct GestureClassifier {
    config: GestureConfig,
    triggers: Vec<Trigger>,
    last_position: Option<Point>,
    press: Option<Press>,
    held: Vec<(TriggerInput, ConfigId)>,
    recent: Option<Recent>,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig, triggers: Vec<Trigger>) -> Self {
        Self {
            config,
            triggers,
            ..Self::default()
        }
    }

    pub fn set_triggers(&mut self, triggers: Vec<Trigger>) {
        self.triggers = triggers;
        self.held.clear();
    }

    pub fn set_config(&mut self, config: GestureConfig) {
        self.config = config;
    }

    pub fn last_position(&self) -> Option<Point> {
        self.last_position
    }

    /// Drops any in-flight press, held trigger and de-duplication state.
    pub fn reset(&mut self) {
        self.last_position = None;
        self.press = None;
        self.held.clear();
        self.recent = None;
    }

    pub fn process(&mut self, raw: &RawEvent, now: Instant) -> Classified {
        let fingerprint = raw.fingerprint();
        let source = raw.source();
        let window = Duration::from_millis(self.config.dedupe_window_ms);

        if let (Some(fp), Some(recent)) = (&fingerprint, &self.recent)
            && recent.fingerprint == *fp
            && recent.source != source
            && now.saturating_duration_since(recent.at) <= window
        {
            log::trace!("dropping duplicate {fp:?} from {source}");
            return Classified {
                events: Vec::new(),
                disposition: recent.disposition,
            };
        }

        let classified = self.classify(raw);
        if let Some(fingerprint) = fingerprint {
            self.recent = Some(Recent {
                fingerprint,
                source,
                at: now,
                disposition: classified.disposition,
            });
        }
        classified
    }

    fn resolve_position(&mut self, position: Option<Point>) -> Point {
        let position = position.or(self.last_position).unwrap_or_default();
        self.last_position = Some(position);
        position
    }

    fn pressed_trigger(&self, input: &TriggerInput, modifiers: Modifiers) -> Option<ConfigId> {
        self.triggers
            .iter()
            .find(|t| t.matches_press(input, modifiers))
            .map(|t| t.config_id.clone())
    }

    fn press_trigger(&mut self, input: TriggerInput, modifiers: Modifiers) -> Option<Classified> {
        if self.held.iter().any(|(held, _)| *held == input) {
            // key repeat
            return Some(Classified::consume(Vec::new()));
        }
        let config_id = self.pressed_trigger(&input, modifiers)?;
        self.held.push((input, config_id.clone()));
        Some(Classified::consume(vec![GestureEvent::TriggerPressed {
            config_id,
        }]))
    }

    fn release_trigger(&mut self, input: &TriggerInput) -> Option<Classified> {
        let at = self.held.iter().position(|(held, _)| held == input)?;
        let (_, config_id) = self.held.remove(at);
        Some(Classified::consume(vec![GestureEvent::TriggerReleased {
            config_id,
        }]))
    }

    fn classify(&mut self, raw: &RawEvent) -> Classified {
        match raw {
            RawEvent::Moved {
                position,
                modifiers,
            } => {
                self.last_position = Some(*position);
                let mut events = Vec::new();
                if let Some(press) = self.press.as_mut()
                    && !press.dragging
                    && position.distance_to(press.origin) > self.config.drag_threshold
                {
                    press.dragging = true;
                    events.push(GestureEvent::DragStarted {
                        button: press.button,
                        origin: press.origin,
                        position: *position,
                        modifiers: press.modifiers,
                    });
                }
                events.push(GestureEvent::Moved {
                    position: *position,
                    modifiers: *modifiers,
                });
                Classified::pass(events)
            }
            RawEvent::ButtonDown {
                button,
                position,
                modifiers,
                ..
            } => {
                let position = self.resolve_position(*position);
                if let Some(consumed) = self.press_trigger(TriggerInput::Button(*button), *modifiers)
                {
                    return consumed;
                }
                self.press = Some(Press {
                    button: *button,
                    origin: position,
                    modifiers: *modifiers,
                    dragging: false,
                });
                Classified::pass(vec![GestureEvent::MouseDown {
                    button: *button,
                    position,
                    modifiers: *modifiers,
                }])
            }
            RawEvent::ButtonUp {
                button,
                position,
                modifiers,
                ..
            } => {
                let position = self.resolve_position(*position);
                if let Some(consumed) = self.release_trigger(&TriggerInput::Button(*button)) {
                    return consumed;
                }
                match self.press.take() {
                    Some(press) if press.button == *button && press.dragging => {
                        Classified::pass(Vec::new())
                    }
                    Some(press) if press.button == *button => {
                        Classified::pass(vec![GestureEvent::Click {
                            button: *button,
                            position,
                            modifiers: *modifiers,
                        }])
                    }
                    other => {
                        self.press = other;
                        Classified::pass(Vec::new())
                    }
                }
            }
            RawEvent::Scroll {
                delta,
                position,
                modifiers,
                ..
            } => {
                let position = self.resolve_position(*position);
                Classified::pass(vec![GestureEvent::Scroll {
                    delta: *delta,
                    position,
                    modifiers: *modifiers,
                }])
            }
            RawEvent::KeyDown { key, modifiers, .. } => {
                if let Some(consumed) = self.press_trigger(TriggerInput::Key(key.clone()), *modifiers)
                {
                    return consumed;
                }
                Classified::pass(vec![GestureEvent::Key {
                    key: key.clone(),
                    modifiers: *modifiers,
                }])
            }
            RawEvent::KeyUp { key, .. } => self
                .release_trigger(&TriggerInput::Key(key.clone()))
                .unwrap_or_else(|| Classified::pass(Vec::new())),
        }
    }
}
