//! Line protocol spoken over the daemon's control socket.
//!
//! Lifecycle requests are understood by both sides; `input` lines carry raw
//! pointer/keyboard events whose grammar belongs to the daemon.

use std::fmt;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::str::FromStr;
use thiserror::Error;

pub const SOCKET_PATH: &str = "/tmp/orbit.sock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Show the menu, optionally expanding one provider's category right away.
    Show { expand: Option<String> },
    /// Show another ring configuration.
    ShowConfig(String),
    Hide,
    Execute,
    /// Outcome of an OS drag session started by the menu.
    DragFinished { success: bool },
    /// A raw input event line, e.g. `move 120 40` or `down left local ctrl`.
    Input(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseRequestError {
    #[error("empty request")]
    Empty,
    #[error("unknown request '{0}'")]
    Unknown(String),
    #[error("'{0}' expects an argument")]
    MissingArgument(&'static str),
}

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("failed to connect to the orbit daemon: {0}. Is orbit running?")]
    Connect(#[source] std::io::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Show { expand: None } => write!(f, "show"),
            Self::Show {
                expand: Some(provider),
            } => write!(f, "show {provider}"),
            Self::ShowConfig(id) => write!(f, "ring {id}"),
            Self::Hide => write!(f, "hide"),
            Self::Execute => write!(f, "execute"),
            Self::DragFinished { success: true } => write!(f, "drop ok"),
            Self::DragFinished { success: false } => write!(f, "drop cancel"),
            Self::Input(line) => write!(f, "input {line}"),
        }
    }
}

impl FromStr for Request {
    type Err = ParseRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map(|(h, r)| (h, r.trim()))
            .unwrap_or((line, ""));
        let arg = (!rest.is_empty()).then(|| rest.to_string());

        match head {
            "" => Err(ParseRequestError::Empty),
            "show" => Ok(Self::Show { expand: arg }),
            "ring" => arg
                .map(Self::ShowConfig)
                .ok_or(ParseRequestError::MissingArgument("ring")),
            "hide" => Ok(Self::Hide),
            "execute" => Ok(Self::Execute),
            "drop" => Ok(Self::DragFinished {
                success: matches!(rest, "ok" | "success" | "1"),
            }),
            "input" => arg
                .map(Self::Input)
                .ok_or(ParseRequestError::MissingArgument("input")),
            other => Err(ParseRequestError::Unknown(other.to_string())),
        }
    }
}

pub fn send(request: &Request) -> Result<(), IpcError> {
    let mut stream = UnixStream::connect(SOCKET_PATH).map_err(IpcError::Connect)?;
    writeln!(stream, "{request}")?;
    Ok(())
}
