//! ASCII commands sent to the actuator over the serial link.
//!
//! Every command is a single line:
//!
//! ```text
//! POSICAO:<x>:<y>     absolute move, x/y in degrees
//! SUBIR | DESCER      calibration nudge up / down
//! ESQUERDA | DIREITA  calibration nudge left / right
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::domain::geometry::{ActuatorPosition, NudgeDirection};

/// Appended to every command before it is written.
pub const LINE_TERMINATOR: &str = "\n";

const MOVE_PREFIX: &str = "POSICAO";

/// A command the actuator firmware understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    /// Move both servos to an absolute position.
    MoveTo(ActuatorPosition),
    /// Step one unit in a direction (calibration only).
    Nudge(NudgeDirection),
}

impl ActuatorCommand {
    /// The command text followed by [`LINE_TERMINATOR`].
    pub fn to_line(&self) -> String {
        format!("{self}{LINE_TERMINATOR}")
    }
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorCommand::MoveTo(p) => write!(f, "{MOVE_PREFIX}:{}:{}", p.x(), p.y()),
            ActuatorCommand::Nudge(d) => f.write_str(nudge_token(*d)),
        }
    }
}

fn nudge_token(direction: NudgeDirection) -> &'static str {
    match direction {
        NudgeDirection::Up => "SUBIR",
        NudgeDirection::Down => "DESCER",
        NudgeDirection::Left => "ESQUERDA",
        NudgeDirection::Right => "DIREITA",
    }
}

/// Error returned when a line is not a known actuator command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unknown command: {0:?}")]
    Unknown(String),
    #[error("position out of range or not numeric: {0:?}")]
    BadPosition(String),
}

impl FromStr for ActuatorCommand {
    type Err = CommandParseError;

    /// Parses a command line (terminator optional).  Used by test doubles that
    /// need to interpret what the controller wrote.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        match line {
            "SUBIR" => return Ok(Self::Nudge(NudgeDirection::Up)),
            "DESCER" => return Ok(Self::Nudge(NudgeDirection::Down)),
            "ESQUERDA" => return Ok(Self::Nudge(NudgeDirection::Left)),
            "DIREITA" => return Ok(Self::Nudge(NudgeDirection::Right)),
            _ => {}
        }

        let mut parts = line.split(':');
        if parts.next() != Some(MOVE_PREFIX) {
            return Err(CommandParseError::Unknown(line.to_string()));
        }
        let bad = || CommandParseError::BadPosition(line.to_string());
        let x: i32 = parts.next().and_then(|v| v.parse().ok()).ok_or_else(bad)?;
        let y: i32 = parts.next().and_then(|v| v.parse().ok()).ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        ActuatorPosition::new(x, y)
            .map(Self::MoveTo)
            .ok_or_else(bad)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
