//! Wire formats: serial commands and telemetry, the JSON movement event, and
//! the sequence counter that numbers movement events.

pub mod command;
pub mod event;
pub mod sequence;
pub mod telemetry;

pub use command::{ActuatorCommand, LINE_TERMINATOR};
pub use event::MovementEvent;
pub use sequence::MovementSequence;
pub use telemetry::{parse_telemetry_line, TelemetryError};
