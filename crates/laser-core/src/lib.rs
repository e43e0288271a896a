//! # laser-core
//!
//! Shared library for the laser-play controller containing the pure decision
//! logic (which regions to avoid, where to aim next, how fast to get there) and
//! the wire formats spoken to the actuator and to the event stream.
//!
//! It has zero dependencies on serial ports, sockets, cameras, or clocks beyond
//! the `Instant` values callers hand in.
//!
//! # Architecture overview (for beginners)
//!
//! The controller points a pan/tilt laser at random spots while keeping the dot
//! away from any person or cat that is currently moving in front of the camera.
//! Once per camera frame it:
//!
//! 1. turns detector output plus a motion mask into a set of *avoid zones*,
//! 2. draws a random aim point that lands outside every zone,
//! 3. nudges the actuator a fraction of the way toward that point,
//! 4. reports the move to subscribers.
//!
//! This crate owns steps 1–3 and the message formats for step 4:
//!
//! - **`domain`** – Geometry (actuator space vs. screen space), detections,
//!   the zone filter, the target selector, and the motion smoother.
//!
//! - **`protocol`** – The ASCII serial commands (`POSICAO:x:y`), the inbound
//!   distance telemetry line, the JSON movement event, and the sequence counter
//!   that numbers those events.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `laser_core::AvoidZone` instead of `laser_core::domain::geometry::AvoidZone`.
pub use domain::detection::{BoundingBox, Detection, MotionMask};
pub use domain::geometry::{
    ActuatorPosition, AvoidZone, CalibrationOffset, FrameSize, NudgeDirection, ScreenPoint,
    Target, ZoneError,
};
pub use domain::smoothing::{CommandGate, MotionSmoother};
pub use domain::target_selector::{CandidateSampler, RandomSampler, Selection, TargetSelector};
pub use domain::zone_filter::{ZoneFilter, ZoneFilterConfig};
pub use protocol::command::ActuatorCommand;
pub use protocol::event::MovementEvent;
pub use protocol::sequence::MovementSequence;
pub use protocol::telemetry::{parse_telemetry_line, TelemetryError};
