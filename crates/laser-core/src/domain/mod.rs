//! Domain entities for the laser-play controller.
//!
//! This module contains pure decision logic with no infrastructure dependencies.
//!
//! # Two coordinate spaces (for beginners)
//!
//! The actuator thinks in *servo degrees*: pan `x` from 0 to 180 and tilt `y`
//! from 60 to 180.  The camera thinks in *pixels*: a 1280×720 frame.  A fixed
//! linear mapping plus a per-session calibration offset converts the first into
//! the second.  Detections and avoid zones live in pixel space; commands live in
//! servo space.  Keeping the two as distinct types ([`geometry::ActuatorPosition`]
//! vs. [`geometry::ScreenPoint`]) makes it a compile-time error to compare one
//! against the other by mistake.

/// Bounds, positions, avoid zones, and the actuator→screen projection.
pub mod geometry;

/// Raw detector output and the per-pixel motion mask.
pub mod detection;

/// Dual-signal gate that turns detections into avoid zones.
pub mod zone_filter;

/// Bounded random search for an aim point outside every avoid zone.
pub mod target_selector;

/// Exponential smoothing and the command-rate gate.
pub mod smoothing;
