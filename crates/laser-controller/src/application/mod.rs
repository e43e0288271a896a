//! Application layer use cases for the controller.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure decision rules in `laser-core`) and the infrastructure (serial port,
//! MQTT client, camera replay, stdin).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects once per frame: filter zones, pick a
//!   target, smooth, write, publish.
//! - **Depend on abstractions** (the [`control_loop::ActuatorLink`] and
//!   [`control_loop::EventPublisher`] traits) so tests can swap in fakes that
//!   fail on demand.
//! - **Own all mutable state** (last position, movement number, calibration
//!   offset) so no component reads hidden globals.
//!
//! # Sub-modules
//!
//! - **`control_loop`** – The `Calibrating → Running → ShuttingDown` state
//!   machine and the per-tick sequence.  This runs on every camera frame.
//!
//! - **`calibrate`** – Drives the `Calibrating` state from operator input
//!   until the offset is confirmed or the operator aborts.

pub mod calibrate;
pub mod control_loop;
