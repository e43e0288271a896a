//! Infrastructure layer for the controller.
//!
//! Contains the adapters that touch the outside world: the serial port to the
//! actuator board, the MQTT client, the frame sources, the operator console,
//! and the configuration file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `laser_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod console;
pub mod mqtt;
pub mod serial;
pub mod storage;
pub mod vision;
