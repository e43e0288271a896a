//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration from an explicit path
//! or the platform config directory, falls back to defaults when no file
//! exists yet, and writes the confirmed calibration offset back on request.

pub mod config;
