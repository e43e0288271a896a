//! TOML-based configuration for the controller.
//!
//! Reads and writes `AppConfig` from an explicit `--config` path or the
//! platform-appropriate config file:
//! - Windows:  `%APPDATA%\LaserPlay\config.toml`
//! - Linux:    `~/.config/laserplay/config.toml`
//! - macOS:    `~/Library/Application Support/LaserPlay/config.toml`
//!
//! # Example file
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyACM0"
//!
//! [mqtt]
//! broker = "192.168.1.20"
//! topic = "living-room/laser"
//!
//! [calibration]
//! offset_x = 4
//! offset_y = -7
//! ```
//!
//! Every section and every field is optional.  Fields annotated with
//! `#[serde(default = "some_fn")]` fall back to `some_fn()` when absent, so an
//! empty file (or no file at all) yields the same values as
//! [`AppConfig::default`].
//!
//! When both calibration offsets are present the interactive calibration is
//! skipped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use laser_core::{CalibrationOffset, FrameSize, ZoneFilterConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::control_loop::ControlSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is outside its usable range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub detection: ZoneFilterConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

/// General process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Actuator serial port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialConfig {
    /// Device name, e.g. `"COM12"` or `"/dev/ttyUSB0"`.
    #[serde(default = "default_serial_port")]
    pub port: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Read timeout on the open port.
    #[serde(default = "default_serial_timeout_ms")]
    pub timeout_ms: u64,
    /// How long the board ignores input after the port opens.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Movement event broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttConfig {
    #[serde(default = "default_broker")]
    pub broker: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Fixed client id.  A random one is generated per run when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

/// Control loop timing and smoothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlConfig {
    #[serde(default = "default_servo_delay_ms")]
    pub servo_delay_ms: u64,
    #[serde(default = "default_actuator_alpha")]
    pub actuator_alpha: f32,
    #[serde(default = "default_display_alpha")]
    pub display_alpha: f32,
    #[serde(default = "default_shutdown_settle_ms")]
    pub shutdown_settle_ms: u64,
    #[serde(default = "default_calibration_settle_ms")]
    pub calibration_settle_ms: u64,
}

/// Frame geometry and the optional replay file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisionConfig {
    #[serde(default = "default_frame_width")]
    pub frame_width: usize,
    #[serde(default = "default_frame_height")]
    pub frame_height: usize,
    /// Pacing of the idle and replay sources.
    #[serde(default = "default_frame_period_ms")]
    pub frame_period_ms: u64,
    /// JSON-lines file of recorded frames.  Idle source when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay: Option<PathBuf>,
}

/// Saved calibration offset in screen pixels.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CalibrationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_y: Option<i32>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_serial_port() -> String {
    if cfg!(target_os = "windows") {
        "COM12".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}
fn default_baud() -> u32 {
    115_200
}
fn default_serial_timeout_ms() -> u64 {
    1_000
}
fn default_settle_ms() -> u64 {
    2_000
}
fn default_broker() -> String {
    "test.mosquitto.org".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_topic() -> String {
    "laser/position".to_string()
}
fn default_keepalive_secs() -> u64 {
    60
}
fn default_servo_delay_ms() -> u64 {
    50
}
fn default_actuator_alpha() -> f32 {
    0.2
}
fn default_display_alpha() -> f32 {
    0.05
}
fn default_shutdown_settle_ms() -> u64 {
    500
}
fn default_calibration_settle_ms() -> u64 {
    1_000
}
fn default_frame_width() -> usize {
    1280
}
fn default_frame_height() -> usize {
    720
}
fn default_frame_period_ms() -> u64 {
    33
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud: default_baud(),
            timeout_ms: default_serial_timeout_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            port: default_mqtt_port(),
            topic: default_topic(),
            client_id: None,
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            servo_delay_ms: default_servo_delay_ms(),
            actuator_alpha: default_actuator_alpha(),
            display_alpha: default_display_alpha(),
            shutdown_settle_ms: default_shutdown_settle_ms(),
            calibration_settle_ms: default_calibration_settle_ms(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            frame_period_ms: default_frame_period_ms(),
            replay: None,
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Largest accepted frame side, in pixels.
const MAX_FRAME_SIDE: usize = 16_384;

impl VisionConfig {
    pub fn frame_period(&self) -> Duration {
        Duration::from_millis(self.frame_period_ms)
    }

    /// Frame size used for projection and the fallback target.
    ///
    /// Sides beyond [`MAX_FRAME_SIDE`] are rejected by [`AppConfig::validate`].
    pub fn frame_size(&self) -> FrameSize {
        let side = |v: usize| i32::try_from(v.min(MAX_FRAME_SIDE)).unwrap_or(i32::MAX);
        FrameSize::new(side(self.frame_width), side(self.frame_height))
    }
}

impl CalibrationConfig {
    /// The saved offset, if both axes are set.
    pub fn preset(&self) -> Option<CalibrationOffset> {
        Some(CalibrationOffset::new(self.offset_x?, self.offset_y?))
    }
}

impl AppConfig {
    /// Control loop settings from the `[control]`, `[detection]` and
    /// `[vision]` sections.
    pub fn control_settings(&self) -> ControlSettings {
        ControlSettings {
            servo_delay: Duration::from_millis(self.control.servo_delay_ms),
            actuator_alpha: self.control.actuator_alpha,
            display_alpha: self.control.display_alpha,
            zone_filter: self.detection.clone(),
            frame: self.vision.frame_size(),
            calibration_settle: Duration::from_millis(self.control.calibration_settle_ms),
            shutdown_settle: Duration::from_millis(self.control.shutdown_settle_ms),
        }
    }

    /// Rejects values that would parse but break the loop.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, v: f32| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be in (0, 1], got {v}")))
            }
        };
        unit("control.actuator_alpha", self.control.actuator_alpha)?;
        unit("control.display_alpha", self.control.display_alpha)?;

        if self.serial.baud == 0 {
            return Err(ConfigError::Invalid("serial.baud must be positive".into()));
        }
        let side_ok = |v: usize| (1..=MAX_FRAME_SIDE).contains(&v);
        if !side_ok(self.vision.frame_width) || !side_ok(self.vision.frame_height) {
            return Err(ConfigError::Invalid(format!(
                "vision frame size {}x{} must be between 1 and {MAX_FRAME_SIDE} pixels per side",
                self.vision.frame_width, self.vision.frame_height
            )));
        }
        if self.mqtt.topic.is_empty() || self.mqtt.topic.contains(['#', '+']) {
            return Err(ConfigError::Invalid(format!(
                "mqtt.topic {:?} is not a publishable topic",
                self.mqtt.topic
            )));
        }
        Ok(())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the platform config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads `AppConfig` from `path`, or from the platform file when `path` is
/// `None`.
///
/// A missing platform file yields `AppConfig::default()`.  An explicit path
/// must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match config_file_path() {
            Ok(p) => (p, false),
            Err(_) => return Ok(AppConfig::default()),
        },
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            Ok(AppConfig::default())
        }
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `offset` into the `[calibration]` section of the file at `path`,
/// keeping every other setting already in that file.
///
/// # Errors
///
/// Same as [`load_config`] and [`save_config`], except that a missing file is
/// created.
pub fn save_calibration(path: &Path, offset: CalibrationOffset) -> Result<(), ConfigError> {
    let mut config = match load_config(Some(path)) {
        Ok(config) => config,
        Err(ConfigError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            AppConfig::default()
        }
        Err(e) => return Err(e),
    };
    config.calibration = CalibrationConfig {
        offset_x: Some(offset.x),
        offset_y: Some(offset.y),
    };
    save_config(path, &config)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("LaserPlay"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("laserplay"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("LaserPlay")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
