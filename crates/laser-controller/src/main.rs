//! Laser controller entry point.
//!
//! Wires the serial link, the MQTT publisher, a frame source, and the
//! operator console into a [`ControlLoop`], then runs
//! `Calibrating → Running → ShuttingDown` until Ctrl-C, the operator aborts,
//! or the frame source ends.
//!
//! # Usage
//!
//! ```text
//! laser-controller [OPTIONS]
//!
//! Options:
//!   --config <PATH>        TOML config file [default: platform config dir]
//!   --serial-port <PORT>   Actuator serial device
//!   --mqtt-broker <HOST>   MQTT broker host
//!   --mqtt-port <PORT>     MQTT broker port
//!   --mqtt-topic <TOPIC>   Topic for movement events
//!   --replay <PATH>        JSON-lines frame recording to play back
//!   --offset-x/--offset-y  Skip interactive calibration with this offset
//!   --seed <N>             Seed the target sampler for a repeatable run
//!   --save-calibration     Write the confirmed offset back to the config file
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable      | Overrides         |
//! |---------------|-------------------|
//! | `SERIAL_PORT` | `[serial] port`   |
//! | `MQTT_BROKER` | `[mqtt] broker`   |
//! | `MQTT_PORT`   | `[mqtt] port`     |
//! | `MQTT_TOPIC`  | `[mqtt] topic`    |
//!
//! CLI arguments take precedence over environment variables, which take
//! precedence over the config file.
//!
//! # Threads
//!
//! ```text
//! main (Tokio)
//!  ├─ MQTT event loop task   -- owns the broker connection
//!  ├─ Ctrl-C task            -- clears the shared `running` flag
//!  └─ spawn_blocking         -- calibration + control loop + shutdown
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use laser_controller::application::calibrate::{run_calibration, CalibrationOutcome};
use laser_controller::application::control_loop::{ControlLoop, EventPublisher};
use laser_controller::infrastructure::console::ConsoleInput;
use laser_controller::infrastructure::mqtt::{spawn_event_loop, MqttEventPublisher};
use laser_controller::infrastructure::serial::{SerialLinkManager, SerialPortOpener};
use laser_controller::infrastructure::storage::config::{
    config_file_path, load_config, save_calibration, AppConfig,
};
use laser_controller::infrastructure::vision::{
    IdleVisionSource, ReplayVisionSource, VisionSource,
};
use laser_core::{CalibrationOffset, RandomSampler};

/// How long queued movement events may take to reach the broker at exit.
const MQTT_FLUSH_GRACE: Duration = Duration::from_secs(2);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Aims a pan/tilt laser at random spots away from moving people and pets.
#[derive(Debug, Parser)]
#[command(name = "laser-controller", version)]
struct Cli {
    /// TOML configuration file.  Defaults to the platform config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial device of the actuator board, e.g. `COM12` or `/dev/ttyUSB0`.
    #[arg(long, env = "SERIAL_PORT")]
    serial_port: Option<String>,

    /// MQTT broker hostname or IP address.
    #[arg(long, env = "MQTT_BROKER")]
    mqtt_broker: Option<String>,

    /// MQTT broker TCP port.
    #[arg(long, env = "MQTT_PORT")]
    mqtt_port: Option<u16>,

    /// Topic movement events are published on.
    #[arg(long, env = "MQTT_TOPIC")]
    mqtt_topic: Option<String>,

    /// Play back recorded frames instead of idling.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Horizontal calibration offset in pixels.  Needs `--offset-y` too.
    #[arg(long, allow_hyphen_values = true, requires = "offset_y")]
    offset_x: Option<i32>,

    /// Vertical calibration offset in pixels.  Needs `--offset-x` too.
    #[arg(long, allow_hyphen_values = true, requires = "offset_x")]
    offset_y: Option<i32>,

    /// Seed for the target sampler.  Random when absent.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the confirmed calibration offset back to the config file.
    #[arg(long)]
    save_calibration: bool,
}

impl Cli {
    /// Layers CLI and environment overrides on top of the loaded file.
    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = &self.serial_port {
            config.serial.port = port.clone();
        }
        if let Some(broker) = &self.mqtt_broker {
            config.mqtt.broker = broker.clone();
        }
        if let Some(port) = self.mqtt_port {
            config.mqtt.port = port;
        }
        if let Some(topic) = &self.mqtt_topic {
            config.mqtt.topic = topic.clone();
        }
        if let Some(replay) = &self.replay {
            config.vision.replay = Some(replay.clone());
        }
        if let (Some(x), Some(y)) = (self.offset_x, self.offset_y) {
            config.calibration.offset_x = Some(x);
            config.calibration.offset_y = Some(y);
        }
    }

    /// Where `--save-calibration` writes.
    fn calibration_target(&self) -> anyhow::Result<Option<PathBuf>> {
        if !self.save_calibration {
            return Ok(None);
        }
        match &self.config {
            Some(path) => Ok(Some(path.clone())),
            None => Ok(Some(config_file_path()?)),
        }
    }
}

// ── Control session ───────────────────────────────────────────────────────────

/// Runs calibration, the control loop, and shutdown on the current thread.
fn run_session(
    config: AppConfig,
    publisher: Arc<dyn EventPublisher>,
    running: Arc<AtomicBool>,
    seed: Option<u64>,
    save_to: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut vision: Box<dyn VisionSource> = match &config.vision.replay {
        Some(path) => Box::new(
            ReplayVisionSource::open(
                path,
                config.vision.frame_width,
                config.vision.frame_height,
                config.vision.frame_period(),
            )
            .context("failed to open replay")?,
        ),
        None => Box::new(IdleVisionSource::new(
            config.vision.frame_width,
            config.vision.frame_height,
            config.vision.frame_period(),
        )),
    };

    let opener = SerialPortOpener::new(
        config.serial.port.clone(),
        config.serial.baud,
        config.serial.timeout(),
    );
    let mut link = SerialLinkManager::new(Box::new(opener), config.serial.settle());
    if link.connect().is_err() {
        warn!(
            "starting without the actuator on {}; commands fail until it appears",
            config.serial.port
        );
    }
    link.wait_until_ready();

    let sampler = match seed {
        Some(seed) => RandomSampler::seeded(seed),
        None => RandomSampler::from_entropy(),
    };
    let mut control = ControlLoop::new(
        Box::new(link),
        publisher,
        sampler,
        config.control_settings(),
        Instant::now(),
    );

    let outcome = match config.calibration.preset() {
        Some(offset) => {
            info!(offset_x = offset.x, offset_y = offset.y, "using saved calibration");
            control.preset_offset(offset)?;
            control.confirm_calibration()?;
            CalibrationOutcome::Confirmed(offset)
        }
        None => {
            let mut console =
                ConsoleInput::stdin(Arc::clone(&running)).context("failed to start console input")?;
            run_calibration(&mut control, &mut console, &running)?
        }
    };

    if let CalibrationOutcome::Confirmed(offset) = outcome {
        if let Some(path) = save_to {
            persist_offset(&path, offset);
        }
        info!("running; press Ctrl-C to stop");
        let ticks = control.run_until_stopped(|| vision.next_frame(), &running)?;
        info!(ticks, "control loop finished");
    }

    control.shutdown();
    Ok(())
}

fn persist_offset(path: &std::path::Path, offset: CalibrationOffset) {
    match save_calibration(path, offset) {
        Ok(()) => info!("calibration saved to {}", path.display()),
        Err(e) => warn!("could not save calibration: {e}"),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.controller.log_level)),
        )
        .init();

    info!(
        "laser controller starting: serial={}, mqtt={}:{}/{}",
        config.serial.port, config.mqtt.broker, config.mqtt.port, config.mqtt.topic
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                running_clone.store(false, Ordering::SeqCst);
            }
            Err(e) => error!("failed to listen for Ctrl-C: {e}"),
        }
    });

    let (publisher, connection) = MqttEventPublisher::new(&config.mqtt);
    let mqtt_task = spawn_event_loop(connection);

    let save_to = cli.calibration_target()?;
    let session = tokio::task::spawn_blocking({
        let running = Arc::clone(&running);
        let publisher: Arc<dyn EventPublisher> = Arc::new(publisher.clone());
        move || run_session(config, publisher, running, cli.seed, save_to)
    });
    let result = session.await.context("control session panicked")?;

    publisher.close(mqtt_task, MQTT_FLUSH_GRACE).await;
    match &result {
        Ok(()) => info!("laser controller stopped"),
        Err(e) => error!("laser controller stopped with error: {e:#}"),
    }
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_without_arguments_keeps_file_values() {
        // Arrange
        let cli = Cli::parse_from(["laser-controller", "--serial-port", "/dev/ttyACM0"]);
        let mut config = AppConfig::default();
        config.mqtt.topic = "from/file".to_string();

        // Act
        cli.apply(&mut config);

        // Assert
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.mqtt.topic, "from/file");
    }

    #[test]
    fn test_cli_overrides_mqtt_settings() {
        let cli = Cli::parse_from([
            "laser-controller",
            "--mqtt-broker",
            "10.0.0.5",
            "--mqtt-port",
            "8883",
            "--mqtt-topic",
            "rig/laser",
        ]);
        let mut config = AppConfig::default();

        cli.apply(&mut config);

        assert_eq!(config.mqtt.broker, "10.0.0.5");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.topic, "rig/laser");
    }

    #[test]
    fn test_negative_offsets_are_accepted() {
        let cli = Cli::parse_from(["laser-controller", "--offset-x", "-4", "--offset-y", "7"]);
        let mut config = AppConfig::default();

        cli.apply(&mut config);

        assert_eq!(
            config.calibration.preset(),
            Some(CalibrationOffset::new(-4, 7))
        );
    }

    #[test]
    fn test_single_offset_is_rejected() {
        let result = Cli::try_parse_from(["laser-controller", "--offset-x", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_calibration_target_prefers_explicit_config() {
        let cli = Cli::parse_from([
            "laser-controller",
            "--config",
            "/tmp/rig.toml",
            "--save-calibration",
        ]);

        assert_eq!(
            cli.calibration_target().unwrap(),
            Some(PathBuf::from("/tmp/rig.toml"))
        );
    }
}
