//! ControlLoop: the per-frame decision and actuation sequence.
//!
//! The loop owns every piece of mutable controller state: the last position
//! that was successfully written, the calibration offset, the movement number,
//! and the smoothing state.  Everything it talks to is injected through the
//! [`ActuatorLink`] and [`EventPublisher`] traits.
//!
//! # States
//!
//! ```text
//! Calibrating ──confirm──▶ Running ──shutdown──▶ ShuttingDown
//!      │                                              ▲
//!      └──────────────────shutdown────────────────────┘
//! ```
//!
//! # One tick
//!
//! 1. Drain distance telemetry (informational only).
//! 2. Filter detections into avoid zones.
//! 3. Select a target outside every zone.
//! 4. If the servo gate is open, smooth toward the target and write it.
//!    Only a *successful* write advances the position and emits an event.
//! 5. Advance the display cursor (never gated).
//!
//! No step can fail the tick.  A dead serial link or a dead broker only means
//! fewer commands or fewer events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use laser_core::{
    domain::smoothing::{DEFAULT_ACTUATOR_ALPHA, DEFAULT_DISPLAY_ALPHA, DEFAULT_SERVO_DELAY},
    ActuatorCommand, ActuatorPosition, AvoidZone, CalibrationOffset, CandidateSampler, Detection,
    FrameSize, MotionMask, MotionSmoother, MovementEvent, MovementSequence, NudgeDirection, ScreenPoint,
    Selection, TargetSelector, ZoneFilter, ZoneFilterConfig,
};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Error type for the control loop.
///
/// Only returned for calls made in the wrong state; runtime faults (serial,
/// broker) are absorbed and never surface here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("{operation} is not allowed while {state:?}")]
    WrongState {
        operation: &'static str,
        state: LoopState,
    },
}

/// Outbound port to the pan/tilt actuator.
///
/// Infrastructure implementation owns a serial port and reconnects on its own;
/// test implementations script successes and failures.
#[cfg_attr(test, mockall::automock)]
pub trait ActuatorLink: Send {
    /// Sends one command.  Returns `true` only if the whole line was written.
    ///
    /// Never panics and never returns an error; any fault is handled inside
    /// the link and reported as `false`.
    fn write(&mut self, command: &ActuatorCommand) -> bool;

    /// Most recent distance reading received since the last call, if any.
    fn read_telemetry(&mut self) -> Option<f32>;

    /// Releases the underlying handle.
    fn close(&mut self);
}

/// Outbound port for movement events.
///
/// Fire-and-forget: ownership of the event passes to the transport and the
/// loop keeps no reference to it.  Failures are logged by the implementation.
#[cfg_attr(test, mockall::automock)]
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: MovementEvent);
}

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Operator is aligning the projection with nudge commands.
    Calibrating,
    /// Ticking once per frame.
    Running,
    /// Terminal.  The link has been centred (best effort) and closed.
    ShuttingDown,
}

/// One camera frame as seen by the loop: detector output plus motion mask.
#[derive(Debug, Clone)]
pub struct FrameObservation {
    pub detections: Vec<Detection>,
    pub motion: MotionMask,
}

impl FrameObservation {
    pub fn new(detections: Vec<Detection>, motion: MotionMask) -> Self {
        Self { detections, motion }
    }

    /// A frame with no detections and no motion.
    pub fn empty(width: usize, height: usize) -> Self {
        Self::new(Vec::new(), MotionMask::new(width, height))
    }
}

/// Tunables for [`ControlLoop`].
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSettings {
    /// Minimum interval between actuator commands.
    pub servo_delay: Duration,
    /// Fraction of the remaining distance covered per actuator command.
    pub actuator_alpha: f32,
    /// Fraction of the remaining distance covered per display update.
    pub display_alpha: f32,
    /// Zone filter thresholds.
    pub zone_filter: ZoneFilterConfig,
    /// Pixel size of the frames passed to [`ControlLoop::tick`].
    pub frame: FrameSize,
    /// Pause after the post-calibration centring command.
    pub calibration_settle: Duration,
    /// Pause between the shutdown centring command and closing the link.
    pub shutdown_settle: Duration,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            servo_delay: DEFAULT_SERVO_DELAY,
            actuator_alpha: DEFAULT_ACTUATOR_ALPHA,
            display_alpha: DEFAULT_DISPLAY_ALPHA,
            zone_filter: ZoneFilterConfig::default(),
            frame: FrameSize::default(),
            calibration_settle: Duration::from_secs(1),
            shutdown_settle: Duration::from_millis(500),
        }
    }
}

/// What happened to the actuator command of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandOutcome {
    /// Smoothed position that was sent.
    pub position: ActuatorPosition,
    /// Movement number of the published event; `None` if the write failed.
    pub sequence: Option<u64>,
}

impl CommandOutcome {
    pub fn written(&self) -> bool {
        self.sequence.is_some()
    }
}

/// Everything one tick decided, for logging, display, and tests.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Latest distance reading drained this tick.
    pub telemetry: Option<f32>,
    /// Avoid zones derived from this frame.
    pub zones: Vec<AvoidZone>,
    /// Target chosen this tick.
    pub selection: Selection,
    /// `None` when the servo gate was closed.
    pub command: Option<CommandOutcome>,
    /// Display cursor after this tick's update.
    pub display: ScreenPoint,
}

/// The controller state machine.
pub struct ControlLoop<S> {
    state: LoopState,
    link: Box<dyn ActuatorLink>,
    publisher: Arc<dyn EventPublisher>,
    zone_filter: ZoneFilter,
    selector: TargetSelector<S>,
    smoother: MotionSmoother,
    offset: CalibrationOffset,
    position: ActuatorPosition,
    sequence: MovementSequence,
    settings: ControlSettings,
}

impl<S: CandidateSampler> ControlLoop<S> {
    /// Creates a loop in the `Calibrating` state with a zero offset and the
    /// actuator assumed at centre.
    pub fn new(
        link: Box<dyn ActuatorLink>,
        publisher: Arc<dyn EventPublisher>,
        sampler: S,
        settings: ControlSettings,
        now: Instant,
    ) -> Self {
        let smoother = MotionSmoother::new(
            settings.actuator_alpha,
            settings.display_alpha,
            settings.servo_delay,
            now,
        )
        .centred_in(settings.frame);
        Self {
            state: LoopState::Calibrating,
            link,
            publisher,
            zone_filter: ZoneFilter::new(settings.zone_filter.clone()),
            selector: TargetSelector::new(sampler).with_frame(settings.frame),
            smoother,
            offset: CalibrationOffset::default(),
            position: ActuatorPosition::center(),
            sequence: MovementSequence::new(),
            settings,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Last position that was successfully written.
    pub fn position(&self) -> ActuatorPosition {
        self.position
    }

    pub fn offset(&self) -> CalibrationOffset {
        self.offset
    }

    /// Number of the last published movement event (0 before the first).
    pub fn last_sequence(&self) -> u64 {
        self.sequence.current()
    }

    fn require(&self, state: LoopState, operation: &'static str) -> Result<(), ControlError> {
        if self.state == state {
            Ok(())
        } else {
            Err(ControlError::WrongState {
                operation,
                state: self.state,
            })
        }
    }

    // ── Calibrating ───────────────────────────────────────────────────────────

    /// Shifts the calibration offset by one step and sends the matching nudge
    /// command.
    ///
    /// The offset moves even if the write fails: it describes where the
    /// operator *sees* the dot, not what the actuator acknowledged.
    pub fn nudge(&mut self, direction: NudgeDirection) -> Result<bool, ControlError> {
        self.require(LoopState::Calibrating, "nudge")?;
        self.offset = self.offset.nudged(direction);
        let written = self.link.write(&ActuatorCommand::Nudge(direction));
        debug!(?direction, offset_x = self.offset.x, offset_y = self.offset.y, written, "nudge");
        Ok(written)
    }

    /// Replaces the offset outright, e.g. from a saved configuration.
    pub fn preset_offset(&mut self, offset: CalibrationOffset) -> Result<(), ControlError> {
        self.require(LoopState::Calibrating, "preset_offset")?;
        self.offset = offset;
        Ok(())
    }

    /// Freezes the offset, centres the actuator, and enters `Running`.
    ///
    /// The centring command is not a movement and publishes no event.
    /// Returns whether the centring write succeeded.
    pub fn confirm_calibration(&mut self) -> Result<bool, ControlError> {
        self.require(LoopState::Calibrating, "confirm_calibration")?;
        let centred = self
            .link
            .write(&ActuatorCommand::MoveTo(ActuatorPosition::center()));
        if !centred {
            warn!("centring after calibration failed; continuing");
        }
        info!(offset_x = self.offset.x, offset_y = self.offset.y, "calibration confirmed");
        std::thread::sleep(self.settings.calibration_settle);
        self.state = LoopState::Running;
        Ok(centred)
    }

    // ── Running ───────────────────────────────────────────────────────────────

    /// Runs one iteration against `frame`.
    pub fn tick(&mut self, frame: &FrameObservation, now: Instant) -> Result<TickReport, ControlError> {
        self.require(LoopState::Running, "tick")?;

        let telemetry = self.link.read_telemetry();
        if let Some(distance) = telemetry {
            debug!(distance, "telemetry");
        }

        let zones = self.zone_filter.filter(&frame.detections, &frame.motion);
        let selection = self.selector.select(&zones, self.offset, self.position);

        let command = self
            .smoother
            .advance_actuator(self.position, selection.target.actuator, now)
            .map(|next| self.send_move(next));

        let cursor = self.smoother.advance_display(selection.target.screen);
        trace!(x = cursor.x, y = cursor.y, "display cursor");

        Ok(TickReport {
            telemetry,
            zones,
            selection,
            command,
            display: cursor,
        })
    }

    /// Writes one move; on success advances the position and publishes.
    fn send_move(&mut self, next: ActuatorPosition) -> CommandOutcome {
        if !self.link.write(&ActuatorCommand::MoveTo(next)) {
            debug!(position = %next, "move not written; position unchanged");
            return CommandOutcome {
                position: next,
                sequence: None,
            };
        }

        self.position = next;
        let sequence = self.sequence.next();
        self.publisher.publish(MovementEvent::now(sequence, next));
        CommandOutcome {
            position: next,
            sequence: Some(sequence),
        }
    }

    /// Ticks on frames from `next_frame` until it returns `None` or `running`
    /// is cleared.  Returns the number of ticks run.
    pub fn run_until_stopped<F>(&mut self, mut next_frame: F, running: &AtomicBool) -> Result<u64, ControlError>
    where
        F: FnMut() -> Option<FrameObservation>,
    {
        let mut ticks = 0u64;
        while running.load(Ordering::SeqCst) {
            let Some(frame) = next_frame() else {
                info!("frame source exhausted");
                break;
            };
            self.tick(&frame, Instant::now())?;
            ticks += 1;
        }
        Ok(ticks)
    }

    // ── ShuttingDown ──────────────────────────────────────────────────────────

    /// Centres the actuator (best effort), waits for it to settle, and closes
    /// the link.  Allowed from any state; a second call is a no-op.
    pub fn shutdown(&mut self) {
        if self.state == LoopState::ShuttingDown {
            return;
        }
        self.state = LoopState::ShuttingDown;

        if self
            .link
            .write(&ActuatorCommand::MoveTo(ActuatorPosition::center()))
        {
            info!("actuator centred for shutdown");
        } else {
            warn!("could not centre actuator on shutdown");
        }
        std::thread::sleep(self.settings.shutdown_settle);
        self.link.close();
        info!(movements = self.sequence.current(), "control loop stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
