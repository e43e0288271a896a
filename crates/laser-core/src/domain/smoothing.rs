//! Motion smoothing and the command-rate gate.
//!
//! Two exponential filters run side by side:
//!
//! - the **actuator** filter (coarse, α ≈ 0.2) produces the next servo command,
//!   but only when the [`CommandGate`] is open, so a fast frame source never
//!   floods the serial link;
//! - the **display** filter (fine, α ≈ 0.05) moves the on-screen indicator
//!   every frame, so a slow command rate never freezes visual feedback.

use std::time::{Duration, Instant};

use super::geometry::{ActuatorPosition, FrameSize, ScreenPoint};

/// Default minimum interval between actuator commands.
pub const DEFAULT_SERVO_DELAY: Duration = Duration::from_millis(50);
/// Default actuator smoothing factor.
pub const DEFAULT_ACTUATOR_ALPHA: f32 = 0.2;
/// Default display smoothing factor.
pub const DEFAULT_DISPLAY_ALPHA: f32 = 0.05;

/// One exponential smoothing step: `last + α·(target − last)`, truncated
/// toward zero.
pub fn smooth_step(last: i32, target: i32, alpha: f32) -> i32 {
    let next = f64::from(last) + f64::from(alpha) * f64::from(target - last);
    next as i32
}

/// Minimum wall-clock interval between actuator commands.
///
/// The gate re-arms every time it opens, whatever the caller then does with
/// the opportunity.
#[derive(Debug, Clone)]
pub struct CommandGate {
    interval: Duration,
    last_opened: Instant,
}

impl CommandGate {
    /// Creates a gate that first opens `interval` after `now`.
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_opened: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` and re-arms if at least `interval` has passed since the
    /// gate last opened.
    pub fn try_open(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_opened) >= self.interval {
            self.last_opened = now;
            true
        } else {
            false
        }
    }
}

/// Actuator and display smoothing with independent factors.
#[derive(Debug, Clone)]
pub struct MotionSmoother {
    actuator_alpha: f32,
    display_alpha: f32,
    gate: CommandGate,
    display: ScreenPoint,
}

impl MotionSmoother {
    /// Creates a smoother whose display cursor starts at the centre of the
    /// default frame.
    pub fn new(actuator_alpha: f32, display_alpha: f32, servo_delay: Duration, now: Instant) -> Self {
        Self {
            actuator_alpha,
            display_alpha,
            gate: CommandGate::new(servo_delay, now),
            display: FrameSize::default().center(),
        }
    }

    /// Moves the display cursor's starting point to the centre of `frame`.
    pub fn centred_in(mut self, frame: FrameSize) -> Self {
        self.display = frame.center();
        self
    }

    /// Smoother with the default factors and servo delay.
    pub fn with_defaults(now: Instant) -> Self {
        Self::new(
            DEFAULT_ACTUATOR_ALPHA,
            DEFAULT_DISPLAY_ALPHA,
            DEFAULT_SERVO_DELAY,
            now,
        )
    }

    /// Next actuator command toward `goal`, or `None` if the command-rate gate
    /// is still closed.
    ///
    /// `last` must be the last position that was *successfully* written, so a
    /// failed write is retried from the same starting point.
    pub fn advance_actuator(
        &mut self,
        last: ActuatorPosition,
        goal: ActuatorPosition,
        now: Instant,
    ) -> Option<ActuatorPosition> {
        if !self.gate.try_open(now) {
            return None;
        }
        Some(ActuatorPosition::clamped(
            smooth_step(last.x(), goal.x(), self.actuator_alpha),
            smooth_step(last.y(), goal.y(), self.actuator_alpha),
        ))
    }

    /// Moves the display cursor one step toward `goal`.  Never gated.
    pub fn advance_display(&mut self, goal: ScreenPoint) -> ScreenPoint {
        self.display = ScreenPoint::new(
            smooth_step(self.display.x, goal.x, self.display_alpha),
            smooth_step(self.display.y, goal.y, self.display_alpha),
        );
        self.display
    }

    /// Current display cursor.
    pub fn display(&self) -> ScreenPoint {
        self.display
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
