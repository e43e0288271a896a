//! Interactive calibration: the operator nudges the laser dot until it sits
//! where the display cursor says it should, then confirms.

use std::sync::atomic::{AtomicBool, Ordering};

use laser_core::{CalibrationOffset, CandidateSampler, NudgeDirection};
use tracing::info;

use super::control_loop::{ControlError, ControlLoop};

/// One operator action during calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationCommand {
    Nudge(NudgeDirection),
    Confirm,
    Abort,
}

/// Source of operator actions.  `None` means the input is closed.
///
/// Implementations may block; [`run_calibration`] re-checks the stop flag
/// after every call, so a command that arrives after a stop request is dropped.
pub trait CalibrationInput {
    fn next_command(&mut self) -> Option<CalibrationCommand>;
}

/// How a calibration session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOutcome {
    /// The loop is now `Running` with this offset.
    Confirmed(CalibrationOffset),
    /// The operator gave up or the process is stopping; the loop is still
    /// `Calibrating` and should be shut down.
    Aborted,
}

/// Applies operator commands to `control` until the offset is confirmed.
///
/// A closed input confirms the offset reached so far, so the controller can
/// run unattended with a preset offset and no terminal.
pub fn run_calibration<S: CandidateSampler>(
    control: &mut ControlLoop<S>,
    input: &mut dyn CalibrationInput,
    running: &AtomicBool,
) -> Result<CalibrationOutcome, ControlError> {
    info!("calibrating: w/s = up/down, a/d = right/left, Enter = confirm, q = abort");

    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(CalibrationOutcome::Aborted);
        }
        let command = input.next_command();
        if !running.load(Ordering::SeqCst) {
            info!("calibration interrupted by stop signal");
            return Ok(CalibrationOutcome::Aborted);
        }
        match command {
            Some(CalibrationCommand::Nudge(direction)) => {
                control.nudge(direction)?;
            }
            Some(CalibrationCommand::Abort) => {
                info!("calibration aborted by operator");
                return Ok(CalibrationOutcome::Aborted);
            }
            Some(CalibrationCommand::Confirm) => break,
            None => {
                info!("calibration input closed; keeping current offset");
                break;
            }
        }
    }

    control.confirm_calibration()?;
    Ok(CalibrationOutcome::Confirmed(control.offset()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
