//! Operator console for calibration.
//!
//! Reads line-buffered keys from a terminal (or any [`BufRead`]).  Each
//! character on a line is one key, so `www` followed by Enter nudges up three
//! times; an empty line confirms.
//!
//! | key   | command          | wire     | offset  |
//! |-------|------------------|----------|---------|
//! | `w`   | nudge up         | SUBIR    | y − 1   |
//! | `s`   | nudge down       | DESCER   | y + 1   |
//! | `a`   | nudge right      | DIREITA  | x + 1   |
//! | `d`   | nudge left       | ESQUERDA | x − 1   |
//! | Enter | confirm          |          |         |
//! | `q`   | abort / shutdown |          |         |
//!
//! `a` and `d` look swapped because the operator faces the laser, which is
//! mirrored relative to the camera image.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use laser_core::NudgeDirection;
use tracing::{debug, warn};

use crate::application::calibrate::{CalibrationCommand, CalibrationInput};

/// How often a waiting [`ConsoleInput`] re-checks the stop flag.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Maps one key to a command.  Unknown keys map to `None`.
pub fn command_for_key(key: char) -> Option<CalibrationCommand> {
    match key.to_ascii_lowercase() {
        'w' => Some(CalibrationCommand::Nudge(NudgeDirection::Up)),
        's' => Some(CalibrationCommand::Nudge(NudgeDirection::Down)),
        'a' => Some(CalibrationCommand::Nudge(NudgeDirection::Right)),
        'd' => Some(CalibrationCommand::Nudge(NudgeDirection::Left)),
        'q' => Some(CalibrationCommand::Abort),
        _ => None,
    }
}

/// [`CalibrationInput`] over a line reader.
///
/// The reader is drained on its own thread so a blocked terminal read never
/// keeps the controller from noticing a stop request.  Once `running` is
/// cleared, [`next_command`](CalibrationInput::next_command) returns
/// [`CalibrationCommand::Abort`] within [`STOP_POLL_INTERVAL`].
pub struct ConsoleInput {
    lines: Receiver<String>,
    running: Arc<AtomicBool>,
    queued: VecDeque<CalibrationCommand>,
}

impl ConsoleInput {
    /// Reads from the process's standard input.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the reader thread cannot be spawned.
    pub fn stdin(running: Arc<AtomicBool>) -> io::Result<Self> {
        Self::spawn(BufReader::new(io::stdin()), running)
    }

    /// Starts a reader thread over `reader`.
    ///
    /// The thread exits at end of input, on a read error, or once this value
    /// is dropped and the next line arrives.
    pub fn spawn<R>(reader: R, running: Arc<AtomicBool>) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("console-input".to_string())
            .spawn(move || read_lines(reader, tx))?;
        Ok(Self {
            lines: rx,
            running,
            queued: VecDeque::new(),
        })
    }

    /// Turns one line into queued commands.  An empty line confirms.
    fn enqueue(&mut self, line: &str) {
        let keys = line.trim();
        if keys.is_empty() {
            self.queued.push_back(CalibrationCommand::Confirm);
            return;
        }
        for key in keys.chars() {
            match command_for_key(key) {
                Some(cmd) => self.queued.push_back(cmd),
                None => debug!(%key, "ignoring key"),
            }
        }
    }
}

/// Body of the reader thread.
fn read_lines<R: BufRead>(mut reader: R, tx: Sender<String>) {
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                if tx.send(line).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("console read failed: {e}");
                return;
            }
        }
    }
}

impl CalibrationInput for ConsoleInput {
    fn next_command(&mut self) -> Option<CalibrationCommand> {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Some(CalibrationCommand::Abort);
            }
            if let Some(cmd) = self.queued.pop_front() {
                return Some(cmd);
            }
            match self.lines.recv_timeout(STOP_POLL_INTERVAL) {
                Ok(line) => self.enqueue(&line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::time::Instant;

    fn console(input: &str, running: &Arc<AtomicBool>) -> ConsoleInput {
        ConsoleInput::spawn(Cursor::new(input.as_bytes().to_vec()), Arc::clone(running)).unwrap()
    }

    fn drain(input: &str) -> Vec<CalibrationCommand> {
        let mut console = console(input, &Arc::new(AtomicBool::new(true)));
        std::iter::from_fn(|| console.next_command()).collect()
    }

    /// A terminal nobody types into: `read` blocks until the paired sender
    /// is dropped.
    struct IdleTerminal(mpsc::Receiver<()>);

    impl Read for IdleTerminal {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_keys_map_to_mirrored_nudges() {
        assert_eq!(
            command_for_key('a'),
            Some(CalibrationCommand::Nudge(NudgeDirection::Right))
        );
        assert_eq!(
            command_for_key('d'),
            Some(CalibrationCommand::Nudge(NudgeDirection::Left))
        );
        assert_eq!(
            command_for_key('W'),
            Some(CalibrationCommand::Nudge(NudgeDirection::Up))
        );
        assert_eq!(command_for_key('x'), None);
    }

    #[test]
    fn test_each_character_on_a_line_is_one_key() {
        let cmds = drain("wws\n");

        assert_eq!(
            cmds,
            vec![
                CalibrationCommand::Nudge(NudgeDirection::Up),
                CalibrationCommand::Nudge(NudgeDirection::Up),
                CalibrationCommand::Nudge(NudgeDirection::Down),
            ]
        );
    }

    #[test]
    fn test_empty_line_confirms() {
        let cmds = drain("d\n\n");

        assert_eq!(
            cmds,
            vec![
                CalibrationCommand::Nudge(NudgeDirection::Left),
                CalibrationCommand::Confirm,
            ]
        );
    }

    #[test]
    fn test_unknown_keys_are_skipped_and_q_aborts() {
        let cmds = drain("zz\r\nq\n");

        assert_eq!(cmds, vec![CalibrationCommand::Abort]);
    }

    #[test]
    fn test_end_of_input_closes_the_stream() {
        let mut console = console("", &Arc::new(AtomicBool::new(true)));
        assert_eq!(console.next_command(), None);
    }

    #[test]
    fn test_stop_signal_unblocks_waiting_console() {
        // Arrange – nothing is ever typed
        let (_keep_open, rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let mut console =
            ConsoleInput::spawn(BufReader::new(IdleTerminal(rx)), Arc::clone(&running)).unwrap();
        let stopper = {
            let running = Arc::clone(&running);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                running.store(false, Ordering::SeqCst);
            })
        };

        // Act
        let started = Instant::now();
        let cmd = console.next_command();

        // Assert
        stopper.join().unwrap();
        assert_eq!(cmd, Some(CalibrationCommand::Abort));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_pending_confirm_is_dropped_once_stopped() {
        // Arrange – Enter is already buffered when the stop arrives
        let running = Arc::new(AtomicBool::new(true));
        let mut console = console("\n", &running);
        running.store(false, Ordering::SeqCst);

        // Act / Assert
        assert_eq!(console.next_command(), Some(CalibrationCommand::Abort));
    }
}
