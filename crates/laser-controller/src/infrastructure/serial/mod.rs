//! Serial link to the pan/tilt actuator board.
//!
//! [`SerialLinkManager`] owns the port and implements [`ActuatorLink`].  It
//! never lets a serial fault escape: a failed write drops the handle, makes
//! exactly one reopen attempt, and reports `false`.  The next write tries
//! again if that reopen failed too.
//!
//! # Connection states (for beginners)
//!
//! ```text
//!           open ok                  write/read fault, close
//! Disconnected ───────▶ Connected ────────────────────────────▶ Disconnected
//!      ▲                    │
//!      └────open failed─────┘ (stays Disconnected)
//! ```
//!
//! Microcontroller boards reset when their USB-serial port is opened, so a
//! freshly opened port ignores input for a moment.  A `Connected` link
//! therefore carries a `ready_at` instant: writes before it fail without
//! counting as a fault, and the control loop keeps running instead of
//! blocking for the settle delay.
//!
//! # Testability
//!
//! The port is reached through the [`LinkOpener`] and [`SerialIo`] traits;
//! [`mock`] provides a scripted implementation of both.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use laser_core::{parse_telemetry_line, ActuatorCommand};
use serialport::SerialPort;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::application::control_loop::ActuatorLink;

pub mod mock;

/// Longest partial telemetry line kept between reads.  Anything longer is
/// line noise and is dropped.
const MAX_PENDING_BYTES: usize = 256;

/// Error type for serial link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The OS refused to open the port (missing device, busy, permissions).
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// A read or write on an open port failed.
    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),

    /// No handle is held.
    #[error("serial link is not connected")]
    NotConnected,

    /// The port is open but the board has not finished resetting.
    #[error("serial link is still settling")]
    Settling,
}

/// Byte stream to the board.
pub trait SerialIo: Read + Write + Send {
    /// Bytes already received and waiting to be read.
    fn bytes_to_read(&self) -> io::Result<u32>;
}

/// Opens fresh handles to the same device.
pub trait LinkOpener: Send {
    fn open(&mut self) -> Result<Box<dyn SerialIo>, LinkError>;

    /// Device name for log messages.
    fn port_name(&self) -> &str;
}

// ── serialport-backed implementation ──────────────────────────────────────────

/// Opens the real device with the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SerialPortOpener {
    port: String,
    baud: u32,
    timeout: Duration,
}

impl SerialPortOpener {
    pub fn new(port: impl Into<String>, baud: u32, timeout: Duration) -> Self {
        Self {
            port: port.into(),
            baud,
            timeout,
        }
    }
}

impl LinkOpener for SerialPortOpener {
    fn open(&mut self) -> Result<Box<dyn SerialIo>, LinkError> {
        let port = serialport::new(self.port.as_str(), self.baud)
            .timeout(self.timeout)
            .open()
            .map_err(|source| LinkError::Open {
                port: self.port.clone(),
                source,
            })?;
        Ok(Box::new(HardwarePort(port)))
    }

    fn port_name(&self) -> &str {
        &self.port
    }
}

struct HardwarePort(Box<dyn SerialPort>);

impl Read for HardwarePort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for HardwarePort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl SerialIo for HardwarePort {
    fn bytes_to_read(&self) -> io::Result<u32> {
        self.0.bytes_to_read().map_err(io::Error::from)
    }
}

// ── Link manager ──────────────────────────────────────────────────────────────

enum LinkState {
    Connected {
        port: Box<dyn SerialIo>,
        ready_at: Instant,
    },
    Disconnected,
}

/// Self-healing actuator link.
pub struct SerialLinkManager {
    opener: Box<dyn LinkOpener>,
    settle: Duration,
    state: LinkState,
    pending: Vec<u8>,
}

impl SerialLinkManager {
    /// Creates a manager in the `Disconnected` state.  Nothing is opened
    /// until [`connect`](Self::connect) or the first write.
    pub fn new(opener: Box<dyn LinkOpener>, settle: Duration) -> Self {
        Self {
            opener,
            settle,
            state: LinkState::Disconnected,
            pending: Vec::new(),
        }
    }

    /// Opens the port, replacing any held handle.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Open`] if the device cannot be opened.  The
    /// manager stays usable and will retry on the next write.
    pub fn connect(&mut self) -> Result<(), LinkError> {
        self.state = LinkState::Disconnected;
        self.pending.clear();
        match self.opener.open() {
            Ok(port) => {
                info!(port = %self.opener.port_name(), "serial link connected");
                self.state = LinkState::Connected {
                    port,
                    ready_at: Instant::now() + self.settle,
                };
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "serial link unavailable");
                Err(e)
            }
        }
    }

    /// Blocks until a freshly opened port has settled.  Returns immediately
    /// when disconnected or already settled.
    pub fn wait_until_ready(&self) {
        if let LinkState::Connected { ready_at, .. } = &self.state {
            let now = Instant::now();
            if *ready_at > now {
                debug!(wait_ms = (*ready_at - now).as_millis() as u64, "waiting for board reset");
                std::thread::sleep(*ready_at - now);
            }
        }
    }

    fn send(&mut self, line: &str) -> Result<(), LinkError> {
        let LinkState::Connected { port, ready_at } = &mut self.state else {
            return Err(LinkError::NotConnected);
        };
        if Instant::now() < *ready_at {
            return Err(LinkError::Settling);
        }
        port.write_all(line.as_bytes())?;
        port.flush()?;
        Ok(())
    }

    fn drain_input(&mut self) -> Result<(), LinkError> {
        let LinkState::Connected { port, .. } = &mut self.state else {
            return Err(LinkError::NotConnected);
        };
        let mut buf = [0u8; MAX_PENDING_BYTES];
        loop {
            let available = port.bytes_to_read()? as usize;
            if available == 0 {
                return Ok(());
            }
            let want = available.min(buf.len());
            let n = match port.read(&mut buf[..want]) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            self.pending.extend_from_slice(&buf[..n]);
        }
    }

    /// Parses every complete line in the buffer and keeps the trailing
    /// partial line for the next call.
    fn take_latest_reading(&mut self) -> Option<f32> {
        let mut latest = None;
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line);
            match parse_telemetry_line(&text) {
                Ok(distance) => latest = Some(distance),
                Err(e) => trace!(error = %e, line = %text.trim(), "discarding serial line"),
            }
        }
        if self.pending.len() > MAX_PENDING_BYTES {
            trace!(bytes = self.pending.len(), "discarding unterminated serial input");
            self.pending.clear();
        }
        latest
    }
}

impl ActuatorLink for SerialLinkManager {
    fn write(&mut self, command: &ActuatorCommand) -> bool {
        if matches!(self.state, LinkState::Disconnected) {
            warn!(port = %self.opener.port_name(), "actuator link down; reconnecting");
            if self.connect().is_err() {
                return false;
            }
        }

        match self.send(&command.to_line()) {
            Ok(()) => {
                trace!(%command, "sent");
                true
            }
            Err(LinkError::Settling) => {
                debug!(%command, "board still settling; command dropped");
                false
            }
            Err(e) => {
                warn!(error = %e, %command, "serial write failed; reconnecting");
                // One attempt only; a failure here is retried by the next write.
                let _ = self.connect();
                false
            }
        }
    }

    fn read_telemetry(&mut self) -> Option<f32> {
        if matches!(self.state, LinkState::Disconnected) {
            return None;
        }
        if let Err(e) = self.drain_input() {
            warn!(error = %e, "serial read failed; link marked down");
            self.state = LinkState::Disconnected;
        }
        self.take_latest_reading()
    }

    fn close(&mut self) {
        if matches!(self.state, LinkState::Connected { .. }) {
            info!(port = %self.opener.port_name(), "serial link closed");
        }
        self.state = LinkState::Disconnected;
        self.pending.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::{MockOpener, MockWire};
    use super::*;
    use laser_core::{ActuatorPosition, NudgeDirection};

    fn manager(wire: &MockWire) -> SerialLinkManager {
        SerialLinkManager::new(Box::new(MockOpener::new(wire.clone())), Duration::ZERO)
    }

    fn move_to(x: i32, y: i32) -> ActuatorCommand {
        ActuatorCommand::MoveTo(ActuatorPosition::new(x, y).unwrap())
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    #[test]
    fn test_write_sends_terminated_command_line() {
        // Arrange
        let wire = MockWire::new();
        let mut link = manager(&wire);
        link.connect().unwrap();

        // Act
        let ok = link.write(&move_to(10, 70));
        let nudge = link.write(&ActuatorCommand::Nudge(NudgeDirection::Up));

        // Assert
        assert!(ok && nudge);
        assert_eq!(wire.written(), "POSICAO:10:70\nSUBIR\n");
    }

    #[test]
    fn test_write_while_disconnected_opens_then_writes() {
        // Arrange – first open refused, second accepted
        let wire = MockWire::new();
        wire.refuse_opens(1);
        let mut link = manager(&wire);
        assert!(link.connect().is_err());

        // Act
        let ok = link.write(&move_to(90, 120));

        // Assert
        assert!(ok);
        assert_eq!(wire.open_attempts(), 2);
        assert_eq!(wire.written(), "POSICAO:90:120\n");
    }

    #[test]
    fn test_write_fault_reopens_exactly_once_and_reports_failure() {
        // Arrange
        let wire = MockWire::new();
        let mut link = manager(&wire);
        link.connect().unwrap();
        wire.fail_writes(1);

        // Act
        let failed = link.write(&move_to(20, 100));
        let opens_after_fault = wire.open_attempts();
        let recovered = link.write(&move_to(21, 101));

        // Assert
        assert!(!failed);
        assert_eq!(opens_after_fault, 2);
        assert!(recovered);
        assert_eq!(wire.open_attempts(), 2, "healthy link must not reopen");
        assert_eq!(wire.written(), "POSICAO:21:101\n");
    }

    #[test]
    fn test_unplugged_device_fails_every_write_with_one_open_each() {
        let wire = MockWire::new();
        wire.unplug();
        let mut link = manager(&wire);

        let results: Vec<bool> = (0..5).map(|_| link.write(&move_to(90, 120))).collect();

        assert!(results.iter().all(|ok| !ok));
        assert_eq!(wire.open_attempts(), 5);
    }

    #[test]
    fn test_replugged_device_recovers_on_next_write() {
        let wire = MockWire::new();
        let mut link = manager(&wire);
        link.connect().unwrap();
        wire.unplug();
        assert!(!link.write(&move_to(90, 120)));

        wire.replug();

        assert!(link.write(&move_to(91, 121)));
        assert_eq!(wire.written(), "POSICAO:91:121\n");
    }

    #[test]
    fn test_settling_port_drops_commands_without_reopening() {
        // Arrange
        let wire = MockWire::new();
        let mut link =
            SerialLinkManager::new(Box::new(MockOpener::new(wire.clone())), Duration::from_secs(3600));
        link.connect().unwrap();

        // Act
        let ok = link.write(&move_to(90, 120));

        // Assert
        assert!(!ok);
        assert_eq!(wire.open_attempts(), 1);
        assert!(wire.written().is_empty());
    }

    #[test]
    fn test_write_after_close_reopens() {
        let wire = MockWire::new();
        let mut link = manager(&wire);
        link.connect().unwrap();

        link.close();
        let ok = link.write(&move_to(90, 120));

        assert!(ok);
        assert_eq!(wire.open_attempts(), 2);
    }

    // ── Telemetry ─────────────────────────────────────────────────────────────

    #[test]
    fn test_telemetry_returns_latest_complete_reading() {
        let wire = MockWire::new();
        let mut link = manager(&wire);
        link.connect().unwrap();
        wire.push_inbound("DISTANCIA:12.5;\r\nDISTANCIA:13.0;\r\n");

        assert_eq!(link.read_telemetry(), Some(13.0));
        assert_eq!(link.read_telemetry(), None);
    }

    #[test]
    fn test_telemetry_partial_line_is_completed_by_next_read() {
        // Arrange
        let wire = MockWire::new();
        let mut link = manager(&wire);
        link.connect().unwrap();

        // Act
        wire.push_inbound("DISTAN");
        let first = link.read_telemetry();
        wire.push_inbound("CIA:7.5;\n");
        let second = link.read_telemetry();

        // Assert
        assert_eq!(first, None);
        assert_eq!(second, Some(7.5));
    }

    #[test]
    fn test_telemetry_discards_malformed_lines() {
        let wire = MockWire::new();
        let mut link = manager(&wire);
        link.connect().unwrap();
        wire.push_inbound("boot ok\nDISTANCIA:abc;\nDISTANCIA:3;\nDISTANCIA:4\n");

        assert_eq!(link.read_telemetry(), Some(3.0));
    }

    #[test]
    fn test_telemetry_read_fault_marks_link_down() {
        // Arrange
        let wire = MockWire::new();
        let mut link = manager(&wire);
        link.connect().unwrap();
        wire.fail_reads(true);

        // Act
        let reading = link.read_telemetry();
        wire.fail_reads(false);
        let opens_before_write = wire.open_attempts();
        let ok = link.write(&move_to(90, 120));

        // Assert
        assert_eq!(reading, None);
        assert_eq!(opens_before_write, 1, "reads never reopen");
        assert!(ok);
        assert_eq!(wire.open_attempts(), 2);
    }

    #[test]
    fn test_telemetry_when_disconnected_is_none_without_opening() {
        let wire = MockWire::new();
        let mut link = manager(&wire);

        assert_eq!(link.read_telemetry(), None);
        assert_eq!(wire.open_attempts(), 0);
    }

    #[test]
    fn test_oversized_garbage_without_newline_is_dropped() {
        let wire = MockWire::new();
        let mut link = manager(&wire);
        link.connect().unwrap();
        wire.push_inbound(&"x".repeat(MAX_PENDING_BYTES * 2));
        assert_eq!(link.read_telemetry(), None);

        wire.push_inbound("DISTANCIA:1.5;\n");

        assert_eq!(link.read_telemetry(), Some(1.5));
    }
}
