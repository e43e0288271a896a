//! Scripted serial device for tests.
//!
//! A [`MockWire`] stands in for the USB cable and the board on the other
//! end.  Tests keep a clone to inject telemetry, break the connection, and
//! inspect what was written, while [`MockOpener`] hands fresh
//! [`SerialIo`] handles to the link manager.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{LinkError, LinkOpener, SerialIo};

#[derive(Debug, Default)]
struct WireState {
    written: Vec<u8>,
    inbound: VecDeque<u8>,
    open_attempts: usize,
    refuse_opens: usize,
    fail_writes: usize,
    fail_reads: bool,
    unplugged: bool,
}

/// Shared handle to the simulated device.
#[derive(Debug, Clone, Default)]
pub struct MockWire {
    state: Arc<Mutex<WireState>>,
}

impl MockWire {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, WireState> {
        self.state.lock().expect("lock poisoned")
    }

    /// Everything successfully written so far, as text.
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.lock().written).into_owned()
    }

    /// Queues bytes as if sent by the board.
    pub fn push_inbound(&self, text: &str) {
        self.lock().inbound.extend(text.bytes());
    }

    pub fn open_attempts(&self) -> usize {
        self.lock().open_attempts
    }

    /// The next `n` opens fail.
    pub fn refuse_opens(&self, n: usize) {
        self.lock().refuse_opens = n;
    }

    /// The next `n` writes fail with a broken pipe.
    pub fn fail_writes(&self, n: usize) {
        self.lock().fail_writes = n;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Every open and every I/O call fails until [`replug`](Self::replug).
    pub fn unplug(&self) {
        self.lock().unplugged = true;
    }

    pub fn replug(&self) {
        self.lock().unplugged = false;
    }
}

/// [`LinkOpener`] over a [`MockWire`].
#[derive(Debug, Clone)]
pub struct MockOpener {
    wire: MockWire,
}

impl MockOpener {
    pub fn new(wire: MockWire) -> Self {
        Self { wire }
    }
}

impl LinkOpener for MockOpener {
    fn open(&mut self) -> Result<Box<dyn SerialIo>, LinkError> {
        let mut state = self.wire.lock();
        state.open_attempts += 1;
        if state.unplugged || state.refuse_opens > 0 {
            state.refuse_opens = state.refuse_opens.saturating_sub(1);
            return Err(LinkError::Open {
                port: self.port_name().to_string(),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "mock device absent"),
            });
        }
        Ok(Box::new(MockPort {
            wire: self.wire.clone(),
        }))
    }

    fn port_name(&self) -> &str {
        "mock0"
    }
}

struct MockPort {
    wire: MockWire,
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "mock device unplugged")
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.wire.lock();
        if state.unplugged || state.fail_reads {
            return Err(broken_pipe());
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.wire.lock();
        if state.unplugged {
            return Err(broken_pipe());
        }
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(broken_pipe());
        }
        state.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialIo for MockPort {
    fn bytes_to_read(&self) -> io::Result<u32> {
        let state = self.wire.lock();
        if state.unplugged || state.fail_reads {
            return Err(broken_pipe());
        }
        Ok(state.inbound.len() as u32)
    }
}
