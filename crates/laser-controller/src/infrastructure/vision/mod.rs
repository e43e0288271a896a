//! Frame sources feeding the control loop.
//!
//! The detector and background subtractor run outside this process; what
//! reaches the controller is one [`FrameObservation`] per camera frame.  A
//! [`VisionSource`] yields them in order and returns `None` once the stream
//! is over.
//!
//! # Replay format
//!
//! [`ReplayVisionSource`] reads one JSON object per line:
//!
//! ```json
//! {"detections":[{"box":[100,80,300,400],"label":"cat","confidence":0.82}],
//!  "motion":[[120,100,280,380]]}
//! ```
//!
//! Each `motion` rectangle is painted as foreground into a mask of the
//! configured frame size.  Blank lines and lines starting with `#` are
//! skipped; lines that fail to parse are logged and skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use laser_core::{BoundingBox, Detection, MotionMask};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

pub use crate::application::control_loop::FrameObservation;

pub mod mock;

/// Error type for replay sources.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error reading replay {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid replay frame on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("frame size {width}x{height} has no pixels")]
    MaskSize { width: usize, height: usize },
}

/// Yields camera frames to the control loop.
pub trait VisionSource: Send {
    fn next_frame(&mut self) -> Option<FrameObservation>;
}

// ── Idle source ───────────────────────────────────────────────────────────────

/// Source that never sees anything, paced at a fixed frame period.
///
/// With no detections the loop free-roams, which is how the rig is exercised
/// without a camera attached.
pub struct IdleVisionSource {
    width: usize,
    height: usize,
    period: Duration,
}

impl IdleVisionSource {
    pub fn new(width: usize, height: usize, period: Duration) -> Self {
        Self {
            width,
            height,
            period,
        }
    }
}

impl VisionSource for IdleVisionSource {
    fn next_frame(&mut self) -> Option<FrameObservation> {
        std::thread::sleep(self.period);
        Some(FrameObservation::empty(self.width, self.height))
    }
}

// ── Replay source ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ReplayFrame {
    #[serde(default)]
    detections: Vec<Detection>,
    #[serde(default)]
    motion: Vec<BoundingBox>,
}

/// Plays back recorded frames from JSON lines.
pub struct ReplayVisionSource<R> {
    reader: R,
    origin: String,
    width: usize,
    height: usize,
    period: Duration,
    line_no: usize,
    frames: u64,
}

impl ReplayVisionSource<BufReader<File>> {
    /// Opens a replay file.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Io`] if the file cannot be opened and
    /// [`ReplayError::MaskSize`] for a zero frame size.
    pub fn open(
        path: &Path,
        width: usize,
        height: usize,
        period: Duration,
    ) -> Result<Self, ReplayError> {
        let origin = path.display().to_string();
        let file = File::open(path).map_err(|source| ReplayError::Io {
            origin: origin.clone(),
            source,
        })?;
        info!(path = %origin, "replaying recorded frames");
        let mut source = Self::from_reader(BufReader::new(file), width, height, period)?;
        source.origin = origin;
        Ok(source)
    }
}

impl<R: BufRead> ReplayVisionSource<R> {
    /// Wraps any line reader.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::MaskSize`] if `width` or `height` is zero.
    pub fn from_reader(
        reader: R,
        width: usize,
        height: usize,
        period: Duration,
    ) -> Result<Self, ReplayError> {
        if width == 0 || height == 0 {
            return Err(ReplayError::MaskSize { width, height });
        }
        Ok(Self {
            reader,
            origin: "<stream>".to_string(),
            width,
            height,
            period,
            line_no: 0,
            frames: 0,
        })
    }

    /// Reads lines until one holds a frame.  `Ok(None)` at end of input.
    fn read_frame(&mut self) -> Result<Option<FrameObservation>, ReplayError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .map_err(|source| ReplayError::Io {
                    origin: self.origin.clone(),
                    source,
                })?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let frame: ReplayFrame =
                serde_json::from_str(text).map_err(|source| ReplayError::Parse {
                    line: self.line_no,
                    source,
                })?;
            return Ok(Some(self.rasterise(frame)));
        }
    }

    fn rasterise(&self, frame: ReplayFrame) -> FrameObservation {
        let mut motion = MotionMask::new(self.width, self.height);
        for area in frame.motion {
            motion.fill(area);
        }
        FrameObservation::new(frame.detections, motion)
    }
}

impl<R: BufRead + Send> VisionSource for ReplayVisionSource<R> {
    fn next_frame(&mut self) -> Option<FrameObservation> {
        loop {
            match self.read_frame() {
                Ok(Some(frame)) => {
                    self.frames += 1;
                    std::thread::sleep(self.period);
                    return Some(frame);
                }
                Ok(None) => {
                    info!(frames = self.frames, "replay finished");
                    return None;
                }
                Err(ReplayError::Parse { line, source }) => {
                    warn!(line, error = %source, "skipping invalid replay frame");
                }
                Err(e) => {
                    warn!(error = %e, "replay aborted");
                    return None;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
