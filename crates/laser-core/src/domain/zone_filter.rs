//! Zone filter: decides which detections become avoid zones.
//!
//! A detector alone fires on static furniture that looks enough like a cat;
//! a motion mask alone fires on camera jitter.  A detection only becomes an
//! avoid zone when *both* signals agree:
//!
//! 1. confidence strictly above `min_confidence`,
//! 2. label in the configured set,
//! 3. foreground fraction inside its box strictly above `min_motion_fraction`.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::detection::{Detection, MotionMask};
use super::geometry::AvoidZone;

/// Thresholds for the zone filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneFilterConfig {
    /// Detections at or below this confidence are ignored.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Labels that represent a living subject.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
    /// Detections whose box is at most this fraction foreground are ignored.
    #[serde(default = "default_min_motion_fraction")]
    pub min_motion_fraction: f32,
}

fn default_min_confidence() -> f32 {
    0.4
}
fn default_labels() -> Vec<String> {
    vec!["person".to_string(), "cat".to_string()]
}
fn default_min_motion_fraction() -> f32 {
    0.2
}

impl Default for ZoneFilterConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            labels: default_labels(),
            min_motion_fraction: default_min_motion_fraction(),
        }
    }
}

/// Turns one frame's detections and motion mask into avoid zones.
#[derive(Debug, Clone, Default)]
pub struct ZoneFilter {
    config: ZoneFilterConfig,
}

impl ZoneFilter {
    pub fn new(config: ZoneFilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ZoneFilterConfig {
        &self.config
    }

    /// Returns one avoid zone per detection that passes all three gates.
    ///
    /// Boxes that are empty or lie entirely outside the mask are dropped.
    pub fn filter(&self, detections: &[Detection], mask: &MotionMask) -> Vec<AvoidZone> {
        detections
            .iter()
            .filter_map(|d| self.admit(d, mask))
            .collect()
    }

    fn admit(&self, detection: &Detection, mask: &MotionMask) -> Option<AvoidZone> {
        if detection.confidence <= self.config.min_confidence {
            return None;
        }
        if !self.config.labels.iter().any(|l| *l == detection.label) {
            return None;
        }
        let fraction = mask.foreground_fraction(detection.bbox)?;
        if fraction <= self.config.min_motion_fraction {
            trace!(
                label = %detection.label,
                fraction,
                "detection ignored: not enough motion"
            );
            return None;
        }
        let b = detection.bbox;
        AvoidZone::new(b.x1, b.y1, b.x2, b.y2).ok()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
