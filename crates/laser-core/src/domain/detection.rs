//! Detector output and the per-pixel motion mask for one camera frame.
//!
//! Both are produced by the vision collaborator; this module only defines their
//! shape and the overlap measurement the zone filter needs.

use serde::{Deserialize, Serialize};

/// A detector bounding box in camera pixels, half-open: `[x1, x2) × [y1, y2)`.
///
/// Detector output is untrusted: the corners may be swapped, negative, or
/// beyond the frame.  Nothing here rejects such boxes; overlap measurement
/// simply finds no pixels in them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [i32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One object reported by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Where the object is.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Class label, e.g. `"person"` or `"cat"`.
    pub label: String,
    /// Detector confidence in `0..=1`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence,
        }
    }
}

/// Binary foreground/background mask with the same resolution as the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionMask {
    width: usize,
    height: usize,
    /// Row-major, `true` = foreground (moving) pixel.
    pixels: Vec<bool>,
}

impl MotionMask {
    /// Creates an all-background mask.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; width * height],
        }
    }

    /// Wraps an existing row-major pixel buffer.
    ///
    /// Returns `None` if `pixels.len() != width * height`.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<bool>) -> Option<Self> {
        (pixels.len() == width * height).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns `true` if the pixel at `(x, y)` is foreground.  Out-of-range
    /// coordinates are background.
    pub fn is_foreground(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.pixels[y * self.width + x]
    }

    /// Marks every pixel of `area` that lies inside the mask as foreground.
    pub fn fill(&mut self, area: BoundingBox) {
        let Some((x1, y1, x2, y2)) = self.clip(area) else {
            return;
        };
        for y in y1..y2 {
            let row = y * self.width;
            self.pixels[row + x1..row + x2].fill(true);
        }
    }

    /// Fraction of foreground pixels inside `area`, after clipping it to the
    /// mask.
    ///
    /// Returns `None` if the clipped area is empty (inverted box, zero-size box,
    /// or box entirely outside the frame).
    pub fn foreground_fraction(&self, area: BoundingBox) -> Option<f32> {
        let (x1, y1, x2, y2) = self.clip(area)?;
        let total = (x2 - x1) * (y2 - y1);
        let set: usize = (y1..y2)
            .map(|y| {
                let row = y * self.width;
                self.pixels[row + x1..row + x2]
                    .iter()
                    .filter(|p| **p)
                    .count()
            })
            .sum();
        Some(set as f32 / total as f32)
    }

    /// Intersects `area` with the mask bounds.  `None` when nothing remains.
    fn clip(&self, area: BoundingBox) -> Option<(usize, usize, usize, usize)> {
        let clamp_to = |v: i32, max: usize| -> usize { v.clamp(0, max as i32) as usize };
        let x1 = clamp_to(area.x1, self.width);
        let x2 = clamp_to(area.x2, self.width);
        let y1 = clamp_to(area.y1, self.height);
        let y2 = clamp_to(area.y2, self.height);
        (x1 < x2 && y1 < y2).then_some((x1, y1, x2, y2))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
