//! Scripted frame source for tests.

use std::collections::VecDeque;

use laser_core::{BoundingBox, Detection, MotionMask};

use super::{FrameObservation, VisionSource};

/// Yields a fixed list of frames, then ends the stream.
#[derive(Debug, Default)]
pub struct ScriptedVisionSource {
    frames: VecDeque<FrameObservation>,
}

impl ScriptedVisionSource {
    pub fn new(frames: impl IntoIterator<Item = FrameObservation>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// `count` empty frames of the given size.
    pub fn empty_frames(count: usize, width: usize, height: usize) -> Self {
        Self::new((0..count).map(|_| FrameObservation::empty(width, height)))
    }

    /// Appends a frame where one subject fills `area` and is moving.
    pub fn push_moving(&mut self, area: BoundingBox, label: &str, width: usize, height: usize) {
        let mut motion = MotionMask::new(width, height);
        motion.fill(area);
        self.frames
            .push_back(FrameObservation::new(vec![Detection::new(area, label, 0.9)], motion));
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl VisionSource for ScriptedVisionSource {
    fn next_frame(&mut self) -> Option<FrameObservation> {
        self.frames.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_yields_frames_in_order_then_ends() {
        let mut source = ScriptedVisionSource::empty_frames(1, 16, 16);
        source.push_moving(BoundingBox::new(0, 0, 8, 8), "person", 16, 16);

        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();

        assert!(first.detections.is_empty());
        assert_eq!(second.detections[0].label, "person");
        assert!(second.motion.is_foreground(4, 4));
        assert!(source.next_frame().is_none());
    }
}
