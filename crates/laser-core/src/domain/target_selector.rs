//! Target selector: bounded random search for an aim point outside every
//! avoid zone.
//!
//! # Why bounded? (for beginners)
//!
//! The naive approach, "keep drawing until one lands outside the zones", never
//! terminates when a zone covers the whole frame (someone standing right in
//! front of the camera).  Instead the selector draws at most
//! [`MAX_ATTEMPTS`] candidates and, if every one of them is rejected, falls back
//! to the centre of both spaces.  Its worst-case cost is therefore fixed no
//! matter how many or how large the zones are, which matters because it runs
//! inside a per-frame loop.
//!
//! The random source is injected through [`CandidateSampler`] so tests can
//! script the exact sequence of draws.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::geometry::{
    project, ActuatorPosition, AvoidZone, CalibrationOffset, FrameSize, Target, TARGET_Y_MIN,
    X_MAX, X_MIN, Y_MAX,
};

/// Number of candidates drawn before giving up and using the fallback.
pub const MAX_ATTEMPTS: usize = 100;

/// Source of candidate aim points in actuator space.
///
/// Implementations should return `x ∈ [X_MIN, X_MAX]` and
/// `y ∈ [TARGET_Y_MIN, Y_MAX]`; out-of-range values are clamped by the selector.
pub trait CandidateSampler {
    fn sample(&mut self) -> (i32, i32);
}

/// Uniform sampler backed by any [`rand::Rng`].
#[derive(Debug, Clone)]
pub struct RandomSampler<R> {
    rng: R,
}

impl<R: Rng> RandomSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomSampler<StdRng> {
    /// Sampler seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Deterministic sampler; the same seed always yields the same draws.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> CandidateSampler for RandomSampler<R> {
    fn sample(&mut self) -> (i32, i32) {
        (
            self.rng.gen_range(X_MIN..=X_MAX),
            self.rng.gen_range(TARGET_Y_MIN..=Y_MAX),
        )
    }
}

/// Outcome of one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// The chosen aim point.
    pub target: Target,
    /// How many candidates were drawn (1..=MAX_ATTEMPTS).
    pub attempts: usize,
    /// `true` if every candidate was rejected and the centre fallback was used.
    pub fallback: bool,
}

/// Picks a fresh aim point every frame.
///
/// Candidates are projected into the same frame size the avoid zones were
/// measured in; see [`TargetSelector::with_frame`].
#[derive(Debug, Clone)]
pub struct TargetSelector<S> {
    sampler: S,
    max_attempts: usize,
    frame: FrameSize,
}

impl<S: CandidateSampler> TargetSelector<S> {
    /// Creates a selector for the default 1280×720 frame that draws up to
    /// [`MAX_ATTEMPTS`] candidates.
    pub fn new(sampler: S) -> Self {
        Self {
            sampler,
            max_attempts: MAX_ATTEMPTS,
            frame: FrameSize::default(),
        }
    }

    /// Uses `frame` for projection and the fallback instead of the default.
    pub fn with_frame(mut self, frame: FrameSize) -> Self {
        self.frame = frame;
        self
    }

    pub fn frame(&self) -> FrameSize {
        self.frame
    }

    /// Returns the first candidate whose projection lies outside every zone,
    /// or [`Target::fallback`] once `MAX_ATTEMPTS` candidates were rejected.
    ///
    /// `previous` is the last position written to the actuator; it does not
    /// constrain the draw.
    pub fn select(
        &mut self,
        zones: &[AvoidZone],
        offset: CalibrationOffset,
        previous: ActuatorPosition,
    ) -> Selection {
        for attempt in 1..=self.max_attempts {
            let (x, y) = self.sampler.sample();
            let actuator = ActuatorPosition::clamped(x, y);
            let screen = project(actuator, offset, self.frame);
            if !zones.iter().any(|z| z.contains(screen)) {
                return Selection {
                    target: Target { actuator, screen },
                    attempts: attempt,
                    fallback: false,
                };
            }
        }

        debug!(
            zones = zones.len(),
            from = %previous,
            "no candidate outside avoid zones; using centre fallback"
        );
        Selection {
            target: Target::fallback(self.frame),
            attempts: self.max_attempts,
            fallback: true,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::{ScreenPoint, Y_MIN};
    use std::collections::VecDeque;

    /// Returns scripted draws in order, then repeats the last one.
    struct ScriptedSampler {
        draws: VecDeque<(i32, i32)>,
        last: (i32, i32),
        calls: usize,
    }

    impl ScriptedSampler {
        fn new(draws: &[(i32, i32)]) -> Self {
            Self {
                draws: draws.iter().copied().collect(),
                last: draws[draws.len() - 1],
                calls: 0,
            }
        }
    }

    impl CandidateSampler for ScriptedSampler {
        fn sample(&mut self) -> (i32, i32) {
            self.calls += 1;
            if let Some(d) = self.draws.pop_front() {
                self.last = d;
            }
            self.last
        }
    }

    fn zone(x1: i32, y1: i32, x2: i32, y2: i32) -> AvoidZone {
        AvoidZone::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn test_first_draw_outside_zone_is_returned() {
        // Arrange
        let mut selector = TargetSelector::new(ScriptedSampler::new(&[(50, 120)]));
        let zones = [zone(100, 100, 300, 300)];

        // Act
        let sel = selector.select(&zones, CalibrationOffset::default(), ActuatorPosition::center());

        // Assert
        assert_eq!(sel.target.actuator, ActuatorPosition::new(50, 120).unwrap());
        assert_eq!(sel.target.screen, ScreenPoint::new(355, 480));
        assert!(!zones[0].contains(sel.target.screen));
        assert_eq!(sel.attempts, 1);
        assert!(!sel.fallback);
    }

    #[test]
    fn test_draw_inside_zone_is_skipped_for_next_draw() {
        // Arrange – (30, 90) projects to (213, 360): inside the zone below
        let mut selector = TargetSelector::new(ScriptedSampler::new(&[(30, 90), (150, 170)]));
        let zones = [zone(100, 100, 300, 400)];

        // Act
        let sel = selector.select(&zones, CalibrationOffset::default(), ActuatorPosition::center());

        // Assert – the second draw wins, not the first
        assert_eq!(sel.target.actuator, ActuatorPosition::new(150, 170).unwrap());
        assert_eq!(sel.attempts, 2);
        assert!(!sel.fallback);
    }

    #[test]
    fn test_full_frame_zone_falls_back_after_exactly_max_attempts() {
        // Arrange
        let mut selector = TargetSelector::new(ScriptedSampler::new(&[(10, 100)]));

        // Act
        let sel = selector.select(
            &[AvoidZone::full_frame(FrameSize::default())],
            CalibrationOffset::default(),
            ActuatorPosition::center(),
        );

        // Assert
        assert!(sel.fallback);
        assert_eq!(sel.target, Target::fallback(FrameSize::default()));
        assert_eq!(selector.sampler.calls, MAX_ATTEMPTS);
    }

    #[test]
    fn test_full_frame_zone_with_random_sampler_terminates_with_fallback() {
        let mut selector = TargetSelector::new(RandomSampler::seeded(7));
        let sel = selector.select(
            &[AvoidZone::full_frame(FrameSize::default())],
            CalibrationOffset::default(),
            ActuatorPosition::center(),
        );
        assert!(sel.fallback);
        assert_eq!(sel.attempts, MAX_ATTEMPTS);
    }

    #[test]
    fn test_empty_zone_set_never_falls_back() {
        let mut selector = TargetSelector::new(RandomSampler::seeded(42));
        for _ in 0..1_000 {
            let sel = selector.select(&[], CalibrationOffset::default(), ActuatorPosition::center());
            assert_eq!(sel.attempts, 1);
            assert!(!sel.fallback);
        }
    }

    #[test]
    fn test_offset_shifts_projection_into_zone() {
        // Arrange – (50, 120) lands at (355, 480) without offset; an offset of
        // (-30, -100) moves it to (295, 280), inside the zone.
        let mut selector = TargetSelector::new(ScriptedSampler::new(&[(50, 120), (170, 175)]));
        let zones = [zone(100, 100, 300, 300)];

        // Act
        let sel = selector.select(&zones, CalibrationOffset::new(-30, -100), ActuatorPosition::center());

        // Assert
        assert_eq!(sel.attempts, 2);
        assert_eq!(sel.target.actuator, ActuatorPosition::new(170, 175).unwrap());
    }

    #[test]
    fn test_random_sampler_stays_in_upper_tilt_range() {
        let mut sampler = RandomSampler::seeded(1);
        for _ in 0..10_000 {
            let (x, y) = sampler.sample();
            assert!((X_MIN..=X_MAX).contains(&x));
            assert!((TARGET_Y_MIN..=Y_MAX).contains(&y));
            assert!(y >= Y_MIN);
        }
    }

    #[test]
    fn test_same_seed_gives_same_targets() {
        let mut a = TargetSelector::new(RandomSampler::seeded(99));
        let mut b = TargetSelector::new(RandomSampler::seeded(99));
        let zones = [zone(0, 0, 640, 720)];
        for _ in 0..50 {
            let ta = a.select(&zones, CalibrationOffset::default(), ActuatorPosition::center());
            let tb = b.select(&zones, CalibrationOffset::default(), ActuatorPosition::center());
            assert_eq!(ta, tb);
        }
    }

    #[test]
    fn test_small_frame_rejects_draw_that_lands_on_zone() {
        // Arrange – a cat in the bottom-right quarter of a 640×480 frame.
        // (150, 170) projects to (533, 453) there, on the cat; in 1280×720
        // space it would have been (1066, 680), well clear of the box.
        let frame = FrameSize::new(640, 480);
        let mut selector =
            TargetSelector::new(ScriptedSampler::new(&[(150, 170), (30, 100)])).with_frame(frame);
        let zones = [zone(320, 240, 640, 480)];

        // Act
        let sel = selector.select(&zones, CalibrationOffset::default(), ActuatorPosition::center());

        // Assert
        assert_eq!(sel.attempts, 2);
        assert_eq!(sel.target.actuator, ActuatorPosition::new(30, 100).unwrap());
        assert_eq!(sel.target.screen, ScreenPoint::new(106, 266));
        assert!(!zones[0].contains(sel.target.screen));
    }

    #[test]
    fn test_small_frame_fallback_uses_its_own_centre() {
        let frame = FrameSize::new(640, 480);
        let mut selector = TargetSelector::new(RandomSampler::seeded(5)).with_frame(frame);

        let sel = selector.select(
            &[AvoidZone::full_frame(frame)],
            CalibrationOffset::default(),
            ActuatorPosition::center(),
        );

        assert!(sel.fallback);
        assert_eq!(sel.target.screen, ScreenPoint::new(320, 240));
        assert_eq!(selector.frame(), frame);
    }

    #[test]
    fn test_out_of_range_draw_is_clamped() {
        let mut selector = TargetSelector::new(ScriptedSampler::new(&[(500, 10)]));
        let sel = selector.select(&[], CalibrationOffset::default(), ActuatorPosition::center());
        assert_eq!(sel.target.actuator, ActuatorPosition::new(X_MAX, Y_MIN).unwrap());
    }
}
