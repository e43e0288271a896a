//! Actuator-space and screen-space geometry.
//!
//! The actuator accepts absolute pan/tilt angles.  The tilt axis has a narrower
//! usable range than the pan axis (below 60° the beam hits the mount), so the
//! bounds are asymmetric on purpose.

use std::fmt;

use thiserror::Error;

/// Lowest pan angle the actuator accepts.
pub const X_MIN: i32 = 0;
/// Highest pan angle the actuator accepts.
pub const X_MAX: i32 = 180;
/// Lowest tilt angle the actuator accepts.
pub const Y_MIN: i32 = 60;
/// Highest tilt angle the actuator accepts.
pub const Y_MAX: i32 = 180;

/// Lowest tilt angle the target selector will draw.
///
/// Tilt angles in `[Y_MIN, TARGET_Y_MIN)` aim at the floor right under the
/// mount, which is reserved for the resting pose.
pub const TARGET_Y_MIN: i32 = 90;

/// Centre of the pan range.
pub const CENTER_X: i32 = (X_MIN + X_MAX) / 2;
/// Centre of the tilt range.
pub const CENTER_Y: i32 = (Y_MIN + Y_MAX) / 2;

/// Default camera frame width in pixels.
pub const FRAME_WIDTH: i32 = 1280;
/// Default camera frame height in pixels.
pub const FRAME_HEIGHT: i32 = 720;

/// Angle span used by the linear actuator→screen mapping.
const PROJECTION_SPAN: i32 = 180;

/// Screen pixels per calibration unit.
const OFFSET_SCALE: i32 = 2;

/// Errors raised when constructing geometry values from untrusted input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZoneError {
    /// The rectangle corners are in the wrong order.
    #[error("inverted avoid zone ({x1},{y1})-({x2},{y2}): expected x1 <= x2 and y1 <= y2")]
    Inverted { x1: i32, y1: i32, x2: i32, y2: i32 },
}

/// A pan/tilt position that is guaranteed to lie inside the actuator bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActuatorPosition {
    x: i32,
    y: i32,
}

impl ActuatorPosition {
    /// Returns `Some` when `(x, y)` is inside `[X_MIN, X_MAX] × [Y_MIN, Y_MAX]`.
    pub fn new(x: i32, y: i32) -> Option<Self> {
        if (X_MIN..=X_MAX).contains(&x) && (Y_MIN..=Y_MAX).contains(&y) {
            Some(Self { x, y })
        } else {
            None
        }
    }

    /// Builds a position, saturating each axis at its bound.
    pub fn clamped(x: i32, y: i32) -> Self {
        Self {
            x: x.clamp(X_MIN, X_MAX),
            y: y.clamp(Y_MIN, Y_MAX),
        }
    }

    /// The resting pose: centre of both axes.
    pub const fn center() -> Self {
        Self {
            x: CENTER_X,
            y: CENTER_Y,
        }
    }

    /// Pan angle.
    pub fn x(&self) -> i32 {
        self.x
    }

    /// Tilt angle.
    pub fn y(&self) -> i32 {
        self.y
    }
}

impl Default for ActuatorPosition {
    fn default() -> Self {
        Self::center()
    }
}

impl fmt::Display for ActuatorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Direction of a manual calibration nudge, as seen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NudgeDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Per-session translation between actuator space and camera pixels.
///
/// Set while calibrating and never changed once the loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CalibrationOffset {
    pub x: i32,
    pub y: i32,
}

impl CalibrationOffset {
    /// Creates an offset.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the offset after one operator nudge.
    ///
    /// The camera image is mirrored, so a nudge to the operator's right moves
    /// the projected dot toward larger `x`.
    pub fn nudged(self, direction: NudgeDirection) -> Self {
        match direction {
            NudgeDirection::Up => Self::new(self.x, self.y - 1),
            NudgeDirection::Down => Self::new(self.x, self.y + 1),
            NudgeDirection::Right => Self::new(self.x + 1, self.y),
            NudgeDirection::Left => Self::new(self.x - 1, self.y),
        }
    }
}

/// A pixel coordinate in the camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Size of the camera frame that detections and motion masks are expressed in.
///
/// Projection, the fallback target, and full-frame zones all scale with it, so
/// a camera running at 640×480 is compared in 640×480 pixels throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: i32,
    pub height: i32,
}

impl FrameSize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Centre pixel of the frame.
    pub const fn center(&self) -> ScreenPoint {
        ScreenPoint {
            x: self.width / 2,
            y: self.height / 2,
        }
    }
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::new(FRAME_WIDTH, FRAME_HEIGHT)
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Projects an actuator position into the pixels of `frame`.
///
/// `px = ⌊x / 180 · width⌋ + 2·ox`, `py = ⌊y / 180 · height⌋ + 2·oy`.
/// Integer arithmetic keeps the mapping exact for every angle.
pub fn project(position: ActuatorPosition, offset: CalibrationOffset, frame: FrameSize) -> ScreenPoint {
    ScreenPoint {
        x: position.x * frame.width / PROJECTION_SPAN + offset.x * OFFSET_SCALE,
        y: position.y * frame.height / PROJECTION_SPAN + offset.y * OFFSET_SCALE,
    }
}

/// An axis-aligned rectangle in camera pixels where the dot must not land.
///
/// Zones have no identity: they are rebuilt from scratch every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AvoidZone {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl AvoidZone {
    /// Creates a zone from its top-left and bottom-right corners.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::Inverted`] when `x1 > x2` or `y1 > y2`.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self, ZoneError> {
        if x1 > x2 || y1 > y2 {
            return Err(ZoneError::Inverted { x1, y1, x2, y2 });
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// A zone covering the whole of `frame`.
    pub const fn full_frame(frame: FrameSize) -> Self {
        Self {
            x1: 0,
            y1: 0,
            x2: frame.width,
            y2: frame.height,
        }
    }

    /// Returns `true` if `point` is inside the zone.  Edges count as inside.
    pub fn contains(&self, point: ScreenPoint) -> bool {
        (self.x1..=self.x2).contains(&point.x) && (self.y1..=self.y2).contains(&point.y)
    }

    /// Corners as `(x1, y1, x2, y2)`.
    pub fn corners(&self) -> (i32, i32, i32, i32) {
        (self.x1, self.y1, self.x2, self.y2)
    }
}

/// An aim point: where the selector wants the dot to end up.
///
/// The smoother moves toward it over several commands; it is never sent to the
/// actuator directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    /// Goal in actuator space.
    pub actuator: ActuatorPosition,
    /// The same goal projected into the camera frame.
    pub screen: ScreenPoint,
}

impl Target {
    /// The deterministic fallback: actuator centre and the centre of `frame`.
    pub const fn fallback(frame: FrameSize) -> Self {
        Self {
            actuator: ActuatorPosition::center(),
            screen: frame.center(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── ActuatorPosition ──────────────────────────────────────────────────────

    #[test]
    fn test_actuator_position_accepts_bounds_inclusive() {
        assert!(ActuatorPosition::new(X_MIN, Y_MIN).is_some());
        assert!(ActuatorPosition::new(X_MAX, Y_MAX).is_some());
    }

    #[test]
    fn test_actuator_position_rejects_tilt_below_minimum() {
        // Tilt range starts at 60, not 0.
        assert!(ActuatorPosition::new(90, 59).is_none());
        assert!(ActuatorPosition::new(-1, 90).is_none());
        assert!(ActuatorPosition::new(181, 90).is_none());
    }

    #[test]
    fn test_clamped_saturates_each_axis() {
        let pos = ActuatorPosition::clamped(-20, 400);
        assert_eq!((pos.x(), pos.y()), (X_MIN, Y_MAX));
    }

    #[test]
    fn test_center_is_90_120() {
        let c = ActuatorPosition::center();
        assert_eq!((c.x(), c.y()), (90, 120));
        assert_eq!(ActuatorPosition::default(), c);
    }

    // ── Projection ────────────────────────────────────────────────────────────

    #[test]
    fn test_project_without_offset_truncates() {
        // Arrange
        let pos = ActuatorPosition::new(50, 120).unwrap();

        // Act
        let p = project(pos, CalibrationOffset::default(), FrameSize::default());

        // Assert – 50/180*1280 = 355.55…, 120/180*720 = 480
        assert_eq!(p, ScreenPoint::new(355, 480));
    }

    #[test]
    fn test_project_applies_offset_twice() {
        let pos = ActuatorPosition::new(90, 90).unwrap();
        let p = project(pos, CalibrationOffset::new(3, -5), FrameSize::default());
        assert_eq!(p, ScreenPoint::new(640 + 6, 360 - 10));
    }

    #[test]
    fn test_project_maps_full_pan_to_frame_width() {
        let pos = ActuatorPosition::new(X_MAX, Y_MAX).unwrap();
        let p = project(pos, CalibrationOffset::default(), FrameSize::default());
        assert_eq!(p, ScreenPoint::new(FRAME_WIDTH, FRAME_HEIGHT));
    }

    #[test]
    fn test_project_scales_with_frame_size() {
        // Arrange
        let frame = FrameSize::new(640, 480);
        let pos = ActuatorPosition::new(150, 170).unwrap();

        // Act
        let p = project(pos, CalibrationOffset::default(), frame);

        // Assert – 150/180*640 = 533.3…, 170/180*480 = 453.3…
        assert_eq!(p, ScreenPoint::new(533, 453));
        assert_eq!(
            project(ActuatorPosition::new(X_MAX, Y_MAX).unwrap(), CalibrationOffset::default(), frame),
            ScreenPoint::new(640, 480)
        );
    }

    // ── Calibration ───────────────────────────────────────────────────────────

    #[test]
    fn test_nudges_move_offset_one_unit() {
        let o = CalibrationOffset::default();
        assert_eq!(o.nudged(NudgeDirection::Up), CalibrationOffset::new(0, -1));
        assert_eq!(o.nudged(NudgeDirection::Down), CalibrationOffset::new(0, 1));
        assert_eq!(o.nudged(NudgeDirection::Right), CalibrationOffset::new(1, 0));
        assert_eq!(o.nudged(NudgeDirection::Left), CalibrationOffset::new(-1, 0));
    }

    // ── AvoidZone ─────────────────────────────────────────────────────────────

    #[test]
    fn test_avoid_zone_rejects_inverted_corners() {
        assert_eq!(
            AvoidZone::new(10, 0, 5, 5),
            Err(ZoneError::Inverted {
                x1: 10,
                y1: 0,
                x2: 5,
                y2: 5
            })
        );
        assert!(AvoidZone::new(0, 10, 5, 5).is_err());
    }

    #[test]
    fn test_avoid_zone_allows_degenerate_rectangle() {
        let zone = AvoidZone::new(7, 7, 7, 7).unwrap();
        assert!(zone.contains(ScreenPoint::new(7, 7)));
    }

    #[test]
    fn test_avoid_zone_edges_count_as_inside() {
        let zone = AvoidZone::new(100, 100, 300, 300).unwrap();
        assert!(zone.contains(ScreenPoint::new(100, 100)));
        assert!(zone.contains(ScreenPoint::new(300, 300)));
        assert!(zone.contains(ScreenPoint::new(200, 300)));
        assert!(!zone.contains(ScreenPoint::new(301, 200)));
        assert!(!zone.contains(ScreenPoint::new(200, 99)));
    }

    #[test]
    fn test_full_frame_zone_contains_every_projected_point() {
        let frame = FrameSize::new(640, 480);
        let zone = AvoidZone::full_frame(frame);
        for x in X_MIN..=X_MAX {
            for y in TARGET_Y_MIN..=Y_MAX {
                let p = project(
                    ActuatorPosition::new(x, y).unwrap(),
                    CalibrationOffset::default(),
                    frame,
                );
                assert!(zone.contains(p), "({x},{y}) projected to {p} outside frame");
            }
        }
    }

    #[test]
    fn test_fallback_target_is_both_centres() {
        let t = Target::fallback(FrameSize::default());
        assert_eq!(t.actuator, ActuatorPosition::center());
        assert_eq!(t.screen, ScreenPoint::new(640, 360));
        assert_eq!(
            Target::fallback(FrameSize::new(640, 480)).screen,
            ScreenPoint::new(320, 240)
        );
    }
}
