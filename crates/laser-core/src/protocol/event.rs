//! The movement event published for every command the actuator accepted.
//!
//! # Wire format
//!
//! ```json
//! {"movimento_num": 17, "x_pos": 102, "y_pos": 131, "ts": 1718035200.125}
//! ```
//!
//! Downstream consumers (the persistence service, dashboards) key on these
//! exact field names, so the Rust field names are mapped with
//! `#[serde(rename = "...")]` rather than changed on the wire.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::domain::geometry::ActuatorPosition;

/// Record of one successfully written actuator command.
///
/// Immutable once built; ownership passes to the publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementEvent {
    /// 1-based, gap-free movement number.
    #[serde(rename = "movimento_num")]
    pub sequence: u64,
    /// Pan angle that was written.
    #[serde(rename = "x_pos")]
    pub x: i32,
    /// Tilt angle that was written.
    #[serde(rename = "y_pos")]
    pub y: i32,
    /// Seconds since the Unix epoch when the event was built.
    #[serde(rename = "ts")]
    pub timestamp: f64,
}

impl MovementEvent {
    pub fn new(sequence: u64, position: ActuatorPosition, timestamp: f64) -> Self {
        Self {
            sequence,
            x: position.x(),
            y: position.y(),
            timestamp,
        }
    }

    /// Builds an event stamped with the current wall-clock time.
    pub fn now(sequence: u64, position: ActuatorPosition) -> Self {
        Self::new(sequence, position, unix_timestamp(SystemTime::now()))
    }

    /// JSON encoding used on the event stream.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Seconds since the Unix epoch as a float; clocks set before 1970 read as 0.
pub fn unix_timestamp(at: SystemTime) -> f64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_event_serializes_with_wire_field_names() {
        // Arrange
        let ev = MovementEvent::new(3, ActuatorPosition::new(100, 130).unwrap(), 1.5);

        // Act
        let value: serde_json::Value =
            serde_json::from_str(&ev.to_json().unwrap()).expect("valid JSON");

        // Assert
        assert_eq!(value["movimento_num"], 3);
        assert_eq!(value["x_pos"], 100);
        assert_eq!(value["y_pos"], 130);
        assert_eq!(value["ts"], 1.5);
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_event_deserializes_consumer_payload() {
        let json = r#"{"movimento_num": 9, "x_pos": 1, "y_pos": 61, "ts": 1700000000.25}"#;
        let ev: MovementEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ev.sequence, 9);
        assert_eq!((ev.x, ev.y), (1, 61));
        assert_eq!(ev.timestamp, 1_700_000_000.25);
    }

    #[test]
    fn test_unix_timestamp_has_subsecond_precision() {
        let at = UNIX_EPOCH + Duration::from_millis(2_500);
        assert_eq!(unix_timestamp(at), 2.5);
    }

    #[test]
    fn test_now_uses_current_time() {
        let before = unix_timestamp(SystemTime::now());
        let ev = MovementEvent::now(1, ActuatorPosition::center());
        assert!(ev.timestamp >= before);
    }
}
