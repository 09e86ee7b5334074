use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch plus the nanosecond remainder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(at: SystemTime) -> Self {
        match at.duration_since(UNIX_EPOCH) {
            Ok(elapsed) => Self {
                seconds: elapsed.as_secs() as i64,
                nanos: elapsed.subsec_nanos() as i32,
            },
            Err(_) => Self::default(),
        }
    }
}

/// A point-in-time GPS fix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "long")]
    pub longitude: f64,
    #[serde(default)]
    pub horizontal_accuracy: f64,
    #[serde(default)]
    pub vertical_accuracy: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub course: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }

    /// A fix taken now.
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude).with_timestamp(Timestamp::now())
    }

    pub fn with_accuracy(mut self, horizontal: f64, vertical: f64) -> Self {
        self.horizontal_accuracy = horizontal;
        self.vertical_accuracy = vertical;
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    pub fn with_motion(mut self, course: f64, speed: f64) -> Self {
        self.course = course;
        self.speed = speed;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn timestamp_keeps_nanosecond_remainder() {
        let at = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        let ts = Timestamp::from_system_time(at);
        assert_eq!(ts.seconds, 1_700_000_000);
        assert_eq!(ts.nanos, 123_456_789);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let loc = Location::new(37.459609, -122.149349)
            .with_accuracy(5.0, 20.0)
            .with_altitude(100.0)
            .with_motion(0.0, 2.0)
            .with_timestamp(Timestamp {
                seconds: 10,
                nanos: 20,
            });
        let value = serde_json::to_value(loc).expect("serialize");
        assert_eq!(value["lat"], 37.459609);
        assert_eq!(value["long"], -122.149349);
        assert_eq!(value["horizontal_accuracy"], 5.0);
        assert_eq!(value["vertical_accuracy"], 20.0);
        assert_eq!(value["speed"], 2.0);
        assert_eq!(value["timestamp"]["seconds"], 10);
        assert_eq!(value["timestamp"]["nanos"], 20);
    }
}
