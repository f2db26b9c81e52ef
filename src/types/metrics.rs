//! Metrics snapshot published to peripherals and the local feed

use serde::{Deserialize, Serialize};

use super::{HeartRateMeasurement, SessionState, StrokeState};

/// Point-in-time view of a rowing session.
///
/// Every field is optional: a value is `None` until the engine can back it
/// with measurements, and absent fields are omitted from the JSON feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strokes_total: Option<u32>,
    /// Metres
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_total: Option<f64>,
    /// Seconds of active rowing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strokes_per_minute: Option<f64>,
    /// Watts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    /// Seconds per 500 m
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pace: Option<f64>,
    /// Metres per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Kilocalories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_per_minute: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_per_hour: Option<f64>,
    /// N·m·s²
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drag_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_state: Option<StrokeState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<SessionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartrate: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartrate_battery_level: Option<u8>,
}

impl Metrics {
    /// Copy carrying only the heart-rate fields (the payload after a reset).
    pub fn heart_rate_only(&self) -> Self {
        Self {
            heartrate: self.heartrate,
            heartrate_battery_level: self.heartrate_battery_level,
            ..Self::default()
        }
    }

    /// Overwrite the heart-rate fields with a new reading.
    pub fn merge_heart_rate(&mut self, measurement: &HeartRateMeasurement) {
        self.heartrate = measurement.heartrate;
        self.heartrate_battery_level = measurement.battery_level;
    }

    /// Speed in km/h, as used by the indoor bike profile.
    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed.map(|mps| mps * 3.6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Metrics {
        Metrics {
            strokes_total: Some(12),
            distance_total: Some(104.5),
            power: Some(150.0),
            stroke_state: Some(StrokeState::Recovery),
            heartrate: Some(128),
            heartrate_battery_level: Some(80),
            ..Metrics::default()
        }
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let json = serde_json::to_value(sample()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj["strokesTotal"], 12);
        assert_eq!(obj["strokeState"], "recovery");
        assert!(!obj.contains_key("pace"));
        assert!(!obj.contains_key("caloriesPerHour"));
    }

    #[test]
    fn test_heart_rate_only_payload() {
        let json = serde_json::to_value(sample().heart_rate_only()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["heartrate"], 128);
        assert_eq!(obj["heartrateBatteryLevel"], 80);
    }

    #[test]
    fn test_merge_heart_rate_overwrites() {
        let mut metrics = sample();
        metrics.merge_heart_rate(&HeartRateMeasurement {
            heartrate: Some(150),
            battery_level: None,
        });
        assert_eq!(metrics.heartrate, Some(150));
        assert_eq!(metrics.heartrate_battery_level, None);
        assert_eq!(metrics.strokes_total, Some(12));
    }

    #[test]
    fn test_speed_kmh() {
        let metrics = Metrics {
            speed: Some(5.0),
            ..Metrics::default()
        };
        assert_eq!(metrics.speed_kmh(), Some(18.0));
        assert_eq!(Metrics::default().speed_kmh(), None);
    }
}
