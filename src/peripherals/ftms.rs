//! Fitness Machine Service (FTMS) payload encoders.
//!
//! All multi-byte fields are little-endian. Values are rounded and
//! saturated to their field width.

use crate::types::Metrics;

pub const ROWER_DATA_LEN: usize = 18;
pub const INDOOR_BIKE_DATA_LEN: usize = 15;
pub const FEATURE_LEN: usize = 8;

/// Rower Data flags: stroke rate and count present, plus total distance,
/// instantaneous pace, power and expended energy.
const ROWER_DATA_FLAGS: [u8; 2] = [0x2C, 0x01];

/// Indoor Bike Data flags: instantaneous speed present, plus total
/// distance, power and expended energy.
const INDOOR_BIKE_DATA_FLAGS: [u8; 2] = [0x50, 0x01];

// Fitness Machine Feature bits (first 32-bit field)
const FEATURE_CADENCE: u32 = 1 << 1;
const FEATURE_TOTAL_DISTANCE: u32 = 1 << 2;
const FEATURE_PACE: u32 = 1 << 5;
const FEATURE_EXPENDED_ENERGY: u32 = 1 << 9;
const FEATURE_POWER_MEASUREMENT: u32 = 1 << 14;

/// Energy fields the monitor does not report.
const ENERGY_PER_HOUR_UNAVAILABLE: u16 = 0xFFFF;
const ENERGY_PER_MINUTE_UNAVAILABLE: u8 = 0xFF;

/// GATT characteristics the monitor writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Characteristic {
    RowerData,
    IndoorBikeData,
    FitnessMachineFeature,
    FitnessMachineStatus,
}

impl Characteristic {
    /// Assigned 16-bit UUID.
    pub fn uuid16(&self) -> u16 {
        match self {
            Characteristic::RowerData => 0x2AD1,
            Characteristic::IndoorBikeData => 0x2AD2,
            Characteristic::FitnessMachineFeature => 0x2ACC,
            Characteristic::FitnessMachineStatus => 0x2ADA,
        }
    }
}

impl std::fmt::Display for Characteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Characteristic::RowerData => write!(f, "Rower Data"),
            Characteristic::IndoorBikeData => write!(f, "Indoor Bike Data"),
            Characteristic::FitnessMachineFeature => write!(f, "Fitness Machine Feature"),
            Characteristic::FitnessMachineStatus => write!(f, "Fitness Machine Status"),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusOpcode {
    Reset = 0x01,
    StoppedOrPausedByUser = 0x02,
    StartedOrResumedByUser = 0x04,
}

/// Status notifications the monitor emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineStatus {
    Reset,
    Stopped,
    Paused,
    StartedOrResumed,
}

impl MachineStatus {
    pub fn opcode(&self) -> StatusOpcode {
        match self {
            MachineStatus::Reset => StatusOpcode::Reset,
            MachineStatus::Stopped | MachineStatus::Paused => StatusOpcode::StoppedOrPausedByUser,
            MachineStatus::StartedOrResumed => StatusOpcode::StartedOrResumedByUser,
        }
    }

    /// `[opcode, parameter]`
    pub fn encode(&self) -> [u8; 2] {
        let parameter = match self {
            MachineStatus::Stopped => 0x01,
            MachineStatus::Paused => 0x02,
            MachineStatus::Reset | MachineStatus::StartedOrResumed => 0x00,
        };
        [self.opcode() as u8, parameter]
    }
}

// ============================================================================
// Field helpers
// ============================================================================

fn saturate(value: f64, max: u32) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let rounded = value.round();
    if rounded >= f64::from(max) {
        max
    } else {
        rounded as u32
    }
}

fn put_u16(buffer: &mut [u8], offset: usize, value: Option<f64>) {
    if let Some(v) = value {
        let v = saturate(v, u32::from(u16::MAX)) as u16;
        buffer[offset..offset + 2].copy_from_slice(&v.to_le_bytes());
    }
}

fn put_u24(buffer: &mut [u8], offset: usize, value: Option<f64>) {
    if let Some(v) = value {
        let v = saturate(v, 0x00FF_FFFF);
        buffer[offset..offset + 3].copy_from_slice(&v.to_le_bytes()[..3]);
    }
}

// ============================================================================
// Data characteristics
// ============================================================================

/// Rower Data payload, or `None` when stroke rate or stroke count is
/// missing or zero.
pub fn encode_rower_data(metrics: &Metrics) -> Option<[u8; ROWER_DATA_LEN]> {
    let spm = metrics.strokes_per_minute.filter(|v| v.is_finite() && *v > 0.0)?;
    let strokes = metrics.strokes_total.filter(|n| *n > 0)?;

    let mut buffer = [0u8; ROWER_DATA_LEN];
    buffer[..2].copy_from_slice(&ROWER_DATA_FLAGS);
    // Stroke rate has a resolution of 0.5 strokes per minute
    buffer[2] = saturate(spm * 2.0, u32::from(u8::MAX)) as u8;
    put_u16(&mut buffer, 3, Some(f64::from(strokes)));
    put_u24(&mut buffer, 5, metrics.distance_total);
    put_u16(&mut buffer, 8, metrics.pace);
    put_u16(&mut buffer, 10, metrics.power);
    put_u16(&mut buffer, 12, metrics.calories_total);
    buffer[14..16].copy_from_slice(&ENERGY_PER_HOUR_UNAVAILABLE.to_le_bytes());
    buffer[16] = ENERGY_PER_MINUTE_UNAVAILABLE;
    Some(buffer)
}

/// Indoor Bike Data payload, or `None` without a speed.
pub fn encode_indoor_bike_data(metrics: &Metrics) -> Option<[u8; INDOOR_BIKE_DATA_LEN]> {
    let speed_kmh = metrics.speed_kmh().filter(|v| v.is_finite())?;

    let mut buffer = [0u8; INDOOR_BIKE_DATA_LEN];
    buffer[..2].copy_from_slice(&INDOOR_BIKE_DATA_FLAGS);
    put_u16(&mut buffer, 2, Some(speed_kmh * 100.0));
    put_u24(&mut buffer, 4, metrics.distance_total);
    put_u16(&mut buffer, 7, metrics.power);
    put_u16(&mut buffer, 9, metrics.calories_total);
    buffer[11..13].copy_from_slice(&ENERGY_PER_HOUR_UNAVAILABLE.to_le_bytes());
    buffer[13] = ENERGY_PER_MINUTE_UNAVAILABLE;
    Some(buffer)
}

fn encode_features(machine_features: u32) -> [u8; FEATURE_LEN] {
    let mut buffer = [0u8; FEATURE_LEN];
    buffer[..4].copy_from_slice(&machine_features.to_le_bytes());
    // Target setting features (second field) stay zero
    buffer
}

pub fn rower_features() -> [u8; FEATURE_LEN] {
    encode_features(
        FEATURE_CADENCE
            | FEATURE_TOTAL_DISTANCE
            | FEATURE_PACE
            | FEATURE_EXPENDED_ENERGY
            | FEATURE_POWER_MEASUREMENT,
    )
}

pub fn indoor_bike_features() -> [u8; FEATURE_LEN] {
    encode_features(FEATURE_TOTAL_DISTANCE | FEATURE_EXPENDED_ENERGY | FEATURE_POWER_MEASUREMENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rowing_metrics() -> Metrics {
        Metrics {
            strokes_per_minute: Some(24.5),
            strokes_total: Some(300),
            distance_total: Some(70_000.4),
            pace: Some(125.2),
            power: Some(180.0),
            calories_total: Some(512.6),
            speed: Some(4.0),
            ..Metrics::default()
        }
    }

    #[test]
    fn test_rower_data_layout() {
        let buffer = encode_rower_data(&rowing_metrics()).unwrap();
        assert_eq!(
            buffer,
            [
                0x2C, 0x01, // flags
                49,   // 24.5 spm at 0.5 resolution
                0x2C, 0x01, // 300 strokes
                0x70, 0x11, 0x01, // 70000 m
                125, 0, // pace
                180, 0, // power
                0x01, 0x02, // 513 kcal
                0xFF, 0xFF, 0xFF, // energy per hour / minute unavailable
                0x00,
            ]
        );
    }

    #[test]
    fn test_rower_data_suppressed_without_strokes() {
        let mut metrics = rowing_metrics();
        metrics.strokes_total = Some(0);
        assert!(encode_rower_data(&metrics).is_none());
        metrics.strokes_total = None;
        assert!(encode_rower_data(&metrics).is_none());

        let mut metrics = rowing_metrics();
        metrics.strokes_per_minute = None;
        assert!(encode_rower_data(&metrics).is_none());
    }

    #[test]
    fn test_rower_data_missing_optionals_are_zero() {
        let metrics = Metrics {
            strokes_per_minute: Some(20.0),
            strokes_total: Some(1),
            ..Metrics::default()
        };
        let buffer = encode_rower_data(&metrics).unwrap();
        assert_eq!(&buffer[5..14], &[0u8; 9]);
        assert_eq!(&buffer[14..17], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_rower_data_saturates() {
        let metrics = Metrics {
            strokes_per_minute: Some(300.0),
            strokes_total: Some(70_000),
            distance_total: Some(1e9),
            ..Metrics::default()
        };
        let buffer = encode_rower_data(&metrics).unwrap();
        assert_eq!(buffer[2], 0xFF);
        assert_eq!(&buffer[3..5], &[0xFF, 0xFF]);
        assert_eq!(&buffer[5..8], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_indoor_bike_data_layout() {
        let buffer = encode_indoor_bike_data(&rowing_metrics()).unwrap();
        assert_eq!(
            buffer,
            [
                0x50, 0x01, // flags
                0xA0, 0x05, // 1440 = 14.40 km/h
                0x70, 0x11, 0x01, // 70000 m
                180, 0, // power
                0x01, 0x02, // 513 kcal
                0xFF, 0xFF, 0xFF, // energy per hour / minute unavailable
                0x00,
            ]
        );
    }

    #[test]
    fn test_indoor_bike_data_suppressed_without_speed() {
        let mut metrics = rowing_metrics();
        metrics.speed = None;
        assert!(encode_indoor_bike_data(&metrics).is_none());
    }

    #[test]
    fn test_features() {
        assert_eq!(rower_features(), [0x26, 0x42, 0, 0, 0, 0, 0, 0]);
        assert_eq!(indoor_bike_features(), [0x04, 0x42, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_status_payloads() {
        assert_eq!(MachineStatus::Reset.encode(), [0x01, 0x00]);
        assert_eq!(MachineStatus::Stopped.encode(), [0x02, 0x01]);
        assert_eq!(MachineStatus::Paused.encode(), [0x02, 0x02]);
        assert_eq!(MachineStatus::StartedOrResumed.encode(), [0x04, 0x00]);
    }

    #[test]
    fn test_characteristic_uuids() {
        assert_eq!(Characteristic::RowerData.uuid16(), 0x2AD1);
        assert_eq!(Characteristic::FitnessMachineStatus.uuid16(), 0x2ADA);
    }
}
