//! Core state types: StrokeState, SessionState, HeartRateMeasurement

use serde::{Deserialize, Serialize};

// ============================================================================
// Stroke Phase
// ============================================================================

/// Phase of the stroke cycle as seen from the flywheel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "camelCase")]
pub enum StrokeState {
    /// Flywheel idle or coasting before the first stroke
    #[default]
    WaitingForDrive,
    /// Handle is being pulled, flywheel accelerating
    Drive,
    /// Handle returning, flywheel decelerating under drag only
    Recovery,
    /// Flywheel spun down or a phase took too long
    Stopped,
}

impl StrokeState {
    /// Drive or recovery.
    pub fn is_rowing(&self) -> bool {
        matches!(self, StrokeState::Drive | StrokeState::Recovery)
    }
}

impl std::fmt::Display for StrokeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrokeState::WaitingForDrive => write!(f, "Waiting For Drive"),
            StrokeState::Drive => write!(f, "Drive"),
            StrokeState::Recovery => write!(f, "Recovery"),
            StrokeState::Stopped => write!(f, "Stopped"),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Nothing rowed since start or the last reset
    #[default]
    WaitingForStart,
    Rowing,
    Paused,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::WaitingForStart => write!(f, "Waiting For Start"),
            SessionState::Rowing => write!(f, "Rowing"),
            SessionState::Paused => write!(f, "Paused"),
        }
    }
}

// ============================================================================
// Heart Rate
// ============================================================================

/// One reading from a heart-rate strap (BLE or ANT+ bridge).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateMeasurement {
    /// Beats per minute
    pub heartrate: Option<u16>,
    /// Strap battery level (%)
    pub battery_level: Option<u8>,
}
