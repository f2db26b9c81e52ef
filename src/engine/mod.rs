//! Rowing Engine Module
//!
//! Turns raw impulse intervals into session metrics:
//!
//! - [`Flywheel`]: angular velocity, acceleration, torque and drag factor
//! - [`Rower`]: drive / recovery detection, stroke summaries
//! - [`RowingStatistics`]: smoothing and the published [`Metrics`]
//!
//! One [`RowingEngine`] is owned per impulse stream and driven by `&mut`
//! from the ingestion task. Nothing in here logs above `debug`.

mod flywheel;
mod rower;
mod statistics;

pub use flywheel::Flywheel;
pub use rower::{Rower, RowerEvent, StrokeSummary};
pub use statistics::{stroke_calories, RowingStatistics};

use crate::config::MonitorConfig;
use crate::types::{HeartRateMeasurement, Metrics, SessionState, StrokeState};

#[derive(Debug, Clone)]
pub struct RowingEngine {
    rower: Rower,
    statistics: RowingStatistics,
}

impl RowingEngine {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            rower: Rower::new(&config.rower),
            statistics: RowingStatistics::new(config),
        }
    }

    /// Process the time since the previous impulse (s).
    pub fn handle_impulse(&mut self, dt: f64) -> Option<RowerEvent> {
        let event = self.rower.handle_impulse(dt)?;
        self.statistics.handle_event(&event);
        Some(event)
    }

    pub fn update_heart_rate(&mut self, measurement: HeartRateMeasurement) {
        self.statistics.update_heart_rate(measurement);
    }

    pub fn metrics(&self) -> Metrics {
        self.statistics.metrics(&self.rower)
    }

    pub fn stroke_state(&self) -> StrokeState {
        self.rower.state()
    }

    pub fn session_state(&self) -> SessionState {
        self.statistics.session_state()
    }

    pub fn rower(&self) -> &Rower {
        &self.rower
    }

    /// Start a new session. Heart-rate values survive.
    pub fn reset(&mut self) {
        self.rower.reset();
        self.statistics.reset();
    }
}
