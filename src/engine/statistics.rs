//! Session statistics: stroke events in, smoothed metrics out.

use super::{Rower, RowerEvent, StrokeSummary};
use crate::config::{defaults, MonitorConfig};
use crate::stats::{MovingAverager, MovingIntervalAverager, WeightedAverager};
use crate::types::{HeartRateMeasurement, Metrics, SessionState};

/// Calories of one stroke: `(4·P + 350) · duration / 4200` kcal.
pub fn stroke_calories(power: f64, stroke_duration: f64) -> f64 {
    (4.0 * power + 350.0) * stroke_duration / 4200.0
}

/// Moving average seeded with its first value instead of a fixed prefill,
/// so early strokes are not pulled towards zero.
#[derive(Debug, Clone)]
struct SeededAverager {
    length: usize,
    pushes: usize,
    inner: Option<MovingAverager>,
}

impl SeededAverager {
    fn new(length: usize) -> Self {
        Self {
            length,
            pushes: 0,
            inner: None,
        }
    }

    fn push_value(&mut self, value: f64) {
        self.pushes += 1;
        if let Some(averager) = self.inner.as_mut() {
            averager.push_value(value);
        } else {
            self.inner = Some(MovingAverager::new(self.length, value));
        }
    }

    /// Correcting the seed re-seeds every slot.
    fn replace_last_pushed_value(&mut self, value: f64) {
        if self.pushes > 1 {
            if let Some(averager) = self.inner.as_mut() {
                averager.replace_last_pushed_value(value);
                return;
            }
        }
        self.pushes = 1;
        self.inner = Some(MovingAverager::new(self.length, value));
    }

    fn average(&self) -> Option<f64> {
        self.inner.as_ref().map(MovingAverager::moving_average)
    }

    fn reset(&mut self) {
        self.pushes = 0;
        self.inner = None;
    }
}

#[derive(Debug, Clone)]
pub struct RowingStatistics {
    power: WeightedAverager,
    stroke_duration: SeededAverager,
    stroke_distance: SeededAverager,
    calories_per_minute: MovingIntervalAverager,
    calories_per_hour: MovingIntervalAverager,
    calories_total: f64,
    strokes_total: u32,
    session_state: SessionState,
    heart_rate: HeartRateMeasurement,
}

impl RowingStatistics {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            power: WeightedAverager::new(config.smoothing.power_smoothing),
            stroke_duration: SeededAverager::new(config.smoothing.stroke_smoothing),
            stroke_distance: SeededAverager::new(config.smoothing.stroke_smoothing),
            calories_per_minute: MovingIntervalAverager::new(defaults::CALORIES_MINUTE_WINDOW_SECS),
            calories_per_hour: MovingIntervalAverager::new(defaults::CALORIES_HOUR_WINDOW_SECS),
            calories_total: 0.0,
            strokes_total: 0,
            session_state: SessionState::WaitingForStart,
            heart_rate: HeartRateMeasurement::default(),
        }
    }

    pub fn handle_event(&mut self, event: &RowerEvent) {
        match event {
            RowerEvent::DriveStarted | RowerEvent::Resumed => {
                self.session_state = SessionState::Rowing;
            }
            RowerEvent::DriveFinished(drive) => {
                // Provisional until the recovery completes
                self.stroke_duration.push_value(drive.stroke_duration);
            }
            RowerEvent::RecoveryFinished(stroke) => self.complete_stroke(stroke),
            RowerEvent::Paused => {
                self.session_state = SessionState::Paused;
            }
        }
    }

    fn complete_stroke(&mut self, stroke: &StrokeSummary) {
        self.stroke_duration.replace_last_pushed_value(stroke.stroke_duration);
        self.stroke_distance.push_value(stroke.distance);
        self.power.push_value(stroke.power);
        self.strokes_total = stroke.stroke_number;

        let calories = stroke_calories(stroke.power, stroke.stroke_duration);
        self.calories_total += calories;
        self.calories_per_minute.push_value(calories, stroke.stroke_duration);
        self.calories_per_hour.push_value(calories, stroke.stroke_duration);
    }

    pub fn update_heart_rate(&mut self, measurement: HeartRateMeasurement) {
        self.heart_rate = measurement;
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    pub fn strokes_total(&self) -> u32 {
        self.strokes_total
    }

    /// Snapshot of the session. Until the first drive only heart-rate
    /// fields are present.
    pub fn metrics(&self, rower: &Rower) -> Metrics {
        let mut metrics = Metrics::default();
        metrics.merge_heart_rate(&self.heart_rate);
        if self.session_state == SessionState::WaitingForStart {
            return metrics;
        }

        metrics.strokes_total = Some(self.strokes_total);
        metrics.distance_total = Some(rower.distance_total());
        metrics.duration_total = Some(rower.moving_time());
        metrics.drag_factor = Some(rower.flywheel().drag_factor());
        metrics.stroke_state = Some(rower.state());
        metrics.session_state = Some(self.session_state);
        metrics.calories_total = Some(self.calories_total);

        if self.strokes_total == 0 {
            return metrics;
        }

        let duration = self.stroke_duration.average().filter(|d| *d > 0.0);
        let distance = self.stroke_distance.average();
        metrics.strokes_per_minute = duration.map(|d| 60.0 / d);
        metrics.power = Some(self.power.weighted_average());
        metrics.speed = duration.zip(distance).map(|(t, d)| d / t);
        metrics.pace = metrics.speed.filter(|v| *v > 0.0).map(|v| 500.0 / v);
        metrics.calories_per_minute = Some(self.calories_per_minute.average());
        metrics.calories_per_hour = Some(self.calories_per_hour.average());
        metrics
    }

    /// Forget the session. Heart-rate values are kept.
    pub fn reset(&mut self) {
        self.power.reset();
        self.stroke_duration.reset();
        self.stroke_distance.reset();
        self.calories_per_minute.reset();
        self.calories_per_hour.reset();
        self.calories_total = 0.0;
        self.strokes_total = 0;
        self.session_state = SessionState::WaitingForStart;
    }
}
