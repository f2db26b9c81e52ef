//! Time-windowed moving total.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy)]
struct IntervalPoint {
    value: f64,
    duration: f64,
}

/// Sums values over a physical time window and reports the total the
/// window would hold if it was exactly `moving_duration` long.
///
/// Example: calories burned per stroke, pushed with the stroke duration,
/// into a 60 s averager yields calories per minute even while less than a
/// minute of strokes has been observed.
#[derive(Debug, Clone)]
pub struct MovingIntervalAverager {
    moving_duration: f64,
    data_points: VecDeque<IntervalPoint>,
    sum: f64,
    duration: f64,
}

impl MovingIntervalAverager {
    pub fn new(moving_duration: f64) -> Self {
        Self {
            moving_duration,
            data_points: VecDeque::new(),
            sum: 0.0,
            duration: 0.0,
        }
    }

    pub fn push_value(&mut self, value: f64, duration: f64) {
        self.data_points.push_front(IntervalPoint { value, duration });
        self.sum += value;
        self.duration += duration;
        while self.duration > self.moving_duration {
            let Some(removed) = self.data_points.pop_back() else {
                break;
            };
            self.sum -= removed.value;
            self.duration -= removed.duration;
        }
        if self.data_points.is_empty() {
            self.sum = 0.0;
            self.duration = 0.0;
        }
    }

    /// `sum / duration · moving_duration`, or 0 before any duration is seen.
    pub fn average(&self) -> f64 {
        if self.duration > 0.0 {
            self.sum / self.duration * self.moving_duration
        } else {
            0.0
        }
    }

    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    pub fn reset(&mut self) {
        self.data_points.clear();
        self.sum = 0.0;
        self.duration = 0.0;
    }
}
