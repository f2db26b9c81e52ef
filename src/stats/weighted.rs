//! Exponentially recency-weighted average over the last N values.

use std::collections::VecDeque;

/// Weighted average where each value counts twice as much as the one
/// pushed before it:
///
/// `Σ 2^(n−1−i)·vᵢ / (2^n − 1)`, with `i = 0` the newest of `n` values.
#[derive(Debug, Clone)]
pub struct WeightedAverager {
    max_num_of_data_points: usize,
    data_points: VecDeque<f64>,
}

impl WeightedAverager {
    /// `max_num_of_data_points` is clamped to at least 1.
    pub fn new(max_num_of_data_points: usize) -> Self {
        let max_num_of_data_points = max_num_of_data_points.max(1);
        Self {
            max_num_of_data_points,
            data_points: VecDeque::with_capacity(max_num_of_data_points),
        }
    }

    pub fn push_value(&mut self, value: f64) {
        self.data_points.push_front(value);
        self.data_points.truncate(self.max_num_of_data_points);
    }

    /// Returns 0 when no value has been pushed.
    pub fn weighted_average(&self) -> f64 {
        let n = self.data_points.len();
        if n == 0 {
            return 0.0;
        }
        // Divided through by 2^(n-1) so long windows cannot overflow
        let mut weight = 1.0;
        let mut weighted_sum = 0.0;
        for value in &self.data_points {
            weighted_sum += value * weight;
            weight /= 2.0;
        }
        let exponent = i32::try_from(n).unwrap_or(i32::MAX).saturating_sub(1);
        weighted_sum / (2.0 - 2.0_f64.powi(-exponent))
    }

    pub fn len(&self) -> usize {
        self.data_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }

    pub fn reset(&mut self) {
        self.data_points.clear();
    }
}
