//! Fixed-length moving average with correctable newest slot.

use std::collections::VecDeque;

/// Unweighted mean over exactly `length` slots, prefilled with `init_value`.
///
/// Until `length` real values have been pushed the average is pulled
/// towards `init_value`. [`replace_last_pushed_value`](Self::replace_last_pushed_value)
/// overwrites the newest slot without shifting, for provisional values that
/// get finalised before the next measurement.
#[derive(Debug, Clone)]
pub struct MovingAverager {
    init_value: f64,
    slots: VecDeque<f64>,
}

impl MovingAverager {
    /// `length` is clamped to at least 1.
    pub fn new(length: usize, init_value: f64) -> Self {
        let length = length.max(1);
        Self {
            init_value,
            slots: std::iter::repeat(init_value).take(length).collect(),
        }
    }

    pub fn push_value(&mut self, value: f64) {
        self.slots.pop_back();
        self.slots.push_front(value);
    }

    pub fn replace_last_pushed_value(&mut self, value: f64) {
        if let Some(newest) = self.slots.front_mut() {
            *newest = value;
        }
    }

    pub fn moving_average(&self) -> f64 {
        self.slots.iter().sum::<f64>() / self.slots.len() as f64
    }

    /// Newest slot (the init value before any push).
    pub fn last_pushed_value(&self) -> f64 {
        self.slots.front().copied().unwrap_or(self.init_value)
    }

    pub fn length(&self) -> usize {
        self.slots.len()
    }

    pub fn reset(&mut self) {
        let init = self.init_value;
        self.slots.iter_mut().for_each(|slot| *slot = init);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefilled_before_push() {
        let averager = MovingAverager::new(2, 3.0);
        assert_eq!(averager.moving_average(), 3.0);
    }

    #[test]
    fn test_push_shifts_window() {
        let mut averager = MovingAverager::new(2, 3.0);
        averager.push_value(9.0);
        averager.push_value(4.0);
        assert_eq!(averager.moving_average(), 6.5);
    }

    #[test]
    fn test_prefill_bias_until_populated() {
        let mut averager = MovingAverager::new(4, 0.0);
        averager.push_value(8.0);
        assert_eq!(averager.moving_average(), 2.0);
    }

    #[test]
    fn test_replace_last_pushed_value() {
        let mut averager = MovingAverager::new(2, 3.0);
        averager.push_value(9.0);
        averager.push_value(5.0);
        averager.replace_last_pushed_value(12.0);
        assert_eq!(averager.moving_average(), 10.5);
        assert_eq!(averager.last_pushed_value(), 12.0);
    }

    #[test]
    fn test_reset_refills() {
        let mut averager = MovingAverager::new(3, 1.0);
        averager.push_value(10.0);
        averager.reset();
        assert_eq!(averager.moving_average(), 1.0);
        assert_eq!(averager.length(), 3);
    }
}
