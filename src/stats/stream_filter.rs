//! Running median over the most recent raw measurements.

use super::OrderedStatisticTree;

/// Median filter over the last `length` values.
///
/// Each value is stored in an [`OrderedStatisticTree`] labelled with its
/// ring position, so the value it overwrites is removed by label in the same
/// step. Before the first push, and for non-finite input, the filter keeps
/// reporting its previous (or default) value.
#[derive(Debug, Clone)]
pub struct StreamFilter {
    length: usize,
    default_value: f64,
    last_raw: f64,
    clean: f64,
    position: usize,
    window: OrderedStatisticTree<usize>,
}

impl StreamFilter {
    pub fn new(length: usize, default_value: f64) -> Self {
        Self {
            length,
            default_value,
            last_raw: default_value,
            clean: default_value,
            position: 0,
            window: OrderedStatisticTree::new(),
        }
    }

    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.last_raw = value;
        if self.length == 0 {
            self.clean = value;
            return;
        }
        self.position = (self.position + 1) % self.length;
        self.window.remove(&self.position);
        self.window.push(self.position, value);
        self.clean = self.window.median();
    }

    /// Last accepted raw value.
    pub fn raw(&self) -> f64 {
        self.last_raw
    }

    /// Median of the window.
    pub fn clean(&self) -> f64 {
        self.clean
    }

    /// Whether at least one real measurement backs [`clean`](Self::clean).
    pub fn is_reliable(&self) -> bool {
        self.length == 0 || !self.window.is_empty()
    }

    pub fn reset(&mut self) {
        self.last_raw = self.default_value;
        self.clean = self.default_value;
        self.position = 0;
        self.window.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_before_push() {
        let filter = StreamFilter::new(3, 0.5);
        assert_eq!(filter.clean(), 0.5);
        assert_eq!(filter.raw(), 0.5);
    }

    #[test]
    fn test_median_rejects_spike() {
        let mut filter = StreamFilter::new(3, 0.0);
        filter.push(0.010);
        filter.push(0.250);
        filter.push(0.011);
        assert_eq!(filter.raw(), 0.011);
        assert_eq!(filter.clean(), 0.011);
    }

    #[test]
    fn test_window_overwrites_oldest() {
        let mut filter = StreamFilter::new(3, 0.0);
        for v in [1.0, 2.0, 3.0, 10.0, 11.0] {
            filter.push(v);
        }
        // Window now holds 3, 10, 11
        assert_eq!(filter.clean(), 10.0);
    }

    #[test]
    fn test_non_finite_is_ignored() {
        let mut filter = StreamFilter::new(3, 0.0);
        filter.push(4.0);
        filter.push(f64::NAN);
        filter.push(f64::INFINITY);
        assert_eq!(filter.raw(), 4.0);
        assert_eq!(filter.clean(), 4.0);
    }

    #[test]
    fn test_zero_length_passes_through() {
        let mut filter = StreamFilter::new(0, 1.0);
        filter.push(7.0);
        assert_eq!(filter.clean(), 7.0);
        assert!(filter.is_reliable());
    }

    #[test]
    fn test_reset() {
        let mut filter = StreamFilter::new(2, 0.3);
        filter.push(9.0);
        filter.reset();
        assert_eq!(filter.clean(), 0.3);
        assert!(!filter.is_reliable());
    }
}
