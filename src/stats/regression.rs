//! Theil–Sen robust regression over small sliding windows.
//!
//! Both estimators keep a fixed-capacity window of `(x, y)` points. Every
//! elementary estimate (a pairwise slope, or a second divided difference
//! over a point triple) is stored in an [`OrderedStatisticTree`] under a
//! unique label, owned by the oldest point that took part in it. Since the
//! oldest point of the window is always the one evicted, eviction removes
//! exactly the estimates that involve it and the medians stay incremental.
//!
//! The number of stored estimates grows with `capacity²` (linear) and
//! `capacity³` (quadratic), so every push costs time in proportion to that.
//! Keep windows to a few dozen points.

use std::collections::VecDeque;

use super::OrderedStatisticTree;

/// Median of an unsorted slice. Reorders the slice; returns 0 when empty.
fn median_in_place(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let (_, upper, _) = values.select_nth_unstable_by(n / 2, f64::total_cmp);
    let upper = *upper;
    if n % 2 == 1 {
        return upper;
    }
    // Lower middle is the maximum of the left partition
    let lower = values[..n / 2]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    (lower + upper) / 2.0
}

/// Coefficient of determination of `predict` over `points`, in `[0, 1]`.
fn r_squared<'a, I, F>(points: I, predict: F) -> f64
where
    I: Iterator<Item = &'a WindowPoint> + Clone,
    F: Fn(f64) -> f64,
{
    let n = points.clone().count();
    if n < 2 {
        return 0.0;
    }
    let mean_y = points.clone().map(|p| p.y).sum::<f64>() / n as f64;
    let mut sse = 0.0;
    let mut sst = 0.0;
    for p in points {
        sse += (p.y - predict(p.x)).powi(2);
        sst += (p.y - mean_y).powi(2);
    }
    if sst <= 0.0 {
        return if sse <= 0.0 { 1.0 } else { 0.0 };
    }
    (1.0 - sse / sst).clamp(0.0, 1.0)
}

// ============================================================================
// Shared window bookkeeping
// ============================================================================

#[derive(Debug, Clone)]
struct WindowPoint {
    x: f64,
    y: f64,
    /// Labels of stored estimates in which this point is the oldest member.
    owned: Vec<u64>,
}

#[derive(Debug, Clone)]
struct EstimateWindow {
    capacity: usize,
    points: VecDeque<WindowPoint>,
    estimates: OrderedStatisticTree<u64>,
    next_label: u64,
}

impl EstimateWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
            estimates: OrderedStatisticTree::new(),
            next_label: 0,
        }
    }

    /// Drop the oldest point (and its estimates) if the window is full.
    fn make_room(&mut self) {
        while self.points.len() >= self.capacity {
            let Some(oldest) = self.points.pop_front() else {
                break;
            };
            if !oldest.owned.is_empty() {
                // Labels are handed out in increasing order
                let evicted = oldest.owned;
                self.estimates
                    .retain(|label| evicted.binary_search(label).is_err());
            }
        }
    }

    fn record(&mut self, owner: usize, estimate: f64) {
        if !estimate.is_finite() {
            return;
        }
        let label = self.next_label;
        self.next_label = self.next_label.wrapping_add(1);
        self.estimates.push(label, estimate);
        if let Some(point) = self.points.get_mut(owner) {
            point.owned.push(label);
        }
    }

    fn append(&mut self, x: f64, y: f64) {
        self.points.push_back(WindowPoint {
            x,
            y,
            owned: Vec::new(),
        });
    }

    fn reset(&mut self) {
        self.points.clear();
        self.estimates.reset();
        self.next_label = 0;
    }
}

// ============================================================================
// Linear estimator
// ============================================================================

/// Robust line fit `y = slope·x + intercept` (classic Theil–Sen).
#[derive(Debug, Clone)]
pub struct RobustLinearEstimator {
    window: EstimateWindow,
    slope: f64,
    intercept: f64,
}

impl RobustLinearEstimator {
    /// `capacity` is clamped to at least 2 points.
    pub fn new(capacity: usize) -> Self {
        Self {
            window: EstimateWindow::new(capacity.max(2)),
            slope: 0.0,
            intercept: 0.0,
        }
    }

    pub fn push(&mut self, x: f64, y: f64) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.window.make_room();
        for i in 0..self.window.points.len() {
            let p = &self.window.points[i];
            if p.x != x {
                let slope = (y - p.y) / (x - p.x);
                self.window.record(i, slope);
            }
        }
        self.window.append(x, y);
        self.refit();
    }

    fn refit(&mut self) {
        self.slope = self.window.estimates.median();
        let slope = self.slope;
        let mut intercepts: Vec<f64> = self
            .window
            .points
            .iter()
            .map(|p| p.y - slope * p.x)
            .collect();
        self.intercept = median_in_place(&mut intercepts);
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn project_x(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn goodness_of_fit(&self) -> f64 {
        r_squared(self.window.points.iter(), |x| self.project_x(x))
    }

    pub fn len(&self) -> usize {
        self.window.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.points.is_empty()
    }

    /// At least one slope estimate exists.
    pub fn is_reliable(&self) -> bool {
        !self.window.estimates.is_empty()
    }

    pub fn reset(&mut self) {
        self.window.reset();
        self.slope = 0.0;
        self.intercept = 0.0;
    }
}

// ============================================================================
// Quadratic estimator
// ============================================================================

/// Robust quadratic fit `y = A·x² + B·x + C`.
///
/// - `A`: median of the second divided differences of all point triples
///   with three distinct `x` (maintained incrementally).
/// - `B`: median of pairwise slopes of the residual `y − A·x²`.
/// - `C`: median of `y − A·x² − B·x`.
///
/// With fewer than three distinct `x` values `A` is 0, with fewer than two
/// `B` is 0 as well; the fit degrades to a line and then a constant.
#[derive(Debug, Clone)]
pub struct RobustQuadraticEstimator {
    window: EstimateWindow,
    a: f64,
    b: f64,
    c: f64,
}

impl RobustQuadraticEstimator {
    /// `capacity` is clamped to at least 3 points.
    pub fn new(capacity: usize) -> Self {
        Self {
            window: EstimateWindow::new(capacity.max(3)),
            a: 0.0,
            b: 0.0,
            c: 0.0,
        }
    }

    pub fn push(&mut self, x: f64, y: f64) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.window.make_room();
        let n = self.window.points.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (p1, p2) = (&self.window.points[i], &self.window.points[j]);
                if let Some(a) = second_divided_difference((p1.x, p1.y), (p2.x, p2.y), (x, y)) {
                    self.window.record(i, a);
                }
            }
        }
        self.window.append(x, y);
        self.refit();
    }

    fn refit(&mut self) {
        let points = &self.window.points;
        let a = self.window.estimates.median();

        let mut slopes = Vec::with_capacity(points.len() * points.len().saturating_sub(1) / 2);
        for (i, p) in points.iter().enumerate() {
            for q in points.iter().skip(i + 1) {
                if p.x != q.x {
                    let (rp, rq) = (p.y - a * p.x * p.x, q.y - a * q.x * q.x);
                    slopes.push((rq - rp) / (q.x - p.x));
                }
            }
        }
        let b = median_in_place(&mut slopes);

        let mut offsets: Vec<f64> = points
            .iter()
            .map(|p| p.y - a * p.x * p.x - b * p.x)
            .collect();
        let c = median_in_place(&mut offsets);

        self.a = a;
        self.b = b;
        self.c = c;
    }

    pub fn coefficient_a(&self) -> f64 {
        self.a
    }

    pub fn coefficient_b(&self) -> f64 {
        self.b
    }

    pub fn coefficient_c(&self) -> f64 {
        self.c
    }

    pub fn project_x(&self, x: f64) -> f64 {
        self.a * x * x + self.b * x + self.c
    }

    /// Slope of the fitted curve at `x`.
    pub fn first_derivative_at(&self, x: f64) -> f64 {
        2.0 * self.a * x + self.b
    }

    pub fn second_derivative(&self) -> f64 {
        2.0 * self.a
    }

    pub fn goodness_of_fit(&self) -> f64 {
        r_squared(self.window.points.iter(), |x| self.project_x(x))
    }

    pub fn len(&self) -> usize {
        self.window.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.points.is_empty()
    }

    /// At least one triple estimate exists, i.e. three distinct `x`.
    pub fn is_reliable(&self) -> bool {
        !self.window.estimates.is_empty()
    }

    pub fn reset(&mut self) {
        self.window.reset();
        self.a = 0.0;
        self.b = 0.0;
        self.c = 0.0;
    }
}

/// Leading coefficient of the parabola through three points, or `None` when
/// two of them share an `x`.
fn second_divided_difference(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) -> Option<f64> {
    let ((x1, y1), (x2, y2), (x3, y3)) = (p1, p2, p3);
    if x1 == x2 || x1 == x3 || x2 == x3 {
        return None;
    }
    let first = (y2 - y1) / (x2 - x1);
    let second = (y3 - y2) / (x3 - x2);
    Some((second - first) / (x3 - x1))
}
