//! Robust streaming statistics.
//!
//! Bounded-memory building blocks that turn a live sequence of noisy
//! measurements into stable summary values:
//!
//! - [`OrderedStatisticTree`]: labelled order-statistic tree (median, rank,
//!   threshold counts)
//! - [`RobustQuadraticEstimator`] / [`RobustLinearEstimator`]: Theil–Sen
//!   regression over a small sliding window
//! - [`WeightedAverager`], [`MovingIntervalAverager`], [`MovingAverager`]:
//!   recency-weighted, time-windowed and fixed-length averages
//! - [`StreamFilter`]: running median of raw input
//!
//! Everything here is synchronous and allocation-bounded by the configured
//! capacities. Empty structures answer queries with `0` (or `None` where a
//! position is asked for) rather than erroring.

mod interval;
mod moving;
mod ordered_tree;
mod regression;
mod stream_filter;
mod weighted;

pub use interval::MovingIntervalAverager;
pub use moving::MovingAverager;
pub use ordered_tree::OrderedStatisticTree;
pub use regression::{RobustLinearEstimator, RobustQuadraticEstimator};
pub use stream_filter::StreamFilter;
pub use weighted::WeightedAverager;
