//! Shared data structures for the rowing monitor
//!
//! - [`Metrics`]: the published snapshot of a session
//! - [`StrokeState`] / [`SessionState`]: phase of the current stroke and
//!   of the session as a whole
//! - [`HeartRateMeasurement`]: asynchronous input from a heart-rate strap

mod metrics;
mod state;

pub use metrics::*;
pub use state::*;
