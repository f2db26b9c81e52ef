//! Rowing Monitor: flywheel impulses to rowing metrics
//!
//! Measures the time between magnet or reed-switch impulses on a rowing
//! machine flywheel and derives stroke rate, power, pace, distance and
//! calories from the flywheel physics.
//!
//! ## Architecture
//!
//! - **Stats**: ordered statistics, robust regression and averagers
//! - **Engine**: flywheel model, stroke detection, session statistics
//! - **Peripherals**: FTMS Rower / Indoor Bike payload encoding
//! - **Pipeline**: impulse sources and the processing loop
//! - **API**: REST endpoints and the web socket metrics feed

pub mod api;
pub mod config;
pub mod engine;
pub mod peripherals;
pub mod pipeline;
pub mod simulation;
pub mod stats;
pub mod types;

// Re-export configuration
pub use config::MonitorConfig;

// Re-export commonly used types
pub use types::{HeartRateMeasurement, Metrics, SessionState, StrokeState};

// Re-export the engine
pub use engine::{RowerEvent, RowingEngine, StrokeSummary};
