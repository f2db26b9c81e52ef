//! System-wide default constants.
//!
//! Centralises magic numbers used by the configuration defaults and the
//! runtime tasks. Grouped by subsystem for easy discovery.

// ============================================================================
// Flywheel
// ============================================================================

/// Magnets (impulses) per flywheel revolution.
pub const IMPULSES_PER_REVOLUTION: u32 = 6;

/// Flywheel moment of inertia (kg·m²).
pub const FLYWHEEL_INERTIA: f64 = 0.1001;

/// Drag factor the session starts with (N·m·s²).
///
/// Displayed by most monitors scaled by 10⁶, i.e. 110.
pub const INITIAL_DRAG_FACTOR: f64 = 110e-6;

/// Ratio between flywheel energy and equivalent boat speed.
pub const MAGIC_CONSTANT: f64 = 2.8;

/// Shortest plausible time between two impulses (s). Shorter intervals are
/// treated as double triggers.
pub const MIN_TIME_BETWEEN_IMPULSES: f64 = 0.003;

/// Longest time between two impulses (s) before the flywheel counts as
/// spinning down.
pub const MAX_TIME_BETWEEN_IMPULSES: f64 = 0.06;

/// Points in the robust quadratic flank window.
///
/// 12 points keep the triple count at 220.
pub const FLANK_LENGTH: usize = 12;

/// Hard upper bound on the flank window (the triple count grows cubically).
pub const MAX_FLANK_LENGTH: usize = 64;

// ============================================================================
// Stroke Detection
// ============================================================================

/// Net flywheel torque (N·m) above which the flywheel is considered driven.
pub const MINIMUM_DRIVE_TORQUE: f64 = 0.5;

/// Minimum drive duration before a recovery may start (s).
pub const MINIMUM_DRIVE_TIME: f64 = 0.3;

/// Minimum recovery duration before the next drive may start (s).
pub const MINIMUM_RECOVERY_TIME: f64 = 0.6;

/// A single phase lasting longer than this pauses the session (s).
pub const MAXIMUM_STROKE_TIME: f64 = 6.0;

// ============================================================================
// Drag Factor Estimation
// ============================================================================

/// Recovery samples kept by the robust drag estimator.
pub const DRAG_SAMPLE_SIZE: usize = 24;

/// Recoveries averaged into the working drag factor.
pub const DRAG_FACTOR_SMOOTHING: usize = 5;

pub const MIN_DRAG_FACTOR: f64 = 50e-6;
pub const MAX_DRAG_FACTOR: f64 = 300e-6;

/// Minimum R² of the recovery fit for a new drag estimate to be accepted.
pub const MIN_DRAG_FIT: f64 = 0.9;

// ============================================================================
// Metric Smoothing
// ============================================================================

/// Strokes in the recency-weighted power average.
pub const POWER_SMOOTHING: usize = 4;

/// Strokes in the stroke duration / distance moving averages.
pub const STROKE_SMOOTHING: usize = 3;

/// Time window of the calories-per-minute averager (s).
pub const CALORIES_MINUTE_WINDOW_SECS: f64 = 60.0;

/// Time window of the calories-per-hour averager (s).
pub const CALORIES_HOUR_WINDOW_SECS: f64 = 3600.0;

// ============================================================================
// Server / Feed
// ============================================================================

pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Frames buffered per web socket subscriber before it starts lagging.
pub const FEED_CHANNEL_CAPACITY: usize = 64;

/// Session commands and heart-rate events buffered towards the engine.
pub const COMMAND_CHANNEL_CAPACITY: usize = 32;

// ============================================================================
// Simulation
// ============================================================================

/// Integration step of the flywheel simulator (s).
pub const SIMULATION_TIME_STEP: f64 = 1e-4;
