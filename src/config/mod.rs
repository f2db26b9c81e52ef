//! Monitor Configuration Module
//!
//! Machine constants and detection thresholds loaded from TOML, so one
//! binary serves different flywheels and sensor setups.
//!
//! ## Loading Order
//!
//! 1. `ROWMON_CONFIG` environment variable (path to TOML file)
//! 2. `rower_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(MonitorConfig::load());
//!
//! // Anywhere in the codebase:
//! let inertia = config::get().rower.flywheel_inertia;
//! ```

mod monitor_config;
pub mod validation;
pub mod defaults;

pub use monitor_config::*;
pub use validation::ValidationWarning;

use std::sync::OnceLock;

/// Global monitor configuration, initialized once at startup.
static MONITOR_CONFIG: OnceLock<MonitorConfig> = OnceLock::new();

/// Initialize the global monitor configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: MonitorConfig) {
    if MONITOR_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Global monitor configuration, or the built-in defaults if `init()` was
/// never called.
pub fn get() -> &'static MonitorConfig {
    MONITOR_CONFIG.get_or_init(MonitorConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    MONITOR_CONFIG.get().is_some()
}
