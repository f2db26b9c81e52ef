//! Monitor Configuration - flywheel, stroke detection and publication settings
//!
//! Every tunable of the rowing engine is a field in this module. Each struct
//! implements `Default` with the values from [`super::defaults`], so a
//! missing or partial config file behaves like the built-in setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::peripherals::PeripheralMode;

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "ROWMON_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "rower_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a monitor deployment.
///
/// Load with `MonitorConfig::load()` which searches:
/// 1. `$ROWMON_CONFIG` env var
/// 2. `./rower_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Flywheel physics and stroke detection
    #[serde(default)]
    pub rower: RowerConfig,

    /// Metric smoothing windows
    #[serde(default)]
    pub smoothing: SmoothingConfig,

    /// HTTP / web socket server
    #[serde(default)]
    pub server: ServerConfig,

    /// FTMS peripheral profile
    #[serde(default)]
    pub peripheral: PeripheralConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$ROWMON_CONFIG` environment variable
    /// 2. `./rower_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded monitor config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded monitor config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Monitor config saved");
        Ok(())
    }

    /// Validate all settings for internal consistency.
    ///
    /// Collects every violation instead of stopping at the first one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.rower;
        let mut errors: Vec<String> = Vec::new();

        if r.impulses_per_revolution == 0 {
            errors.push("rower.impulses_per_revolution must be > 0".to_string());
        }
        Self::check_positive(r.flywheel_inertia, "rower.flywheel_inertia", &mut errors);
        Self::check_positive(r.magic_constant, "rower.magic_constant", &mut errors);
        Self::check_positive(r.min_time_between_impulses, "rower.min_time_between_impulses", &mut errors);
        if r.max_time_between_impulses <= r.min_time_between_impulses {
            errors.push(format!(
                "rower.max_time_between_impulses ({:.4}) must be > min_time_between_impulses ({:.4})",
                r.max_time_between_impulses, r.min_time_between_impulses
            ));
        }
        if r.flank_length < 3 || r.flank_length > defaults::MAX_FLANK_LENGTH {
            errors.push(format!(
                "rower.flank_length ({}) must be within 3..={}",
                r.flank_length,
                defaults::MAX_FLANK_LENGTH
            ));
        }

        if !r.minimum_drive_torque.is_finite() {
            errors.push("rower.minimum_drive_torque must be finite".to_string());
        }
        Self::check_positive(r.minimum_drive_time, "rower.minimum_drive_time", &mut errors);
        Self::check_positive(r.minimum_recovery_time, "rower.minimum_recovery_time", &mut errors);
        if r.maximum_stroke_time <= r.minimum_drive_time + r.minimum_recovery_time {
            errors.push(format!(
                "rower.maximum_stroke_time ({:.2}) must exceed minimum_drive_time + minimum_recovery_time ({:.2})",
                r.maximum_stroke_time,
                r.minimum_drive_time + r.minimum_recovery_time
            ));
        }

        Self::check_positive(r.drag_factor, "rower.drag_factor", &mut errors);
        if r.max_drag_factor <= r.min_drag_factor {
            errors.push(format!(
                "rower.max_drag_factor ({:e}) must be > min_drag_factor ({:e})",
                r.max_drag_factor, r.min_drag_factor
            ));
        } else if r.drag_factor < r.min_drag_factor || r.drag_factor > r.max_drag_factor {
            errors.push(format!(
                "rower.drag_factor ({:e}) must lie within [min_drag_factor, max_drag_factor]",
                r.drag_factor
            ));
        }
        if r.drag_sample_size < 2 || r.drag_sample_size > 4 * defaults::MAX_FLANK_LENGTH {
            errors.push(format!(
                "rower.drag_sample_size ({}) must be within 2..={}",
                r.drag_sample_size,
                4 * defaults::MAX_FLANK_LENGTH
            ));
        }
        if !(0.0..=1.0).contains(&r.min_drag_fit) {
            errors.push("rower.min_drag_fit must be within [0, 1]".to_string());
        }
        if r.drag_factor_smoothing == 0 {
            errors.push("rower.drag_factor_smoothing must be > 0".to_string());
        }

        let s = &self.smoothing;
        if s.power_smoothing == 0 {
            errors.push("smoothing.power_smoothing must be > 0".to_string());
        }
        if s.stroke_smoothing == 0 {
            errors.push("smoothing.stroke_smoothing must be > 0".to_string());
        }

        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!("server.addr '{}' is not a valid HOST:PORT socket address", self.server.addr));
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_positive(value: f64, name: &str, errors: &mut Vec<String>) {
        // NaN comparisons silently pass, so finiteness is checked first
        if !value.is_finite() {
            errors.push(format!("{name} must be finite (got {value})"));
        } else if value <= 0.0 {
            errors.push(format!("{name} must be > 0 (got {value})"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Rower Config
// ============================================================================

/// Flywheel constants and stroke detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RowerConfig {
    /// Impulses the sensor emits per flywheel revolution
    pub impulses_per_revolution: u32,
    /// Flywheel moment of inertia (kg·m²)
    pub flywheel_inertia: f64,
    /// Energy-to-speed conversion constant
    pub magic_constant: f64,
    /// Double-trigger bound on impulse interval (s)
    pub min_time_between_impulses: f64,
    /// Spin-down bound on impulse interval (s)
    pub max_time_between_impulses: f64,
    /// Running median length applied to raw impulse intervals
    pub smoothing: usize,
    /// Points in the robust quadratic flank window
    pub flank_length: usize,
    /// Net torque (N·m) separating drive from recovery
    pub minimum_drive_torque: f64,
    pub minimum_drive_time: f64,
    pub minimum_recovery_time: f64,
    pub maximum_stroke_time: f64,
    /// Starting drag factor (N·m·s²)
    pub drag_factor: f64,
    /// Re-estimate the drag factor from every recovery
    pub auto_adjust_drag_factor: bool,
    pub drag_sample_size: usize,
    pub drag_factor_smoothing: usize,
    pub min_drag_factor: f64,
    pub max_drag_factor: f64,
    pub min_drag_fit: f64,
}

impl Default for RowerConfig {
    fn default() -> Self {
        Self {
            impulses_per_revolution: defaults::IMPULSES_PER_REVOLUTION,
            flywheel_inertia: defaults::FLYWHEEL_INERTIA,
            magic_constant: defaults::MAGIC_CONSTANT,
            min_time_between_impulses: defaults::MIN_TIME_BETWEEN_IMPULSES,
            max_time_between_impulses: defaults::MAX_TIME_BETWEEN_IMPULSES,
            smoothing: 1,
            flank_length: defaults::FLANK_LENGTH,
            minimum_drive_torque: defaults::MINIMUM_DRIVE_TORQUE,
            minimum_drive_time: defaults::MINIMUM_DRIVE_TIME,
            minimum_recovery_time: defaults::MINIMUM_RECOVERY_TIME,
            maximum_stroke_time: defaults::MAXIMUM_STROKE_TIME,
            drag_factor: defaults::INITIAL_DRAG_FACTOR,
            auto_adjust_drag_factor: true,
            drag_sample_size: defaults::DRAG_SAMPLE_SIZE,
            drag_factor_smoothing: defaults::DRAG_FACTOR_SMOOTHING,
            min_drag_factor: defaults::MIN_DRAG_FACTOR,
            max_drag_factor: defaults::MAX_DRAG_FACTOR,
            min_drag_fit: defaults::MIN_DRAG_FIT,
        }
    }
}

// ============================================================================
// Smoothing Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Strokes in the recency-weighted power average
    pub power_smoothing: usize,
    /// Strokes in the stroke duration and distance averages
    pub stroke_smoothing: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            power_smoothing: defaults::POWER_SMOOTHING,
            stroke_smoothing: defaults::STROKE_SMOOTHING,
        }
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by `ROWMON_SERVER_ADDR` env var or `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Peripheral Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    /// FTMS profile to publish
    pub mode: PeripheralMode,
    /// Encode and hand payloads to the notifier at all
    pub enabled: bool,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            mode: PeripheralMode::Rower,
            enabled: true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
