//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! The raw TOML is first walked as a `toml::Value` tree and every dotted key
//! is compared against the known field names. Unknown keys only produce
//! warnings, so older configs keep loading.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of `MonitorConfig`.
///
/// Must be kept in step with the structs in monitor_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [rower]
        "rower",
        "rower.impulses_per_revolution",
        "rower.flywheel_inertia",
        "rower.magic_constant",
        "rower.min_time_between_impulses",
        "rower.max_time_between_impulses",
        "rower.smoothing",
        "rower.flank_length",
        "rower.minimum_drive_torque",
        "rower.minimum_drive_time",
        "rower.minimum_recovery_time",
        "rower.maximum_stroke_time",
        "rower.drag_factor",
        "rower.auto_adjust_drag_factor",
        "rower.drag_sample_size",
        "rower.drag_factor_smoothing",
        "rower.min_drag_factor",
        "rower.max_drag_factor",
        "rower.min_drag_fit",
        // [smoothing]
        "smoothing",
        "smoothing.power_smoothing",
        "smoothing.stroke_smoothing",
        // [server]
        "server",
        "server.addr",
        // [peripheral]
        "peripheral",
        "peripheral.mode",
        "peripheral.enabled",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// A table `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Closest known key within edit distance 3, ties resolved alphabetically.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|&(dist, _)| dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are reported by serde
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Physical plausibility of a parsed `MonitorConfig`.
///
/// Returns (errors, warnings). Errors are values no machine can have;
/// warnings are unusual but possible.
pub fn validate_physical_ranges(
    config: &super::MonitorConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let r = &config.rower;

    // Rowing machine flywheels are well under 5 kg·m²
    if r.flywheel_inertia > 5.0 {
        errors.push(format!(
            "rower.flywheel_inertia = {:.3} is outside physical range (0-5 kg·m²)",
            r.flywheel_inertia
        ));
    } else if r.flywheel_inertia > 0.0 && !(0.02..=0.5).contains(&r.flywheel_inertia) {
        warnings.push(ValidationWarning {
            field: "rower.flywheel_inertia".to_string(),
            message: format!(
                "flywheel_inertia = {:.4} is outside typical range (0.02-0.5 kg·m²)",
                r.flywheel_inertia
            ),
            suggestion: None,
        });
    }

    if r.impulses_per_revolution > 360 {
        errors.push(format!(
            "rower.impulses_per_revolution = {} is outside physical range (1-360)",
            r.impulses_per_revolution
        ));
    }

    // A flywheel turning slower than one impulse per second has stopped
    if r.max_time_between_impulses > 1.0 {
        warnings.push(ValidationWarning {
            field: "rower.max_time_between_impulses".to_string(),
            message: format!(
                "max_time_between_impulses = {:.3} s is longer than one second",
                r.max_time_between_impulses
            ),
            suggestion: None,
        });
    }

    if r.magic_constant.is_finite() && !(2.0..=3.5).contains(&r.magic_constant) {
        warnings.push(ValidationWarning {
            field: "rower.magic_constant".to_string(),
            message: format!(
                "magic_constant = {:.2} is outside typical range (2.0-3.5)",
                r.magic_constant
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("flank_lenght", "flank_length"), 2);
        assert_eq!(levenshtein("inertia", "inerta"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [rower]
            flank_length = 10
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"rower".to_string()));
        assert!(keys.contains(&"rower.flank_length".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[rower]
flywheel_inertai = 0.1
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("flywheel_inertai"));
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("rower.flywheel_inertia")
        );
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[rower]
impulses_per_revolution = 4
auto_adjust_drag_factor = false

[server]
addr = "127.0.0.1:9000"

[peripheral]
mode = "bike"
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let warnings = validate_unknown_keys("[bluetooth]\nname = \"x\"\n");
        assert!(warnings.iter().any(|w| w.field == "bluetooth"));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("completely_unrelated_garbage_key_xyz", &known).is_none());
    }

    #[test]
    fn test_known_keys_match_serialized_defaults() {
        let serialized = MonitorConfig::default().to_toml().unwrap();
        let warnings = validate_unknown_keys(&serialized);
        assert!(warnings.is_empty(), "Serialized defaults hit unknown keys: {:?}", warnings);
    }

    #[test]
    fn test_physical_range_defaults_clean() {
        let (errors, warnings) = validate_physical_ranges(&MonitorConfig::default());
        assert!(errors.is_empty(), "Defaults should produce no errors: {:?}", errors);
        assert!(warnings.is_empty(), "Defaults should produce no warnings: {:?}", warnings);
    }

    #[test]
    fn test_physical_range_inertia_too_large() {
        let mut config = MonitorConfig::default();
        config.rower.flywheel_inertia = 20.0;
        let (errors, _) = validate_physical_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("flywheel_inertia")));
    }

    #[test]
    fn test_physical_range_inertia_suspicious() {
        let mut config = MonitorConfig::default();
        config.rower.flywheel_inertia = 1.2;
        let (errors, warnings) = validate_physical_ranges(&config);
        assert!(errors.is_empty());
        assert!(warnings.iter().any(|w| w.field == "rower.flywheel_inertia"));
    }

    #[test]
    fn test_physical_range_magic_constant_suspicious() {
        let mut config = MonitorConfig::default();
        config.rower.magic_constant = 5.0;
        let (_, warnings) = validate_physical_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "rower.magic_constant"));
    }
}
