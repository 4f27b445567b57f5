//! Run configuration.
//!
//! Handles loading, validating, and merging `dia.toml` files. Stock defaults
//! are the base layer; a user file overrides only the keys it names.
//!
//! ## Config File Location
//!
//! `dia encode` looks for a config file in this order:
//!
//! 1. The path given with `--config`
//! 2. `dia.toml` inside the input directory
//! 3. Nothing: stock defaults are used as-is
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [scan]
//! extensions = ["png"]        # Frame file extensions (case-insensitive)
//!
//! [processing]
//! max_processes = 8           # Pair-scoring workers (omit for auto = cores / 2)
//!
//! [encode]
//! workers = 4                 # Diff-encoding workers
//! png_level = 6               # oxipng optimization preset (0-6)
//! optimize_alpha = true       # Zero the color of fully transparent pixels
//!
//! [archive]
//! manifest_name = "optimization_map.json"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the per-input config file picked up automatically.
pub const CONFIG_FILENAME: &str = "dia.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Full run configuration.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiaConfig {
    /// Frame discovery settings.
    pub scan: ScanConfig,
    /// Pair-scoring pool settings.
    pub processing: ProcessingConfig,
    /// Diff-encoding settings.
    pub encode: EncodeConfig,
    /// Output container settings.
    pub archive: ArchiveConfig,
}

impl DiaConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "scan.extensions must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if self.encode.workers == 0 {
            return Err(ConfigError::Validation(
                "encode.workers must be at least 1".into(),
            ));
        }
        if self.encode.png_level > 6 {
            return Err(ConfigError::Validation(
                "encode.png_level must be 0-6".into(),
            ));
        }
        let name = &self.archive.manifest_name;
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(ConfigError::Validation(
                "archive.manifest_name must be a plain file name".into(),
            ));
        }
        Ok(())
    }
}

/// Frame discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// File extensions (without dot) that count as frames.
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["png".to_string()],
        }
    }
}

/// Pair-scoring pool settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel scoring workers.
    /// When absent, defaults to half the CPU cores (at least one).
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective scoring thread count.
///
/// - `None` → half the available cores, at least 1
/// - `Some(n)` → `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or_else(|| (cores / 2).max(1))
}

/// Diff-encoding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeConfig {
    /// Diff-encoding pool size. Not exposed on the command line.
    pub workers: usize,
    /// oxipng preset, 0 (fast) to 6 (smallest).
    pub png_level: u8,
    /// Let oxipng rewrite the color of fully transparent pixels.
    pub optimize_alpha: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            png_level: 6,
            optimize_alpha: true,
        }
    }
}

/// Output container settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// File name of the manifest at the archive root.
    pub manifest_name: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            manifest_name: crate::manifest::MANIFEST_FILENAME.to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(DiaConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<DiaConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: DiaConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the run config.
///
/// An explicit path must exist; otherwise `dia.toml` in `input_dir` is used
/// when present, and stock defaults when not.
pub fn load_config(explicit: Option<&Path>, input_dir: &Path) -> Result<DiaConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str(&content)?)
        }
        None => load_raw_config(&input_dir.join(CONFIG_FILENAME))?,
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `dia.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# dia configuration
# =================
# Every key is optional. Values shown are the defaults.

[scan]
# File extensions (without the dot) that are treated as frames.
# Matching is case-insensitive; the input directory is scanned recursively.
extensions = ["png"]

[processing]
# Workers used to score every pair of frames. Omit for half the CPU cores.
# Values above the core count are clamped down. `-w` overrides this.
# max_processes = 8

[encode]
# Workers used to diff-encode non-root frames.
workers = 4
# oxipng optimization preset: 0 is fastest, 6 produces the smallest files.
png_level = 6
# Allow oxipng to rewrite the color of fully transparent pixels.
optimize_alpha = true

[archive]
# Name of the manifest stored at the archive root.
manifest_name = "optimization_map.json"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = DiaConfig::default();
        assert_eq!(config.scan.extensions, vec!["png"]);
        assert_eq!(config.processing.max_processes, None);
        assert_eq!(config.encode.workers, 4);
        assert_eq!(config.encode.png_level, 6);
        assert!(config.encode.optimize_alpha);
        assert_eq!(config.archive.manifest_name, "optimization_map.json");
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(DiaConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_empty_extensions() {
        let mut config = DiaConfig::default();
        config.scan.extensions.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_encode_workers() {
        let mut config = DiaConfig::default();
        config.encode.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_max_processes() {
        let mut config = DiaConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_png_level_too_high() {
        let mut config = DiaConfig::default();
        config.encode.png_level = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_manifest_name_with_separator() {
        let mut config = DiaConfig::default();
        config.archive.manifest_name = "nested/map.json".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_threads_auto_is_half_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let threads = effective_threads(&ProcessingConfig::default());
        assert_eq!(threads, (cores / 2).max(1));
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(10_000),
        };
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_nested_preserves_siblings() {
        let base = stock_defaults_value();
        let overlay: toml::Value = toml::from_str("[encode]\npng_level = 2").unwrap();
        let config: DiaConfig = merge_toml(base, overlay).try_into().unwrap();
        assert_eq!(config.encode.png_level, 2);
        assert_eq!(config.encode.workers, 4);
        assert!(config.encode.optimize_alpha);
    }

    #[test]
    fn unknown_key_rejected() {
        let overlay: toml::Value = toml::from_str("[encode]\nspeed = 3").unwrap();
        assert!(resolve_config(stock_defaults_value(), Some(overlay)).is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let overlay: toml::Value = toml::from_str("[colors]\nx = 1").unwrap();
        assert!(resolve_config(stock_defaults_value(), Some(overlay)).is_err());
    }

    #[test]
    fn load_config_without_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(None, tmp.path()).unwrap();
        assert_eq!(config, DiaConfig::default());
    }

    #[test]
    fn load_config_picks_up_input_dir_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[scan]\nextensions = [\"png\", \"webp\"]\n",
        )
        .unwrap();
        let config = load_config(None, tmp.path()).unwrap();
        assert_eq!(config.scan.extensions, vec!["png", "webp"]);
    }

    #[test]
    fn load_config_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[encode]\nworkers = 2\n").unwrap();
        let explicit = tmp.path().join("other.toml");
        fs::write(&explicit, "[encode]\nworkers = 7\n").unwrap();

        let config = load_config(Some(&explicit), tmp.path()).unwrap();
        assert_eq!(config.encode.workers, 7);
    }

    #[test]
    fn load_config_explicit_missing_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("nope.toml")), tmp.path());
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[encode]\npng_level = 9\n").unwrap();
        let result = load_config(None, tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(stock_defaults_value(), Some(value)).unwrap();
        assert_eq!(config, DiaConfig::default());
    }
}
