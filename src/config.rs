//! Server configuration module.
//!
//! Handles loading, validating, and merging an optional `config.toml`. User
//! values are merged over the stock defaults, so a file only needs the keys it
//! wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [defaults.resize_image]
//! fit = "cover"
//! preserveAspectRatio = true
//!
//! [defaults.convert_format]
//! quality = 80
//!
//! [defaults.compress_image]
//! quality = 80
//! progressive = true
//!
//! [defaults.rotate_image]
//! background = "#000000"
//!
//! [defaults.batch_resize]
//! quality = 80
//!
//! [batch]
//! max_parallel = 1          # 1 = one item at a time; capped at CPU cores
//! fail_fast = false         # true = skip remaining items after a failure
//!
//! [logging]
//! level = "info"            # RUST_LOG takes precedence
//! ```
//!
//! `[defaults]` is the one place fallback values for optional arguments live.
//! Each entry is checked by the same validator caller arguments go through,
//! so a bad default is rejected at startup instead of on the first request.
//!
//! Unknown keys are rejected to catch typos early.

use crate::catalog::OperationKind;
use crate::resolve;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Fallback values for optional operation arguments.
    pub defaults: Defaults,
    /// Batch orchestration policy.
    pub batch: BatchConfig,
    /// Log filter used when `RUST_LOG` is not set.
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.defaults.validate()?;
        if self.batch.max_parallel == 0 {
            return Err(ConfigError::Validation(
                "batch.max_parallel must be at least 1".into(),
            ));
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.level) {
            return Err(ConfigError::Validation(format!(
                "logging.level `{}` is not a valid filter: {e}",
                self.logging.level
            )));
        }
        Ok(())
    }
}

/// The {operation, field} → default value table.
///
/// Keyed by operation name, then by the argument's wire name, with values
/// in the same JSON shape a caller would send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Defaults(BTreeMap<String, BTreeMap<String, Value>>);

impl Default for Defaults {
    fn default() -> Self {
        let entries: [(OperationKind, &str, Value); 7] = [
            (OperationKind::ResizeImage, "fit", Value::from("cover")),
            (OperationKind::ResizeImage, "preserveAspectRatio", Value::from(true)),
            (OperationKind::ConvertFormat, "quality", Value::from(80)),
            (OperationKind::CompressImage, "quality", Value::from(80)),
            (OperationKind::CompressImage, "progressive", Value::from(true)),
            (OperationKind::RotateImage, "background", Value::from("#000000")),
            (OperationKind::BatchResize, "quality", Value::from(80)),
        ];
        let mut table: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
        for (kind, field, value) in entries {
            table
                .entry(kind.name().to_string())
                .or_default()
                .insert(field.to_string(), value);
        }
        Defaults(table)
    }
}

impl Defaults {
    /// Configured default for one argument of one operation.
    pub fn get(&self, kind: OperationKind, field: &str) -> Option<&Value> {
        self.0.get(kind.name())?.get(field)
    }

    /// Override one entry. Callers are expected to [`validate`](Self::validate) afterwards.
    pub fn set(&mut self, kind: OperationKind, field: &str, value: Value) {
        self.0
            .entry(kind.name().to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (operation, fields) in &self.0 {
            let kind = OperationKind::from_name(operation).ok_or_else(|| {
                ConfigError::Validation(format!("defaults.{operation}: unknown operation"))
            })?;
            for (field, value) in fields {
                if !kind.defaultable_fields().contains(&field.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "defaults.{operation}.{field}: not a defaultable argument of {operation}"
                    )));
                }
                resolve::check_default(kind, field, value).map_err(|e| {
                    ConfigError::Validation(format!("defaults.{operation}.{field}: {e}"))
                })?;
            }
        }
        Ok(())
    }
}

/// Batch orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Maximum number of batch items encoded at once.
    /// Values larger than the core count are clamped down.
    pub max_parallel: usize,
    /// Stop starting new items once one has failed.
    pub fail_fast: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            fail_fast: false,
        }
    }
}

/// Resolve the effective worker count for batch items.
///
/// `max_parallel` is capped at the available cores (user can constrain down,
/// not up) and never drops below one.
pub fn effective_threads(config: &BatchConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_parallel.clamp(1, cores)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive, e.g. `"info"` or `"imagician=debug"`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(ServerConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock config does not serialize: {e}")))
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

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ServerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the server config.
///
/// With no path the stock defaults are used. A path that was given but
/// cannot be read is an error.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Imagician Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Argument defaults
# ---------------------------------------------------------------------------
# Values used when a caller omits an optional argument. Keys use the same
# names as the tool arguments, and every value must pass the same checks a
# caller-supplied value would.

[defaults.resize_image]
# cover, contain, fill, inside or outside.
fit = "cover"
# When true, images are never enlarged past their original size.
preserveAspectRatio = true

[defaults.convert_format]
# 1-100. Ignored by lossless targets.
quality = 80

[defaults.compress_image]
quality = 80
# Requested for JPEG output.
progressive = true

[defaults.rotate_image]
# Fill for corners exposed by non-right-angle rotations (hex or named color).
background = "#000000"

[defaults.batch_resize]
# Applied when the batch names an explicit output format.
quality = 80

# ---------------------------------------------------------------------------
# Batch resize
# ---------------------------------------------------------------------------
[batch]
# Number of sizes encoded at once. 1 processes them strictly in order;
# larger values are capped at the CPU core count. Reported results always
# follow the order of the request.
max_parallel = 1

# When true, the first failed size marks every size not yet started as
# skipped. When false, every size is attempted and reported.
fail_fast = false

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing EnvFilter directive. RUST_LOG overrides this when set.
# Logs always go to stderr.
level = "info"
"##
}
