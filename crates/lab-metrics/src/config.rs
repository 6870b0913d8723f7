use crate::error::{MetricsError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_METRICS_DIR: &str = "M3_outputs";
pub const DEFAULT_OUTPUT: &str = "reports/aggregate_metrics.json";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregateConfig {
    pub metrics_dir: PathBuf,
    pub output: PathBuf,
    pub task_id: Option<String>,
    /// Emit trial entries only; `summary` is left empty.
    pub include_raw: bool,
    /// Base for relative `log_file` references; without it they are not searched.
    pub log_root: Option<PathBuf>,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            metrics_dir: PathBuf::from(DEFAULT_METRICS_DIR),
            output: PathBuf::from(DEFAULT_OUTPUT),
            task_id: None,
            include_raw: false,
            log_root: None,
        }
    }
}

/// Loads an aggregation config from YAML (JSON is valid YAML too).
pub fn load_config(path: &Path) -> Result<AggregateConfig> {
    let invalid = |reason: String| MetricsError::Config {
        path: path.to_path_buf(),
        reason,
    };
    if !path.exists() {
        return Err(MetricsError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let raw = fs::read_to_string(path)?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&raw).map_err(|e| invalid(e.to_string()))?;
    let json_value: Value = serde_json::to_value(yaml_value).map_err(|e| invalid(e.to_string()))?;
    if json_value.is_null() {
        return Ok(AggregateConfig::default());
    }
    serde_json::from_value(json_value).map_err(|e| invalid(e.to_string()))
}
