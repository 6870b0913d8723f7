use crate::error::{MetricsError, Result};
use crate::judge::{clamp_unit, metric_field, notes_field};
use crate::locate::{find_results_file, resolve_log_path};
use crate::results::{read_results_metadata, ResultsMetadata};
use crate::{
    CONSTRAINT_ADHERENCE, DEFAULT_METRIC, PROCESS_REDUNDANCY, SELECTIVE_REASONING_FAILURE_RATE,
    UNKNOWN_TASK_ID, UNKNOWN_TRIAL_ID,
};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// One trial, joined from its judge metrics and its results artifact.
///
/// Field order is the rendered order. Optional fields serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub task_id: String,
    pub trial_id: String,
    pub timestamp: Option<String>,
    pub model: Option<String>,
    pub network_mode: Option<String>,
    #[serde(serialize_with = "path_lossy")]
    pub metrics_path: PathBuf,
    #[serde(serialize_with = "opt_path_lossy")]
    pub results_path: Option<PathBuf>,
    pub constraint_adherence: f64,
    pub process_redundancy: f64,
    pub selective_reasoning_failure_rate: f64,
    pub resolved: bool,
    pub failure_mode: Option<String>,
    pub notes: Option<String>,
}

fn path_lossy<S: Serializer>(path: &Path, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&path.to_string_lossy())
}

fn opt_path_lossy<S: Serializer>(
    path: &Option<PathBuf>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match path {
        Some(p) => s.serialize_str(&p.to_string_lossy()),
        None => s.serialize_none(),
    }
}

/// Builds the record for one judge metrics artifact.
///
/// Returns [`MetricsError::MalformedRecord`] when the artifact cannot take
/// part: unreadable, a legacy list export, or no `log_file`. A results file
/// that exists but cannot be read only degrades the record. A relative
/// `log_file` is only searched when `log_root` is given.
pub fn build_trial_record(metrics_path: &Path, log_root: Option<&Path>) -> Result<TrialRecord> {
    let malformed = |reason: String| MetricsError::MalformedRecord {
        path: metrics_path.to_path_buf(),
        reason,
    };
    let payload = lab_core::load_json_file(metrics_path).map_err(|e| malformed(e.to_string()))?;
    let metrics = match payload {
        Value::Object(doc) => doc,
        Value::Array(_) => return Err(malformed("legacy bulk export (list payload)".to_string())),
        _ => return Err(malformed("metrics artifact is not a JSON object".to_string())),
    };
    let log_file = metrics
        .get("log_file")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("missing log_file".to_string()))?;

    let log_path = resolve_log_path(log_file, log_root);
    let results_path = if log_path.is_relative() {
        tracing::debug!(
            log = %log_path.display(),
            "relative log_file without log_root; not searching for results"
        );
        None
    } else {
        find_results_file(&log_path)
    };
    let meta = match results_path.as_deref() {
        Some(path) => {
            tracing::debug!(
                results = %path.display(),
                log = %log_path.display(),
                "located results artifact"
            );
            match read_results_metadata(path) {
                Ok(meta) => Some(meta),
                Err(err) => {
                    tracing::warn!("{}", err);
                    None
                }
            }
        }
        None => {
            tracing::debug!(log = %log_path.display(), "no results artifact above log");
            None
        }
    };

    let trial_id = derive_trial_id(results_path.as_deref(), &log_path, metrics_path);
    let ResultsMetadata {
        task_id,
        failure_mode,
        is_resolved,
        trial_started_at,
        model,
        network_mode,
        ..
    } = meta.unwrap_or_default();

    Ok(TrialRecord {
        task_id: task_id
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN_TASK_ID.to_string()),
        trial_id,
        timestamp: trial_started_at,
        model,
        network_mode,
        metrics_path: metrics_path.to_path_buf(),
        results_path,
        constraint_adherence: judged_metric(&metrics, CONSTRAINT_ADHERENCE, metrics_path),
        process_redundancy: judged_metric(&metrics, PROCESS_REDUNDANCY, metrics_path),
        selective_reasoning_failure_rate: judged_metric(
            &metrics,
            SELECTIVE_REASONING_FAILURE_RATE,
            metrics_path,
        ),
        resolved: is_resolved,
        failure_mode: if is_resolved { None } else { failure_mode },
        notes: notes_field(&metrics),
    })
}

fn derive_trial_id(results_path: Option<&Path>, log_path: &Path, metrics_path: &Path) -> String {
    results_path
        .and_then(parent_dir_name)
        .or_else(|| parent_dir_name(log_path))
        .or_else(|| {
            metrics_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| UNKNOWN_TRIAL_ID.to_string())
}

fn parent_dir_name(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
}

fn judged_metric(doc: &Map<String, Value>, key: &str, metrics_path: &Path) -> f64 {
    match metric_field(doc, key) {
        Ok(Some(v)) => clamp_unit(v),
        Ok(None) => DEFAULT_METRIC,
        Err(reason) => {
            tracing::warn!(metrics = %metrics_path.display(), "{}; using default", reason);
            DEFAULT_METRIC
        }
    }
}
