use crate::aggregate::{Aggregation, SummaryStatistics, TaskSummaries};
use crate::config::AggregateConfig;
use crate::error::{MetricsError, Result};
use crate::record::{build_trial_record, TrialRecord};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// `{"trials": [...], "summary": {...}}`. In raw-only mode `summary` is `{}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub trials: Vec<TrialRecord>,
    pub summary: ReportSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<SummaryStatistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_task: Option<TaskSummaries>,
}

pub fn render(records: Vec<TrialRecord>, aggregation: Option<Aggregation>) -> AggregateReport {
    let summary = match aggregation {
        Some(agg) => ReportSummary {
            overall: Some(agg.overall),
            per_task: Some(agg.per_task),
        },
        None => ReportSummary::default(),
    };
    AggregateReport {
        trials: records,
        summary,
    }
}

pub fn write_report(path: &Path, report: &AggregateReport) -> Result<()> {
    lab_core::atomic_write_json_pretty(path, report)?;
    Ok(())
}

pub fn load_report(path: &Path) -> Result<AggregateReport> {
    if !path.is_file() {
        return Err(MetricsError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[derive(Debug, Clone)]
pub struct SkippedArtifact {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct CollectedRecords {
    pub records: Vec<TrialRecord>,
    pub skipped: Vec<SkippedArtifact>,
    /// Records built but dropped by the task filter.
    pub filtered_out: usize,
}

/// Every `*.json` directly under `metrics_dir`, sorted by file name.
pub fn discover_metrics_files(metrics_dir: &Path) -> Result<Vec<PathBuf>> {
    if !metrics_dir.is_dir() {
        return Err(MetricsError::MissingInput {
            path: metrics_dir.to_path_buf(),
        });
    }
    let mut out = Vec::new();
    let walker = WalkDir::new(metrics_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| MetricsError::Io(e.into()))?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("json")
        {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

pub fn collect_records(
    metrics_dir: &Path,
    log_root: Option<&Path>,
    task_filter: Option<&str>,
) -> Result<CollectedRecords> {
    let mut collected = CollectedRecords::default();
    for metrics_path in discover_metrics_files(metrics_dir)? {
        match build_trial_record(&metrics_path, log_root) {
            Ok(record) => {
                if task_filter.is_some_and(|t| record.task_id != t) {
                    collected.filtered_out += 1;
                    continue;
                }
                collected.records.push(record);
            }
            Err(err) if err.is_per_artifact() => {
                tracing::warn!("{}", err);
                collected.skipped.push(SkippedArtifact {
                    path: metrics_path,
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }
    Ok(collected)
}

#[derive(Debug, Clone)]
pub struct AggregateOutcome {
    pub output: PathBuf,
    pub report: AggregateReport,
    pub skipped: Vec<SkippedArtifact>,
    pub filtered_out: usize,
}

pub fn run_aggregation(config: &AggregateConfig) -> Result<AggregateOutcome> {
    let collected = collect_records(
        &config.metrics_dir,
        config.log_root.as_deref(),
        config.task_id.as_deref(),
    )?;
    let aggregation = if config.include_raw {
        None
    } else {
        Some(Aggregation::compute(&collected.records, None))
    };
    tracing::info!(
        trials = collected.records.len(),
        skipped = collected.skipped.len(),
        filtered_out = collected.filtered_out,
        "aggregated metrics artifacts"
    );
    let report = render(collected.records, aggregation);
    write_report(&config.output, &report)?;
    Ok(AggregateOutcome {
        output: config.output.clone(),
        report,
        skipped: collected.skipped,
        filtered_out: collected.filtered_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TempTree;
    use serde_json::{json, Value};

    fn setup_two_tasks(tree: &TempTree) -> PathBuf {
        tree.write(
            "runs/r1/t1/results.json",
            &json!({"results": [{"task_id": "t1", "is_resolved": true}], "n_resolved": 1, "n_unresolved": 0}).to_string(),
        );
        let log1 = tree.write("runs/r1/t1/agent.log", "log");
        tree.write(
            "runs/r1/t2/results.json",
            &json!({"task_id": "t2", "is_resolved": false, "failure_mode": "timeout"}).to_string(),
        );
        let log2 = tree.write("runs/r1/t2/agent.log", "log");

        let metrics = tree.mkdir("metrics");
        tree.write(
            "metrics/a.json",
            &json!({"log_file": log1, "constraint_adherence": 0.8, "process_redundancy": 0.2, "selective_reasoning_failure_rate": 0.0}).to_string(),
        );
        tree.write(
            "metrics/b.json",
            &json!({"log_file": log2, "constraint_adherence": 0.4, "process_redundancy": 0.6, "selective_reasoning_failure_rate": 1.0}).to_string(),
        );
        tree.write("metrics/legacy.json", &json!([{"log_file": "/x"}]).to_string());
        tree.write("metrics/notes.txt", "ignored");
        metrics
    }

    #[test]
    fn discovery_is_sorted_and_json_only() {
        let tree = TempTree::new("report_discover");
        let metrics = setup_two_tasks(&tree);
        tree.write("metrics/nested/c.json", "{}");
        let files = discover_metrics_files(&metrics).expect("discover");
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().expect("name").to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json", "legacy.json"]);
    }

    #[test]
    fn missing_metrics_dir_is_fatal_and_writes_nothing() {
        let tree = TempTree::new("report_missing");
        let config = AggregateConfig {
            metrics_dir: tree.path("absent"),
            output: tree.path("reports/out.json"),
            ..AggregateConfig::default()
        };
        let err = run_aggregation(&config).expect_err("should fail");
        assert!(matches!(err, MetricsError::MissingInput { .. }));
        assert!(!tree.path("reports").exists());
    }

    #[test]
    fn end_to_end_report_shape() {
        let tree = TempTree::new("report_e2e");
        let metrics = setup_two_tasks(&tree);
        let config = AggregateConfig {
            metrics_dir: metrics,
            output: tree.path("reports/out.json"),
            ..AggregateConfig::default()
        };
        let outcome = run_aggregation(&config).expect("aggregate");
        assert_eq!(outcome.report.trials.len(), 2);
        assert_eq!(outcome.skipped.len(), 1);

        let value = lab_core::load_json_file(&config.output).expect("load");
        assert_eq!(value["summary"]["overall"]["count"], 2);
        assert_eq!(value["summary"]["overall"]["pass_at_1"], 0.5);
        assert_eq!(value["summary"]["per_task"]["t1"]["pass_at_1"], 1.0);
        assert_eq!(value["summary"]["per_task"]["t2"]["pass_at_1"], 0.0);
        assert_eq!(value["trials"][1]["failure_mode"], "timeout");
        assert_eq!(value["trials"][0]["failure_mode"], Value::Null);

        let reloaded = load_report(&config.output).expect("reload");
        assert_eq!(reloaded, outcome.report);
    }

    #[test]
    fn raw_only_leaves_summary_empty() {
        let tree = TempTree::new("report_raw");
        let metrics = setup_two_tasks(&tree);
        let config = AggregateConfig {
            metrics_dir: metrics,
            output: tree.path("out.json"),
            include_raw: true,
            ..AggregateConfig::default()
        };
        run_aggregation(&config).expect("aggregate");
        let value = lab_core::load_json_file(&config.output).expect("load");
        assert_eq!(value["summary"], json!({}));
        assert_eq!(value["trials"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn task_filter_applies_before_any_statistic() {
        let tree = TempTree::new("report_filter");
        let metrics = setup_two_tasks(&tree);
        let config = AggregateConfig {
            metrics_dir: metrics,
            output: tree.path("out.json"),
            task_id: Some("t2".to_string()),
            ..AggregateConfig::default()
        };
        let outcome = run_aggregation(&config).expect("aggregate");
        assert_eq!(outcome.filtered_out, 1);
        let value = lab_core::load_json_file(&config.output).expect("load");
        assert_eq!(value["trials"].as_array().map(Vec::len), Some(1));
        assert_eq!(value["summary"]["overall"]["count"], 1);
        assert_eq!(value["summary"]["overall"]["ca_mean"], 0.4);
        assert!(value["summary"]["per_task"].get("t1").is_none());
    }
}
