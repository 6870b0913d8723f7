//! Consolidates judged trial artifacts into one statistical summary.
//!
//! Pipeline: locate each trial's `results.json`, normalize whichever layout
//! it uses, join it with the judge metrics into a [`TrialRecord`], then group
//! by task and summarise.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod judge;
pub mod locate;
pub mod record;
pub mod report;
pub mod results;

pub use aggregate::{
    group_by_task, summarise, Aggregation, SummaryStatistics, TaskGroup, TaskSummaries,
};
pub use config::{load_config, AggregateConfig};
pub use error::{MetricsError, Result};
pub use judge::{
    clamp_unit, default_artifact_path, parse_judge_response, JudgeArtifact, JudgeScores,
};
pub use locate::find_results_file;
pub use record::{build_trial_record, TrialRecord};
pub use report::{
    collect_records, discover_metrics_files, load_report, render, run_aggregation, write_report,
    AggregateOutcome, AggregateReport, CollectedRecords, ReportSummary, SkippedArtifact,
};
pub use results::{read_results_metadata, ResultsArtifact, ResultsMetadata};

/// Companion file searched for above every log artifact.
pub const RESULTS_FILE_NAME: &str = "results.json";

/// `task_id` of a record whose results artifact is missing, unreadable, or
/// carries no (or an empty) task id.
pub const UNKNOWN_TASK_ID: &str = "unknown";

/// Last-resort `trial_id` when no directory or file stem yields a name.
pub const UNKNOWN_TRIAL_ID: &str = "unknown";

/// Value used for any judged metric absent from its payload. This is not a
/// neutral value: it reads as "no adherence" for `constraint_adherence` and as
/// a perfect score for the two failure-style metrics.
pub const DEFAULT_METRIC: f64 = 0.0;

pub const CONSTRAINT_ADHERENCE: &str = "constraint_adherence";
pub const PROCESS_REDUNDANCY: &str = "process_redundancy";
pub const SELECTIVE_REASONING_FAILURE_RATE: &str = "selective_reasoning_failure_rate";
