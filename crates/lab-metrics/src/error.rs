use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("missing input: {} does not exist", path.display())]
    MissingInput { path: PathBuf },

    #[error("unreadable results artifact {}: {reason}", path.display())]
    SchemaRead { path: PathBuf, reason: String },

    #[error("judge response rejected: {reason}\nSnippet: {snippet}")]
    JudgeResponse { reason: String, snippet: String },

    #[error("skipping metrics artifact {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("invalid config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Write(#[from] anyhow::Error),
}

impl MetricsError {
    /// Per-artifact failures that bulk aggregation absorbs instead of aborting.
    pub fn is_per_artifact(&self) -> bool {
        matches!(
            self,
            MetricsError::SchemaRead { .. } | MetricsError::MalformedRecord { .. }
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            MetricsError::MissingInput { .. } => "missing_input",
            MetricsError::SchemaRead { .. } => "schema_read",
            MetricsError::JudgeResponse { .. } => "judge_response",
            MetricsError::MalformedRecord { .. } => "malformed_record",
            MetricsError::Config { .. } => "invalid_config",
            MetricsError::Io(_) => "io_error",
            MetricsError::Json(_) => "json_error",
            MetricsError::Write(_) => "write_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, MetricsError>;
