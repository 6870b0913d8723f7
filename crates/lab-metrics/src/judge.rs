use crate::error::{MetricsError, Result};
use crate::{
    CONSTRAINT_ADHERENCE, DEFAULT_METRIC, PROCESS_REDUNDANCY, SELECTIVE_REASONING_FAILURE_RATE,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const SNIPPET_CHARS: usize = 400;

#[derive(Debug, Clone, PartialEq)]
pub struct JudgeScores {
    pub constraint_adherence: f64,
    pub process_redundancy: f64,
    pub selective_reasoning_failure_rate: f64,
    pub notes: Option<String>,
}

/// Pins `value` into `[0.0, 1.0]`. NaN maps to 0.0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Reads one metric as an unclamped float. `Ok(None)` when absent or null.
pub(crate) fn metric_field(
    doc: &Map<String, Value>,
    key: &str,
) -> std::result::Result<Option<f64>, String> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("{} is not representable as f64", key)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("{} is not numeric: {:?}", key, s)),
        Some(other) => Err(format!("{} must be a number, found {}", key, other)),
    }
}

pub(crate) fn notes_field(doc: &Map<String, Value>) -> Option<String> {
    match doc.get("notes")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl JudgeScores {
    pub fn from_object(doc: &Map<String, Value>) -> std::result::Result<Self, String> {
        let read = |key: &str| -> std::result::Result<f64, String> {
            let value = metric_field(doc, key)?.unwrap_or_else(|| {
                tracing::debug!(metric = key, "metric absent from judge payload; defaulting");
                DEFAULT_METRIC
            });
            Ok(clamp_unit(value))
        };
        Ok(JudgeScores {
            constraint_adherence: read(CONSTRAINT_ADHERENCE)?,
            process_redundancy: read(PROCESS_REDUNDANCY)?,
            selective_reasoning_failure_rate: read(SELECTIVE_REASONING_FAILURE_RATE)?,
            notes: notes_field(doc),
        })
    }
}

/// Extracts and clamps scores from judge free text.
///
/// Only the textually last top-level `{...}` is considered. If that object
/// does not parse, the call fails even when an earlier object would have.
pub fn parse_judge_response(text: &str) -> Result<JudgeScores> {
    let candidate = last_object_span(text)?;
    let value: Value = serde_json::from_str(candidate).map_err(|e| MetricsError::JudgeResponse {
        reason: format!("failed to parse JSON from judge response: {}", e),
        snippet: snippet(candidate),
    })?;
    let doc = match value {
        Value::Object(doc) => doc,
        _ => {
            return Err(MetricsError::JudgeResponse {
                reason: "last JSON value is not an object".to_string(),
                snippet: snippet(candidate),
            })
        }
    };
    JudgeScores::from_object(&doc).map_err(|reason| MetricsError::JudgeResponse {
        reason,
        snippet: snippet(candidate),
    })
}

/// Byte span of the balanced object that ends last in `text`.
///
/// Each `{` outside an already-closed span is matched on its own, tracking
/// JSON strings, so an opener in prose that never closes cannot absorb the
/// objects after it. Fails when such an opener follows the chosen span.
fn last_object_span(text: &str) -> Result<&str> {
    let bytes = text.as_bytes();
    let mut last: Option<(usize, usize)> = None;
    let mut dangling: Option<usize> = None;
    let mut pos = 0usize;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'{') {
        let open = pos + offset;
        match closing_brace(bytes, open) {
            Some(close) => {
                last = Some((open, close + 1));
                dangling = None;
                pos = close + 1;
            }
            None => {
                if dangling.is_none() {
                    dangling = Some(open);
                }
                pos = open + 1;
            }
        }
    }

    if let Some(open) = dangling {
        return Err(MetricsError::JudgeResponse {
            reason: "last JSON object in judge response is unterminated".to_string(),
            snippet: snippet(&text[open..]),
        });
    }
    match last {
        Some((s, e)) => Ok(&text[s..e]),
        None => Err(MetricsError::JudgeResponse {
            reason: "no JSON object found in judge response".to_string(),
            snippet: snippet(text),
        }),
    }
}

/// Index of the `}` that balances the `{` at `open`, if any.
fn closing_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn snippet(text: &str) -> String {
    let mut out: String = text.chars().take(SNIPPET_CHARS).collect();
    if text.chars().count() > SNIPPET_CHARS {
        out.push_str("...");
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeArtifact {
    pub log_file: String,
    pub constraint_adherence: f64,
    pub process_redundancy: f64,
    pub selective_reasoning_failure_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl JudgeArtifact {
    pub fn new(log_file: &Path, scores: JudgeScores) -> Self {
        Self {
            log_file: log_file.to_string_lossy().to_string(),
            constraint_adherence: scores.constraint_adherence,
            process_redundancy: scores.process_redundancy,
            selective_reasoning_failure_rate: scores.selective_reasoning_failure_rate,
            notes: scores.notes.filter(|n| !n.is_empty()),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        lab_core::atomic_write_json_pretty(path, self)?;
        Ok(())
    }
}

/// `post-agent.txt` -> `post-agent.metrics.json`, beside the log.
pub fn default_artifact_path(log_file: &Path) -> PathBuf {
    log_file.with_extension("metrics.json")
}
