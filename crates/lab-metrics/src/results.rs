use crate::error::{MetricsError, Result};
use serde_json::{Map, Value};
use std::path::Path;

/// A `results.json` payload after shape dispatch.
///
/// The discriminator is checked once, up front: a list-valued top-level
/// `results` key means [`ResultsArtifact::Aggregate`], anything else is read as
/// a single flat trial object.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsArtifact {
    Aggregate {
        /// First element of `results`; the only one treated as authoritative.
        entry: Map<String, Value>,
        n_resolved: u64,
        n_unresolved: u64,
    },
    Flat(Map<String, Value>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsMetadata {
    pub task_id: Option<String>,
    pub trial_name: Option<String>,
    pub failure_mode: Option<String>,
    pub is_resolved: bool,
    pub trial_started_at: Option<String>,
    pub model: Option<String>,
    pub network_mode: Option<String>,
    pub resolved_count: u64,
    pub unresolved_count: u64,
}

impl ResultsArtifact {
    pub fn classify(payload: Value) -> std::result::Result<Self, String> {
        let mut doc = match payload {
            Value::Object(map) => map,
            other => {
                return Err(format!(
                    "expected a JSON object, found {}",
                    value_type_name(&other)
                ))
            }
        };
        match doc.remove("results") {
            Some(Value::Array(entries)) => {
                let entry = match entries.into_iter().next() {
                    Some(Value::Object(entry)) => entry,
                    Some(other) => {
                        return Err(format!(
                            "results[0] must be an object, found {}",
                            value_type_name(&other)
                        ))
                    }
                    None => return Err("results list is empty".to_string()),
                };
                Ok(ResultsArtifact::Aggregate {
                    entry,
                    n_resolved: doc.get("n_resolved").and_then(Value::as_u64).unwrap_or(0),
                    n_unresolved: doc.get("n_unresolved").and_then(Value::as_u64).unwrap_or(0),
                })
            }
            Some(other) => {
                // Non-list `results` is just another flat field.
                doc.insert("results".to_string(), other);
                Ok(ResultsArtifact::Flat(doc))
            }
            None => Ok(ResultsArtifact::Flat(doc)),
        }
    }

    pub fn normalize(&self) -> ResultsMetadata {
        let (entry, resolved_count, unresolved_count) = match self {
            ResultsArtifact::Aggregate {
                entry,
                n_resolved,
                n_unresolved,
            } => (entry, *n_resolved, *n_unresolved),
            ResultsArtifact::Flat(entry) => {
                if truthy(entry.get("is_resolved")) {
                    (entry, 1, 0)
                } else {
                    (entry, 0, 1)
                }
            }
        };
        ResultsMetadata {
            task_id: str_field(entry, "task_id"),
            trial_name: str_field(entry, "trial_name"),
            failure_mode: str_field(entry, "failure_mode"),
            is_resolved: truthy(entry.get("is_resolved")),
            trial_started_at: str_field(entry, "trial_started_at"),
            model: str_field(entry, "model"),
            network_mode: str_field(entry, "network_mode"),
            resolved_count,
            unresolved_count,
        }
    }
}

pub fn read_results_metadata(path: &Path) -> Result<ResultsMetadata> {
    let payload = lab_core::load_json_file(path).map_err(|e| MetricsError::SchemaRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let artifact = ResultsArtifact::classify(payload).map_err(|reason| MetricsError::SchemaRead {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(artifact.normalize())
}

fn str_field(entry: &Map<String, Value>, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

// Non-empty strings and containers count as resolved, as do non-zero numbers.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
