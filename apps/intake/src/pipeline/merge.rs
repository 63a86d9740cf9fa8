//! Manual-override merge.
//!
//! Reviewer corrections and field moves are applied to the processed data without
//! re-running ingestion. Fields are addressed by camelCase paths such as
//! `contact.email`, `workExperiences[0].employer` or `skills`. Each change is applied to
//! a copy and kept only if the result still has the `ParsedResumeData` shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::models::resume::{ParsedResumeData, ResumeData};
use crate::parsing::contact::normalize_phone;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCorrection {
    pub path: String,
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMove {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub processed_data: ParsedResumeData,
    #[serde(default)]
    pub corrections: Vec<FieldCorrection>,
    #[serde(default)]
    pub moves: Vec<FieldMove>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedChange {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub resume: ResumeData,
    pub applied: Vec<String>,
    pub rejected: Vec<RejectedChange>,
}

pub fn merge(request: MergeRequest) -> MergeResult {
    let fallback = request.processed_data.clone();
    let mut doc = match serde_json::to_value(&request.processed_data) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("processed data is not serializable: {e}");
            return MergeResult {
                resume: fallback.into(),
                applied: Vec::new(),
                rejected: Vec::new(),
            };
        }
    };
    let mut applied = Vec::new();
    let mut rejected = Vec::new();

    for correction in request.corrections {
        let outcome = try_change(&doc, |candidate| {
            set_value(candidate, &correction.path, normalized(&correction.path, correction.value.clone()))
        });
        match outcome {
            Ok(next) => {
                doc = next;
                applied.push(correction.path);
            }
            Err(reason) => rejected.push(RejectedChange {
                path: correction.path,
                reason,
            }),
        }
    }

    for field_move in request.moves {
        let label = format!("{} -> {}", field_move.from, field_move.to);
        let outcome = try_change(&doc, |candidate| {
            let value = take_value(candidate, &field_move.from)?;
            place_value(candidate, &field_move.to, value)
        });
        match outcome {
            Ok(next) => {
                doc = next;
                applied.push(label);
            }
            Err(reason) => rejected.push(RejectedChange { path: label, reason }),
        }
    }

    info!(applied = applied.len(), rejected = rejected.len(), "merged manual overrides");
    let parsed: ParsedResumeData = serde_json::from_value(doc).unwrap_or(fallback);
    MergeResult {
        resume: parsed.into(),
        applied,
        rejected,
    }
}

/// Applies `change` to a copy of `doc` and checks the shape still deserializes.
fn try_change(doc: &Value, change: impl FnOnce(&mut Value) -> Result<(), String>) -> Result<Value, String> {
    let mut candidate = doc.clone();
    change(&mut candidate)?;
    serde_json::from_value::<ParsedResumeData>(candidate.clone())
        .map_err(|e| format!("value has the wrong type: {e}"))?;
    Ok(candidate)
}

/// `workExperiences[0].employer` → `/workExperiences/0/employer`.
fn pointer(path: &str) -> Result<String, String> {
    let normalized = path.trim().replace('[', ".").replace(']', "");
    let segments: Vec<&str> = normalized.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err("empty field path".to_string());
    }
    Ok(segments
        .iter()
        .map(|s| format!("/{}", s.replace('~', "~0").replace('/', "~1")))
        .collect())
}

fn slot<'a>(doc: &'a mut Value, path: &str) -> Result<&'a mut Value, String> {
    let ptr = pointer(path)?;
    doc.pointer_mut(&ptr).ok_or_else(|| format!("no field at {path}"))
}

fn set_value(doc: &mut Value, path: &str, value: Value) -> Result<(), String> {
    *slot(doc, path)? = value;
    Ok(())
}

/// Removes the value at `path`, leaving an empty value of the same kind behind.
fn take_value(doc: &mut Value, path: &str) -> Result<Value, String> {
    let target = slot(doc, path)?;
    let empty = match target {
        Value::String(_) => Value::String(String::new()),
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Bool(_) => Value::Bool(false),
        _ => Value::Null,
    };
    let taken = std::mem::replace(target, empty);
    if taken.is_null() || taken.as_str().is_some_and(str::is_empty) {
        return Err(format!("nothing to move at {path}"));
    }
    Ok(taken)
}

/// Arrays receive scalar values as a new element; anything else is replaced.
fn place_value(doc: &mut Value, path: &str, value: Value) -> Result<(), String> {
    let target = slot(doc, path)?;
    match (target, value) {
        (Value::Array(items), value @ (Value::String(_) | Value::Number(_))) => items.push(value),
        (Value::String(existing), Value::String(text)) if !existing.is_empty() => {
            existing.push('\n');
            existing.push_str(&text);
        }
        (target, value) => *target = value,
    }
    Ok(())
}

fn normalized(path: &str, value: Value) -> Value {
    match value {
        Value::String(s) if path.ends_with("phone") => Value::String(normalize_phone(&s)),
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other,
    }
}
