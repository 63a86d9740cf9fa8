//! Per-invocation diagnostics.
//!
//! A `ParsingContext` is created for each document and threaded through every stage.
//! It owns a capacity-bounded log buffer (oldest entries evicted first), per-code error
//! counts, and performance spans. Nothing here is shared between documents.

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::diagnostics::error::{ErrorCode, ParserError};

pub const DEFAULT_LOG_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSpan {
    pub name: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ParserError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance_span: Option<PerformanceSpan>,
}

/// Snapshot handed back to callers with the parse result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub document_id: Uuid,
    pub entries: Vec<LogEntry>,
    pub error_counts: BTreeMap<ErrorCode, u32>,
    pub spans: Vec<PerformanceSpan>,
    pub dropped_entries: u64,
}

#[derive(Debug)]
pub struct ParsingContext {
    document_id: Uuid,
    filename: String,
    capacity: usize,
    entries: VecDeque<LogEntry>,
    dropped: u64,
    error_counts: BTreeMap<ErrorCode, u32>,
    spans: Vec<PerformanceSpan>,
    started_at: Instant,
}

impl ParsingContext {
    pub fn new(filename: &str, capacity: usize) -> Self {
        Self {
            document_id: Uuid::new_v4(),
            filename: filename.to_string(),
            capacity: capacity.max(1),
            entries: VecDeque::new(),
            dropped: 0,
            error_counts: BTreeMap::new(),
            spans: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn debug(&mut self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Debug, category, message.into(), None);
    }

    pub fn info(&mut self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Info, category, message.into(), None);
    }

    pub fn warn(&mut self, category: &str, message: impl Into<String>) {
        self.log(LogLevel::Warn, category, message.into(), None);
    }

    pub fn info_with(&mut self, category: &str, message: impl Into<String>, data: Value) {
        self.log(LogLevel::Info, category, message.into(), Some(data));
    }

    pub fn log(&mut self, level: LogLevel, category: &str, message: String, data: Option<Value>) {
        let doc = self.document_id;
        match level {
            LogLevel::Debug => debug!(document_id = %doc, category, "{message}"),
            LogLevel::Info => info!(document_id = %doc, category, "{message}"),
            LogLevel::Warn => warn!(document_id = %doc, category, "{message}"),
            LogLevel::Error => error!(document_id = %doc, category, "{message}"),
        }
        self.push(LogEntry {
            timestamp: Utc::now(),
            level,
            category: category.to_string(),
            message,
            data,
            error: None,
            performance_span: None,
        });
    }

    /// Counts and logs an error. The error is bound to this document first.
    pub fn record_error(&mut self, category: &str, err: &ParserError) -> ParserError {
        let bound = err.clone().for_document(self.document_id, &self.filename);
        *self.error_counts.entry(bound.code).or_insert(0) += 1;
        let level = if bound.recoverable {
            LogLevel::Warn
        } else {
            LogLevel::Error
        };
        let doc = self.document_id;
        match level {
            LogLevel::Warn => warn!(document_id = %doc, category, code = %bound.code, "{}", bound.message),
            _ => error!(document_id = %doc, category, code = %bound.code, "{}", bound.message),
        }
        self.push(LogEntry {
            timestamp: Utc::now(),
            level,
            category: category.to_string(),
            message: bound.message.clone(),
            data: None,
            error: Some(bound.clone()),
            performance_span: None,
        });
        bound
    }

    /// Records the time since `started` under `name`.
    pub fn finish_span(&mut self, category: &str, name: &str, started: Instant) -> u64 {
        let duration_ms = started.elapsed().as_millis() as u64;
        let span = PerformanceSpan {
            name: name.to_string(),
            duration_ms,
        };
        debug!(document_id = %self.document_id, category, span = name, duration_ms, "stage finished");
        self.spans.push(span.clone());
        self.push(LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Debug,
            category: category.to_string(),
            message: format!("{name} finished in {duration_ms}ms"),
            data: None,
            error: None,
            performance_span: Some(span),
        });
        duration_ms
    }

    pub fn error_count(&self, code: ErrorCode) -> u32 {
        self.error_counts.get(&code).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn report(&self) -> DiagnosticsReport {
        DiagnosticsReport {
            document_id: self.document_id,
            entries: self.entries.iter().cloned().collect(),
            error_counts: self.error_counts.clone(),
            spans: self.spans.clone(),
            dropped_entries: self.dropped,
        }
    }

    fn push(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_evicts_oldest_first() {
        let mut ctx = ParsingContext::new("cv.txt", 3);
        for i in 0..5 {
            ctx.info("test", format!("entry {i}"));
        }
        let messages: Vec<_> = ctx.entries().map(|e| e.message.clone()).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
        assert_eq!(ctx.report().dropped_entries, 2);
    }

    #[test]
    fn test_contexts_do_not_share_state() {
        let mut a = ParsingContext::new("a.pdf", 10);
        let b = ParsingContext::new("b.pdf", 10);
        a.record_error("ingest", &ParserError::new(ErrorCode::FileEmpty, "empty"));
        assert_eq!(a.error_count(ErrorCode::FileEmpty), 1);
        assert_eq!(b.error_count(ErrorCode::FileEmpty), 0);
        assert_eq!(b.entries().count(), 0);
        assert_ne!(a.document_id(), b.document_id());
    }

    #[test]
    fn test_record_error_binds_document() {
        let mut ctx = ParsingContext::new("resume.docx", 10);
        let bound = ctx.record_error(
            "ingest",
            &ParserError::new(ErrorCode::DocxParsingFailed, "bad zip"),
        );
        assert_eq!(bound.context.document_id, Some(ctx.document_id()));
        assert_eq!(bound.context.filename.as_deref(), Some("resume.docx"));
        let entry = ctx.entries().last().unwrap();
        assert_eq!(entry.level, LogLevel::Warn);
        assert!(entry.error.is_some());
    }

    #[test]
    fn test_spans_are_reported() {
        let mut ctx = ParsingContext::new("cv.txt", 10);
        ctx.finish_span("pipeline", "classify", Instant::now());
        let report = ctx.report();
        assert_eq!(report.spans.len(), 1);
        assert_eq!(report.spans[0].name, "classify");
        assert!(report.entries[0].performance_span.is_some());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut ctx = ParsingContext::new("cv.txt", 0);
        ctx.info("test", "one");
        ctx.info("test", "two");
        assert_eq!(ctx.entries().count(), 1);
    }
}
