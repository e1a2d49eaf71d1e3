//! Shared types for sparkscan
//!
//! This crate contains data structures used across multiple sparkscan crates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Event Types
// ============================================================================

/// One decoded line of a Spark driver event log. No schema is enforced.
pub type RawEvent = Value;

/// User identity carried forward from identity events onto later job records
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CarryState {
    last_known_user: Option<String>,
}

impl CarryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently observed user, if any
    pub fn user(&self) -> Option<&str> {
        self.last_known_user.as_deref()
    }

    /// Record a newly observed user. Empty values are ignored so the state is
    /// never reset once set.
    pub fn observe_user(&mut self, user: &str) -> bool {
        if user.is_empty() {
            return false;
        }
        self.last_known_user = Some(user.to_string());
        true
    }
}

/// Normalized record emitted for every job-description event
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    pub timestamp: Option<Value>,
    pub category: Option<Value>,
    pub fabric_livy_id: Option<Value>,
    pub application_id: Option<Value>,
    pub application_name: Option<Value>,
    pub executor_id: Option<Value>,
    pub fabric_tenant_id: Option<Value>,
    pub capacity_id: Option<Value>,
    pub artifact_type: Option<Value>,
    pub artifact_id: Option<Value>,
    pub fabric_workspace_id: Option<Value>,
    pub fabric_env_id: Option<Value>,
    pub job_description: Option<Value>,
    pub user: Option<String>,
}

/// Why a structurally unexpected event could not be read
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("event is {found}, expected an object")]
    EventNotObject { found: &'static str },

    #[error("`{path}` is {found}, expected an object")]
    NotAnObject {
        path: &'static str,
        found: &'static str,
    },
}

/// Outcome of running one event through the extractor
#[derive(Clone, Debug, PartialEq)]
pub enum Extraction {
    /// A job-description event produced a record
    Emitted(ExtractedRecord),
    /// Nothing to emit (identity event or unrelated event)
    Suppressed,
    /// The event could not be read; logged and skipped
    Failed(ExtractError),
}

impl Extraction {
    pub fn record(&self) -> Option<&ExtractedRecord> {
        match self {
            Extraction::Emitted(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Extraction::Suppressed)
    }
}

/// Name of a JSON value's type, for error messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Storage Types
// ============================================================================

/// An object returned by a container listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobItem {
    pub name: String,
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl BlobItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            last_modified: None,
        }
    }
}

// ============================================================================
// Scan Types
// ============================================================================

/// Counters collected over one scan
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub folders: usize,
    pub blobs_seen: usize,
    pub driver_logs: usize,
    pub candidate_lines: usize,
    pub records_emitted: usize,
    pub extraction_failures: usize,
    pub records_written_back: usize,
}

impl ScanSummary {
    /// Fold the counters of another scan pass into this one
    pub fn merge(&mut self, other: &ScanSummary) {
        self.folders += other.folders;
        self.blobs_seen += other.blobs_seen;
        self.driver_logs += other.driver_logs;
        self.candidate_lines += other.candidate_lines;
        self.records_emitted += other.records_emitted;
        self.extraction_failures += other.extraction_failures;
        self.records_written_back += other.records_written_back;
    }
}
