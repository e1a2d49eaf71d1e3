//! Spark event log processing for sparkscan
//!
//! This crate provides the event extractor with its carry-forward user state,
//! the scan-matching policy, record output sinks, and the scan driver.

mod error;
mod extractor;
mod output;
mod policy;
mod scanner;

pub use error::ScanError;
pub use extractor::EventExtractor;
pub use output::{ConsoleSink, RecordFormat, RecordSink};
pub use policy::{
    DEFAULT_DRIVER_SEGMENT, DEFAULT_LINE_PREFIX, DEFAULT_LOG_SUFFIX, ScanPolicy, split_lines,
};
pub use scanner::LogScanner;

// Re-export types used in our public API
pub use sparkscan_types::{
    CarryState, ExtractError, ExtractedRecord, Extraction, RawEvent, ScanSummary,
};
