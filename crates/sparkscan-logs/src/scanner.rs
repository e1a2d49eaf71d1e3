use tracing::{debug, info, warn};

use sparkscan_blob::BlobStore;
use sparkscan_types::{CarryState, ExtractedRecord, Extraction, RawEvent, ScanSummary};

use crate::output::to_json_lines;
use crate::policy::split_lines;
use crate::{EventExtractor, RecordSink, ScanError, ScanPolicy};

/// Suffix of the object that receives a driver log's records on write-back
const WRITE_BACK_SUFFIX: &str = ".records.jsonl";

/// Walks a container folder by folder and feeds driver log lines to the
/// extractor.
///
/// Everything runs sequentially: the carry-forward user depends on the order
/// events are seen, so lines are processed in file order and logs one at a
/// time.
pub struct LogScanner<S, K> {
    source: S,
    destination: Option<S>,
    policy: ScanPolicy,
    sink: K,
}

impl<S: BlobStore, K: RecordSink> LogScanner<S, K> {
    pub fn new(source: S, policy: ScanPolicy, sink: K) -> Self {
        Self {
            source,
            destination: None,
            policy,
            sink,
        }
    }

    /// Also upload each driver log's records to `destination`
    pub fn with_destination(mut self, destination: S) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn destination(&self) -> Option<&S> {
        self.destination.as_ref()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Scan the whole source container with fresh carry state
    pub async fn scan(&mut self) -> Result<ScanSummary, ScanError> {
        let mut state = CarryState::new();
        self.scan_with_state(&mut state).await
    }

    /// Scan the whole source container, continuing from `state`
    pub async fn scan_with_state(
        &mut self,
        state: &mut CarryState,
    ) -> Result<ScanSummary, ScanError> {
        let mut summary = ScanSummary::default();

        info!(source = %self.source.describe(), "scanning container");
        let keys = self.source.list_blobs(None).await?;
        let folders = ScanPolicy::distinct_folders(keys.iter().map(|b| b.name.as_str()));
        debug!(keys = keys.len(), folders = folders.len(), "derived folders");

        for folder in &folders {
            summary.folders += 1;
            let prefix = ScanPolicy::folder_prefix(folder);
            self.sink.progress(&format!("Processing folder: {}", prefix))?;
            self.sink.progress(&format!("Checking blobs under: {}", prefix))?;

            let blobs = self.source.list_blobs(Some(prefix.as_str())).await?;
            if blobs.is_empty() {
                self.sink.progress(&format!("No blobs found under: {}", prefix))?;
                continue;
            }

            for blob in &blobs {
                summary.blobs_seen += 1;
                self.sink.progress(&format!("Found blob: {}", blob.name))?;

                if !self.policy.is_driver_log(&blob.name) {
                    continue;
                }

                self.sink
                    .progress(&format!("Found driver event log: {}", blob.name))?;
                let content = self.source.download(&blob.name).await?;

                let mut collected = self.destination.as_ref().map(|_| Vec::new());
                let pass = self.scan_lines(&blob.name, &content, state, collected.as_mut())?;
                summary.merge(&pass);

                if let Some(records) = collected {
                    summary.records_written_back += self.write_back(&blob.name, &records).await?;
                }
            }
        }

        info!(
            folders = summary.folders,
            driver_logs = summary.driver_logs,
            records = summary.records_emitted,
            failures = summary.extraction_failures,
            "scan complete"
        );
        Ok(summary)
    }

    /// Process the content of one driver log
    pub fn scan_content(
        &mut self,
        blob_name: &str,
        content: &[u8],
        state: &mut CarryState,
    ) -> Result<ScanSummary, ScanError> {
        self.scan_lines(blob_name, content, state, None)
    }

    fn scan_lines(
        &mut self,
        blob_name: &str,
        content: &[u8],
        state: &mut CarryState,
        mut collected: Option<&mut Vec<ExtractedRecord>>,
    ) -> Result<ScanSummary, ScanError> {
        let mut summary = ScanSummary {
            driver_logs: 1,
            ..Default::default()
        };

        let text = std::str::from_utf8(content).map_err(|source| ScanError::Utf8 {
            blob: blob_name.to_string(),
            source,
        })?;

        for (index, line) in split_lines(text).enumerate() {
            if !self.policy.is_event_line(line) {
                continue;
            }
            summary.candidate_lines += 1;

            let event: RawEvent =
                serde_json::from_str(line).map_err(|source| ScanError::Decode {
                    blob: blob_name.to_string(),
                    line: index + 1,
                    source,
                })?;

            match EventExtractor::extract(&event, state) {
                Extraction::Emitted(record) => {
                    self.sink.record(&record)?;
                    summary.records_emitted += 1;
                    if let Some(records) = collected.as_deref_mut() {
                        records.push(record);
                    }
                }
                Extraction::Suppressed => {}
                Extraction::Failed(err) => {
                    summary.extraction_failures += 1;
                    debug!(blob = %blob_name, line = index + 1, error = %err, "skipped event");
                }
            }
        }

        debug!(
            blob = %blob_name,
            lines = summary.candidate_lines,
            records = summary.records_emitted,
            "scanned driver log"
        );
        Ok(summary)
    }

    async fn write_back(
        &self,
        blob_name: &str,
        records: &[ExtractedRecord],
    ) -> Result<usize, ScanError> {
        let Some(destination) = &self.destination else {
            return Ok(0);
        };
        if records.is_empty() {
            return Ok(0);
        }

        let target = format!("{}{}", blob_name, WRITE_BACK_SUFFIX);
        let body = to_json_lines(records).map_err(std::io::Error::from)?;
        destination.upload(&target, body).await.inspect_err(|e| {
            warn!(blob = %target, error = %e, "write-back failed");
        })?;

        info!(blob = %target, records = records.len(), "wrote records back");
        Ok(records.len())
    }
}
