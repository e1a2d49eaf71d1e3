use std::collections::BTreeSet;

/// Path segment that marks a driver log
pub const DEFAULT_DRIVER_SEGMENT: &str = "driver/";
/// Name suffix of a driver event log
pub const DEFAULT_LOG_SUFFIX: &str = "spark-events";
/// Prefix of an event line once leading whitespace is trimmed
pub const DEFAULT_LINE_PREFIX: &str = "{\"timestamp\"";

/// Name and content heuristics that decide what gets scanned
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanPolicy {
    pub driver_segment: String,
    pub log_suffix: String,
    pub line_prefix: String,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            driver_segment: DEFAULT_DRIVER_SEGMENT.to_string(),
            log_suffix: DEFAULT_LOG_SUFFIX.to_string(),
            line_prefix: DEFAULT_LINE_PREFIX.to_string(),
        }
    }
}

impl ScanPolicy {
    pub fn with_driver_segment(mut self, segment: impl Into<String>) -> Self {
        self.driver_segment = segment.into();
        self
    }

    pub fn with_log_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.log_suffix = suffix.into();
        self
    }

    /// Everything before the final `/`, or `None` for top-level keys
    pub fn folder_of(key: &str) -> Option<&str> {
        key.rsplit_once('/').map(|(folder, _)| folder)
    }

    /// Distinct folders of a listing, in sorted order
    pub fn distinct_folders<'a>(keys: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        keys.into_iter()
            .filter_map(Self::folder_of)
            .map(str::to_string)
            .collect()
    }

    /// Listing prefix for the keys of a folder
    pub fn folder_prefix(folder: &str) -> String {
        format!("{}/", folder)
    }

    pub fn is_driver_log(&self, key: &str) -> bool {
        key.contains(self.driver_segment.as_str()) && key.ends_with(self.log_suffix.as_str())
    }

    /// Non-blank line that looks like a JSON event
    pub fn is_event_line(&self, line: &str) -> bool {
        !line.trim().is_empty() && line.trim_start().starts_with(self.line_prefix.as_str())
    }
}

/// Split log content into lines. Besides `\n` and `\r\n`, a lone `\r`,
/// vertical tab, form feed and the `\x1c`-`\x1e` separators end a line; none
/// of them can appear raw inside a JSON event. A trailing break does not
/// produce an extra empty line.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find(is_line_break) {
            Some(pos) => {
                let line = &rest[..pos];
                let width = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[pos + width..];
                Some(line)
            }
            None => Some(std::mem::take(&mut rest)),
        }
    })
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\x0b' | '\x0c' | '\x1c'..='\x1e')
}
