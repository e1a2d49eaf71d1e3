use std::io::{self, Write};

use serde::Serialize;
use serde_json::Serializer;
use serde_json::ser::PrettyFormatter;

use sparkscan_types::ExtractedRecord;

/// Where emitted records and progress messages go
pub trait RecordSink {
    fn progress(&mut self, message: &str) -> io::Result<()>;

    fn record(&mut self, record: &ExtractedRecord) -> io::Result<()>;
}

/// How records are rendered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecordFormat {
    /// Blank line, then the record indented by four spaces
    #[default]
    Pretty,
    /// One record per line
    Compact,
}

/// Writes records and progress lines to a writer (usually stdout)
pub struct ConsoleSink<W: Write> {
    writer: W,
    format: RecordFormat,
    show_progress: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            format: RecordFormat::Pretty,
            show_progress: true,
        }
    }

    pub fn with_format(mut self, format: RecordFormat) -> Self {
        self.format = format;
        self
    }

    /// Hide progress lines so only records are written
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for ConsoleSink<W> {
    fn progress(&mut self, message: &str) -> io::Result<()> {
        if self.show_progress {
            writeln!(self.writer, "{}", message)?;
        }
        Ok(())
    }

    fn record(&mut self, record: &ExtractedRecord) -> io::Result<()> {
        match self.format {
            RecordFormat::Pretty => {
                writeln!(self.writer)?;
                let mut serializer =
                    Serializer::with_formatter(&mut self.writer, PrettyFormatter::with_indent(b"    "));
                record.serialize(&mut serializer)?;
                writeln!(self.writer)?;
            }
            RecordFormat::Compact => {
                serde_json::to_writer(&mut self.writer, record)?;
                writeln!(self.writer)?;
            }
        }
        self.writer.flush()
    }
}

/// Records as newline-delimited JSON
pub(crate) fn to_json_lines(records: &[ExtractedRecord]) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.push(b'\n');
    }
    Ok(out)
}
