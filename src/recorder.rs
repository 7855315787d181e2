use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::stream::StreamError;
use crate::types::SinkRecord;

/// Append-only destination for results and failure reports.
pub trait ResultSink: Send {
    /// Appends one record; it must be durable once this returns.
    fn record(&mut self, record: &SinkRecord) -> Result<(), StreamError>;

    fn flush(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}

/// One JSON object per line, opened in append mode, flushed after every record.
pub struct JsonlRecorder {
    writer: BufWriter<File>,
}

impl JsonlRecorder {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StreamError> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::info!("recording results to {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl ResultSink for JsonlRecorder {
    fn record(&mut self, record: &SinkRecord) -> Result<(), StreamError> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|e| StreamError::Io(e.into()))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        self.writer.flush()?;
        Ok(())
    }
}
