//! Append-only event log sinks.
//!
//! Agents and the kernel write event lines through an [`EventLogger`]; the
//! kernel writes its end-of-run summary through the same sink. Diagnostic
//! logging goes through `tracing` instead.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Append-only text sink.
pub trait EventLogger {
    fn log(&mut self, line: &str);
}

/// Logger writing one line per event to a file.
pub struct FileLogger {
    writer: BufWriter<File>,
}

impl FileLogger {
    /// Create or truncate the log file at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl EventLogger for FileLogger {
    fn log(&mut self, line: &str) {
        if let Err(err) = writeln!(self.writer, "{line}") {
            warn!(%err, "failed to write event log line");
        }
    }
}

impl Drop for FileLogger {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Logger collecting lines in memory, with a shareable handle for
/// inspection after the run.
#[derive(Clone, Default)]
pub struct MemoryLogger {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone observing the same line buffer.
    pub fn handle(&self) -> Self {
        self.clone()
    }

    /// Snapshot of the logged lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl EventLogger for MemoryLogger {
    fn log(&mut self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

/// Logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl EventLogger for NullLogger {
    fn log(&mut self, _line: &str) {}
}
