//! Progress output for transfers
//!
//! Engine push/pull calls stream newline-delimited JSON status messages. Each job
//! reassembles its own chunks into whole lines ([`LineBuffer`]), decodes them
//! ([`decode_line`]) and hands complete lines to one shared [`ProgressSink`].
//! Concurrent jobs share the sink through a [`SerializedSink`], so a line is always
//! written in one piece.

use crate::logging::Logger;
use serde::Deserialize;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Color/severity hint for a progress line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Write-only observer of transfer output
pub trait ProgressSink: Send + Sync {
    fn emit(&self, line: &str, severity: Severity);
}

/// Guards an inner sink with a single writer lock
pub struct SerializedSink {
    inner: Arc<dyn ProgressSink>,
    lock: Mutex<()>,
}

impl SerializedSink {
    pub fn new(inner: Arc<dyn ProgressSink>) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
        }
    }

    /// Write several lines without another writer getting in between
    pub fn emit_all(&self, lines: &[(String, Severity)]) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (line, severity) in lines {
            self.inner.emit(line, *severity);
        }
    }
}

impl ProgressSink for SerializedSink {
    fn emit(&self, line: &str, severity: Severity) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.inner.emit(line, severity);
    }
}

type Writer = Mutex<Box<dyn Write + Send>>;

/// Terminal sink: white, green or red text, mirrored into the log file.
///
/// Lines are printed regardless of the logger's quiet flag, which only silences
/// the logger's own headings and notes.
pub struct ConsoleSink {
    logger: Logger,
    out: Writer,
    err: Writer,
}

impl ConsoleSink {
    pub fn new(logger: Logger) -> Self {
        Self::with_writers(logger, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Same sink writing to the given streams instead of stdout and stderr
    pub fn with_writers(
        logger: Logger,
        out: Box<dyn Write + Send>,
        err: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            logger,
            out: Mutex::new(out),
            err: Mutex::new(err),
        }
    }

    fn write(writer: &Writer, color: &str, line: &str) {
        let mut writer = writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let _ = writeln!(writer, "\x1b[{}m{}\x1b[0m", color, line);
        let _ = writer.flush();
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&self, line: &str, severity: Severity) {
        match severity {
            Severity::Info => {
                self.logger.record("INFO", line);
                Self::write(&self.out, "37", line);
            }
            Severity::Success => {
                self.logger.record("INFO", line);
                Self::write(&self.out, "32", line);
            }
            Severity::Error => {
                self.logger.record("ERROR", line);
                Self::write(&self.err, "31", line);
            }
        }
    }
}

/// Collects lines in memory, for callers that render output themselves
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<(String, Severity)>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(String, Severity)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// All lines joined with `\n`
    pub fn text(&self) -> String {
        self.lines()
            .into_iter()
            .map(|(line, _)| line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(line, _)| line.contains(needle))
    }
}

impl ProgressSink for BufferSink {
    fn emit(&self, line: &str, severity: Severity) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((line.to_string(), severity));
        }
    }
}

/// Reassembles arbitrarily chunked bytes into whole lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns every line completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever is left once the stream ended without a final newline
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// One JSON status message from the engine
#[derive(Debug, Deserialize)]
struct ProgressMessage {
    id: Option<String>,
    status: Option<String>,
    progress: Option<String>,
    error: Option<String>,
    #[serde(rename = "errorDetail")]
    error_detail: Option<ErrorDetail>,
}

/// A decoded line of transfer output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressLine {
    Text(String),
    /// The engine reported a failure inside an otherwise successful response
    Failure(String),
}

/// Decode one line of engine output. Blank lines yield `None`; lines that are not
/// engine JSON are passed through unchanged.
pub fn decode_line(line: &str) -> Option<ProgressLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(message) = serde_json::from_str::<ProgressMessage>(trimmed) else {
        return Some(ProgressLine::Text(line.to_string()));
    };

    let detail = message.error_detail.and_then(|detail| detail.message);
    if let Some(error) = detail.or(message.error) {
        return Some(ProgressLine::Failure(error));
    }

    let body: Vec<&str> = [message.status.as_deref(), message.progress.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect();

    let rendered = match (message.id.as_deref(), body.is_empty()) {
        (_, true) => trimmed.to_string(),
        (Some(id), false) => format!("{}: {}", id, body.join(" ")),
        (None, false) => body.join(" "),
    };
    Some(ProgressLine::Text(rendered))
}
