//! Logging and output control
//!
//! This module provides the [`Logger`] for controlling output verbosity, formatting logs,
//! and tracking operation timing. Every message can additionally be appended to a log
//! file so that a session leaves a trail after the terminal is gone.

use crate::error::{Result, SyncError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Logger responsible for all user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
    log_file: Option<Arc<Mutex<File>>>,
    log_path: Option<PathBuf>,
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
            log_file: None,
            log_path: None,
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
            log_file: None,
            log_path: None,
        }
    }

    /// Append every message to `path` as well.
    ///
    /// The file is opened in append mode and created when missing.
    pub fn with_log_file(mut self, path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                SyncError::Io(format!("Cannot open log file {}: {}", path.display(), e))
            })?;
        self.log_file = Some(Arc::new(Mutex::new(file)));
        self.log_path = Some(path.to_path_buf());
        Ok(self)
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        self.record("INFO", title);
        if !self.quiet {
            println!("\n=== {} ===", title);
        }
    }

    /// Sub-section heading
    pub fn subsection(&self, title: &str) {
        self.record("INFO", title);
        if !self.quiet {
            println!("\n--- {} ---", title);
        }
    }

    pub fn verbose(&self, message: &str) {
        self.record("INFO", message);
        if self.verbose && !self.quiet {
            println!("📝 {}", message);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        self.record("INFO", message);
        if !self.quiet {
            println!("ℹ️  {}", message);
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        self.record("INFO", message);
        if !self.quiet {
            println!("✅ {}", message);
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        self.record("WARNING", message);
        if !self.quiet {
            println!("⚠️  WARNING: {}", message);
        }
    }

    /// Error message
    pub fn error(&self, message: &str) {
        self.record("ERROR", message);
        eprintln!("❌ ERROR: {}", message);
    }

    /// Step information
    pub fn step(&self, message: &str) {
        self.record("INFO", message);
        if !self.quiet {
            println!("▶️  {}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        self.record("DEBUG", message);
        if self.verbose && !self.quiet {
            println!("   {}", message);
        }
    }

    // Structured list output
    pub fn list(&self, title: &str, items: &[String]) {
        self.record("INFO", &format!("{} ({} items)", title, items.len()));
        if !self.quiet {
            self.subsection(title);
            for (i, item) in items.iter().enumerate() {
                println!("  {}. {}", i + 1, item);
            }

            if items.is_empty() {
                println!("  (No items to display)");
            }
        }
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if !self.quiet {
            self.subsection(title);
            for (key, value) in items {
                println!("  {}: {}", key, value);
            }
        }
    }

    /// Format file size in human-readable units
    pub fn format_size(&self, bytes: u64) -> String {
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else if bytes < 1024 * 1024 * 1024 {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        } else {
            format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    /// Append a line to the log file only, without printing it
    pub fn record(&self, level: &str, message: &str) {
        let Some(file) = &self.log_file else {
            return;
        };
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        // Logging must never take the operation down with it
        if let Ok(mut file) = file.lock() {
            let _ = writeln!(file, "{}: [{}] {}", level, timestamp, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        let logger = Logger::new_quiet();
        assert_eq!(logger.format_size(512), "512 B");
        assert_eq!(logger.format_size(2048), "2.0 KB");
        assert_eq!(logger.format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(logger.format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_format_duration() {
        let logger = Logger::new_quiet();
        assert_eq!(logger.format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(logger.format_duration(Duration::from_secs(125)), "2m5s");
        assert_eq!(logger.format_duration(Duration::from_secs(3725)), "1h2m5s");
    }

    #[test]
    fn test_log_file_receives_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        let logger = Logger::new_quiet().with_log_file(&path).unwrap();

        logger.info("tagging started");
        logger.warning("slow registry");
        logger.error("push failed");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("INFO: "));
        assert!(contents.contains("tagging started"));
        assert!(contents.contains("WARNING: "));
        assert!(contents.contains("ERROR: "));
        assert_eq!(logger.log_path(), Some(path.as_path()));
    }

    #[test]
    fn test_log_file_appends_across_loggers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");

        Logger::new_quiet().with_log_file(&path).unwrap().info("first");
        Logger::new_quiet().with_log_file(&path).unwrap().info("second");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("logs.txt");
        assert!(Logger::new(false).with_log_file(&path).is_err());
    }
}
