//! Progress sinks for assertions

use image_sync::registry::{ProgressSink, Severity};
use std::sync::Mutex;

/// Writes each line one character at a time, yielding between characters.
///
/// Two unsynchronized writers sharing this sink would interleave their characters.
#[derive(Default)]
pub struct CharByCharSink {
    text: Mutex<String>,
}

impl CharByCharSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text
            .lock()
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl ProgressSink for CharByCharSink {
    fn emit(&self, line: &str, _severity: Severity) {
        for c in line.chars().chain(std::iter::once('\n')) {
            self.text.lock().unwrap().push(c);
            std::thread::yield_now();
        }
    }
}
