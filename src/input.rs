//! Image reference files
//!
//! One reference per line, taken verbatim. Blank lines and `#` lines are not special.

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{Result, SyncError};
use std::path::Path;

/// Read every line of `path` as an image reference, in file order
pub fn read_reference_file(path: &Path) -> Result<Vec<String>> {
    ValidationErrorHandler::validate_input_file(path)?;

    let content = std::fs::read_to_string(path).map_err(|e| {
        SyncError::Io(format!("Failed to read images file {}: {}", path.display(), e))
    })?;

    Ok(parse_references(&content))
}

/// Split file content into references; a trailing `\r` from CRLF files is dropped
pub fn parse_references(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}
