//! Standardized mapping of engine HTTP responses and transport failures

use crate::error::{Result, SyncError};
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::Path;

/// Docker engine error body: `{"message": "..."}`
#[derive(Debug, Deserialize)]
struct EngineMessage {
    message: String,
}

/// Maps non-success engine responses onto [`SyncError`]
pub struct EngineErrorHandler;

impl EngineErrorHandler {
    /// Extract the engine's own message from a response body.
    ///
    /// Falls back to the raw body text so the cause is never lost.
    pub fn extract_message(body: &str) -> String {
        match serde_json::from_str::<EngineMessage>(body) {
            Ok(parsed) => parsed.message,
            Err(_) => body.trim().to_string(),
        }
    }

    /// Build the error for a failed engine call
    pub fn handle_engine_error(status: StatusCode, body: &str, operation: &str) -> SyncError {
        let message = Self::extract_message(body);
        let message = match status.as_u16() {
            401 => format!("Unauthorized to {}: {}", operation, message),
            403 => format!("Forbidden to {}: {}", operation, message),
            404 => format!("Not found during {}: {}", operation, message),
            409 => format!("Conflict during {}: {}", operation, message),
            500 => format!("Engine server error during {}: {}", operation, message),
            502 | 503 => format!("Engine unavailable for {}: {}", operation, message),
            _ => format!("{} failed: {}", operation, message),
        };

        SyncError::Engine {
            status: status.as_u16(),
            message,
        }
    }
}

/// Network error categorization and handling
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    /// Categorize and format network errors with helpful context
    pub fn handle_network_error(error: &reqwest::Error, context: &str) -> SyncError {
        if error.is_timeout() {
            SyncError::Timeout(format!("{} timeout: {}", context, error))
        } else if error.is_connect() {
            SyncError::Network(format!("Connection error during {}: {}", context, error))
        } else {
            SyncError::Network(format!("{} network error: {}", context, error))
        }
    }

    /// Same categorization for requests sent over the engine's Unix socket
    pub fn handle_socket_error(error: &hyper_util::client::legacy::Error, context: &str) -> SyncError {
        if error.is_connect() {
            SyncError::Network(format!("Connection error during {}: {}", context, error))
        } else {
            SyncError::Network(format!("{} socket error: {}", context, error))
        }
    }
}

/// Validation error utilities
pub struct ValidationErrorHandler;

impl ValidationErrorHandler {
    /// The images file must exist and be a regular file
    pub fn validate_input_file(file_path: &Path) -> Result<()> {
        if !file_path.exists() {
            return Err(SyncError::Validation(format!(
                "Images file does not exist: {}",
                file_path.display()
            )));
        }

        if !file_path.is_file() {
            return Err(SyncError::Validation(format!(
                "Images file is not a file: {}",
                file_path.display()
            )));
        }

        Ok(())
    }

    /// Username and password must be provided together
    pub fn validate_credentials(username: &str, password: &str) -> Result<()> {
        match (username.is_empty(), password.is_empty()) {
            (false, true) => Err(SyncError::Validation(
                "Password is required when username is provided".to_string(),
            )),
            (true, false) => Err(SyncError::Validation(
                "Username is required when password is provided".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn validate_timeout(timeout: u64) -> Result<()> {
        if timeout == 0 {
            return Err(SyncError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if timeout > 86400 {
            // 24 hours
            return Err(SyncError::Validation(
                "Timeout cannot exceed 24 hours (86400 seconds)".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_docker_message() {
        let body = r#"{"message":"No such image: nginx:missing"}"#;
        assert_eq!(
            EngineErrorHandler::extract_message(body),
            "No such image: nginx:missing"
        );
    }

    #[test]
    fn test_extract_falls_back_to_raw_body() {
        assert_eq!(
            EngineErrorHandler::extract_message("  page not found\n"),
            "page not found"
        );
    }

    #[test]
    fn test_engine_error_keeps_status_and_cause() {
        let err = EngineErrorHandler::handle_engine_error(
            StatusCode::NOT_FOUND,
            r#"{"message":"reference does not exist"}"#,
            "tag image",
        );
        match err {
            SyncError::Engine { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("reference does not exist"));
                assert!(message.contains("tag image"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_credentials_must_be_paired() {
        assert!(ValidationErrorHandler::validate_credentials("", "").is_ok());
        assert!(ValidationErrorHandler::validate_credentials("bob", "pw").is_ok());
        assert!(ValidationErrorHandler::validate_credentials("bob", "").is_err());
        assert!(ValidationErrorHandler::validate_credentials("", "pw").is_err());
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(ValidationErrorHandler::validate_timeout(0).is_err());
        assert!(ValidationErrorHandler::validate_timeout(300).is_ok());
        assert!(ValidationErrorHandler::validate_timeout(86401).is_err());
    }
}
