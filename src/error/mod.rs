//! Error types for engine, transfer and archive operations

pub mod handlers;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// A precondition was not met before any network activity started
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Tag, push or pull primitive failed
    #[error("Transfer error: {0}")]
    Transfer(String),
    /// Archive creation, compression or entry read failed
    #[error("Archive error: {0}")]
    Archive(String),
    /// Local image store query failed
    #[error("Catalog error: {0}")]
    Catalog(String),
    /// Container engine answered with a non-success status
    #[error("Engine error (status {status}): {message}")]
    Engine { status: u16, message: String },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl SyncError {
    /// Re-wrap an error as a transfer failure, keeping its message verbatim
    pub fn into_transfer(self) -> Self {
        match self {
            SyncError::Transfer(_) | SyncError::Cancelled(_) | SyncError::Timeout(_) => self,
            other => SyncError::Transfer(other.to_string()),
        }
    }

    /// Re-wrap an error as a catalog failure, keeping its message verbatim
    pub fn into_catalog(self) -> Self {
        match self {
            SyncError::Catalog(_) => self,
            other => SyncError::Catalog(other.to_string()),
        }
    }

    /// Re-wrap an error as an archive failure, keeping its message verbatim
    pub fn into_archive(self) -> Self {
        match self {
            SyncError::Archive(_) => self,
            other => SyncError::Archive(other.to_string()),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "engine request")
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::Validation(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        SyncError::Io(format!("Background task failed: {}", err))
    }
}
