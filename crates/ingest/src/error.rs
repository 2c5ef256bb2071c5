use thiserror::Error;

use marketfeed_athena::AthenaError;
use marketfeed_queue::error::QueueError;
use marketfeed_storage::StorageError;

/// Failure while discovering, fetching, or landing a file.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid file pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Fetch task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Registry unavailable: {0}")]
    Registry(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("Invalid landed-file event: {0}")]
    Event(String),

    #[error("Event JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Marker check failed: {0}")]
    Marker(#[from] StorageError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] AthenaError),
}
