use crate::upload_queue::LogStatus;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the upload pipeline
#[derive(Debug, Error)]
pub enum UploadError {
    /// Source file could not be opened or read (raised before any network call)
    #[error("Failed to read {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connection refused, timeout, or failure while reading the response body
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-retryable HTTP status from the report service
    #[error("upload failed: {status}")]
    Server { status: StatusCode, headers: HeaderMap },

    /// Response body was not a valid report
    #[error("could not read report response: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    /// Retry cap reached while the service kept rate limiting or failing
    #[error("upload abandoned after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Status machine contract violation
    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition { from: LogStatus, to: LogStatus },

    /// Entry already has a processing cycle in flight
    #[error("{} is already queued or uploading", path.display())]
    AlreadyInFlight { path: PathBuf },

    /// Entry already carries a report
    #[error("{} has already been uploaded", path.display())]
    AlreadyUploaded { path: PathBuf },

    /// Submission after the queue has been closed
    #[error("upload queue is closed")]
    QueueClosed,

    /// Invalid uploader configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse error categories, used for reporting and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    LocalIo,
    Transport,
    Server,
    Parse,
    RetriesExhausted,
    Contract,
    Config,
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::LocalIo { .. } => ErrorKind::LocalIo,
            UploadError::Transport(_) => ErrorKind::Transport,
            UploadError::Server { .. } => ErrorKind::Server,
            UploadError::Parse { .. } => ErrorKind::Parse,
            UploadError::RetriesExhausted { .. } => ErrorKind::RetriesExhausted,
            UploadError::IllegalTransition { .. }
            | UploadError::AlreadyInFlight { .. }
            | UploadError::AlreadyUploaded { .. }
            | UploadError::QueueClosed => ErrorKind::Contract,
            UploadError::Config(_) => ErrorKind::Config,
        }
    }

    /// HTTP status carried by a server error, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UploadError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}
