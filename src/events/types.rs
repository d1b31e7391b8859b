use crate::error::{ErrorKind, UploadError};
use crate::upload_queue::{LogStatus, Report};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sequence number for ordering events
pub type EventSequence = u64;

/// Progress event for one log file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadEvent {
    pub sequence: EventSequence,
    pub timestamp: DateTime<Utc>,
    pub file: PathBuf,
    pub payload: UploadEventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEventPayload {
    /// Entry moved to a new status
    StatusChanged { status: LogStatus },

    /// Detailed WvW was rejected by the service and turned off
    DetailedForcedOff,

    /// Processing cycle finished
    UploadCompleted { outcome: UploadOutcome },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum UploadOutcome {
    Done { permalink: String },
    Failed { kind: ErrorKind, message: String },
}

impl UploadOutcome {
    pub fn from_result(result: Result<&Report, &UploadError>) -> Self {
        match result {
            Ok(report) => UploadOutcome::Done {
                permalink: report.permalink.clone(),
            },
            Err(err) => UploadOutcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}

impl UploadEvent {
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn payload_type(&self) -> &str {
        match &self.payload {
            UploadEventPayload::StatusChanged { .. } => "status_changed",
            UploadEventPayload::DetailedForcedOff => "detailed_forced_off",
            UploadEventPayload::UploadCompleted { .. } => "upload_completed",
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self.payload, UploadEventPayload::UploadCompleted { .. })
    }
}
