//! Type definitions for the upload pipeline.
//!
//! Defines the per-file status machine, the detail flag, the per-submission
//! option snapshot, and pipeline constants.

use serde::{Deserialize, Serialize};
use std::fmt;

// Number of long-lived upload workers
pub const DEFAULT_WORKER_COUNT: usize = 5;

// Queue capacity; large enough that a normal batch never blocks the producer
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

// Broadcast buffer for progress events
pub const EVENT_BUS_CAPACITY: usize = 1024;

/// Lifecycle of a single log file upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    /// Created, not yet submitted
    Outstanding,
    /// Sitting in the upload queue
    WaitingInQueue,
    /// Waiting for a rate limit token (normal pacing)
    WaitingRateLimited,
    /// Honoring a server-issued cool-down after a 429
    WaitingRateLimitedHard,
    /// Request dispatched
    Uploading,
    Done,
    Error,
}

impl LogStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, LogStatus::Done | LogStatus::Error)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// The retry loop revisits the waiting states, so `Uploading` may fall
    /// back to `WaitingRateLimited` (detail downgrade) or
    /// `WaitingRateLimitedHard` (429). `Error -> WaitingInQueue` is the only
    /// way out of a terminal state.
    pub fn can_transition_to(self, next: LogStatus) -> bool {
        use LogStatus::*;

        matches!(
            (self, next),
            (Outstanding, WaitingInQueue)
                | (Error, WaitingInQueue)
                | (WaitingInQueue, WaitingRateLimited)
                | (WaitingInQueue, Error)
                | (WaitingRateLimited, Uploading)
                | (WaitingRateLimited, Error)
                | (Uploading, WaitingRateLimited)
                | (Uploading, WaitingRateLimitedHard)
                | (Uploading, Done)
                | (Uploading, Error)
                | (WaitingRateLimitedHard, WaitingRateLimited)
                | (WaitingRateLimitedHard, Error)
        )
    }

    /// Short human readable label
    pub fn label(self) -> &'static str {
        match self {
            LogStatus::Outstanding => "Outstanding",
            LogStatus::WaitingInQueue => "Waiting (Queue)",
            LogStatus::WaitingRateLimited => "Waiting (Rate Limit)",
            LogStatus::WaitingRateLimitedHard => "Waiting (Rate Limited)",
            LogStatus::Uploading => "Uploading",
            LogStatus::Done => "Done",
            LogStatus::Error => "Error",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Detailed WvW analysis flag of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailedStatus {
    #[default]
    Requested,
    Declined,
    /// Requested, but the service rejected it and the upload fell back
    ForcedOff,
}

/// Per-submission snapshot of upload settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadOptions {
    #[serde(rename = "detailedWvw")]
    pub detailed_wvw: bool,
    pub anonymous: bool,
}

impl UploadOptions {
    pub fn new(detailed_wvw: bool, anonymous: bool) -> Self {
        Self {
            detailed_wvw,
            anonymous,
        }
    }
}
