//! Per-file upload record and its status state machine.
//!
//! A `LogEntry` is owned by the submitter (usually through `Arc`) and mutated
//! only by the worker running its current processing cycle. The `in_flight`
//! flag enforces that at most one cycle exists per entry at any time.

use crate::error::UploadError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::report::Report;
use super::types::{DetailedStatus, LogStatus, UploadOptions};

/// Point-in-time copy of an entry's mutable fields
#[derive(Debug, Clone)]
pub struct LogEntrySnapshot {
    pub status: LogStatus,
    pub detailed: DetailedStatus,
    pub anonymized: bool,
    /// Included in the output set (set on successful upload)
    pub checked: bool,
    pub report: Option<Report>,
    pub error: Option<Arc<UploadError>>,
}

impl Default for LogEntrySnapshot {
    fn default() -> Self {
        Self {
            status: LogStatus::Outstanding,
            detailed: DetailedStatus::default(),
            anonymized: false,
            checked: false,
            report: None,
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct LogEntry {
    path: PathBuf,
    in_flight: AtomicBool,
    state: Mutex<LogEntrySnapshot>,
}

impl LogEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            in_flight: AtomicBool::new(false),
            state: Mutex::new(LogEntrySnapshot::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the source file
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn status(&self) -> LogStatus {
        self.state().status
    }

    pub fn detailed(&self) -> DetailedStatus {
        self.state().detailed
    }

    pub fn anonymized(&self) -> bool {
        self.state().anonymized
    }

    pub fn is_checked(&self) -> bool {
        self.state().checked
    }

    pub fn report(&self) -> Option<Report> {
        self.state().report.clone()
    }

    pub fn error(&self) -> Option<Arc<UploadError>> {
        self.state().error.clone()
    }

    pub fn snapshot(&self) -> LogEntrySnapshot {
        self.state().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Move to `next`, returning the previous status. Only the worker running
    /// the current cycle calls this.
    pub(crate) fn transition(&self, next: LogStatus) -> Result<LogStatus, UploadError> {
        let mut state = self.state();
        Self::apply_transition(&mut state, next)
    }

    /// Start a processing cycle: claim the single-flight slot, record the
    /// option snapshot and move to `WaitingInQueue`.
    pub(crate) fn begin_cycle(&self, options: &UploadOptions) -> Result<(), UploadError> {
        let mut state = self.state();

        if state.status == LogStatus::Done {
            return Err(UploadError::AlreadyUploaded {
                path: self.path.clone(),
            });
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(UploadError::AlreadyInFlight {
                path: self.path.clone(),
            });
        }

        if let Err(e) = Self::apply_transition(&mut state, LogStatus::WaitingInQueue) {
            self.in_flight.store(false, Ordering::Release);
            return Err(e);
        }

        state.anonymized = options.anonymous;
        state.detailed = if options.detailed_wvw {
            DetailedStatus::Requested
        } else {
            DetailedStatus::Declined
        };
        state.error = None;
        Ok(())
    }

    pub(crate) fn mark_detailed_forced_off(&self) {
        let mut state = self.state();
        if state.detailed == DetailedStatus::Requested {
            state.detailed = DetailedStatus::ForcedOff;
        }
    }

    /// End the current cycle with its terminal outcome and release the
    /// single-flight slot.
    pub(crate) fn finish(&self, result: &Result<Report, Arc<UploadError>>) -> Result<(), UploadError> {
        let outcome = {
            let mut state = self.state();
            match result {
                Ok(report) => Self::apply_transition(&mut state, LogStatus::Done).map(|_| {
                    state.report = Some(report.clone());
                    state.checked = true;
                    state.error = None;
                }),
                Err(error) => Self::apply_transition(&mut state, LogStatus::Error).map(|_| {
                    state.error = Some(Arc::clone(error));
                }),
            }
        };

        self.in_flight.store(false, Ordering::Release);
        outcome
    }

    fn apply_transition(
        state: &mut LogEntrySnapshot,
        next: LogStatus,
    ) -> Result<LogStatus, UploadError> {
        let previous = state.status;
        if !previous.can_transition_to(next) {
            return Err(UploadError::IllegalTransition {
                from: previous,
                to: next,
            });
        }
        debug!(from = %previous, to = %next, "Status transition");
        state.status = next;
        Ok(previous)
    }

    fn state(&self) -> MutexGuard<'_, LogEntrySnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
