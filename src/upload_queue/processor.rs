//! Fixed-size worker pool draining the upload queue.
//!
//! Each worker loops: receive a queue entry (waiting while the queue is
//! empty), run the retry controller to a terminal outcome, record it on the
//! entry, fire `on_done`. Workers exit once the queue is closed and drained;
//! there is no mid-flight cancellation.

use crate::error::UploadError;
use crate::events::{EventBus, UploadEventPayload, UploadOutcome};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::log_entry::LogEntry;
use super::report::Report;
use super::types::UploadOptions;
use super::upload::{RetryController, UploadProgress};

/// Outcome delivered to `on_done`
pub type UploadResult = Result<Report, Arc<UploadError>>;

type ChangeCallback = Arc<dyn Fn(&LogEntry) + Send + Sync>;
type DoneCallback = Box<dyn FnOnce(&LogEntry, UploadResult) + Send>;

/// Per-submission callbacks.
///
/// `on_change` fires after every status mutation; `on_done` fires exactly once
/// per processing cycle. Both run on the worker; a panic inside either is
/// logged and swallowed so the worker and the entry keep going.
#[derive(Default)]
pub struct UploadCallbacks {
    on_change: Option<ChangeCallback>,
    on_done: Option<DoneCallback>,
}

impl std::fmt::Debug for UploadCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCallbacks")
            .field("on_change", &self.on_change.is_some())
            .field("on_done", &self.on_done.is_some())
            .finish()
    }
}

impl UploadCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_change(mut self, callback: impl Fn(&LogEntry) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(callback));
        self
    }

    pub fn on_done(
        mut self,
        callback: impl FnOnce(&LogEntry, UploadResult) + Send + 'static,
    ) -> Self {
        self.on_done = Some(Box::new(callback));
        self
    }

    pub(crate) fn changed(&self, entry: &LogEntry) {
        notify_change(self.on_change.as_ref(), entry);
    }

    pub(crate) fn done(self, entry: &LogEntry, result: UploadResult) {
        if let Some(callback) = self.on_done {
            if catch_unwind(AssertUnwindSafe(|| callback(entry, result))).is_err() {
                error!(file = %entry.path().display(), "on_done callback panicked");
            }
        }
    }
}

fn notify_change(callback: Option<&ChangeCallback>, entry: &LogEntry) {
    if let Some(callback) = callback {
        if catch_unwind(AssertUnwindSafe(|| callback(entry))).is_err() {
            error!(file = %entry.path().display(), "on_change callback panicked");
        }
    }
}

/// Transient envelope handed from the submitter to a worker
#[derive(Debug)]
pub struct QueueEntry {
    pub entry: Arc<LogEntry>,
    pub options: UploadOptions,
    pub callbacks: UploadCallbacks,
}

/// Long-lived upload workers
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers sharing `receiver`
    pub fn spawn(
        size: usize,
        receiver: mpsc::Receiver<QueueEntry>,
        controller: Arc<RetryController>,
        events: EventBus,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..size)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let controller = Arc::clone(&controller);
                let events = events.clone();

                tokio::spawn(async move {
                    info!(worker = worker_id, "📤 Upload worker started");
                    while let Some(job) = next_job(&receiver).await {
                        process_job(worker_id, job, &controller, &events).await;
                    }
                    info!(worker = worker_id, "📤 Upload worker stopped");
                })
            })
            .collect();

        Self { handles }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to drain the closed queue and exit
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Upload worker terminated abnormally: {}", e);
            }
        }
    }
}

async fn next_job(receiver: &Mutex<mpsc::Receiver<QueueEntry>>) -> Option<QueueEntry> {
    receiver.lock().await.recv().await
}

async fn process_job(
    worker_id: usize,
    job: QueueEntry,
    controller: &RetryController,
    events: &EventBus,
) {
    let QueueEntry {
        entry,
        mut options,
        callbacks,
    } = job;

    // Only the shareable half is borrowed across the upload's await points
    let on_change = callbacks.on_change.clone();
    let result = controller
        .run(entry.path(), &mut options, |progress| {
            handle_progress(worker_id, &entry, progress, on_change.as_ref(), events)
        })
        .await
        .map_err(Arc::new);

    complete(worker_id, &entry, result, callbacks, events);
}

fn handle_progress(
    worker_id: usize,
    entry: &LogEntry,
    progress: UploadProgress,
    on_change: Option<&ChangeCallback>,
    events: &EventBus,
) {
    let payload = match progress {
        UploadProgress::Status(status) => {
            if let Err(e) = entry.transition(status) {
                error!(worker = worker_id, file = %entry.path().display(), "{}", e);
                return;
            }
            UploadEventPayload::StatusChanged { status }
        }
        UploadProgress::DetailedForcedOff => {
            entry.mark_detailed_forced_off();
            UploadEventPayload::DetailedForcedOff
        }
    };

    events.publish(entry.path(), payload);
    notify_change(on_change, entry);
}

/// Record the terminal outcome on the entry, announce it and fire `on_done`
pub(crate) fn complete(
    worker_id: usize,
    entry: &LogEntry,
    result: UploadResult,
    callbacks: UploadCallbacks,
    events: &EventBus,
) {
    // An outcome the entry refused to record is reported as that refusal
    let result = match entry.finish(&result) {
        Ok(()) => result,
        Err(e) => {
            error!(worker = worker_id, file = %entry.path().display(), "{}", e);
            Err(Arc::new(e))
        }
    };

    match &result {
        Ok(report) => {
            if report.has_server_error() {
                warn!(
                    file = %entry.path().display(),
                    server_error = report.error.as_deref().unwrap_or_default(),
                    "✓ Uploaded with server-reported error"
                );
            } else {
                info!(file = %entry.path().display(), permalink = %report.permalink, "✓ Upload successful");
            }
        }
        Err(e) => {
            error!(file = %entry.path().display(), kind = ?e.kind(), "✗ Upload failed: {}", e);
        }
    }

    let outcome = UploadOutcome::from_result(result.as_ref().map_err(|e| e.as_ref()));
    events.publish_status(entry.path(), entry.status());
    events.publish(entry.path(), UploadEventPayload::UploadCompleted { outcome });

    callbacks.changed(entry);
    callbacks.done(entry, result);
}
