// Module declarations
mod log_entry;
mod processor;
mod rate_gate;
mod report;
mod types;
pub mod upload;

pub use log_entry::{LogEntry, LogEntrySnapshot};
pub use processor::{QueueEntry, UploadCallbacks, UploadResult, WorkerPool};
pub use rate_gate::{RateGate, RateLimit};
pub use report::{epoch_seconds, Encounter, Report};
pub use types::*;
pub use upload::{RetryController, RetryPolicy};

use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::events::{EventBus, EventReceiver};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Id used in logs for work completed on the submitting task
const SUBMITTER_ID: usize = usize::MAX;

/// Running upload pipeline: one shared rate gate, one bounded queue and a
/// fixed pool of workers draining it.
pub struct Uploader {
    sender: Mutex<Option<mpsc::Sender<QueueEntry>>>,
    workers: Mutex<Option<WorkerPool>>,
    gate: Arc<RateGate>,
    events: EventBus,
    defaults: UploadOptions,
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("open", &self.is_open())
            .field("gate", &self.gate)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl Uploader {
    /// Build the pipeline and spawn its workers. Must be called from within
    /// a tokio runtime.
    pub fn start(config: &UploaderConfig) -> Result<Self, UploadError> {
        config.validate()?;
        let endpoint = config.endpoint_url()?;

        let client = reqwest::Client::builder()
            .timeout(config.retry.request_timeout())
            .build()?;

        let gate = Arc::new(RateGate::new(config.rate_limit.to_rate_limit()?));
        let controller = Arc::new(RetryController::new(
            client,
            endpoint,
            Arc::clone(&gate),
            config.retry.to_policy(),
        ));

        let events = EventBus::new(EVENT_BUS_CAPACITY);
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let workers = WorkerPool::spawn(config.worker_count, receiver, controller, events.clone());

        info!(
            endpoint = %config.endpoint,
            workers = config.worker_count,
            queue_capacity = config.queue_capacity,
            "🚀 Uploader started"
        );

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(Some(workers)),
            gate,
            events,
            defaults: config.defaults,
        })
    }

    /// Queue `entry` with the configured default options
    pub async fn submit(
        &self,
        entry: Arc<LogEntry>,
        callbacks: UploadCallbacks,
    ) -> Result<(), UploadError> {
        self.submit_with(entry, self.defaults, callbacks).await
    }

    /// Queue `entry` for upload.
    ///
    /// Waits while the queue is full. Entries that are already uploaded or
    /// already in flight are refused without touching their state. If the
    /// queue has been closed the entry ends in `Error` and `on_done` fires
    /// before `QueueClosed` is returned.
    pub async fn submit_with(
        &self,
        entry: Arc<LogEntry>,
        options: UploadOptions,
        callbacks: UploadCallbacks,
    ) -> Result<(), UploadError> {
        entry.begin_cycle(&options)?;
        debug!(file = %entry.path().display(), ?options, "Queued for upload");

        self.events.publish_status(entry.path(), LogStatus::WaitingInQueue);
        callbacks.changed(&entry);

        let sender = lock(&self.sender).as_ref().cloned();
        let job = QueueEntry {
            entry,
            options,
            callbacks,
        };

        let rejected = match sender {
            Some(sender) => match sender.send(job).await {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        warn!(file = %rejected.entry.path().display(), "Upload queue closed, dropping submission");
        let QueueEntry {
            entry, callbacks, ..
        } = rejected;
        complete_rejected(&entry, callbacks, &self.events);
        Err(UploadError::QueueClosed)
    }

    /// Receive progress events for every entry
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    pub fn rate_gate(&self) -> &Arc<RateGate> {
        &self.gate
    }

    pub fn defaults(&self) -> UploadOptions {
        self.defaults
    }

    pub fn is_open(&self) -> bool {
        lock(&self.sender).is_some()
    }

    /// Close the queue and wait for workers to finish everything already
    /// queued. Later submissions fail with `QueueClosed`.
    pub async fn shutdown(&self) {
        lock(&self.sender).take();

        let workers = lock(&self.workers).take();
        if let Some(workers) = workers {
            info!(workers = workers.size(), "Draining upload queue");
            workers.join().await;
            info!("🛑 Uploader stopped");
        }
    }
}

fn complete_rejected(entry: &LogEntry, callbacks: UploadCallbacks, events: &EventBus) {
    processor::complete(
        SUBMITTER_ID,
        entry,
        Err(Arc::new(UploadError::QueueClosed)),
        callbacks,
        events,
    );
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
