use super::types::{EventSequence, UploadEvent, UploadEventPayload};
use crate::upload_queue::LogStatus;
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

pub type EventReceiver = broadcast::Receiver<UploadEvent>;

/// Fan-out of upload progress to any number of observers.
///
/// Publishing never fails: with nobody listening the event is dropped. Slow
/// receivers lag and skip events rather than stalling workers.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<UploadEvent>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn publish(&self, file: &Path, payload: UploadEventPayload) {
        if self.sender.receiver_count() == 0 {
            trace!(file = %file.display(), "No event subscribers");
            return;
        }

        let event = UploadEvent {
            sequence: self.next_sequence(),
            timestamp: Utc::now(),
            file: file.to_path_buf(),
            payload,
        };

        // The last receiver may have gone away since the count above
        let _ = self.sender.send(event);
    }

    pub fn publish_status(&self, file: &Path, status: LogStatus) {
        self.publish(file, UploadEventPayload::StatusChanged { status });
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    fn next_sequence(&self) -> EventSequence {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }
}
