//! Submitter-side bookkeeping of known log files.
//!
//! Dropping the same file twice reuses its entry; only entries without a
//! report that are not currently in flight get queued again.

use crate::upload_queue::{LogEntry, LogStatus};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOG_EXTENSIONS: [&str; 3] = [".evtc", ".evtc.zip", ".zevtc"];

/// True for arcdps log files (`.evtc`, `.evtc.zip`, `.zevtc`)
pub fn is_log_file(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_ascii_lowercase();

    LOG_EXTENSIONS
        .iter()
        .any(|ext| name.len() > ext.len() && name.ends_with(ext))
}

#[derive(Debug, Default)]
pub struct LogRegistry {
    entries: IndexMap<PathBuf, Arc<LogEntry>>,
}

impl LogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `path`, creating it if unknown. The flag is true
    /// for newly created entries.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> (Arc<LogEntry>, bool) {
        let path = path.into();
        if let Some(existing) = self.entries.get(&path) {
            return (Arc::clone(existing), false);
        }

        let entry = Arc::new(LogEntry::new(path.clone()));
        self.entries.insert(path, Arc::clone(&entry));
        (entry, true)
    }

    pub fn get(&self, path: &Path) -> Option<&Arc<LogEntry>> {
        self.entries.get(path)
    }

    /// Whether `entry` needs to be (re)queued
    pub fn should_submit(entry: &LogEntry) -> bool {
        entry.report().is_none() && !entry.is_in_flight()
    }

    /// (finished, total), where finished counts `Done` and `Error` entries
    pub fn progress(&self) -> (usize, usize) {
        let finished = self
            .entries
            .values()
            .filter(|entry| entry.status().is_terminal())
            .count();
        (finished, self.entries.len())
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<LogEntry>> {
        self.entries.values()
    }

    /// Entries that finished with a report, in insertion order
    pub fn uploaded(&self) -> impl Iterator<Item = &Arc<LogEntry>> {
        self.entries
            .values()
            .filter(|entry| entry.status() == LogStatus::Done)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
