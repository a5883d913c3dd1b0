use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use crate::core::error::{Error, Result};
use crate::core::types::TranslationUnit;
use crate::search::results::Match;

/// Opaque handle of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        TaskId::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result payload of a completed task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TaskOutput {
    Imported(usize),
    Exported(usize),
    Matches(Vec<Match>),
    Units(Vec<TranslationUnit>),
    Languages(BTreeSet<String>),
    Flagged(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TaskStatus {
    Pending,
    Completed(TaskOutput),
    Failed(String),
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

struct TaskEntry {
    status: TaskStatus,
    finished_at: Option<Instant>,
    first_polled_at: Option<Instant>,
}

/// Status of every known task.
///
/// A terminal task stays queryable for `retention` after it was first polled
/// as terminal. One that is never polled is kept until it is, unless an
/// `abandoned_ttl` is set, in which case it is dropped that long after it
/// finished. Expired entries are purged lazily on insert and poll.
pub struct TaskStore {
    entries: Mutex<HashMap<TaskId, TaskEntry>>,
    retention: Duration,
    abandoned_ttl: Option<Duration>,
}

impl TaskStore {
    pub fn new(retention: Duration, abandoned_ttl: Option<Duration>) -> Self {
        TaskStore {
            entries: Mutex::new(HashMap::new()),
            retention,
            abandoned_ttl,
        }
    }

    pub fn insert_pending(&self, id: TaskId) {
        self.purge();
        self.entries.lock().insert(
            id,
            TaskEntry {
                status: TaskStatus::Pending,
                finished_at: None,
                first_polled_at: None,
            },
        );
    }

    pub fn remove(&self, id: &TaskId) {
        self.entries.lock().remove(id);
    }

    pub fn finish(&self, id: &TaskId, outcome: std::result::Result<TaskOutput, String>) {
        let status = match outcome {
            Ok(output) => TaskStatus::Completed(output),
            Err(message) => TaskStatus::Failed(message),
        };
        if let Some(entry) = self.entries.lock().get_mut(id) {
            entry.status = status;
            entry.finished_at = Some(Instant::now());
        }
    }

    pub fn poll(&self, id: &TaskId) -> Result<TaskStatus> {
        self.purge();
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| Error::not_found(format!("Unknown task: {}", id)))?;
        if entry.status.is_terminal() && entry.first_polled_at.is_none() {
            entry.first_polled_at = Some(Instant::now());
        }
        Ok(entry.status.clone())
    }

    /// Drops expired terminal entries and returns how many went.
    pub fn purge(&self) -> usize {
        self.purge_at(Instant::now())
    }

    fn purge_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| match (entry.finished_at, entry.first_polled_at) {
            (None, _) => true,
            (Some(_), Some(polled)) => now.saturating_duration_since(polled) < self.retention,
            (Some(finished), None) => self
                .abandoned_ttl
                .is_none_or(|ttl| now.saturating_duration_since(finished) < ttl),
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "Evicted finished tasks");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn pending(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.status.is_terminal())
            .count()
    }
}
