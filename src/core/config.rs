use std::path::PathBuf;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use crate::core::error::{Error, Result};
use crate::storage::wal::SyncMode;

#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: PathBuf,

    // Task scheduler
    pub workers: usize,
    pub task_queue_capacity: usize,
    pub task_retention: Duration,     // after the first terminal poll
    pub abandoned_task_ttl: Option<Duration>, // terminal but never polled; None keeps them

    // Embedded backend
    pub sync_mode: SyncMode,
    pub compaction_threshold: usize,  // logged ops before a snapshot rewrite
}

impl Default for Config {
    fn default() -> Self {
        Config {
            work_dir: PathBuf::from("./memories"),
            workers: num_cpus::get(),
            task_queue_capacity: 256,
            task_retention: Duration::from_secs(10 * 60),
            abandoned_task_ttl: None,
            sync_mode: SyncMode::OnCommit,
            compaction_threshold: 10_000,
        }
    }
}

impl Config {
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Config {
            work_dir: work_dir.into(),
            ..Config::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::invalid("workers must be at least 1"));
        }
        if self.task_queue_capacity == 0 {
            return Err(Error::invalid("task_queue_capacity must be at least 1"));
        }
        if self.compaction_threshold == 0 {
            return Err(Error::invalid("compaction_threshold must be at least 1"));
        }
        Ok(())
    }
}

/// Persistence strategy of one memory, as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendConfig {
    /// Sorted-map files in a directory of their own.
    Embedded { path: PathBuf },
    /// SQLite database file with per-language index tables.
    Relational { database: PathBuf },
}

impl BackendConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            BackendConfig::Embedded { .. } => "Embedded",
            BackendConfig::Relational { .. } => "Relational",
        }
    }
}
