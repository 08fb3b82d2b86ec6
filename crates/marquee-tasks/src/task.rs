//! Running-task records and lifetime counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier of a spawned task. Time-ordered (UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Uuid);

impl TaskId {
    pub(crate) fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A task that is still running.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    /// Task identifier.
    pub id: TaskId,
    /// Name given at spawn time, e.g. `edge-cache-store`.
    pub name: String,
    /// When the task was admitted.
    pub started_at: DateTime<Utc>,
}

impl TaskInfo {
    pub(crate) fn new(id: TaskId, name: String) -> Self {
        Self {
            id,
            name,
            started_at: Utc::now(),
        }
    }

    /// How long the task has been running.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.started_at).to_std().unwrap_or_default()
    }
}

/// Lifetime counters of a spawner.
#[derive(Debug, Default)]
pub struct TaskStats {
    spawned: AtomicU64,
    completed: AtomicU64,
    timed_out: AtomicU64,
    abandoned: AtomicU64,
    rejected: AtomicU64,
}

impl TaskStats {
    pub(crate) fn record_spawned(&self) {
        self.spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Tasks admitted.
    pub fn total_spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Tasks that ran to completion.
    pub fn total_completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Tasks dropped at their timeout.
    pub fn total_timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Tasks that panicked or were dropped before finishing.
    pub fn total_abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    /// Spawns refused by the spawner.
    pub fn total_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
