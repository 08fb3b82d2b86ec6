//! Detached task spawner.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::error::{TaskError, TaskResult};
use crate::task::{TaskId, TaskInfo, TaskStats};

/// Configuration for the task spawner.
#[derive(Debug, Clone)]
pub struct SpawnerConfig {
    /// Maximum number of concurrently running tasks.
    pub max_concurrent: usize,
    /// Timeout applied to every task, if any.
    pub default_timeout: Option<Duration>,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1024,
            default_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl SpawnerConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum concurrent tasks.
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set default timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Let tasks run for as long as they need.
    #[must_use]
    pub fn without_timeout(mut self) -> Self {
        self.default_timeout = None;
        self
    }
}

type RunningTasks = Arc<DashMap<TaskId, TaskInfo>>;

/// Background task spawner.
///
/// Only running tasks are tracked; a record leaves the registry as soon as
/// its task settles, so the registry never outgrows `max_concurrent`.
#[derive(Debug)]
pub struct Spawner {
    config: SpawnerConfig,
    running: RunningTasks,
    stats: Arc<TaskStats>,
    shutdown: AtomicBool,
}

impl Spawner {
    /// Create a new spawner with default configuration.
    pub fn new() -> Self {
        Self::with_config(SpawnerConfig::default())
    }

    /// Create a new spawner with custom configuration.
    pub fn with_config(config: SpawnerConfig) -> Self {
        Self {
            config,
            running: Arc::new(DashMap::new()),
            stats: Arc::new(TaskStats::default()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Check if the spawner is shut down.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Number of tasks currently running.
    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Running tasks, oldest first.
    pub fn running_tasks(&self) -> Vec<TaskInfo> {
        let mut tasks: Vec<TaskInfo> = self.running.iter().map(|e| e.value().clone()).collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    /// Get task statistics.
    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }

    /// Spawn a fire-and-forget task.
    ///
    /// The caller never observes the task's outcome. Timeouts and panics are
    /// logged and counted in [`TaskStats`].
    ///
    /// # Errors
    ///
    /// Returns `TaskError::ShuttingDown` after [`Spawner::shutdown`] and
    /// `TaskError::AtCapacity` while `max_concurrent` tasks are running.
    pub fn spawn_detached<F>(&self, name: impl Into<String>, task: F) -> TaskResult<TaskId>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutdown() {
            self.stats.record_rejected();
            return Err(TaskError::ShuttingDown);
        }

        if self.running.len() >= self.config.max_concurrent {
            self.stats.record_rejected();
            return Err(TaskError::AtCapacity {
                limit: self.config.max_concurrent,
            });
        }

        let id = TaskId::new();
        let name = name.into();
        debug!(task_id = %id, task_name = %name, "spawning background task");

        self.running.insert(id, TaskInfo::new(id, name));
        self.stats.record_spawned();

        let slot = Slot {
            id,
            running: self.running.clone(),
            stats: self.stats.clone(),
            settled: false,
        };
        tokio::spawn(supervise(slot, task, self.config.default_timeout));

        Ok(id)
    }

    /// Stop accepting tasks and wait up to `grace` for running ones to finish.
    pub async fn shutdown(&self, grace: Duration) {
        info!(running = self.running_count(), "shutting down task spawner");
        self.shutdown.store(true, Ordering::Release);

        let deadline = tokio::time::Instant::now() + grace;
        while !self.running.is_empty() {
            if tokio::time::Instant::now() >= deadline {
                let pending: Vec<String> =
                    self.running_tasks().into_iter().map(|t| t.name).collect();
                warn!(
                    running = pending.len(),
                    tasks = ?pending,
                    "shutdown grace period elapsed with tasks still running"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        info!("task spawner drained");
    }
}

impl Default for Spawner {
    fn default() -> Self {
        Self::new()
    }
}

/// A task's place in the registry. Dropping it frees the place, including
/// when the task panics or the runtime drops it.
struct Slot {
    id: TaskId,
    running: RunningTasks,
    stats: Arc<TaskStats>,
    settled: bool,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.running.remove(&self.id);
        if !self.settled {
            self.stats.record_abandoned();
            warn!(task_id = %self.id, "background task abandoned before finishing");
        }
    }
}

async fn supervise<F>(mut slot: Slot, task: F, timeout: Option<Duration>)
where
    F: Future<Output = ()>,
{
    let finished = match timeout {
        Some(limit) => tokio::time::timeout(limit, task).await.is_ok(),
        None => {
            task.await;
            true
        }
    };

    if finished {
        slot.stats.record_completed();
        debug!(task_id = %slot.id, "background task completed");
    } else {
        slot.stats.record_timed_out();
        warn!(task_id = %slot.id, ?timeout, "background task timed out");
    }
    slot.settled = true;
}

/// A spawner that can be cloned into request handlers.
#[derive(Debug, Clone, Default)]
pub struct SharedSpawner(Arc<Spawner>);

impl SharedSpawner {
    /// Create a new shared spawner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared spawner with configuration.
    pub fn with_config(config: SpawnerConfig) -> Self {
        Self(Arc::new(Spawner::with_config(config)))
    }

    /// Get the inner spawner.
    pub fn inner(&self) -> &Spawner {
        &self.0
    }

    /// Spawn a fire-and-forget task.
    ///
    /// # Errors
    ///
    /// See [`Spawner::spawn_detached`].
    pub fn spawn_detached<F>(&self, name: impl Into<String>, task: F) -> TaskResult<TaskId>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.0.spawn_detached(name, task)
    }
}
