//! # Marquee Tasks
//!
//! Supervised fire-and-forget work for the marquee edge.
//!
//! Request handlers must never wait on bookkeeping such as populating the
//! edge cache, yet that work still has to be accounted for. The [`Spawner`]
//! wraps `tokio::spawn` with a concurrency ceiling, an optional per-task
//! timeout and a registry of what is still running. [`Spawner::shutdown`]
//! waits for the registry to drain.
//!
//! Spawns beyond the ceiling are rejected, not queued. Outcomes are counted
//! in [`TaskStats`].
//!
//! ```rust,no_run
//! use marquee_tasks::{SharedSpawner, SpawnerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let spawner = SharedSpawner::with_config(
//!         SpawnerConfig::new()
//!             .with_max_concurrent(256)
//!             .with_default_timeout(Duration::from_secs(10)),
//!     );
//!
//!     spawner
//!         .spawn_detached("edge-cache-store", async {
//!             // write the entry
//!         })
//!         .unwrap();
//!
//!     spawner.inner().shutdown(Duration::from_secs(5)).await;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod spawner;
mod task;

pub use error::{TaskError, TaskResult};
pub use spawner::{SharedSpawner, Spawner, SpawnerConfig};
pub use task::{TaskId, TaskInfo, TaskStats};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_detached_work_runs_without_being_awaited() {
        let spawner = SharedSpawner::new();
        let writes = Arc::new(AtomicUsize::new(0));

        let writes_clone = writes.clone();
        spawner
            .spawn_detached("store", async move {
                writes_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        spawner.inner().shutdown(Duration::from_secs(1)).await;
        assert_eq!(writes.load(Ordering::SeqCst), 1);
        assert_eq!(spawner.inner().stats().total_completed(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_slow_detached_task() {
        let spawner = Spawner::with_config(SpawnerConfig::new().without_timeout());
        let done = Arc::new(AtomicUsize::new(0));

        let done_clone = done.clone();
        spawner
            .spawn_detached("slow-store", async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                done_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        spawner.shutdown(Duration::from_secs(2)).await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(spawner.is_shutdown());
        assert_eq!(spawner.running_count(), 0);
    }
}
