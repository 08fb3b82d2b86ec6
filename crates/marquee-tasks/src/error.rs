//! Spawn rejections.

use thiserror::Error;

/// Result type for task operations.
pub type TaskResult<T> = Result<T, TaskError>;

/// Why the spawner refused a task. A refused task never runs.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    /// `Spawner::shutdown` has been called.
    #[error("spawner is shutting down")]
    ShuttingDown,

    /// The concurrency ceiling is reached.
    #[error("at capacity: {limit} tasks already running")]
    AtCapacity {
        /// The configured ceiling.
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            TaskError::AtCapacity { limit: 64 }.to_string(),
            "at capacity: 64 tasks already running"
        );
        assert_eq!(TaskError::ShuttingDown.to_string(), "spawner is shutting down");
    }
}
