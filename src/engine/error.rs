// ABOUTME: Error types for task orchestration and execution engine operations
// ABOUTME: Defines the registry, planning and per-task execution error taxonomy

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Task already registered: {task_id}")]
    DuplicateId { task_id: String },

    #[error("Task not found: {task_id}")]
    UnknownTask { task_id: String },

    #[error("Circular dependency detected: {}", tasks.join(" -> "))]
    CyclicDependency { tasks: Vec<String> },

    #[error("Invalid input for task {task_id}: parameter '{field}' {reason}")]
    ValidationError {
        task_id: String,
        field: String,
        reason: String,
    },

    #[error("Task {task_id} requires parameter '{parameter}' but no value source was found")]
    UnresolvedParameter { task_id: String, parameter: String },

    #[error("Invalid expression for task {task_id}, parameter '{parameter}': {reason}")]
    InvalidExpression {
        task_id: String,
        parameter: String,
        reason: String,
    },

    #[error("Task timeout: {task_id} - exceeded {timeout:?}")]
    Timeout { task_id: String, timeout: Duration },

    #[error("Task execution failed: {task_id} - {message}")]
    ExecutionError { task_id: String, message: String },

    #[error("Scheduler unavailable: {0}")]
    SchedulerClosed(String),

    #[error("Join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl EngineError {
    /// Whether the error aborts plan construction rather than a single task
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::CyclicDependency { .. }
                | EngineError::UnknownTask { .. }
                | EngineError::UnresolvedParameter { .. }
                | EngineError::InvalidExpression { .. }
                | EngineError::DuplicateId { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = EngineError::CyclicDependency {
            tasks: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_execution_errors_are_local() {
        let err = EngineError::Timeout {
            task_id: "slow".to_string(),
            timeout: Duration::from_millis(50),
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("slow"));
    }
}
