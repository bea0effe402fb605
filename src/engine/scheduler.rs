// ABOUTME: Task attempt scheduling with concurrency limits and timeouts
// ABOUTME: Gates attempts behind a semaphore and computes retry backoff delays

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::error::{EngineError, Result};
use crate::tasks::TaskError;

/// Limits concurrent attempts and bounds each attempt by a timeout
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    retry: RetryConfig,
}

/// Delay between attempts of a failing task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(with = "humantime_serde", default)]
    pub initial_delay: Duration,
    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(300)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            backoff_multiplier: default_multiplier(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a specific retry attempt (0-indexed)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32)) as u64;

        Duration::from_millis(delay_ms).min(self.max_delay)
    }

    /// Same delay before every retry
    pub fn fixed_delay(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            backoff_multiplier: 1.0,
            max_delay: delay,
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TaskScheduler {
    /// Create a scheduler allowing `max_concurrent` attempts at once; 0 means unbounded
    pub fn new(max_concurrent: usize) -> Self {
        let permits = if max_concurrent == 0 {
            Semaphore::MAX_PERMITS
        } else {
            max_concurrent
        };

        Self {
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(permits)),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run one attempt under a permit and the task's timeout
    pub async fn run_attempt<F>(&self, task_id: &str, limit: Duration, attempt: F) -> Result<Value>
    where
        F: Future<Output = std::result::Result<Value, TaskError>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EngineError::SchedulerClosed(e.to_string()))?;

        debug!("Starting attempt for task {}", task_id);

        match timeout(limit, attempt).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(EngineError::ExecutionError {
                task_id: task_id.to_string(),
                message: e.to_string(),
            }),
            Err(_) => {
                warn!("Task {} timed out after {:?}", task_id, limit);
                Err(EngineError::Timeout {
                    task_id: task_id.to_string(),
                    timeout: limit,
                })
            }
        }
    }

    /// Wait before retry number `retry` (1-based)
    pub async fn backoff(&self, task_id: &str, retry: u32) {
        let delay = self.retry.calculate_delay(retry.saturating_sub(1));
        if !delay.is_zero() {
            debug!("Waiting {:?} before retrying {}", delay, task_id);
            sleep(delay).await;
        }
    }
}
