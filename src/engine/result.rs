// ABOUTME: Execution trace, summary and per-task outcome types
// ABOUTME: Defines what the tracker records and what a run hands back to callers

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use super::orchestrator::OrchestrationPlan;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One execution attempt sequence of a task within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub task_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub input_data: IndexMap<String, Value>,
    pub output_data: Option<Value>,
    pub error: Option<String>,
    pub retry_count: u32,
}

impl ExecutionTrace {
    pub fn new(task_id: impl Into<String>, input_data: IndexMap<String, Value>) -> Self {
        Self {
            task_id: task_id.into(),
            start_time: Utc::now(),
            end_time: None,
            status: TaskStatus::Pending,
            input_data,
            output_data: None,
            error: None,
            retry_count: 0,
        }
    }

    pub fn mark_started(&mut self) {
        self.status = TaskStatus::Running;
        self.start_time = Utc::now();
    }

    pub fn mark_completed(&mut self, output: Value) {
        self.status = TaskStatus::Success;
        self.end_time = Some(Utc::now());
        self.output_data = Some(output);
        self.error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.end_time = Some(Utc::now());
        self.error = Some(error.into());
    }

    pub fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Elapsed time; a running trace measures up to now
    pub fn duration(&self) -> Duration {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_successful(&self) -> bool {
        self.status == TaskStatus::Success
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummaryEntry {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub retry_count: u32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub session_id: Option<String>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub running: usize,
    #[serde(with = "humantime_serde")]
    pub total_duration: Duration,
    pub tasks: Vec<TaskSummaryEntry>,
}

impl ExecutionSummary {
    pub fn from_traces(session_id: Option<String>, traces: &[ExecutionTrace]) -> Self {
        let count = |status: TaskStatus| traces.iter().filter(|t| t.status == status).count();

        Self {
            session_id,
            total: traces.len(),
            successful: count(TaskStatus::Success),
            failed: count(TaskStatus::Failed),
            running: count(TaskStatus::Running),
            total_duration: traces.iter().map(ExecutionTrace::duration).sum(),
            tasks: traces
                .iter()
                .map(|trace| TaskSummaryEntry {
                    task_id: trace.task_id.clone(),
                    status: trace.status,
                    duration: trace.duration(),
                    retry_count: trace.retry_count,
                    error: trace.error.clone(),
                })
                .collect(),
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total as f64) * 100.0
        }
    }
}

/// Result slot for one task: the output value, or `{"error": message}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TaskOutcome {
    Failure { error: String },
    Success(Value),
}

impl TaskOutcome {
    pub fn failure(error: impl fmt::Display) -> Self {
        TaskOutcome::Failure {
            error: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    pub fn output(&self) -> Option<&Value> {
        match self {
            TaskOutcome::Success(value) => Some(value),
            TaskOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TaskOutcome::Failure { error } => Some(error),
            TaskOutcome::Success(_) => None,
        }
    }
}

/// Everything produced by one orchestrated run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub session_id: String,
    pub plan: OrchestrationPlan,
    pub results: IndexMap<String, TaskOutcome>,
    pub summary: ExecutionSummary,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.results.values().all(TaskOutcome::is_success)
    }

    pub fn failed_tasks(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, outcome)| !outcome.is_success())
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trace_lifecycle() {
        let mut trace = ExecutionTrace::new("study", IndexMap::new());
        assert_eq!(trace.status, TaskStatus::Pending);

        trace.mark_started();
        assert_eq!(trace.status, TaskStatus::Running);
        assert!(trace.end_time.is_none());

        trace.increment_retry();
        trace.mark_completed(json!({"notes": "done"}));
        assert!(trace.is_successful());
        assert_eq!(trace.retry_count, 1);
        assert!(trace.end_time.unwrap() >= trace.start_time);
    }

    #[test]
    fn test_summary_counts() {
        let mut ok = ExecutionTrace::new("ok", IndexMap::new());
        ok.mark_started();
        ok.mark_completed(json!(1));
        let mut bad = ExecutionTrace::new("bad", IndexMap::new());
        bad.mark_started();
        bad.mark_failed("boom");
        let mut busy = ExecutionTrace::new("busy", IndexMap::new());
        busy.mark_started();

        let summary = ExecutionSummary::from_traces(Some("s1".into()), &[ok, bad, busy]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.running, 1);
        assert_eq!(summary.tasks[1].error.as_deref(), Some("boom"));
        assert!((summary.success_rate() - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_outcome_serialization() {
        let ok = TaskOutcome::Success(json!({"count": 3}));
        let failed = TaskOutcome::failure("Task not found: x");

        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"count": 3}));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"error": "Task not found: x"})
        );
        assert_eq!(failed.error(), Some("Task not found: x"));
        assert!(ok.output().is_some());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TaskStatus::Success.to_string(), "success");
        assert_eq!(
            serde_json::to_value(TaskStatus::Failed).unwrap(),
            json!("failed")
        );
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
