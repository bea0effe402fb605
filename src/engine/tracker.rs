// ABOUTME: Session-scoped execution tracker recording per-task traces
// ABOUTME: Shared across concurrently running tasks behind an async RwLock

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::context::DataContext;
use super::result::{ExecutionSummary, ExecutionTrace, TaskStatus};

/// Handle to a trace created by [`ExecutionTracker::start_task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(usize);

#[derive(Debug, Default)]
struct TrackerState {
    session_id: Option<String>,
    traces: Vec<ExecutionTrace>,
    context: DataContext,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionTracker {
    state: Arc<RwLock<TrackerState>>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a session, discarding traces and context from any previous one
    pub async fn start_session(&self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        let mut state = self.state.write().await;
        if let Some(previous) = state.session_id.as_ref() {
            debug!("Replacing tracker session {}", previous);
        }
        info!("Starting execution session: {}", session_id);
        state.session_id = Some(session_id);
        state.traces.clear();
        state.context.clear();
    }

    pub async fn session_id(&self) -> Option<String> {
        self.state.read().await.session_id.clone()
    }

    pub async fn start_task(&self, task_id: &str, input: IndexMap<String, Value>) -> TraceId {
        let mut trace = ExecutionTrace::new(task_id, input);
        trace.mark_started();

        let mut state = self.state.write().await;
        state.traces.push(trace);
        TraceId(state.traces.len() - 1)
    }

    pub async fn complete_task(&self, id: TraceId, output: Value) {
        self.update(id, |trace| trace.mark_completed(output)).await;
    }

    pub async fn fail_task(&self, id: TraceId, error: impl Into<String>) {
        let error = error.into();
        self.update(id, |trace| trace.mark_failed(error)).await;
    }

    pub async fn retry_task(&self, id: TraceId) {
        self.update(id, ExecutionTrace::increment_retry).await;
    }

    async fn update<F>(&self, id: TraceId, f: F)
    where
        F: FnOnce(&mut ExecutionTrace),
    {
        let mut state = self.state.write().await;
        match state.traces.get_mut(id.0) {
            Some(trace) => f(trace),
            // the session was restarted under a running task
            None => warn!("Ignoring update for unknown trace {:?}", id),
        }
    }

    pub async fn trace(&self, id: TraceId) -> Option<ExecutionTrace> {
        self.state.read().await.traces.get(id.0).cloned()
    }

    /// Latest trace recorded for a task id
    pub async fn trace_for(&self, task_id: &str) -> Option<ExecutionTrace> {
        self.state
            .read()
            .await
            .traces
            .iter()
            .rev()
            .find(|trace| trace.task_id == task_id)
            .cloned()
    }

    pub async fn traces(&self) -> Vec<ExecutionTrace> {
        self.state.read().await.traces.clone()
    }

    pub async fn successful_tasks(&self) -> Vec<String> {
        self.tasks_with_status(TaskStatus::Success).await
    }

    pub async fn failed_tasks(&self) -> Vec<String> {
        self.tasks_with_status(TaskStatus::Failed).await
    }

    async fn tasks_with_status(&self, status: TaskStatus) -> Vec<String> {
        self.state
            .read()
            .await
            .traces
            .iter()
            .filter(|trace| trace.status == status)
            .map(|trace| trace.task_id.clone())
            .collect()
    }

    pub async fn is_all_success(&self) -> bool {
        self.state
            .read()
            .await
            .traces
            .iter()
            .all(ExecutionTrace::is_successful)
    }

    pub async fn has_failures(&self) -> bool {
        self.state
            .read()
            .await
            .traces
            .iter()
            .any(ExecutionTrace::is_failed)
    }

    pub async fn context_snapshot(&self) -> DataContext {
        self.state.read().await.context.clone()
    }

    /// Merge completed outputs into the session context; nulls are skipped
    pub async fn merge_outputs<I>(&self, outputs: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.state.write().await.context.merge(outputs);
    }

    pub async fn summary(&self) -> ExecutionSummary {
        let state = self.state.read().await;
        ExecutionSummary::from_traces(state.session_id.clone(), &state.traces)
    }

    /// Summarise and clear the session
    pub async fn end_session(&self) -> ExecutionSummary {
        let mut state = self.state.write().await;
        let summary = ExecutionSummary::from_traces(state.session_id.take(), &state.traces);
        state.traces.clear();
        state.context.clear();

        info!(
            "Session finished: {}/{} tasks succeeded",
            summary.successful, summary.total
        );
        summary
    }
}
