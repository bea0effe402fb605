// ABOUTME: Task executor driving orchestration plans layer by layer
// ABOUTME: Resolves inputs, runs attempts with retries and timeouts, and records traces

use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::context::DataContext;
use super::error::{EngineError, Result};
use super::orchestrator::{OrchestrationPlan, Orchestrator, TaskRequest};
use super::result::{RunReport, TaskOutcome};
use super::scheduler::TaskScheduler;
use super::tracker::ExecutionTracker;
use crate::dataflow::{DataFlowError, ExpressionResolver};
use crate::tasks::TaskRegistry;

/// Runs tasks and plans against a shared registry.
///
/// Every [`TaskExecutor::execute_plan`] call records into its own
/// [`ExecutionTracker`], so concurrent plans never see each other's traces or
/// context. The executor's own tracker only records tasks run directly through
/// [`TaskExecutor::execute_single_task`] and [`TaskExecutor::execute_layer`].
pub struct TaskExecutor {
    registry: Arc<TaskRegistry>,
    resolver: ExpressionResolver,
    scheduler: TaskScheduler,
    tracker: ExecutionTracker,
}

impl TaskExecutor {
    /// Create an executor with an unbounded scheduler
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            resolver: ExpressionResolver::new(),
            scheduler: TaskScheduler::default(),
            tracker: ExecutionTracker::new(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: TaskScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn tracker(&self) -> &ExecutionTracker {
        &self.tracker
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Validate `input` and run the task with its retry budget and timeout
    #[instrument(skip(self, input))]
    pub async fn execute_single_task(
        &self,
        task_id: &str,
        input: IndexMap<String, Value>,
    ) -> Result<Value> {
        self.attempt_task(&self.tracker, task_id, input).await
    }

    async fn attempt_task(
        &self,
        tracker: &ExecutionTracker,
        task_id: &str,
        input: IndexMap<String, Value>,
    ) -> Result<Value> {
        let definition = self
            .registry
            .get(task_id)
            .ok_or_else(|| EngineError::UnknownTask {
                task_id: task_id.to_string(),
            })?;

        let trace = tracker.start_task(task_id, input.clone()).await;

        let params = match definition.bind_input(input) {
            Ok(params) => params,
            Err(violation) => {
                let err = EngineError::ValidationError {
                    task_id: task_id.to_string(),
                    field: violation.field,
                    reason: violation.reason,
                };
                warn!("{}", err);
                tracker.fail_task(trace, err.to_string()).await;
                return Err(err);
            }
        };

        let limit = definition.metadata.timeout;
        let max_retries = definition.metadata.retry_count;
        let mut retries = 0;

        loop {
            let attempt = definition.executable.invoke(params.clone());
            match self.scheduler.run_attempt(task_id, limit, attempt).await {
                Ok(output) => {
                    debug!("Task {} succeeded after {} retries", task_id, retries);
                    tracker.complete_task(trace, output.clone()).await;
                    return Ok(output);
                }
                Err(e) if retries < max_retries => {
                    retries += 1;
                    warn!(
                        "Task {} failed (retry {}/{}): {}",
                        task_id, retries, max_retries, e
                    );
                    tracker.retry_task(trace).await;
                    self.scheduler.backoff(task_id, retries).await;
                }
                Err(e) => {
                    error!("Task {} failed after {} attempts: {}", task_id, retries + 1, e);
                    tracker.fail_task(trace, e.to_string()).await;
                    return Err(e);
                }
            }
        }
    }

    /// Resolve a task's data mapping against a context snapshot
    fn resolve_input(
        &self,
        task_id: &str,
        plan: &OrchestrationPlan,
        context: &DataContext,
    ) -> Result<IndexMap<String, Value>> {
        let Some(mapping) = plan.mapping_for(task_id) else {
            return Ok(IndexMap::new());
        };

        self.resolver
            .resolve_mapping(mapping, context.as_map())
            .map_err(|e| match e {
                DataFlowError::InvalidParameter { parameter, source } => {
                    EngineError::InvalidExpression {
                        task_id: task_id.to_string(),
                        parameter,
                        reason: source.to_string(),
                    }
                }
                other => EngineError::InvalidExpression {
                    task_id: task_id.to_string(),
                    parameter: String::new(),
                    reason: other.to_string(),
                },
            })
    }

    async fn run_task(
        &self,
        tracker: &ExecutionTracker,
        task_id: &str,
        plan: &OrchestrationPlan,
        context: &DataContext,
    ) -> TaskOutcome {
        let input = match self.resolve_input(task_id, plan, context) {
            Ok(input) => input,
            Err(e) => {
                let raw = plan.mapping_for(task_id).cloned().unwrap_or_default();
                let trace = tracker.start_task(task_id, raw).await;
                tracker.fail_task(trace, e.to_string()).await;
                return TaskOutcome::failure(e);
            }
        };

        match self.attempt_task(tracker, task_id, input).await {
            Ok(output) => TaskOutcome::Success(output),
            Err(e) => TaskOutcome::failure(e),
        }
    }

    /// Run every task of a layer concurrently. A failure never cancels siblings.
    pub async fn execute_layer(
        &self,
        layer: &[String],
        plan: &OrchestrationPlan,
        context: &DataContext,
    ) -> IndexMap<String, TaskOutcome> {
        self.run_layer(&self.tracker, layer, plan, context).await
    }

    async fn run_layer(
        &self,
        tracker: &ExecutionTracker,
        layer: &[String],
        plan: &OrchestrationPlan,
        context: &DataContext,
    ) -> IndexMap<String, TaskOutcome> {
        let runs = layer.iter().map(|task_id| async move {
            let outcome = self.run_task(tracker, task_id, plan, context).await;
            (task_id.clone(), outcome)
        });

        join_all(runs).await.into_iter().collect()
    }

    /// Run a plan layer by layer in a session of its own
    #[instrument(skip(self, plan), fields(tasks = plan.total_tasks()))]
    pub async fn execute_plan(
        &self,
        plan: &OrchestrationPlan,
        session_id: Option<&str>,
    ) -> RunReport {
        let start_time = Instant::now();
        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let tracker = ExecutionTracker::new();
        tracker.start_session(session_id.clone()).await;

        let mut results = IndexMap::new();
        for (index, layer) in plan.execution_layers.iter().enumerate() {
            info!(
                "Executing layer {}/{} with {} tasks: {:?}",
                index + 1,
                plan.total_layers(),
                layer.len(),
                layer
            );

            let snapshot = tracker.context_snapshot().await;
            let layer_results = self.run_layer(&tracker, layer, plan, &snapshot).await;

            let outputs: Vec<(String, Value)> = layer_results
                .iter()
                .filter_map(|(id, outcome)| outcome.output().map(|v| (id.clone(), v.clone())))
                .collect();
            tracker.merge_outputs(outputs).await;
            results.extend(layer_results);
        }

        let ordered: IndexMap<String, TaskOutcome> = plan
            .execution_order
            .iter()
            .filter_map(|id| results.shift_remove(id).map(|outcome| (id.clone(), outcome)))
            .collect();

        info!(
            "Plan execution completed in {:?}: {} tasks",
            start_time.elapsed(),
            ordered.len()
        );

        RunReport {
            session_id,
            plan: plan.clone(),
            results: ordered,
            summary: tracker.end_session().await,
        }
    }
}

/// Orchestrator and executor sharing one registry
pub struct TaskEngine {
    orchestrator: Orchestrator,
    executor: TaskExecutor,
}

impl TaskEngine {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            orchestrator: Orchestrator::new(Arc::clone(&registry)),
            executor: TaskExecutor::new(registry),
        }
    }

    pub fn with_scheduler(mut self, scheduler: TaskScheduler) -> Self {
        self.executor = self.executor.with_scheduler(scheduler);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub fn plan(&self, request: &TaskRequest) -> Result<OrchestrationPlan> {
        self.orchestrator.orchestrate(request)
    }

    /// Orchestrate and execute a request. Planning errors abort the run;
    /// task failures are reported per task.
    #[instrument(skip(self, request), fields(primary = %request.primary))]
    pub async fn run(&self, request: &TaskRequest, session_id: Option<&str>) -> Result<RunReport> {
        let plan = self.orchestrator.orchestrate(request)?;
        Ok(self.executor.execute_plan(&plan, session_id).await)
    }
}
