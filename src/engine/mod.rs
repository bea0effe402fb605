// ABOUTME: Task orchestration and execution engine
// ABOUTME: Plans task requests into layers, then executes them with retries, timeouts and tracing

pub mod context;
pub mod dependency;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod result;
pub mod scheduler;
pub mod tracker;

pub use context::DataContext;
pub use dependency::DependencyGraph;
pub use error::{EngineError, Result};
pub use executor::{TaskEngine, TaskExecutor};
pub use orchestrator::{DependencyHint, OrchestrationPlan, Orchestrator, SecondaryTask, TaskRequest};
pub use result::{
    ExecutionSummary, ExecutionTrace, RunReport, TaskOutcome, TaskStatus, TaskSummaryEntry,
};
pub use scheduler::{RetryConfig, TaskScheduler};
pub use tracker::{ExecutionTracker, TraceId};
