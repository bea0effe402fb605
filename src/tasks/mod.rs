// ABOUTME: Task definitions, executable unit capabilities and the task registry
// ABOUTME: Provides sync and async task traits, builtin implementations and registry indexes

pub mod builtin;
pub mod command;
pub mod definition;
pub mod error;
pub mod registry;
pub mod schema;

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

pub use builtin::BuiltinKind;
pub use definition::{TaskDefinition, TaskExample, TaskMetadata};
pub use error::{Result, SchemaViolation, TaskError};
pub use registry::{DependencyProblem, TaskRegistry, TaskSummary};
pub use schema::{InputOutputSchema, OutputSpec, ParamSpec, ParamType, Parameters};

/// A blocking unit of work. Runs on the blocking thread pool.
///
/// A blocking call cannot be interrupted. When an attempt exceeds the task's
/// timeout the engine stops waiting for it, but the call keeps running on its
/// thread and no longer holds a concurrency permit. A retry may therefore
/// overlap the abandoned attempt, so implementations with side effects should
/// be idempotent or have `retry_count: 0`. Use [`AsyncTask`] for work that
/// must stop at the timeout.
pub trait SyncTask: Send + Sync {
    fn execute(&self, params: &Parameters) -> Result<Value>;
}

/// A unit of work that awaits I/O
#[async_trait]
pub trait AsyncTask: Send + Sync {
    async fn execute(&self, params: Parameters) -> Result<Value>;
}

/// The executable bound to a task definition
#[derive(Clone)]
pub enum Executable {
    Sync(Arc<dyn SyncTask>),
    Async(Arc<dyn AsyncTask>),
}

impl Executable {
    pub fn sync<T: SyncTask + 'static>(task: T) -> Self {
        Executable::Sync(Arc::new(task))
    }

    pub fn asynchronous<T: AsyncTask + 'static>(task: T) -> Self {
        Executable::Async(Arc::new(task))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Parameters) -> Result<Value> + Send + Sync + 'static,
    {
        Executable::sync(FnTask(f))
    }

    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Executable::asynchronous(AsyncFnTask(f))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Executable::Sync(_) => "sync",
            Executable::Async(_) => "async",
        }
    }

    /// Run one attempt. A panicking sync task surfaces as a failure. Dropping
    /// the future detaches a sync task instead of stopping it.
    pub async fn invoke(&self, params: Parameters) -> Result<Value> {
        match self {
            Executable::Sync(task) => {
                let task = Arc::clone(task);
                tokio::task::spawn_blocking(move || task.execute(&params))
                    .await
                    .map_err(|e| TaskError::failed(format!("task aborted: {}", e)))?
            }
            Executable::Async(task) => task.execute(params).await,
        }
    }
}

impl std::fmt::Debug for Executable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Executable({})", self.kind())
    }
}

struct FnTask<F>(F);

impl<F> SyncTask for FnTask<F>
where
    F: Fn(&Parameters) -> Result<Value> + Send + Sync,
{
    fn execute(&self, params: &Parameters) -> Result<Value> {
        (self.0)(params)
    }
}

struct AsyncFnTask<F>(F);

#[async_trait]
impl<F, Fut> AsyncTask for AsyncFnTask<F>
where
    F: Fn(Parameters) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn execute(&self, params: Parameters) -> Result<Value> {
        (self.0)(params).await
    }
}
