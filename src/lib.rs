// ABOUTME: Main library module for the taskweave orchestration engine
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod dataflow;
pub mod engine;
pub mod output;
pub mod parser;
pub mod tasks;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use dataflow::{ExpressionResolver, Transform};
pub use engine::{
    EngineError, OrchestrationPlan, Orchestrator, RunReport, TaskEngine, TaskExecutor,
    TaskOutcome, TaskRequest, TaskStatus,
};
pub use output::OutputHandler;
pub use parser::{Manifest, ManifestParser};
pub use tasks::{Executable, TaskDefinition, TaskMetadata, TaskRegistry};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
