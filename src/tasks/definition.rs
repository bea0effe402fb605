// ABOUTME: Task metadata and complete task definitions
// ABOUTME: Binds metadata, input/output schema and an executable unit into one registrable record

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::error::SchemaViolation;
use super::schema::{InputOutputSchema, Parameters};
use super::Executable;

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_can_parallel() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub tags: IndexSet<String>,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_can_parallel")]
    pub can_parallel: bool,
    #[serde(default)]
    pub dependencies: IndexSet<String>,
    #[serde(default)]
    pub conflicts: IndexSet<String>,
}

impl TaskMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category: default_category(),
            version: default_version(),
            priority: 0,
            tags: IndexSet::new(),
            timeout: default_timeout(),
            retry_count: 0,
            can_parallel: true,
            dependencies: IndexSet::new(),
            conflicts: IndexSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn with_conflicts<I, S>(mut self, conflicts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflicts.extend(conflicts.into_iter().map(Into::into));
        self
    }

    /// Mark the task as unable to share a layer with any other task
    pub fn sequential(mut self) -> Self {
        self.can_parallel = false;
        self
    }

    pub fn conflicts_with(&self, other: &TaskMetadata) -> bool {
        self.conflicts.contains(&other.id) || other.conflicts.contains(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExample {
    #[serde(default)]
    pub input: IndexMap<String, Value>,
    #[serde(default)]
    pub output: Value,
}

#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub metadata: TaskMetadata,
    pub schema: InputOutputSchema,
    pub executable: Executable,
    pub examples: Vec<TaskExample>,
}

impl TaskDefinition {
    pub fn new(metadata: TaskMetadata, schema: InputOutputSchema, executable: Executable) -> Self {
        Self {
            metadata,
            schema,
            executable,
            examples: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn with_example(mut self, input: IndexMap<String, Value>, output: Value) -> Self {
        self.examples.push(TaskExample { input, output });
        self
    }

    pub fn validate_input(&self, data: &IndexMap<String, Value>) -> Result<(), SchemaViolation> {
        self.schema.validate_input(data)
    }

    pub fn bind_input(&self, data: IndexMap<String, Value>) -> Result<Parameters, SchemaViolation> {
        self.schema.bind(data)
    }

    pub fn input_defaults(&self) -> IndexMap<String, Value> {
        self.schema.input_defaults()
    }
}

impl std::fmt::Display for TaskDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) [{}]",
            self.metadata.name, self.metadata.id, self.metadata.category
        )
    }
}
