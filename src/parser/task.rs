// ABOUTME: Manifest task entries and their conversion into task definitions
// ABOUTME: Binds a builtin executable, metadata and schema for each declared task

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::error::{ParserError, Result, ValidationError};
use crate::tasks::{
    BuiltinKind, InputOutputSchema, OutputSpec, ParamSpec, TaskDefinition, TaskExample,
    TaskMetadata,
};

fn default_can_parallel() -> bool {
    true
}

/// One entry under `tasks:` in a manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "humantime_serde", default)]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_can_parallel")]
    pub can_parallel: bool,
    #[serde(default, alias = "pre_tasks")]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub kind: BuiltinKind,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub inputs: IndexMap<String, ParamSpec>,
    #[serde(default)]
    pub outputs: IndexMap<String, OutputSpec>,
    #[serde(default)]
    pub examples: Vec<TaskExample>,
}

impl TaskSpec {
    /// Declared schema, or the builtin's schema when nothing is declared
    pub fn schema(&self) -> InputOutputSchema {
        if self.inputs.is_empty() && self.outputs.is_empty() {
            self.kind.default_schema()
        } else {
            InputOutputSchema {
                inputs: self.inputs.clone(),
                outputs: self.outputs.clone(),
            }
        }
    }

    pub fn metadata(&self, id: &str, default_timeout: Duration) -> TaskMetadata {
        let mut metadata = TaskMetadata::new(id, self.name.as_deref().unwrap_or(id))
            .with_description(self.description.clone())
            .with_priority(self.priority)
            .with_tags(self.tags.iter().cloned())
            .with_timeout(self.timeout.unwrap_or(default_timeout))
            .with_retry_count(self.retry_count)
            .with_dependencies(self.depends_on.iter().cloned())
            .with_conflicts(self.conflicts.iter().cloned());
        if let Some(category) = &self.category {
            metadata = metadata.with_category(category.clone());
        }
        if let Some(version) = &self.version {
            metadata.version = version.clone();
        }
        if !self.can_parallel {
            metadata = metadata.sequential();
        }
        metadata
    }

    /// Build the registrable definition for the entry keyed `id`
    pub fn into_definition(&self, id: &str, default_timeout: Duration) -> Result<TaskDefinition> {
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(invalid(id, "timeout must be greater than zero"));
        }

        let executable = self
            .kind
            .build(id, &self.config)
            .map_err(|e| invalid(id, e.to_string()))?;

        let mut definition =
            TaskDefinition::new(self.metadata(id, default_timeout), self.schema(), executable);
        definition.examples = self.examples.clone();
        Ok(definition)
    }
}

fn invalid(task: &str, reason: impl Into<String>) -> ParserError {
    ParserError::ValidationError(ValidationError::InvalidTaskConfig {
        task: task.to_string(),
        reason: reason.into(),
    })
}
