// ABOUTME: Manifest documents declaring task definitions and an optional request
// ABOUTME: Parses YAML or JSON manifests and builds task registries from them

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

use super::error::{ParserError, Result, ValidationError};
use super::task::TaskSpec;
use crate::engine::TaskRequest;
use crate::tasks::TaskRegistry;

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    pub tasks: IndexMap<String, TaskSpec>,
    pub request: Option<TaskRequest>,
}

impl Manifest {
    /// Parse manifest from YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content)?;
        manifest.validate_structure()?;
        Ok(manifest)
    }

    /// Parse manifest from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(content)?;
        manifest.validate_structure()?;
        Ok(manifest)
    }

    /// Validate basic manifest structure
    fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ParserError::MissingField("name".to_string()));
        }

        if self.tasks.is_empty() {
            return Err(ValidationError::EmptyManifest.into());
        }

        if let Some(task_id) = self.tasks.keys().find(|id| id.trim().is_empty()) {
            return Err(ValidationError::InvalidTaskConfig {
                task: task_id.clone(),
                reason: "task id cannot be empty".to_string(),
            }
            .into());
        }

        if let Some(request) = &self.request {
            if let Some(unknown) = request
                .task_ids()
                .into_iter()
                .find(|id| !self.tasks.contains_key(id))
            {
                return Err(ValidationError::UnknownRequestTask { task: unknown }.into());
            }
        }

        Ok(())
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn get_task(&self, task_id: &str) -> Option<&TaskSpec> {
        self.tasks.get(task_id)
    }

    /// Build a registry holding every declared task. Tasks without an
    /// explicit timeout get `default_timeout`.
    pub fn build_registry(&self, default_timeout: Duration) -> Result<TaskRegistry> {
        let mut registry = TaskRegistry::new();
        for (task_id, spec) in &self.tasks {
            registry.register(spec.into_definition(task_id, default_timeout)?)?;
        }
        info!(
            "Loaded {} tasks from manifest '{}'",
            registry.len(),
            self.name
        );
        Ok(registry)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManifestParser;

impl ManifestParser {
    pub fn new() -> Self {
        Self
    }

    /// Read and parse a manifest. `.json` files use the JSON parser, everything else YAML.
    pub async fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Manifest> {
        let path = path.as_ref();
        debug!("Reading manifest {}", path.display());
        let content = fs::read_to_string(path).await?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Manifest::from_json(&content)
        } else {
            Manifest::from_yaml(&content)
        }
    }

    pub fn parse_string(&self, content: &str) -> Result<Manifest> {
        Manifest::from_yaml(content)
    }
}
