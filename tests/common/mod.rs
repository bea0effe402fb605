// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides manifest builders, registry fixtures and temp directory environments

#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;

use taskweave::tasks::{
    Executable, InputOutputSchema, ParamSpec, ParamType, TaskDefinition, TaskError, TaskMetadata,
    TaskRegistry,
};

/// Builds manifest YAML one task at a time
pub struct ManifestBuilder {
    name: String,
    description: String,
    tasks: Vec<TestTask>,
    request: Option<String>,
}

pub struct TestTask {
    pub id: String,
    pub kind: String,
    pub config: Option<String>,
    pub depends_on: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub retry_count: Option<u32>,
    pub timeout: Option<String>,
}

impl TestTask {
    pub fn new(id: &str, kind: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            config: None,
            depends_on: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            retry_count: None,
            timeout: None,
        }
    }

    /// Inline YAML mapping for the task's `config:`
    pub fn with_config(mut self, config: &str) -> Self {
        self.config = Some(config.to_string());
        self
    }

    pub fn depends_on(mut self, ids: &[&str]) -> Self {
        self.depends_on = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    /// `name: { type: ..., ... }` input line
    pub fn with_input(mut self, line: &str) -> Self {
        self.inputs.push(line.to_string());
        self
    }

    pub fn with_output(mut self, line: &str) -> Self {
        self.outputs.push(line.to_string());
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_timeout(mut self, timeout: &str) -> Self {
        self.timeout = Some(timeout.to_string());
        self
    }
}

impl ManifestBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Test manifest: {}", name),
            tasks: Vec::new(),
            request: None,
        }
    }

    pub fn with_task(mut self, task: TestTask) -> Self {
        self.tasks.push(task);
        self
    }

    /// Raw YAML body of the `request:` section, indented by the caller's two spaces
    pub fn with_request(mut self, request: &str) -> Self {
        self.request = Some(request.to_string());
        self
    }

    pub fn to_yaml(&self) -> String {
        let mut yaml = format!(
            "name: {}\ndescription: \"{}\"\n\ntasks:\n",
            self.name, self.description
        );

        for task in &self.tasks {
            yaml.push_str(&format!("  {}:\n", task.id));
            yaml.push_str(&format!("    kind: {}\n", task.kind));
            if let Some(config) = &task.config {
                yaml.push_str(&format!("    config: {}\n", config));
            }
            if !task.depends_on.is_empty() {
                yaml.push_str(&format!("    depends_on: [{}]\n", task.depends_on.join(", ")));
            }
            if let Some(retry_count) = task.retry_count {
                yaml.push_str(&format!("    retry_count: {}\n", retry_count));
            }
            if let Some(timeout) = &task.timeout {
                yaml.push_str(&format!("    timeout: {}\n", timeout));
            }
            if !task.inputs.is_empty() {
                yaml.push_str("    inputs:\n");
                for line in &task.inputs {
                    yaml.push_str(&format!("      {}\n", line));
                }
            }
            if !task.outputs.is_empty() {
                yaml.push_str("    outputs:\n");
                for line in &task.outputs {
                    yaml.push_str(&format!("      {}\n", line));
                }
            }
        }

        if let Some(request) = &self.request {
            yaml.push_str("\nrequest:\n");
            for line in request.lines().filter(|line| !line.trim().is_empty()) {
                yaml.push_str(&format!("  {}\n", line.trim_end()));
            }
        }

        yaml
    }

    pub async fn write_to_file(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, self.to_yaml()).await
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn manifest_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}.yaml", name))
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}_output.json", name))
    }

    pub async fn create_manifest_file(&self, name: &str, builder: &ManifestBuilder) -> PathBuf {
        let manifest_file = self.manifest_file(name);
        builder
            .write_to_file(&manifest_file)
            .await
            .expect("Failed to write manifest file");
        manifest_file
    }

    pub async fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, content)
            .await
            .expect("Failed to write fixture file");
        path
    }
}

pub async fn read_json_output(file_path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(file_path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Task that echoes its parameters and declares the given outputs
pub fn echo_task(metadata: TaskMetadata, outputs: &[&str]) -> TaskDefinition {
    let id = metadata.id.clone();
    let schema = outputs
        .iter()
        .fold(InputOutputSchema::new(), |schema, name| {
            schema.output(*name, ParamType::Any)
        });
    TaskDefinition::new(
        metadata,
        schema,
        Executable::from_fn(move |params| {
            let mut output = json!({ "task": id });
            if let Value::Object(inputs) = params.to_value() {
                for (key, value) in inputs {
                    output[key] = value;
                }
            }
            Ok(output)
        }),
    )
}

/// Task that fails its first `failures` attempts
pub fn flaky_task(id: &str, failures: u32, retry_count: u32) -> (TaskDefinition, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let definition = TaskDefinition::new(
        TaskMetadata::new(id, id).with_retry_count(retry_count),
        InputOutputSchema::new(),
        Executable::from_fn(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) < failures {
                Err(TaskError::failed("transient failure"))
            } else {
                Ok(json!({ "attempts": counter.load(Ordering::SeqCst) }))
            }
        }),
    );
    (definition, calls)
}

/// study -> develop -> test, with notes and code flowing forward
pub fn sdlc_registry() -> TaskRegistry {
    let study = TaskDefinition::new(
        TaskMetadata::new("study", "Study requirements")
            .with_category("analysis")
            .with_tags(["planning"]),
        InputOutputSchema::new()
            .input("topic", ParamSpec::new(ParamType::String).required())
            .output("notes", ParamType::String),
        Executable::from_fn(|params| {
            let topic = params.get_str("topic").unwrap_or_default();
            Ok(json!({ "notes": format!("notes on {}", topic) }))
        }),
    );
    let develop = TaskDefinition::new(
        TaskMetadata::new("develop", "Develop")
            .with_category("build")
            .with_tags(["code"])
            .with_dependencies(["study"]),
        InputOutputSchema::new()
            .input("notes", ParamSpec::new(ParamType::String).required())
            .output("code", ParamType::String),
        Executable::from_async_fn(|params| async move {
            let notes = params.get_str("notes").unwrap_or_default().to_string();
            Ok::<_, TaskError>(json!({ "code": format!("fn main() {{}} // {}", notes) }))
        }),
    );
    let test = TaskDefinition::new(
        TaskMetadata::new("test", "Test")
            .with_category("build")
            .with_tags(["code", "quality"])
            .with_dependencies(["develop"]),
        InputOutputSchema::new()
            .input("code", ParamSpec::new(ParamType::String).required())
            .input(
                "level",
                ParamSpec::new(ParamType::String).with_default(json!("unit")),
            ),
        Executable::from_fn(|params| {
            let code = params.get_str("code").unwrap_or_default();
            Ok(json!({
                "passed": code.starts_with("fn main"),
                "level": params.get("level").cloned().unwrap_or(Value::Null),
            }))
        }),
    );

    let mut registry = TaskRegistry::new();
    for definition in [study, develop, test] {
        registry
            .register(definition)
            .expect("sdlc tasks have unique ids");
    }
    registry
}
