// ABOUTME: Builtin executable units that manifests bind to by kind
// ABOUTME: Passthrough, text processing, data analysis, transforms and file reading

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::command::{CommandConfig, CommandTask};
use super::error::{Result, TaskError};
use super::schema::{InputOutputSchema, ParamSpec, ParamType, Parameters};
use super::{AsyncTask, Executable, SyncTask};
use crate::dataflow::{AggregateOp, Transform};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinKind {
    #[default]
    Passthrough,
    Text,
    Analyze,
    Transform,
    ReadFile,
    Command,
}

impl BuiltinKind {
    pub fn all() -> &'static [BuiltinKind] {
        &[
            BuiltinKind::Passthrough,
            BuiltinKind::Text,
            BuiltinKind::Analyze,
            BuiltinKind::Transform,
            BuiltinKind::ReadFile,
            BuiltinKind::Command,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinKind::Passthrough => "passthrough",
            BuiltinKind::Text => "text",
            BuiltinKind::Analyze => "analyze",
            BuiltinKind::Transform => "transform",
            BuiltinKind::ReadFile => "read_file",
            BuiltinKind::Command => "command",
        }
    }

    /// Build the executable for `task_id` from its builtin-specific config
    pub fn build(&self, task_id: &str, config: &Value) -> Result<Executable> {
        debug!("Building {} executable for task {}", self.as_str(), task_id);
        let executable = match self {
            BuiltinKind::Passthrough => Executable::sync(PassthroughTask {
                task_id: task_id.to_string(),
            }),
            BuiltinKind::Text => Executable::sync(TextTask),
            BuiltinKind::Analyze => Executable::sync(AnalyzeTask),
            BuiltinKind::Transform => {
                let transform = config
                    .get("transform")
                    .ok_or_else(|| TaskError::Config("transform task requires 'transform'".into()))
                    .and_then(|raw| {
                        serde_json::from_value::<Transform>(raw.clone())
                            .map_err(|e| TaskError::Config(format!("invalid transform: {}", e)))
                    })?;
                Executable::sync(TransformTask { transform })
            }
            BuiltinKind::ReadFile => Executable::asynchronous(ReadFileTask),
            BuiltinKind::Command => {
                let config: CommandConfig = serde_json::from_value(config.clone())
                    .map_err(|e| TaskError::Config(format!("invalid command config: {}", e)))?;
                config.validate()?;
                Executable::asynchronous(CommandTask::new(config))
            }
        };
        Ok(executable)
    }

    /// Schema used when a manifest entry declares no inputs or outputs of its own
    pub fn default_schema(&self) -> InputOutputSchema {
        match self {
            BuiltinKind::Passthrough => InputOutputSchema::new(),
            BuiltinKind::Text => InputOutputSchema::new()
                .input("text", ParamSpec::new(ParamType::String).required())
                .input(
                    "operation",
                    ParamSpec::new(ParamType::String)
                        .with_default(json!("count"))
                        .with_enum(
                            TEXT_OPERATIONS.iter().map(|op| json!(op)).collect(),
                        ),
                )
                .output("operation", ParamType::String)
                .output("result", ParamType::Any),
            BuiltinKind::Analyze => InputOutputSchema::new()
                .input("data", ParamSpec::new(ParamType::Any).required())
                .output("data_type", ParamType::String)
                .output("count", ParamType::Integer)
                .output("summary", ParamType::String),
            BuiltinKind::Transform => InputOutputSchema::new()
                .input("data", ParamSpec::new(ParamType::Any).required())
                .output("result", ParamType::Any),
            BuiltinKind::ReadFile => InputOutputSchema::new()
                .input("path", ParamSpec::new(ParamType::String).required())
                .output("path", ParamType::String)
                .output("content", ParamType::String)
                .output("bytes", ParamType::Integer),
            BuiltinKind::Command => InputOutputSchema::new()
                .input("args", ParamSpec::new(ParamType::Array))
                .output("stdout", ParamType::String)
                .output("stderr", ParamType::String)
                .output("exit_code", ParamType::Integer),
        }
    }
}

impl std::fmt::Display for BuiltinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const TEXT_OPERATIONS: &[&str] = &["count", "lower", "upper", "reverse", "words"];

/// Echoes its inputs back with a completion marker
pub struct PassthroughTask {
    task_id: String,
}

impl SyncTask for PassthroughTask {
    fn execute(&self, params: &Parameters) -> Result<Value> {
        let mut output = Map::new();
        output.insert("status".to_string(), json!("completed"));
        output.insert("task".to_string(), json!(self.task_id));
        if let Value::Object(inputs) = params.to_value() {
            output.extend(inputs);
        }
        Ok(Value::Object(output))
    }
}

pub struct TextTask;

impl SyncTask for TextTask {
    fn execute(&self, params: &Parameters) -> Result<Value> {
        let text = params.require_str("text")?;
        let operation = params.get_str("operation").unwrap_or("count");

        let result = match operation {
            "count" => json!(text.chars().count()),
            "lower" => json!(text.to_lowercase()),
            "upper" => json!(text.to_uppercase()),
            "reverse" => json!(text.chars().rev().collect::<String>()),
            "words" => json!(text.split_whitespace().count()),
            other => {
                return Err(TaskError::invalid_input(
                    "operation",
                    format!("unknown text operation '{}'", other),
                ))
            }
        };

        Ok(json!({ "operation": operation, "result": result }))
    }
}

/// Shape summary of arbitrary data, with numeric statistics for lists
pub struct AnalyzeTask;

impl SyncTask for AnalyzeTask {
    fn execute(&self, params: &Parameters) -> Result<Value> {
        let data = params.require("data")?;

        let analysis = match data {
            Value::Array(items) => {
                let mut report = json!({
                    "data_type": "list",
                    "count": items.len(),
                    "summary": format!("list with {} items", items.len()),
                });
                if items.iter().any(Value::is_number) {
                    for op in [AggregateOp::Sum, AggregateOp::Avg, AggregateOp::Min, AggregateOp::Max] {
                        report[op.as_str()] = op.apply(items);
                    }
                }
                report
            }
            Value::Object(map) => json!({
                "data_type": "object",
                "keys": map.keys().collect::<Vec<_>>(),
                "count": map.len(),
                "summary": format!("object with {} keys", map.len()),
            }),
            Value::String(text) => json!({
                "data_type": "string",
                "length": text.chars().count(),
                "summary": format!("string with {} characters", text.chars().count()),
            }),
            other => json!({
                "data_type": value_type(other),
                "value": other,
            }),
        };

        Ok(analysis)
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

pub struct TransformTask {
    transform: Transform,
}

impl SyncTask for TransformTask {
    fn execute(&self, params: &Parameters) -> Result<Value> {
        let data = params.require("data")?;
        Ok(json!({ "result": self.transform.apply(data) }))
    }
}

pub struct ReadFileTask;

#[async_trait]
impl AsyncTask for ReadFileTask {
    async fn execute(&self, params: Parameters) -> Result<Value> {
        let path = params.require_str("path")?;
        let content = tokio::fs::read_to_string(path).await?;
        Ok(json!({
            "path": path,
            "bytes": content.len(),
            "content": content,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn params(value: Value) -> Parameters {
        let mut params = Parameters::new();
        if let Value::Object(map) = value {
            for (k, v) in map {
                params.insert(k, v);
            }
        }
        params
    }

    #[test]
    fn test_passthrough_echoes_inputs() {
        let task = PassthroughTask {
            task_id: "study".to_string(),
        };
        let output = task.execute(&params(json!({"topic": "graphs"}))).unwrap();
        assert_eq!(
            output,
            json!({"status": "completed", "task": "study", "topic": "graphs"})
        );
    }

    #[test]
    fn test_text_operations() {
        let upper = TextTask
            .execute(&params(json!({"text": "abc", "operation": "upper"})))
            .unwrap();
        assert_eq!(upper["result"], json!("ABC"));

        let count = TextTask.execute(&params(json!({"text": "héllo"}))).unwrap();
        assert_eq!(count, json!({"operation": "count", "result": 5}));

        let err = TextTask
            .execute(&params(json!({"text": "abc", "operation": "shout"})))
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidInput { .. }));
    }

    #[test]
    fn test_analyze_numeric_list() {
        let report = AnalyzeTask
            .execute(&params(json!({"data": [4, 1, 7]})))
            .unwrap();
        assert_eq!(report["data_type"], json!("list"));
        assert_eq!(report["count"], json!(3));
        assert_eq!(report["sum"], json!(12));
        assert_eq!(report["min"], json!(1));
        assert_eq!(report["max"], json!(7));
        assert_eq!(report["avg"], json!(4.0));
    }

    #[test]
    fn test_transform_builtin_from_config() {
        let executable = BuiltinKind::Transform
            .build("pick", &json!({"transform": {"type": "extract", "path": "user.name"}}))
            .unwrap();
        assert_eq!(executable.kind(), "sync");

        let err = BuiltinKind::Transform.build("pick", &json!({})).unwrap_err();
        assert!(matches!(err, TaskError::Config(_)));
    }

    #[tokio::test]
    async fn test_read_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "line one").unwrap();

        let output = ReadFileTask
            .execute(params(json!({"path": file.path().to_str().unwrap()})))
            .await
            .unwrap();
        assert_eq!(output["content"], json!("line one"));
        assert_eq!(output["bytes"], json!(8));
    }

    #[test]
    fn test_builtin_kind_names() {
        let kind: BuiltinKind = serde_yaml::from_str("read_file").unwrap();
        assert_eq!(kind, BuiltinKind::ReadFile);
        assert_eq!(BuiltinKind::default(), BuiltinKind::Passthrough);
        assert_eq!(BuiltinKind::all().len(), 6);
    }
}
