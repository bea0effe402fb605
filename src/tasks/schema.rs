// ABOUTME: Input/output schema for task definitions
// ABOUTME: Validates supplied parameters, supplies defaults and splits undeclared passthrough values

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::SchemaViolation;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    #[default]
    Any,
}

impl ParamType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
            ParamType::Any => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Any => "any",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
}

impl ParamSpec {
    pub fn new(param_type: ParamType) -> Self {
        Self {
            param_type,
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, allowed: Vec<Value>) -> Self {
        self.allowed = Some(allowed);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn check(&self, name: &str, value: &Value) -> Result<(), SchemaViolation> {
        if !self.param_type.matches(value) {
            return Err(SchemaViolation::new(
                name,
                format!("should be of type {}", self.param_type),
            ));
        }

        if let Some(allowed) = &self.allowed {
            if !allowed.contains(value) {
                let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
                return Err(SchemaViolation::new(
                    name,
                    format!("must be one of [{}]", options.join(", ")),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(rename = "type", default)]
    pub output_type: ParamType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputOutputSchema {
    #[serde(default)]
    pub inputs: IndexMap<String, ParamSpec>,
    #[serde(default)]
    pub outputs: IndexMap<String, OutputSpec>,
}

impl InputOutputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.inputs.insert(name.into(), spec);
        self
    }

    pub fn output(mut self, name: impl Into<String>, output_type: ParamType) -> Self {
        self.outputs.insert(
            name.into(),
            OutputSpec {
                output_type,
                description: String::new(),
            },
        );
        self
    }

    pub fn declares_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    /// Check required presence, type tags and enumerations in declaration order
    pub fn validate_input(&self, data: &IndexMap<String, Value>) -> Result<(), SchemaViolation> {
        for (name, spec) in &self.inputs {
            match data.get(name) {
                Some(value) => spec.check(name, value)?,
                None if spec.required => {
                    return Err(SchemaViolation::new(name.as_str(), "is required"))
                }
                None => {}
            }
        }
        Ok(())
    }

    pub fn input_defaults(&self) -> IndexMap<String, Value> {
        self.inputs
            .iter()
            .filter_map(|(name, spec)| spec.default.clone().map(|value| (name.clone(), value)))
            .collect()
    }

    /// Validate `data`, fill missing defaults and separate undeclared keys
    pub fn bind(&self, data: IndexMap<String, Value>) -> Result<Parameters, SchemaViolation> {
        self.validate_input(&data)?;

        let mut params = Parameters::default();
        for (name, value) in data {
            if self.inputs.contains_key(&name) {
                params.values.insert(name, value);
            } else {
                params.extra.insert(name, value);
            }
        }

        for (name, default) in self.input_defaults() {
            params.values.entry(name).or_insert(default);
        }

        Ok(params)
    }
}

/// Parameters handed to an executable unit.
///
/// `values` holds the schema-declared parameters, already validated. `extra`
/// carries undeclared passthrough values untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub values: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, Value>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).or_else(|| self.extra.get(name))
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn require(&self, name: &str) -> super::Result<&Value> {
        self.get(name)
            .ok_or_else(|| super::TaskError::invalid_input(name, "is required"))
    }

    pub fn require_str(&self, name: &str) -> super::Result<&str> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| super::TaskError::invalid_input(name, "should be a string"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name) || self.extra.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len() + self.extra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into one JSON object, declared values first
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        for (name, value) in self.values.iter().chain(self.extra.iter()) {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn greeting_schema() -> InputOutputSchema {
        InputOutputSchema::new()
            .input("name", ParamSpec::new(ParamType::String).required())
            .input(
                "style",
                ParamSpec::new(ParamType::String)
                    .with_default(json!("plain"))
                    .with_enum(vec![json!("plain"), json!("loud")]),
            )
            .input("repeat", ParamSpec::new(ParamType::Integer))
            .output("message", ParamType::String)
    }

    fn input(value: Value) -> IndexMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_missing_required_parameter() {
        let err = greeting_schema()
            .validate_input(&input(json!({"style": "loud"})))
            .unwrap_err();
        assert_eq!(err.field, "name");
        assert_eq!(err.reason, "is required");
    }

    #[test]
    fn test_type_mismatch() {
        let err = greeting_schema()
            .validate_input(&input(json!({"name": "ada", "repeat": 1.5})))
            .unwrap_err();
        assert_eq!(err.field, "repeat");
        assert!(err.reason.contains("integer"));
    }

    #[test]
    fn test_enum_violation() {
        let err = greeting_schema()
            .validate_input(&input(json!({"name": "ada", "style": "quiet"})))
            .unwrap_err();
        assert_eq!(err.field, "style");
        assert!(err.reason.contains("\"loud\""));
    }

    #[test]
    fn test_bind_fills_defaults_and_keeps_extra() {
        let params = greeting_schema()
            .bind(input(json!({"name": "ada", "trace_id": "t-1"})))
            .unwrap();

        assert_eq!(params.get_str("name"), Some("ada"));
        assert_eq!(params.get_str("style"), Some("plain"));
        assert_eq!(params.extra.get("trace_id"), Some(&json!("t-1")));
        assert!(!params.values.contains_key("trace_id"));
        assert_eq!(
            params.to_value(),
            json!({"name": "ada", "style": "plain", "trace_id": "t-1"})
        );
    }

    #[test]
    fn test_schema_from_yaml() {
        let yaml = r#"
inputs:
  path:
    type: string
    required: true
  mode:
    type: string
    enum: [fast, slow]
outputs:
  content:
    type: string
"#;
        let schema: InputOutputSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.inputs.len(), 2);
        assert!(schema.inputs["path"].required);
        assert_eq!(
            schema.inputs["mode"].allowed,
            Some(vec![json!("fast"), json!("slow")])
        );
        assert!(schema.declares_output("content"));
    }
}
