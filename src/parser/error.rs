// ABOUTME: Error types for manifest parsing and validation
// ABOUTME: Defines specific error types for parser module operations

use thiserror::Error;

use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Failed to read manifest file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Validation failed: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Registration failed: {0}")]
    RegistryError(#[from] EngineError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Empty manifest: no tasks defined")]
    EmptyManifest,

    #[error("Invalid task configuration for '{task}': {reason}")]
    InvalidTaskConfig { task: String, reason: String },

    #[error("Request names unknown task '{task}'")]
    UnknownRequestTask { task: String },
}

pub type Result<T> = std::result::Result<T, ParserError>;
