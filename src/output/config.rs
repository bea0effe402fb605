// ABOUTME: Configuration types for output handling
// ABOUTME: Selects the report format and the destination it is written to

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: String,
    /// `stdout`, `file://<path>` or a plain path
    #[serde(default = "default_destination")]
    pub destination: String,
    #[serde(default = "default_true")]
    pub pretty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    File(PathBuf),
}

impl Destination {
    pub fn parse(destination: &str) -> Self {
        let destination = destination.trim();
        match destination {
            "" | "-" | "stdout" => Destination::Stdout,
            other => Destination::File(PathBuf::from(
                other.strip_prefix("file://").unwrap_or(other),
            )),
        }
    }

    /// Name of the writer handling this destination
    pub fn writer_type(&self) -> &'static str {
        match self {
            Destination::Stdout => "stdout",
            Destination::File(_) => "file",
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            destination: default_destination(),
            pretty: true,
        }
    }
}

impl OutputConfig {
    pub fn new(format: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            destination: destination.into(),
            pretty: true,
        }
    }

    pub fn destination(&self) -> Destination {
        Destination::parse(&self.destination)
    }
}

fn default_format() -> String {
    "json".to_string()
}

fn default_destination() -> String {
    "stdout".to_string()
}

fn default_true() -> bool {
    true
}
