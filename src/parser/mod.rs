// ABOUTME: Parser module for YAML and JSON task manifests
// ABOUTME: Exports manifest parsing, task entries and parser errors

pub mod error;
pub mod manifest;
pub mod task;

pub use error::{ParserError, Result, ValidationError};
pub use manifest::{Manifest, ManifestParser};
pub use task::TaskSpec;
