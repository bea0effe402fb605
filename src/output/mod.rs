// ABOUTME: Output handler module for run report formatting and persistence
// ABOUTME: Routes reports and plans through a named formatter to stdout or a file

pub mod config;
pub mod error;
pub mod formatter;
pub mod writer;

use std::collections::HashMap;
use tracing::debug;

pub use self::config::{Destination, OutputConfig};
pub use self::error::{OutputError, Result};
pub use self::formatter::{JsonFormatter, OutputFormatter, TextFormatter, YamlFormatter};
pub use self::writer::{FileWriter, OutputWriter, StdoutWriter};
use crate::engine::{OrchestrationPlan, RunReport};

pub struct OutputHandler {
    formatters: HashMap<String, Box<dyn OutputFormatter>>,
    writers: HashMap<String, Box<dyn OutputWriter>>,
}

impl OutputHandler {
    pub fn new() -> Self {
        let mut handler = Self {
            formatters: HashMap::new(),
            writers: HashMap::new(),
        };

        handler.register_formatter("json", Box::new(JsonFormatter::new(true)));
        handler.register_formatter("compact", Box::new(JsonFormatter::new(false)));
        handler.register_formatter("yaml", Box::new(YamlFormatter));
        handler.register_formatter("text", Box::new(TextFormatter::new()));

        handler.register_writer("stdout", Box::new(StdoutWriter));
        handler.register_writer("file", Box::new(FileWriter::new(true)));

        handler
    }

    pub fn register_formatter(&mut self, name: &str, formatter: Box<dyn OutputFormatter>) {
        self.formatters.insert(name.to_string(), formatter);
    }

    pub fn register_writer(&mut self, name: &str, writer: Box<dyn OutputWriter>) {
        self.writers.insert(name.to_string(), writer);
    }

    fn formatter(&self, config: &OutputConfig) -> Result<&dyn OutputFormatter> {
        let name = match config.format.as_str() {
            "json" if !config.pretty => "compact",
            other => other,
        };
        self.formatters
            .get(name)
            .map(|formatter| formatter.as_ref())
            .ok_or_else(|| OutputError::FormatterNotFound {
                format: config.format.clone(),
            })
    }

    pub fn render_report(&self, report: &RunReport, config: &OutputConfig) -> Result<String> {
        self.formatter(config)?.format_report(report)
    }

    pub fn render_plan(&self, plan: &OrchestrationPlan, config: &OutputConfig) -> Result<String> {
        self.formatter(config)?.format_plan(plan)
    }

    pub async fn output_report(&self, report: &RunReport, config: &OutputConfig) -> Result<()> {
        let content = self.render_report(report, config)?;
        self.write(&content, config).await
    }

    pub async fn output_plan(&self, plan: &OrchestrationPlan, config: &OutputConfig) -> Result<()> {
        let content = self.render_plan(plan, config)?;
        self.write(&content, config).await
    }

    async fn write(&self, content: &str, config: &OutputConfig) -> Result<()> {
        let destination = config.destination();
        let writer_type = destination.writer_type();
        let writer = self
            .writers
            .get(writer_type)
            .ok_or_else(|| OutputError::WriterNotFound {
                writer_type: writer_type.to_string(),
            })?;

        debug!("Writing {} output via {}", config.format, writer_type);
        writer.write(content, &destination).await
    }

    pub fn list_formatters(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.formatters.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for OutputHandler {
    fn default() -> Self {
        Self::new()
    }
}
