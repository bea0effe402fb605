// ABOUTME: Configuration management for the taskweave application
// ABOUTME: Loads settings from a config file and applies environment variable overrides

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{RetryConfig, TaskScheduler};
use crate::output::OutputConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,

    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub default_timeout: Duration,

    /// Delay before the first retry; later retries back off exponentially
    #[serde(with = "humantime_serde", default)]
    pub retry_delay: Duration,

    /// Global parameters, overridden by `--param`
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent(),
            default_timeout: default_timeout(),
            retry_delay: Duration::ZERO,
            parameters: IndexMap::new(),
            logging: LoggingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file path or default locations
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let explicit = path.is_some();
        let config_path = match path {
            Some(p) => p,
            None => Self::find_config_file(),
        };

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config {}", config_path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid config {}", config_path.display()))?
        } else if explicit {
            anyhow::bail!("Config file not found: {}", config_path.display());
        } else {
            Config::default()
        };

        config.merge_env()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> PathBuf {
        let possible_paths = [
            PathBuf::from("taskweave.yaml"),
            PathBuf::from("taskweave.yml"),
            PathBuf::from(".taskweave.yaml"),
            PathBuf::from(".taskweave.yml"),
        ];

        for path in possible_paths {
            if path.exists() {
                return path;
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".taskweave").join("config.yaml");
            if home_config.exists() {
                return home_config;
            }
        }

        // may not exist
        PathBuf::from("taskweave.yaml")
    }

    /// Merge environment variables into configuration
    fn merge_env(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("TASKWEAVE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("TASKWEAVE_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(max_tasks) = std::env::var("TASKWEAVE_MAX_CONCURRENT") {
            self.max_concurrent_tasks = max_tasks
                .parse()
                .context("TASKWEAVE_MAX_CONCURRENT must be a number")?;
        }
        if let Ok(timeout) = std::env::var("TASKWEAVE_DEFAULT_TIMEOUT") {
            self.default_timeout = humantime_serde::re::humantime::parse_duration(&timeout)
                .context("TASKWEAVE_DEFAULT_TIMEOUT must be a duration such as 30s")?;
        }
        if let Ok(format) = std::env::var("TASKWEAVE_OUTPUT_FORMAT") {
            self.output.format = format;
        }

        Ok(())
    }

    /// Parameters given on the command line take precedence over configured ones
    pub fn merge_parameters(&mut self, parameters: IndexMap<String, Value>) {
        self.parameters.extend(parameters);
    }

    pub fn scheduler(&self, max_concurrent: Option<usize>) -> TaskScheduler {
        let retry = RetryConfig {
            initial_delay: self.retry_delay,
            ..RetryConfig::default()
        };
        TaskScheduler::new(max_concurrent.unwrap_or(self.max_concurrent_tasks)).with_retry(retry)
    }
}
