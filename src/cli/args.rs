// ABOUTME: Command line argument definitions and parsing using Clap
// ABOUTME: Defines the main CLI structure and subcommands for taskweave

use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::PathBuf;

use crate::dataflow::parse_literal;
use crate::engine::DependencyHint;

#[derive(Parser)]
#[command(name = "taskweave")]
#[command(about = "A dependency-aware task orchestration engine for declarative task manifests")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan and execute tasks from a manifest
    Run {
        #[arg(help = "Path to manifest YAML or JSON file")]
        manifest: PathBuf,

        #[command(flatten)]
        request: RequestArgs,

        #[arg(long, help = "Session id for this run (generated when omitted)")]
        session: Option<String>,

        #[arg(short, long, help = "Output format: json, yaml or text")]
        format: Option<String>,

        #[arg(short, long, help = "Output file or file:// destination")]
        output: Option<String>,

        #[arg(long, help = "Maximum number of concurrent tasks")]
        max_concurrent: Option<usize>,
    },

    /// Show the execution plan without running anything
    Plan {
        #[arg(help = "Path to manifest YAML or JSON file")]
        manifest: PathBuf,

        #[command(flatten)]
        request: RequestArgs,

        #[arg(short, long, help = "Output format: json, yaml or text")]
        format: Option<String>,
    },

    /// Validate a manifest and its task dependencies
    Validate {
        #[arg(help = "Path to manifest YAML or JSON file")]
        manifest: PathBuf,
    },

    /// List the tasks declared in a manifest
    List {
        #[arg(help = "Path to manifest YAML or JSON file")]
        manifest: PathBuf,

        #[arg(long, help = "Only tasks in this category")]
        category: Option<String>,

        #[arg(long = "tag", help = "Only tasks carrying this tag")]
        tags: Vec<String>,

        #[arg(long, help = "Require every --tag instead of any")]
        match_all: bool,
    },
}

/// Request flags shared by `run` and `plan`
#[derive(clap::Args, Debug, Default)]
pub struct RequestArgs {
    #[arg(short = 't', long = "task", help = "Task to run; the first is primary")]
    pub tasks: Vec<String>,

    #[arg(short = 'p', long = "param", help = "Global parameter (key=value)")]
    pub params: Vec<String>,

    #[arg(
        short = 'd',
        long = "depends",
        help = "Extra dependency hint (task:dependency)"
    )]
    pub dependencies: Vec<String>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse `key=value` pairs; values go through literal parsing so `3` becomes a number
    pub fn parse_parameters(params: &[String]) -> anyhow::Result<IndexMap<String, Value>> {
        let mut parameters = IndexMap::new();

        for param in params {
            match param.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    parameters.insert(key.trim().to_string(), parse_literal(value));
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "Invalid parameter format '{}'. Expected 'key=value'",
                        param
                    ));
                }
            }
        }

        Ok(parameters)
    }

    pub fn parse_dependencies(hints: &[String]) -> anyhow::Result<Vec<DependencyHint>> {
        hints
            .iter()
            .map(|hint| {
                hint.parse::<DependencyHint>()
                    .map_err(|e| anyhow::anyhow!("Invalid dependency '{}': {}", hint, e))
            })
            .collect()
    }
}
