// ABOUTME: Command implementations for the taskweave CLI
// ABOUTME: Handles execution of run, plan, validate, and list commands

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::args::{Args, RequestArgs};
use super::config::Config;
use crate::engine::{TaskEngine, TaskRequest};
use crate::output::{OutputConfig, OutputHandler};
use crate::parser::{Manifest, ManifestParser};
use crate::tasks::TaskRegistry;

/// Options for a `run` invocation beyond the request itself
#[derive(Debug, Default)]
pub struct RunOptions {
    pub session: Option<String>,
    pub format: Option<String>,
    pub output: Option<String>,
    pub max_concurrent: Option<usize>,
}

async fn load_manifest(path: &Path, config: &Config) -> Result<(Manifest, Arc<TaskRegistry>)> {
    let manifest = ManifestParser::new()
        .parse_file(path)
        .await
        .with_context(|| format!("Failed to parse manifest {}", path.display()))?;
    info!("Loaded manifest: {}", manifest.name);

    let registry = manifest
        .build_registry(config.default_timeout)
        .context("Failed to build task registry")?;
    Ok((manifest, Arc::new(registry)))
}

/// Request from `-t`/`-d` flags, or the manifest's own `request:` when no task is named.
/// Configured and `-p` parameters override the manifest's global parameters.
pub fn build_request(
    manifest: &Manifest,
    request_args: &RequestArgs,
    config: &Config,
) -> Result<TaskRequest> {
    let mut request = match request_args.tasks.split_first() {
        Some((primary, secondary)) => secondary
            .iter()
            .fold(TaskRequest::new(primary.clone()), |request, id| {
                request.with_secondary(id.clone(), Default::default())
            }),
        None => manifest.request.clone().with_context(|| {
            format!(
                "Manifest '{}' has no request section; name tasks with --task",
                manifest.name
            )
        })?,
    };

    request.parameters.extend(config.parameters.clone());
    request
        .parameters
        .extend(Args::parse_parameters(&request_args.params)?);
    request
        .dependencies
        .extend(Args::parse_dependencies(&request_args.dependencies)?);
    Ok(request)
}

fn output_config(config: &Config, format: Option<String>, destination: Option<String>) -> OutputConfig {
    let mut output = config.output.clone();
    if let Some(format) = format {
        output.format = format;
    }
    if let Some(destination) = destination {
        output.destination = destination;
    }
    output
}

/// Plan and execute a manifest request, then emit the run report
pub async fn run_manifest(
    manifest_path: &Path,
    request_args: &RequestArgs,
    options: RunOptions,
    config: &Config,
) -> Result<()> {
    let (manifest, registry) = load_manifest(manifest_path, config).await?;
    let request = build_request(&manifest, request_args, config)?;

    let engine = TaskEngine::new(registry).with_scheduler(config.scheduler(options.max_concurrent));
    let report = engine
        .run(&request, options.session.as_deref())
        .await
        .context("Failed to orchestrate request")?;

    let output = output_config(config, options.format, options.output);
    OutputHandler::new()
        .output_report(&report, &output)
        .await
        .context("Failed to write run report")?;

    info!(
        "Session {} finished: {}/{} tasks succeeded",
        report.session_id, report.summary.successful, report.summary.total
    );

    if report.is_success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} task(s) failed: {}",
            report.failed_tasks().len(),
            report.failed_tasks().join(", ")
        ))
    }
}

/// Print the execution plan for a manifest request
pub async fn plan_manifest(
    manifest_path: &Path,
    request_args: &RequestArgs,
    format: Option<String>,
    config: &Config,
) -> Result<()> {
    let (manifest, registry) = load_manifest(manifest_path, config).await?;
    let request = build_request(&manifest, request_args, config)?;

    let plan = TaskEngine::new(registry)
        .plan(&request)
        .context("Failed to orchestrate request")?;

    let output = output_config(config, format, Some("stdout".to_string()));
    OutputHandler::new()
        .output_plan(&plan, &output)
        .await
        .context("Failed to write plan")?;
    Ok(())
}

/// Validate a manifest, its dependency graph and its request when present
pub async fn validate_manifest(manifest_path: &Path, config: &Config) -> Result<()> {
    info!("Validating manifest: {}", manifest_path.display());
    let (manifest, registry) = load_manifest(manifest_path, config).await?;

    let problems = registry.validate_dependencies();
    if !problems.is_empty() {
        for problem in &problems {
            warn!("{}", problem);
            println!("✗ {}", problem);
        }
        return Err(anyhow::anyhow!(
            "Manifest '{}' has {} dependency problem(s)",
            manifest.name,
            problems.len()
        ));
    }

    let planned = match &manifest.request {
        Some(request) => {
            let plan = TaskEngine::new(Arc::clone(&registry))
                .plan(request)
                .context("Manifest request cannot be planned")?;
            Some(plan.total_layers())
        }
        None => None,
    };

    println!("✓ Manifest '{}' is valid", manifest.name);
    println!("  Tasks: {}", registry.len());
    println!("  Categories: {}", registry.list_categories().join(", "));
    if let Some(layers) = planned {
        println!("  Request plan: {} layers", layers);
    }

    info!("Manifest validation completed successfully");
    Ok(())
}

/// Print the tasks of a manifest, optionally filtered by category and tags
pub async fn list_tasks(
    manifest_path: &Path,
    category: Option<&str>,
    tags: &[String],
    match_all: bool,
    config: &Config,
) -> Result<()> {
    let (_, registry) = load_manifest(manifest_path, config).await?;

    let mut tasks = match category {
        Some(category) => registry.get_by_category(category),
        None => registry.list_all(),
    };
    if !tags.is_empty() {
        let tagged: Vec<String> = registry
            .get_by_tags(tags, match_all)
            .iter()
            .map(|definition| definition.id().to_string())
            .collect();
        tasks.retain(|definition| tagged.iter().any(|id| id == definition.id()));
    }

    for definition in &tasks {
        let metadata = &definition.metadata;
        let mut line = format!("{} [{}] {}", metadata.id, metadata.category, metadata.name);
        if !metadata.description.is_empty() {
            line.push_str(&format!(" - {}", metadata.description));
        }
        if !metadata.tags.is_empty() {
            let tags: Vec<&str> = metadata.tags.iter().map(String::as_str).collect();
            line.push_str(&format!(" ({})", tags.join(", ")));
        }
        println!("{}", line);
    }

    info!("Listed {} of {} tasks", tasks.len(), registry.len());
    Ok(())
}
