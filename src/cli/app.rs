// ABOUTME: Main application orchestration for the taskweave CLI
// ABOUTME: Coordinates between CLI arguments, configuration, and command execution

use anyhow::Result;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use super::commands::{self, RunOptions};
use super::{Args, Commands, Config};

pub struct App {
    config: Config,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self, verbose: bool, no_color: bool) -> Result<()> {
        let log_level = if verbose {
            "debug"
        } else {
            &self.config.logging.level
        };

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // stdout carries reports, logs go to stderr
        let result = match self.config.logging.format.as_str() {
            "compact" => tracing_subscriber::fmt()
                .compact()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
            _ => tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_ansi(!no_color)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init(),
        };
        result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

        debug!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Run the application with parsed arguments
    pub async fn run(&mut self, args: Args) -> Result<()> {
        self.init_logging(args.verbose, args.no_color)?;

        info!("Starting taskweave v{}", env!("CARGO_PKG_VERSION"));
        debug!("Configuration loaded from: {:?}", args.config);

        match args.command {
            Commands::Run {
                manifest,
                request,
                session,
                format,
                output,
                max_concurrent,
            } => {
                let options = RunOptions {
                    session,
                    format,
                    output,
                    max_concurrent,
                };
                commands::run_manifest(&manifest, &request, options, &self.config).await
            }

            Commands::Plan {
                manifest,
                request,
                format,
            } => commands::plan_manifest(&manifest, &request, format, &self.config).await,

            Commands::Validate { manifest } => {
                commands::validate_manifest(&manifest, &self.config).await
            }

            Commands::List {
                manifest,
                category,
                tags,
                match_all,
            } => {
                commands::list_tasks(
                    &manifest,
                    category.as_deref(),
                    &tags,
                    match_all,
                    &self.config,
                )
                .await
            }
        }
    }

    /// Parse arguments, load configuration and run
    pub async fn from_env() -> Result<()> {
        let args = Args::parse_args();
        let config = Config::load(args.config.clone())?;
        Self::new(config).run(args).await
    }
}
