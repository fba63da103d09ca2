//! k8s-event-watcher - Kubernetes event classification CLI
//!
#![doc = "Main entry point for the k8s-event-watcher application."]

use anyhow::Result;

use k8s_event_watcher::cli::{Cli, Commands};
use k8s_event_watcher::commands;
use k8s_event_watcher::commands::watch::WatchOptions;
use k8s_event_watcher::config::Config;
use k8s_event_watcher::watcher::logging::{bootstrap_subscriber, init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load and validate configuration; env override diagnostics go to a
    // bootstrap subscriber until the configured one is installed
    let bootstrap = bootstrap_subscriber(cli.verbose)?;
    let mut config = tracing::subscriber::with_default(bootstrap, || Config::load(&cli.config))?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    // Initialize tracing
    init_logging(&config.logging)?;
    tracing::debug!(config = %cli.config.display(), "Configuration loaded");

    // Execute command
    match cli.command {
        Commands::Watch {
            events,
            max_retries,
            webhook_timeout,
            dry_run,
        } => {
            tracing::info!("Starting watcher mode");
            if dry_run {
                tracing::debug!("Dry-run mode requested");
            }

            commands::watch::run_watch(
                config,
                WatchOptions {
                    events,
                    max_retries,
                    webhook_timeout,
                    dry_run,
                },
            )
            .await?;
            Ok(())
        }
        Commands::Check => {
            let dump = commands::check::run_check(&config)?;
            print!("{}", dump);
            Ok(())
        }
        Commands::Match { event } => {
            tracing::debug!("Classifying event from: {}", event.display());
            let report = commands::classify::run_classify(&config, &event)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
