//! Command-line interface definition for k8s-event-watcher
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// k8s-event-watcher - classify Kubernetes events and forward matches
///
/// Reads events, matches them against the configured filters and posts
/// every match to the configured webhooks.
#[derive(Parser, Debug, Clone)]
#[command(name = "k8s-event-watcher")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "K8SEW_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Watch an event stream and deliver matches to webhooks
    Watch {
        /// Event stream to read (`-` for stdin), e.g. the output of
        /// `kubectl get events --watch -o json`
        #[arg(short, long, default_value = "-")]
        events: String,

        /// Override delivery.maxRetries
        #[arg(long)]
        max_retries: Option<u32>,

        /// Override delivery.timeoutSecs
        #[arg(long)]
        webhook_timeout: Option<u64>,

        /// Log matches instead of posting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration and print it back
    Check,

    /// Classify a single event JSON file and print the match
    Match {
        /// Path to the event JSON file
        #[arg(short, long)]
        event: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_watch_defaults() {
        let cli = Cli::try_parse_from(["k8s-event-watcher", "watch"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        assert!(!cli.verbose);
        assert_eq!(
            cli.command,
            Commands::Watch {
                events: "-".to_string(),
                max_retries: None,
                webhook_timeout: None,
                dry_run: false,
            }
        );
    }

    #[test]
    fn test_cli_parse_watch_overrides() {
        let cli = Cli::try_parse_from([
            "k8s-event-watcher",
            "--config",
            "/etc/k8sew/config.yaml",
            "-v",
            "watch",
            "--events",
            "events.json",
            "--max-retries",
            "5",
            "--webhook-timeout",
            "20",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/k8sew/config.yaml"));
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Commands::Watch {
                events: "events.json".to_string(),
                max_retries: Some(5),
                webhook_timeout: Some(20),
                dry_run: true,
            }
        );
    }

    #[test]
    fn test_cli_parse_check() {
        let cli = Cli::try_parse_from(["k8s-event-watcher", "-c", "c.yaml", "check"]).unwrap();
        assert_eq!(cli.command, Commands::Check);
        assert_eq!(cli.config, PathBuf::from("c.yaml"));
    }

    #[test]
    fn test_cli_parse_match_requires_event() {
        assert!(Cli::try_parse_from(["k8s-event-watcher", "match"]).is_err());

        let cli =
            Cli::try_parse_from(["k8s-event-watcher", "match", "--event", "e.json"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Match {
                event: PathBuf::from("e.json")
            }
        );
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["k8s-event-watcher"]).is_err());
    }
}
