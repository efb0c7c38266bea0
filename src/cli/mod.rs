//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, ListCommand, PlanCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// CI pipeline runner with trigger rules and release automation
#[derive(Debug, Parser, Clone)]
#[command(name = "release-pipeline")]
#[command(version)]
#[command(
    about = "Run build, lint, artifact and release stages for a triggering event",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print command output as it arrives
    #[arg(short, long, global = true)]
    pub stream: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline for an event
    Run(RunCommand),

    /// Show which stages an event would run
    Plan(PlanCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// List pipelines with recorded runs
    List(ListCommand),

    /// Show execution history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::EventArg;

    #[test]
    fn test_parse_run_with_trigger_flags() {
        let cli = Cli::try_parse_from([
            "release-pipeline",
            "--stream",
            "run",
            "--file",
            "pipelines/revanced-discord-bot.yml",
            "--event",
            "pull-request",
            "--branch",
            "fix/embeds",
            "--base",
            "main",
            "--variable",
            "target=x86_64-unknown-linux-gnu",
        ])
        .unwrap();

        assert!(cli.stream);
        match cli.command {
            Command::Run(run) => {
                assert_eq!(run.trigger.event, EventArg::PullRequest);
                assert_eq!(run.trigger.base.as_deref(), Some("main"));
                assert_eq!(run.variable.len(), 1);
                assert!(!run.no_history);
            }
            other => panic!("Expected run command, got {:?}", other),
        }
    }

    #[test]
    fn test_from_env_conflicts_with_explicit_event() {
        let result = Cli::try_parse_from([
            "release-pipeline",
            "plan",
            "--file",
            "pipeline.yml",
            "--from-env",
            "--branch",
            "main",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_history() {
        let cli =
            Cli::try_parse_from(["release-pipeline", "history", "--limit", "3", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::History(HistoryCommand { limit: 3, json: true, .. })
        ));
    }
}
