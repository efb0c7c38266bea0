//! CLI command definitions

use crate::core::TriggerEvent;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    #[command(flatten)]
    pub trigger: TriggerArgs,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Directory artifacts are published to
    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,

    /// Don't save execution to history
    #[arg(long)]
    pub no_history: bool,
}

/// Show which stages an event would run
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    #[command(flatten)]
    pub trigger: TriggerArgs,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List pipelines with recorded runs
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show execution counts
    #[arg(long)]
    pub with_counts: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show execution history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent executions to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific execution
    #[arg(long)]
    pub execution_id: Option<String>,
}

/// The event a run is evaluated against
#[derive(Debug, Args, Clone)]
pub struct TriggerArgs {
    /// Kind of triggering event
    #[arg(long, value_enum, default_value_t = EventArg::Push)]
    pub event: EventArg,

    /// Pushed branch, or the source branch of a pull request
    #[arg(long)]
    pub branch: Option<String>,

    /// Target branch of a pull request
    #[arg(long)]
    pub base: Option<String>,

    /// Read the event from GitHub Actions environment variables
    #[arg(long, conflicts_with_all = ["event", "branch", "base"])]
    pub from_env: bool,
}

/// Event kind argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventArg {
    Push,
    PullRequest,
    Dispatch,
}

impl TriggerArgs {
    /// Build the triggering event from the flags or the process environment
    pub fn to_event(&self) -> Result<TriggerEvent> {
        self.resolve(|key| std::env::var(key).ok())
    }

    /// Build the triggering event, reading variables through `lookup`
    pub fn resolve<F>(&self, lookup: F) -> Result<TriggerEvent>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.from_env {
            return TriggerEvent::from_github_env(lookup)
                .context("Failed to read the triggering event from the environment");
        }

        match self.event {
            EventArg::Push => {
                let branch = self
                    .branch
                    .clone()
                    .context("--branch is required for push events")?;
                Ok(TriggerEvent::Push { branch })
            }
            EventArg::PullRequest => {
                let base = self
                    .base
                    .clone()
                    .context("--base is required for pull-request events")?;
                Ok(TriggerEvent::PullRequest {
                    base,
                    head: self.branch.clone(),
                })
            }
            EventArg::Dispatch => Ok(TriggerEvent::WorkflowDispatch {
                branch: self.branch.clone(),
            }),
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
