//! Stage domain model

use crate::core::{
    condition::ConditionPattern,
    config::{StageConfig, StageKindConfig},
    context::render_template,
    state::StageState,
    trigger::EventKind,
};
use std::collections::HashMap;

/// A single stage in a pipeline
#[derive(Debug, Clone)]
pub struct Stage {
    /// Unique stage identifier
    pub id: String,

    /// Human-readable stage name
    pub name: String,

    /// What the stage does
    pub kind: StageKind,

    /// Events this stage runs for
    pub events: Vec<EventKind>,

    /// Timeout in seconds (None = no timeout)
    pub timeout_secs: Option<u64>,

    /// Directory the command runs in
    pub working_dir: Option<String>,

    /// Runtime state (not serialized)
    pub state: StageState,
}

/// Stage behavior with its kind-specific settings
#[derive(Debug, Clone)]
pub enum StageKind {
    Build {
        command: String,
    },
    Lint {
        command: String,
        diagnostics: ConditionPattern,
    },
    Artifact {
        name: String,
        path: String,
    },
    Release {
        command: String,
        token_env: String,
        published: ConditionPattern,
    },
    Command {
        command: String,
    },
}

impl StageKind {
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Build { .. } => "build",
            StageKind::Lint { .. } => "lint",
            StageKind::Artifact { .. } => "artifact",
            StageKind::Release { .. } => "release",
            StageKind::Command { .. } => "command",
        }
    }

    /// Command template, if the stage runs one
    pub fn command(&self) -> Option<&str> {
        match self {
            StageKind::Build { command }
            | StageKind::Lint { command, .. }
            | StageKind::Release { command, .. }
            | StageKind::Command { command } => Some(command),
            StageKind::Artifact { .. } => None,
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, StageKind::Release { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StageDefaults {
    pub timeout_secs: Option<u64>,
}

impl Stage {
    /// Create a stage from a validated stage config
    pub fn from_config(config: &StageConfig, defaults: &StageDefaults) -> Self {
        let command = config.run.clone().unwrap_or_default();

        let kind = match config.kind {
            StageKindConfig::Build => StageKind::Build { command },
            StageKindConfig::Command => StageKind::Command { command },
            StageKindConfig::Lint => {
                let diagnostics = match &config.diagnostic_pattern {
                    Some(pattern) => ConditionPattern::new(pattern, config.use_regex)
                        .unwrap_or_else(|_| ConditionPattern::Simple(pattern.clone())),
                    None => ConditionPattern::diagnostics(),
                };
                StageKind::Lint { command, diagnostics }
            }
            StageKindConfig::Artifact => {
                let (name, path) = config
                    .artifact
                    .as_ref()
                    .map(|a| (a.name.clone(), a.path.clone()))
                    .unwrap_or_default();
                StageKind::Artifact { name, path }
            }
            StageKindConfig::Release => {
                let published = match &config.published_pattern {
                    Some(pattern) => ConditionPattern::new(pattern, true)
                        .unwrap_or_else(|_| ConditionPattern::Simple(pattern.clone())),
                    None => ConditionPattern::published_release(),
                };
                StageKind::Release {
                    command,
                    token_env: config.effective_token_env().to_string(),
                    published,
                }
            }
        };

        Stage {
            id: config.id.clone(),
            name: config.name.clone(),
            kind,
            events: config.effective_events(),
            timeout_secs: config.timeout_secs.or(defaults.timeout_secs),
            working_dir: config.working_dir.clone(),
            state: StageState::Pending,
        }
    }

    /// Whether the stage is enabled for an event kind
    pub fn runs_on(&self, event: EventKind) -> bool {
        self.events.contains(&event)
    }

    /// Render the stage command with variable substitution
    pub fn render_command(&self, variables: &HashMap<String, String>) -> Option<String> {
        self.kind
            .command()
            .map(|template| render_template(template, variables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PipelineConfig;

    fn stages(yaml: &str) -> Vec<Stage> {
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        let defaults = StageDefaults {
            timeout_secs: config.default_timeout_secs,
        };
        config
            .stages
            .iter()
            .map(|s| Stage::from_config(s, &defaults))
            .collect()
    }

    #[test]
    fn test_render_command() {
        let stage = Stage {
            id: "build".to_string(),
            name: "Build".to_string(),
            kind: StageKind::Build {
                command: "cargo build --release --target {{ target }}".to_string(),
            },
            events: EventKind::ALL.to_vec(),
            timeout_secs: None,
            working_dir: None,
            state: StageState::Pending,
        };

        let mut vars = HashMap::new();
        vars.insert("target".to_string(), "x86_64-unknown-linux-musl".to_string());

        assert_eq!(
            stage.render_command(&vars).unwrap(),
            "cargo build --release --target x86_64-unknown-linux-musl"
        );
    }

    #[test]
    fn test_from_config_kinds() {
        let stages = stages(
            r#"
name: "Test"
on:
  push:
default_timeout_secs: 600
stages:
  - { id: lint, name: Lint, kind: lint, run: "cargo clippy", timeout_secs: 30 }
  - { id: upload, name: Upload, kind: artifact, artifact: { name: bot, path: target/bot } }
  - { id: release, name: Release, kind: release, run: "npx semantic-release", token_env: GH_TOKEN }
"#,
        );

        assert_eq!(stages[0].kind.label(), "lint");
        assert_eq!(stages[0].timeout_secs, Some(30));
        assert!(matches!(
            &stages[0].kind,
            StageKind::Lint { diagnostics: ConditionPattern::Regex(_), .. }
        ));

        assert_eq!(stages[1].timeout_secs, Some(600));
        assert!(stages[1].kind.command().is_none());
        assert!(matches!(
            &stages[1].kind,
            StageKind::Artifact { name, path } if name == "bot" && path == "target/bot"
        ));

        assert!(stages[2].kind.is_release());
        assert!(!stages[2].runs_on(EventKind::PullRequest));
        assert!(stages[2].runs_on(EventKind::Push));
        assert!(matches!(
            &stages[2].kind,
            StageKind::Release { token_env, .. } if token_env == "GH_TOKEN"
        ));
    }

    #[test]
    fn test_custom_simple_diagnostic_pattern() {
        let stages = stages(
            r#"
name: "Test"
on:
  push:
stages:
  - { id: lint, name: Lint, kind: lint, run: "eslint .", diagnostic_pattern: "problem" }
"#,
        );

        match &stages[0].kind {
            StageKind::Lint { diagnostics, .. } => {
                assert!(diagnostics.matches("1 problem (1 error, 0 warnings)"));
                assert!(matches!(diagnostics, ConditionPattern::Simple(_)));
            }
            other => panic!("Expected lint stage, got {:?}", other),
        }
    }
}
