//! Pipeline configuration from YAML

use crate::core::{
    condition::ConditionPattern,
    trigger::{EventKind, TriggerConfig},
    Pipeline,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Environment variable the release token is read from when none is configured
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Events that start a run
    #[serde(rename = "on")]
    pub triggers: TriggerConfig,

    /// Environment set for every stage command
    #[serde(default)]
    env: HashMap<String, Value>,

    /// Variables available to `{{ name }}` placeholders
    #[serde(default)]
    variables: HashMap<String, Value>,

    /// Extra environment variables to treat as secrets
    #[serde(default)]
    pub secrets: Vec<String>,

    /// Pipeline stages, executed in declared order
    pub stages: Vec<StageConfig>,

    /// Default timeout for stages (in seconds); no timeout when unset
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
}

/// Kind of work a stage performs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageKindConfig {
    /// Compile the release binary
    Build,
    /// Static analysis with zero tolerance for diagnostics
    Lint,
    /// Publish a file as a run artifact
    Artifact,
    /// Run the external release tool
    Release,
    /// Any other command
    Command,
}

/// Stage configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Unique stage identifier
    pub id: String,

    /// Human-readable stage name
    pub name: String,

    /// Optional stage description
    #[serde(default)]
    pub description: Option<String>,

    pub kind: StageKindConfig,

    /// Shell command (every kind except artifact)
    #[serde(default)]
    pub run: Option<String>,

    /// File to publish (artifact stages)
    #[serde(default)]
    pub artifact: Option<ArtifactConfig>,

    /// Environment variable holding the release token (release stages)
    #[serde(default)]
    pub token_env: Option<String>,

    /// Pattern identifying a diagnostic line (lint stages)
    #[serde(default)]
    pub diagnostic_pattern: Option<String>,

    /// Whether `diagnostic_pattern` is a regex
    #[serde(default)]
    pub use_regex: bool,

    /// Regex whose first group is the published version (release stages)
    #[serde(default)]
    pub published_pattern: Option<String>,

    /// Events this stage runs for (defaults depend on the kind)
    #[serde(default, rename = "on")]
    pub events: Option<Vec<EventKind>>,

    /// Timeout for this stage (overrides global)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Directory the command runs in
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// Artifact published by an artifact stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Deterministic artifact name
    pub name: String,

    /// Path of the file to publish
    pub path: String,
}

impl StageConfig {
    /// Events the stage is enabled for
    ///
    /// Release stages default to every event except pull requests.
    pub fn effective_events(&self) -> Vec<EventKind> {
        match &self.events {
            Some(events) => events.clone(),
            None if self.kind == StageKindConfig::Release => {
                vec![EventKind::Push, EventKind::WorkflowDispatch]
            }
            None => EventKind::ALL.to_vec(),
        }
    }

    pub fn effective_token_env(&self) -> &str {
        self.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV)
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.triggers.is_empty() {
            anyhow::bail!("Pipeline '{}' declares no triggers under 'on'", self.name);
        }

        if self.stages.is_empty() {
            anyhow::bail!("Pipeline '{}' has no stages", self.name);
        }

        let mut seen_ids = HashSet::new();
        for stage in &self.stages {
            if !seen_ids.insert(&stage.id) {
                anyhow::bail!("Duplicate stage ID: {}", stage.id);
            }
        }

        let release_stages: Vec<_> = self
            .stages
            .iter()
            .filter(|s| s.kind == StageKindConfig::Release)
            .map(|s| s.id.as_str())
            .collect();
        if release_stages.len() > 1 {
            anyhow::bail!(
                "Only one release stage is allowed per pipeline, found: {}",
                release_stages.join(", ")
            );
        }

        for stage in &self.stages {
            self.validate_stage(stage)?;
        }

        Ok(())
    }

    fn validate_stage(&self, stage: &StageConfig) -> Result<()> {
        match stage.kind {
            StageKindConfig::Artifact => {
                let Some(artifact) = &stage.artifact else {
                    anyhow::bail!("Artifact stage '{}' has no 'artifact' section", stage.id);
                };
                if artifact.name.trim().is_empty() || artifact.path.trim().is_empty() {
                    anyhow::bail!(
                        "Artifact stage '{}' needs a non-empty name and path",
                        stage.id
                    );
                }
            }
            _ => {
                if stage.run.as_deref().map_or(true, |r| r.trim().is_empty()) {
                    anyhow::bail!("Stage '{}' has no 'run' command", stage.id);
                }
            }
        }

        if let Some(events) = &stage.events {
            if events.is_empty() {
                anyhow::bail!("Stage '{}' is enabled for no events", stage.id);
            }
        }

        if stage.kind == StageKindConfig::Release {
            if stage.effective_events().contains(&EventKind::PullRequest) {
                anyhow::bail!(
                    "Release stage '{}' cannot run for pull_request events",
                    stage.id
                );
            }
            if stage.effective_token_env().trim().is_empty() {
                anyhow::bail!("Release stage '{}' has an empty token_env", stage.id);
            }
            if let Some(pattern) = &stage.published_pattern {
                if let Err(e) = ConditionPattern::new(pattern, true) {
                    anyhow::bail!(
                        "Release stage '{}' has an invalid published_pattern: {}",
                        stage.id,
                        e
                    );
                }
            }
        }

        if stage.kind == StageKindConfig::Lint {
            if let Some(pattern) = &stage.diagnostic_pattern {
                if let Err(e) = ConditionPattern::new(pattern, stage.use_regex) {
                    anyhow::bail!(
                        "Lint stage '{}' has an invalid diagnostic_pattern: {}",
                        stage.id,
                        e
                    );
                }
            }
        }

        Ok(())
    }

    /// Get variables as a string map
    pub fn variables_as_string_map(&self) -> HashMap<String, String> {
        scalar_map(&self.variables)
    }

    /// Get the stage environment as a string map
    pub fn env_as_string_map(&self) -> HashMap<String, String> {
        scalar_map(&self.env)
    }

    /// Names of every environment variable handled as a secret
    pub fn secret_names(&self) -> Vec<String> {
        let mut names = self.secrets.clone();
        for stage in &self.stages {
            if stage.kind == StageKindConfig::Release {
                let token_env = stage.effective_token_env().to_string();
                if !names.contains(&token_env) {
                    names.push(token_env);
                }
            }
        }
        names
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Pipeline {
        Pipeline::from_config(self)
    }
}

fn scalar_map(values: &HashMap<String, Value>) -> HashMap<String, String> {
    values
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Null => String::new(),
                // Fallback: convert to string
                other => serde_yaml::to_string(other)
                    .unwrap_or_default()
                    .trim_end()
                    .to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}
