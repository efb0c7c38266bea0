//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    context::PipelineContext,
    secrets::Secrets,
    stage::{Stage, StageDefaults},
    state::{ExecutionStatus, PipelineState, StageState},
    trigger::{TriggerConfig, TriggerEvent},
};
use std::collections::HashMap;

/// A pipeline definition together with the state of one run
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Global variables available to all stages
    pub variables: HashMap<String, String>,

    /// Environment set for every stage command
    pub env: HashMap<String, String>,

    /// Events that start a run
    pub triggers: TriggerConfig,

    /// Names of variables withheld from every stage but the release stage
    pub secret_names: Vec<String>,

    /// Resolved secret values
    pub secrets: Secrets,

    /// Pipeline stages
    pub stages: HashMap<String, Stage>,

    /// Execution state
    pub state: PipelineState,

    /// The event this run was started by
    pub event: Option<TriggerEvent>,

    /// Declared stage order
    execution_order: Vec<String>,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let defaults = StageDefaults {
            timeout_secs: config.default_timeout_secs,
        };

        let execution_order = config.stages.iter().map(|s| s.id.clone()).collect();

        let stages: HashMap<String, Stage> = config
            .stages
            .iter()
            .map(|stage_config| {
                let stage = Stage::from_config(stage_config, &defaults);
                (stage.id.clone(), stage)
            })
            .collect();

        Pipeline {
            name: config.name.clone(),
            variables: config.variables_as_string_map(),
            env: config.env_as_string_map(),
            triggers: config.triggers.clone(),
            secret_names: config.secret_names(),
            secrets: Secrets::new(),
            stages,
            state: PipelineState::new(),
            event: None,
            execution_order,
        }
    }

    /// Get a stage by ID
    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.get(id)
    }

    /// Get a mutable stage by ID
    pub fn stage_mut(&mut self, id: &str) -> Option<&mut Stage> {
        self.stages.get_mut(id)
    }

    /// Stage ids in declared order
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Stages in declared order
    pub fn stages_in_order(&self) -> impl Iterator<Item = &Stage> {
        self.execution_order.iter().filter_map(|id| self.stages.get(id))
    }

    /// Resolve secret values, usually from the process environment
    pub fn load_secrets<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.secrets = Secrets::from_lookup(&self.secret_names, lookup);
    }

    /// Check if every stage reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.stages.values().all(|s| s.state.is_terminal())
    }

    /// Check if pipeline has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }

    /// First stage (in declared order) that failed
    pub fn failed_stage_id(&self) -> Option<&str> {
        self.stages_in_order()
            .find(|s| matches!(s.state, StageState::Failed { .. }))
            .map(|s| s.id.as_str())
    }

    /// Create execution context for a stage
    pub fn create_context_for_stage(&self, stage_id: &str) -> PipelineContext {
        let mut context = PipelineContext::new();

        // Add global variables
        context.variables.extend(self.variables.clone());

        context.set_variable(
            "execution_id".to_string(),
            self.state.execution_id.to_string(),
        );
        if let Some(event) = &self.event {
            context.set_variable("event".to_string(), event.kind().to_string());
            if let Some(branch) = event.branch() {
                context.set_variable("branch".to_string(), branch.to_string());
            }
        }

        // Add outputs from previous stages
        for (id, stage) in &self.stages {
            if let StageState::Completed { output, .. } = &stage.state {
                context.set_stage_output(id, output.clone());
            }
        }

        context.current_stage_id = Some(stage_id.to_string());

        context
    }
}
