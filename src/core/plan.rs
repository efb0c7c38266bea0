//! Run plan - which stages an event runs

use crate::core::{trigger::TriggerEvent, Pipeline};
use serde::Serialize;

/// Whether a stage runs for the resolved event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StageDecision {
    Run,
    Skip { reason: String },
}

/// A stage and its decision
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStage {
    pub stage_id: String,
    pub name: String,
    pub kind: &'static str,
    pub decision: StageDecision,
}

/// Stages to run for one triggering event, in declared order
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub event: TriggerEvent,
    pub stages: Vec<PlannedStage>,
}

impl RunPlan {
    /// Resolve the plan for an event
    ///
    /// Returns `None` when the pipeline's triggers do not accept the event.
    pub fn resolve(pipeline: &Pipeline, event: &TriggerEvent) -> Option<Self> {
        if !pipeline.triggers.accepts(event) {
            return None;
        }

        let kind = event.kind();
        let stages = pipeline
            .stages_in_order()
            .map(|stage| {
                let decision = if stage.kind.is_release() && event.is_pull_request() {
                    StageDecision::Skip {
                        reason: "release stages never run for pull requests".to_string(),
                    }
                } else if !stage.runs_on(kind) {
                    StageDecision::Skip {
                        reason: format!("not enabled for {} events", kind),
                    }
                } else {
                    StageDecision::Run
                };

                PlannedStage {
                    stage_id: stage.id.clone(),
                    name: stage.name.clone(),
                    kind: stage.kind.label(),
                    decision,
                }
            })
            .collect();

        Some(RunPlan {
            event: event.clone(),
            stages,
        })
    }

    pub fn decision(&self, stage_id: &str) -> Option<&StageDecision> {
        self.stages
            .iter()
            .find(|s| s.stage_id == stage_id)
            .map(|s| &s.decision)
    }

    pub fn runs(&self, stage_id: &str) -> bool {
        self.decision(stage_id) == Some(&StageDecision::Run)
    }

    /// Stages that will run
    pub fn scheduled(&self) -> impl Iterator<Item = &PlannedStage> {
        self.stages
            .iter()
            .filter(|s| s.decision == StageDecision::Run)
    }
}
