//! Execution scheduler - determines which stage runs next

use crate::core::{Pipeline, StageState};

/// Picks stages one at a time in declared order
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionScheduler;

impl ExecutionScheduler {
    pub fn new() -> Self {
        Self
    }

    /// First pending stage in declared order
    pub fn next_stage(&self, pipeline: &Pipeline) -> Option<String> {
        pipeline
            .stages_in_order()
            .find(|stage| matches!(stage.state, StageState::Pending))
            .map(|stage| stage.id.clone())
    }
}
