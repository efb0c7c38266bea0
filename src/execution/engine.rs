//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    artifact::ArtifactStore,
    core::{
        ExecutionStatus, Pipeline, PublishedArtifact, ReleaseOutcome, RunPlan, StageDecision,
        StageState,
    },
    execution::{ExecutionResult, ExecutionScheduler, StageExecutor},
    runner::{CommandRunner, OutputLine, OutputSink},
};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        trigger: String,
    },
    StageStarted {
        stage_id: String,
        kind: &'static str,
    },
    /// A line of live command output
    StageLine {
        stage_id: String,
        line: OutputLine,
    },
    StageOutput {
        stage_id: String,
        output: String,
    },
    StageCompleted {
        stage_id: String,
    },
    StageFailed {
        stage_id: String,
        error: String,
    },
    StageSkipped {
        stage_id: String,
        reason: String,
    },
    ArtifactPublished {
        stage_id: String,
        artifact: PublishedArtifact,
    },
    ReleaseFinished {
        stage_id: String,
        outcome: ReleaseOutcome,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

type Handlers = Mutex<Vec<EventHandler>>;

/// Error types for the engine itself; stage failures are not errors here
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Run plan does not match pipeline: {0}")]
    PlanMismatch(String),

    #[error("Pipeline run {0} has already been executed")]
    AlreadyExecuted(Uuid),
}

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    scheduler: ExecutionScheduler,
    executor: StageExecutor<R>,
    event_handlers: Handlers,
}

impl<R: CommandRunner> ExecutionEngine<R> {
    pub fn new(runner: R, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            scheduler: ExecutionScheduler::new(),
            executor: StageExecutor::new(runner, artifacts),
            event_handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn runner(&self) -> &R {
        self.executor.runner()
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        emit(&self.event_handlers, event);
    }

    /// Execute the pipeline for a resolved plan
    ///
    /// Stages run one at a time in declared order. The first failure stops
    /// the run and every remaining stage is skipped. Returns the final status;
    /// stage failures are reported through it rather than as `Err`.
    pub async fn execute(
        &self,
        pipeline: &mut Pipeline,
        plan: &RunPlan,
    ) -> Result<ExecutionStatus, EngineError> {
        let execution_id = pipeline.state.execution_id;
        if pipeline.state.status != ExecutionStatus::Pending {
            return Err(EngineError::AlreadyExecuted(execution_id));
        }
        check_plan(pipeline, plan)?;

        let trigger = plan.event.to_string();
        info!(
            "Starting pipeline execution: {} ({}) for {}",
            pipeline.name, execution_id, trigger
        );

        pipeline.event = Some(plan.event.clone());
        pipeline.state.start(pipeline.stages.len(), trigger.clone());
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            trigger,
        });

        for planned in &plan.stages {
            if let StageDecision::Skip { reason } = &planned.decision {
                self.mark_stage_skipped(pipeline, &planned.stage_id, reason.clone());
            }
        }
        update_state_counts(pipeline);

        let mut release_ran = false;
        while let Some(stage_id) = self.scheduler.next_stage(pipeline) {
            if let Some(failed) = pipeline.failed_stage_id().map(str::to_string) {
                let reason = format!("not run: stage '{}' failed", failed);
                self.mark_stage_skipped(pipeline, &stage_id, reason);
            } else if release_ran && pipeline.stage(&stage_id).is_some_and(|s| s.kind.is_release())
            {
                warn!("Stage {} skipped, a release already ran in this run", stage_id);
                self.mark_stage_skipped(
                    pipeline,
                    &stage_id,
                    "a release already ran in this run".to_string(),
                );
            } else {
                release_ran |= self.execute_stage(pipeline, &stage_id).await;
            }
            update_state_counts(pipeline);
        }

        let status = if pipeline.failed_stage_id().is_some() {
            pipeline.state.fail();
            ExecutionStatus::Failed
        } else {
            pipeline.state.complete();
            ExecutionStatus::Completed
        };

        info!(
            "Pipeline execution finished: {} - {:?}",
            pipeline.name, status
        );
        self.emit_event(ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        });

        Ok(status)
    }

    /// Execute a single stage; returns whether it was a release stage
    async fn execute_stage(&self, pipeline: &mut Pipeline, stage_id: &str) -> bool {
        let Some(stage) = pipeline.stage(stage_id).cloned() else {
            return false;
        };

        let started_at = chrono::Utc::now();
        if let Some(s) = pipeline.stage_mut(stage_id) {
            s.state = StageState::Running { started_at };
        }
        self.emit_event(ExecutionEvent::StageStarted {
            stage_id: stage_id.to_string(),
            kind: stage.kind.label(),
        });

        let context = pipeline.create_context_for_stage(stage_id);
        let sink = StageSink {
            stage_id,
            handlers: &self.event_handlers,
        };
        let result = self
            .executor
            .execute(pipeline, &stage, &context, Some(&sink))
            .await;

        match result {
            ExecutionResult::Success {
                output,
                artifact,
                release,
            } => {
                if !output.is_empty() {
                    self.emit_event(ExecutionEvent::StageOutput {
                        stage_id: stage_id.to_string(),
                        output: output.clone(),
                    });
                }
                if let Some(artifact) = artifact {
                    pipeline.state.artifacts.push(artifact.clone());
                    self.emit_event(ExecutionEvent::ArtifactPublished {
                        stage_id: stage_id.to_string(),
                        artifact,
                    });
                }
                if let Some(outcome) = release {
                    pipeline.state.release = Some(outcome.clone());
                    self.emit_event(ExecutionEvent::ReleaseFinished {
                        stage_id: stage_id.to_string(),
                        outcome,
                    });
                }
                if let Some(s) = pipeline.stage_mut(stage_id) {
                    s.state = StageState::Completed {
                        output,
                        started_at,
                        completed_at: chrono::Utc::now(),
                    };
                }
                self.emit_event(ExecutionEvent::StageCompleted {
                    stage_id: stage_id.to_string(),
                });
            }
            ExecutionResult::Failed { error, output } => {
                let error = error.to_string();
                error!("Stage {} failed: {}", stage_id, error);
                if let Some(s) = pipeline.stage_mut(stage_id) {
                    s.state = StageState::Failed {
                        error: error.clone(),
                        output,
                        started_at,
                        failed_at: chrono::Utc::now(),
                    };
                }
                self.emit_event(ExecutionEvent::StageFailed {
                    stage_id: stage_id.to_string(),
                    error,
                });
            }
        }

        stage.kind.is_release()
    }

    fn mark_stage_skipped(&self, pipeline: &mut Pipeline, stage_id: &str, reason: String) {
        if let Some(stage) = pipeline.stage_mut(stage_id) {
            info!("Skipping stage {}: {}", stage_id, reason);
            stage.state = StageState::Skipped {
                reason: reason.clone(),
            };
            self.emit_event(ExecutionEvent::StageSkipped {
                stage_id: stage_id.to_string(),
                reason,
            });
        }
    }
}

/// Handlers run without the lock held, so one may register another
fn emit(handlers: &Handlers, event: ExecutionEvent) {
    let handlers: Vec<EventHandler> = handlers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    for handler in &handlers {
        handler(event.clone());
    }
}

/// The plan must cover exactly the pipeline's stages
fn check_plan(pipeline: &Pipeline, plan: &RunPlan) -> Result<(), EngineError> {
    if let Some(unknown) = plan
        .stages
        .iter()
        .find(|planned| pipeline.stage(&planned.stage_id).is_none())
    {
        return Err(EngineError::PlanMismatch(format!(
            "unknown stage '{}'",
            unknown.stage_id
        )));
    }
    if let Some(missing) = pipeline
        .execution_order()
        .iter()
        .find(|id| plan.decision(id).is_none())
    {
        return Err(EngineError::PlanMismatch(format!(
            "stage '{}' has no decision",
            missing
        )));
    }
    Ok(())
}

/// Update pipeline state counts
fn update_state_counts(pipeline: &mut Pipeline) {
    let mut completed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for stage in pipeline.stages.values() {
        match &stage.state {
            StageState::Completed { .. } => completed += 1,
            StageState::Failed { .. } => failed += 1,
            StageState::Skipped { .. } => skipped += 1,
            _ => {}
        }
    }

    pipeline.state.update_counts(completed, failed, skipped);
}

/// Forwards live command output as `StageLine` events
struct StageSink<'a> {
    stage_id: &'a str,
    handlers: &'a Handlers,
}

impl OutputSink for StageSink<'_> {
    fn on_line(&self, line: &OutputLine) {
        emit(
            self.handlers,
            ExecutionEvent::StageLine {
                stage_id: self.stage_id.to_string(),
                line: line.clone(),
            },
        );
    }
}
