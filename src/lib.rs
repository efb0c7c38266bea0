//! release-pipeline - a CI pipeline runner with trigger rules, fail-fast
//! stages, artifact publishing and release automation

pub mod artifact;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod runner;

// Re-export commonly used types
pub use artifact::{ArtifactError, ArtifactStore, LocalArtifactStore};
pub use core::{
    ExecutionStatus, Pipeline, PipelineContext, RunPlan, Stage, StageState, TriggerEvent,
};
pub use execution::{EngineError, ExecutionEngine, ExecutionEvent, StageError};
pub use runner::{CommandRunner, Invocation, RunnerConfig, RunnerError, ShellRunner};
