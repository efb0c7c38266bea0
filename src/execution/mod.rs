//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{EngineError, EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{ExecutionResult, StageError, StageExecutor};
pub use scheduler::ExecutionScheduler;
