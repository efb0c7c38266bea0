//! Core domain models for the release pipeline
//!
//! This module defines the pipeline definition, its stages, trigger rules
//! and the state of a run.

pub mod condition;
pub mod config;
pub mod context;
pub mod pipeline;
pub mod plan;
pub mod secrets;
pub mod stage;
pub mod state;
pub mod trigger;

pub use context::*;
pub use pipeline::*;
pub use plan::*;
pub use stage::*;
pub use state::*;
pub use trigger::{EventKind, TriggerConfig, TriggerEvent};
