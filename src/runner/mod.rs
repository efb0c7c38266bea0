//! External command execution
//!
//! Stages talk to the toolchain, the linter and the release tool through
//! [`CommandRunner`], so the engine can be driven by a real shell or by a
//! scripted runner in tests.

pub mod config;
pub mod invocation;
pub mod shell;
pub mod streaming;

use async_trait::async_trait;
pub use config::RunnerConfig;
pub use invocation::{CommandOutput, Invocation, OutputLine, OutputStream, RunnerError};
pub use shell::ShellRunner;
pub use streaming::OutputSink;

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, forwarding each output line to `sink`
    async fn run(
        &self,
        invocation: &Invocation,
        sink: Option<&dyn OutputSink>,
    ) -> Result<CommandOutput, RunnerError>;
}
