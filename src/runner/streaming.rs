//! Streaming support for command execution
//!
//! [`ShellRunner`](crate::runner::ShellRunner) reads stdout and stderr line by
//! line while the command runs. Each line is handed to an [`OutputSink`] as
//! soon as it arrives, which is how the CLI shows live build output.
//!
//! # Example
//!
//! ```no_run
//! use release_pipeline::runner::{CommandRunner, Invocation, OutputLine, OutputSink, RunnerConfig, ShellRunner};
//!
//! struct LivePrinter;
//!
//! impl OutputSink for LivePrinter {
//!     fn on_line(&self, line: &OutputLine) {
//!         println!("{}", line.text);
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = ShellRunner::new(RunnerConfig::default());
//! let output = runner.run(&Invocation::new("cargo build"), Some(&LivePrinter)).await?;
//! println!("exit code: {:?}", output.exit_code);
//! # Ok(())
//! # }
//! ```

use crate::runner::OutputLine;

/// Receives output lines as they arrive
///
/// This trait is object-safe and can be used as `&dyn OutputSink`.
pub trait OutputSink: Send + Sync {
    fn on_line(&self, line: &OutputLine);
}
