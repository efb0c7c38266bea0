//! Stage executor - runs individual stages through the command runner

use crate::{
    artifact::{ArtifactError, ArtifactStore},
    core::{
        context::render_template, condition::ConditionPattern, Pipeline, PipelineContext,
        PublishedArtifact, ReleaseOutcome, Stage, StageKind,
    },
    runner::{CommandOutput, CommandRunner, Invocation, OutputSink, RunnerError},
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Lines of output kept in a command failure
const FAILURE_TAIL_LINES: usize = 20;

/// Why a stage failed
#[derive(Debug, Error)]
pub enum StageError {
    #[error("`{command}` {}", describe_exit(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        tail: String,
    },

    #[error("{count} lint diagnostic(s), first: {first}")]
    Diagnostics { count: usize, first: String },

    #[error("Release token ${0} is not set")]
    MissingToken(String),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

/// Result of executing a stage
#[derive(Debug)]
pub enum ExecutionResult {
    /// Stage completed successfully
    Success {
        output: String,
        artifact: Option<PublishedArtifact>,
        release: Option<ReleaseOutcome>,
    },
    /// Stage failed; the run stops here
    Failed { error: StageError, output: String },
}

impl ExecutionResult {
    fn completed(output: String) -> Self {
        ExecutionResult::Success {
            output,
            artifact: None,
            release: None,
        }
    }

    fn failed(error: StageError, output: String) -> Self {
        ExecutionResult::Failed { error, output }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }
}

/// Executes a single stage
pub struct StageExecutor<R> {
    runner: R,
    artifacts: Arc<dyn ArtifactStore>,
}

impl<R: CommandRunner> StageExecutor<R> {
    pub fn new(runner: R, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { runner, artifacts }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Execute a stage and return the result
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        stage: &Stage,
        context: &PipelineContext,
        sink: Option<&dyn OutputSink>,
    ) -> ExecutionResult {
        info!("Executing {} stage: {}", stage.kind.label(), stage.id);
        let variables = context.get_rendering_variables();

        match &stage.kind {
            StageKind::Build { .. } | StageKind::Command { .. } => {
                self.execute_command(pipeline, stage, &variables, sink).await
            }
            StageKind::Lint { diagnostics, .. } => {
                self.execute_lint(pipeline, stage, diagnostics, &variables, sink)
                    .await
            }
            StageKind::Artifact { name, path } => {
                self.execute_artifact(pipeline, stage, name, path, &variables)
                    .await
            }
            StageKind::Release {
                token_env,
                published,
                ..
            } => {
                self.execute_release(pipeline, stage, token_env, published, &variables, sink)
                    .await
            }
        }
    }

    async fn execute_command(
        &self,
        pipeline: &Pipeline,
        stage: &Stage,
        variables: &HashMap<String, String>,
        sink: Option<&dyn OutputSink>,
    ) -> ExecutionResult {
        let invocation = self.invocation(pipeline, stage, variables);
        let output = match self.run(stage, &invocation, sink).await {
            Ok(output) => output,
            Err(e) => return ExecutionResult::failed(e, String::new()),
        };

        if !output.success() {
            return command_failed(stage, invocation, output);
        }

        info!("Stage {} completed successfully", stage.id);
        ExecutionResult::completed(output.text())
    }

    async fn execute_lint(
        &self,
        pipeline: &Pipeline,
        stage: &Stage,
        diagnostics: &ConditionPattern,
        variables: &HashMap<String, String>,
        sink: Option<&dyn OutputSink>,
    ) -> ExecutionResult {
        let invocation = self.invocation(pipeline, stage, variables);
        let output = match self.run(stage, &invocation, sink).await {
            Ok(output) => output,
            Err(e) => return ExecutionResult::failed(e, String::new()),
        };

        // Any diagnostic fails the stage, even when the linter exits 0
        let found: Vec<String> = output
            .lines
            .iter()
            .map(|line| plain_text(&line.text))
            .filter(|text| diagnostics.matches(text))
            .collect();

        if let Some(first) = found.first() {
            warn!(
                "Stage {} reported {} diagnostic(s) matching {}",
                stage.id,
                found.len(),
                diagnostics.display()
            );
            let error = StageError::Diagnostics {
                count: found.len(),
                first: first.trim().to_string(),
            };
            return ExecutionResult::failed(error, output.text());
        }

        if !output.success() {
            return command_failed(stage, invocation, output);
        }

        info!("Stage {} found no diagnostics", stage.id);
        ExecutionResult::completed(output.text())
    }

    async fn execute_artifact(
        &self,
        pipeline: &Pipeline,
        stage: &Stage,
        name: &str,
        path: &str,
        variables: &HashMap<String, String>,
    ) -> ExecutionResult {
        let name = render_template(name, variables);
        let mut source = PathBuf::from(render_template(path, variables));
        if source.is_relative() {
            if let Some(dir) = &stage.working_dir {
                source = PathBuf::from(dir).join(source);
            }
        }

        debug!(
            "Stage {} publishing {} as {}",
            stage.id,
            source.display(),
            name
        );

        match self
            .artifacts
            .publish(pipeline.state.execution_id, &name, &source)
            .await
        {
            Ok(artifact) => ExecutionResult::Success {
                output: artifact.path.display().to_string(),
                artifact: Some(artifact),
                release: None,
            },
            Err(e) => {
                error!("Stage {} could not publish {}: {}", stage.id, name, e);
                ExecutionResult::failed(e.into(), String::new())
            }
        }
    }

    async fn execute_release(
        &self,
        pipeline: &Pipeline,
        stage: &Stage,
        token_env: &str,
        published: &ConditionPattern,
        variables: &HashMap<String, String>,
        sink: Option<&dyn OutputSink>,
    ) -> ExecutionResult {
        let Some(token) = pipeline.secrets.get(token_env) else {
            error!("Stage {} needs ${} but it is not set", stage.id, token_env);
            return ExecutionResult::failed(
                StageError::MissingToken(token_env.to_string()),
                String::new(),
            );
        };

        let invocation = self
            .invocation(pipeline, stage, variables)
            .with_env(token_env, token);
        let output = match self.run(stage, &invocation, sink).await {
            Ok(output) => output,
            Err(e) => return ExecutionResult::failed(e, String::new()),
        };

        if !output.success() {
            return command_failed(stage, invocation, output);
        }

        let outcome = release_outcome(&output, published);
        match outcome.version() {
            Some(version) => info!("Stage {} published version {}", stage.id, version),
            None if outcome == ReleaseOutcome::NoRelease => {
                info!("Stage {} finished without a new release", stage.id)
            }
            None => info!("Stage {} published a release", stage.id),
        }

        ExecutionResult::Success {
            output: output.text(),
            artifact: None,
            release: Some(outcome),
        }
    }

    async fn run(
        &self,
        stage: &Stage,
        invocation: &Invocation,
        sink: Option<&dyn OutputSink>,
    ) -> Result<CommandOutput, StageError> {
        debug!("Stage {} command: {}", stage.id, invocation.command);
        self.runner.run(invocation, sink).await.map_err(|e| {
            error!("Runner error for stage {}: {}", stage.id, e);
            StageError::from(e)
        })
    }

    /// Build the invocation for a command stage
    ///
    /// Pipeline env is applied to every stage. Secrets are stripped from
    /// everything except the release stage, which adds its token itself.
    fn invocation(
        &self,
        pipeline: &Pipeline,
        stage: &Stage,
        variables: &HashMap<String, String>,
    ) -> Invocation {
        let command = stage.render_command(variables).unwrap_or_default();
        let mut invocation = Invocation::new(command);

        for (key, value) in &pipeline.env {
            invocation = invocation.with_env(key, value);
        }

        if !stage.kind.is_release() {
            for name in &pipeline.secret_names {
                invocation.env.remove(name);
                invocation = invocation.without_env(name);
            }
        }

        if let Some(dir) = &stage.working_dir {
            invocation = invocation.in_dir(dir);
        }
        if let Some(secs) = stage.timeout_secs {
            invocation = invocation.with_timeout(Duration::from_secs(secs));
        }

        invocation
    }
}

fn command_failed(stage: &Stage, invocation: Invocation, output: CommandOutput) -> ExecutionResult {
    error!(
        "Stage {} failed: `{}` {}",
        stage.id,
        invocation.command,
        describe_exit(&output.exit_code)
    );
    let error = StageError::CommandFailed {
        command: invocation.command,
        exit_code: output.exit_code,
        tail: output.tail(FAILURE_TAIL_LINES),
    };
    ExecutionResult::failed(error, output.text())
}

/// Output text with terminal color codes removed (`CARGO_TERM_COLOR=always`)
fn plain_text(text: &str) -> String {
    console::strip_ansi_codes(text).into_owned()
}

/// Read the release tool's verdict from its output
fn release_outcome(output: &CommandOutput, published: &ConditionPattern) -> ReleaseOutcome {
    output
        .lines
        .iter()
        .map(|line| plain_text(&line.text))
        .find(|text| published.matches(text))
        .map(|text| ReleaseOutcome::Published {
            version: published.capture(&text),
        })
        .unwrap_or(ReleaseOutcome::NoRelease)
}
