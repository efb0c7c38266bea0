//! Test harness for scenario tests

use async_trait::async_trait;
use release_pipeline::artifact::LocalArtifactStore;
use release_pipeline::core::{
    config::PipelineConfig, ExecutionStatus, Pipeline, RunPlan, StageState, TriggerEvent,
};
use release_pipeline::execution::{ExecutionEngine, ExecutionEvent};
use release_pipeline::runner::{
    CommandOutput, CommandRunner, Invocation, OutputLine, OutputSink, RunnerError,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const BINARY_PATH: &str = "target/x86_64-unknown-linux-musl/release/revanced-discord-bot";
pub const TOKEN: &str = "ghp_scenario_token";

/// The pipeline shipped in `pipelines/`
pub fn bot_pipeline_yaml() -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("pipelines/revanced-discord-bot.yml");
    std::fs::read_to_string(path).unwrap()
}

struct Rule {
    pattern: &'static str,
    exit_code: i32,
    lines: Vec<OutputLine>,
}

/// Runner that answers commands by substring match; unmatched commands succeed silently
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` exit with `exit_code` after printing `lines` to stderr
    pub fn on<I, S>(mut self, pattern: &'static str, exit_code: i32, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push(Rule {
            pattern,
            exit_code,
            lines: lines.into_iter().map(OutputLine::stderr).collect(),
        });
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|i| i.command)
            .collect()
    }

    pub fn invocation_for(&self, pattern: &str) -> Option<Invocation> {
        self.invocations()
            .into_iter()
            .find(|i| i.command.contains(pattern))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        sink: Option<&dyn OutputSink>,
    ) -> Result<CommandOutput, RunnerError> {
        self.invocations.lock().unwrap().push(invocation.clone());

        let (exit_code, lines) = self
            .rules
            .iter()
            .find(|rule| invocation.command.contains(rule.pattern))
            .map(|rule| (rule.exit_code, rule.lines.clone()))
            .unwrap_or((0, Vec::new()));

        if let Some(sink) = sink {
            for line in &lines {
                sink.on_line(line);
            }
        }
        Ok(CommandOutput::new(Some(exit_code), lines))
    }
}

/// A pipeline, an engine and a scratch workspace for one run
pub struct Harness {
    pub pipeline: Pipeline,
    pub engine: ExecutionEngine<ScriptedRunner>,
    pub workspace: TempDir,
    pub events: Arc<Mutex<Vec<ExecutionEvent>>>,
}

impl Harness {
    pub fn new(config: &PipelineConfig, runner: ScriptedRunner) -> Self {
        let workspace = tempfile::tempdir().unwrap();
        let mut pipeline = config.to_pipeline();
        let dir = workspace.path().display().to_string();
        for stage in pipeline.stages.values_mut() {
            stage.working_dir = Some(dir.clone());
        }

        let store = LocalArtifactStore::new(workspace.path().join("artifacts"));
        let engine = ExecutionEngine::new(runner, Arc::new(store));

        let events = Arc::new(Mutex::new(Vec::new()));
        let recorded = events.clone();
        engine.add_event_handler(move |event| recorded.lock().unwrap().push(event));

        Self {
            pipeline,
            engine,
            workspace,
            events,
        }
    }

    /// The shipped bot pipeline
    pub fn bot(runner: ScriptedRunner) -> Self {
        let config = PipelineConfig::from_yaml(&bot_pipeline_yaml()).unwrap();
        Self::new(&config, runner)
    }

    /// Place the compiled binary where the artifact stage expects it
    pub fn with_binary(self) -> Self {
        let path = self.workspace.path().join(BINARY_PATH);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"\x7fELF revanced-discord-bot").unwrap();
        self
    }

    pub fn with_token(mut self) -> Self {
        self.pipeline
            .load_secrets(|name| (name == "GITHUB_TOKEN").then(|| TOKEN.to_string()));
        self
    }

    /// Resolve the plan and execute it; `None` when the event does not trigger the pipeline
    pub async fn run(&mut self, event: TriggerEvent) -> Option<ExecutionStatus> {
        let plan = RunPlan::resolve(&self.pipeline, &event)?;
        Some(self.engine.execute(&mut self.pipeline, &plan).await.unwrap())
    }

    pub fn runner(&self) -> &ScriptedRunner {
        self.engine.runner()
    }

    pub fn state(&self, stage_id: &str) -> &StageState {
        &self.pipeline.stage(stage_id).unwrap().state
    }

    pub fn artifact_root(&self) -> PathBuf {
        self.workspace.path().join("artifacts")
    }

    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().unwrap().clone()
    }
}

pub fn push(branch: &str) -> TriggerEvent {
    TriggerEvent::Push {
        branch: branch.to_string(),
    }
}

pub fn pull_request(head: &str, base: &str) -> TriggerEvent {
    TriggerEvent::PullRequest {
        base: base.to_string(),
        head: Some(head.to_string()),
    }
}

pub fn dispatch() -> TriggerEvent {
    TriggerEvent::WorkflowDispatch { branch: None }
}

pub fn is_completed(state: &StageState) -> bool {
    matches!(state, StageState::Completed { .. })
}

pub fn skip_reason(state: &StageState) -> Option<&str> {
    match state {
        StageState::Skipped { reason } => Some(reason),
        _ => None,
    }
}

/// What semantic-release prints when it publishes `version`
pub fn semantic_release_published(version: &str) -> Vec<String> {
    vec![
        "[semantic-release] › ℹ  Running semantic-release version 22.0.0".to_string(),
        format!("[semantic-release] › ✔  Published release {} on default channel", version),
    ]
}
