use anyhow::{Context, Result};
use release_pipeline::{
    artifact::{ArtifactStore, LocalArtifactStore},
    cli::{
        commands::{
            HistoryCommand, ListCommand, PlanCommand, RunCommand, TriggerArgs, ValidateCommand,
        },
        output::*,
        Cli, Command,
    },
    core::{config::PipelineConfig, trigger::TriggerError, ExecutionStatus, RunPlan, TriggerEvent},
    execution::{ExecutionEngine, ExecutionEvent},
    persistence::{create_summary, ExecutionSummary, InMemoryPersistence, PersistenceBackend},
    runner::{RunnerConfig, ShellRunner},
};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; --verbose wins over RUST_LOG
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, cli.stream).await?,
        Command::Plan(cmd) => show_plan(cmd)?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

/// Persistent history store, or an in-memory one when SQLite is compiled out
async fn history_store() -> Result<Arc<dyn PersistenceBackend>> {
    #[cfg(feature = "sqlite")]
    {
        let store = release_pipeline::persistence::SqliteExecutionStore::with_default_path()
            .await
            .context("Failed to open execution history")?;
        return Ok(Arc::new(store));
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Ok(Arc::new(InMemoryPersistence::new()))
    }
}

fn load_config(file: &str) -> Result<PipelineConfig> {
    PipelineConfig::from_file(file)
        .with_context(|| format!("Failed to load pipeline config {}", file))
}

fn print_not_triggered(name: &str, event: &TriggerEvent) {
    println!(
        "{} {} is not triggered by {}; nothing to do",
        INFO,
        style(name).bold(),
        style(event).cyan()
    );
}

fn print_tag_push(name: &str, tag: &str) {
    println!(
        "{} {} is not triggered by tag {}; nothing to do",
        INFO,
        style(name).bold(),
        style(tag).cyan()
    );
}

/// The triggering event, or the pushed tag when the event is a tag push
fn trigger_event(trigger: &TriggerArgs) -> Result<std::result::Result<TriggerEvent, String>> {
    match trigger.to_event() {
        Ok(event) => Ok(Ok(event)),
        Err(e) => match e.downcast_ref::<TriggerError>() {
            Some(TriggerError::TagPush(tag)) => Ok(Err(tag.clone())),
            _ => Err(e),
        },
    }
}

async fn run_pipeline(cmd: &RunCommand, stream: bool) -> Result<()> {
    let config = load_config(&cmd.file)?;
    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let mut pipeline = config.to_pipeline();

    // Apply variable overrides
    for (key, value) in &cmd.variable {
        pipeline.variables.insert(key.clone(), value.clone());
        println!(
            "{} Variable override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }
    pipeline.load_secrets(|name| std::env::var(name).ok());

    let event = match trigger_event(&cmd.trigger)? {
        Ok(event) => event,
        Err(tag) => {
            print_tag_push(&pipeline.name, &tag);
            return Ok(());
        }
    };
    let Some(plan) = RunPlan::resolve(&pipeline, &event) else {
        print_not_triggered(&pipeline.name, &event);
        return Ok(());
    };

    println!("{}", separator());
    for planned in &plan.stages {
        println!("  {}", format_decision(planned));
    }
    println!("{}", separator());

    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        history_store().await?
    };

    let artifacts: Arc<dyn ArtifactStore> = match &cmd.artifacts_dir {
        Some(dir) => Arc::new(LocalArtifactStore::new(dir)),
        None => Arc::new(LocalArtifactStore::with_default_path()?),
    };

    let engine = ExecutionEngine::new(ShellRunner::new(RunnerConfig::new()), artifacts);

    // Progress bar over the stages that will run; messages print above it
    let progress = create_progress_bar(plan.scheduled().count());
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        match &event {
            ExecutionEvent::StageLine { line, .. } if stream => {
                bar.println(format!("  {} {}", style("│").dim(), line.text));
            }
            ExecutionEvent::StageStarted { stage_id, .. } => bar.set_message(stage_id.clone()),
            ExecutionEvent::StageCompleted { .. } | ExecutionEvent::StageFailed { .. } => {
                bar.inc(1)
            }
            ExecutionEvent::StageOutput { output, .. } if !stream => {
                bar.println(format_output(output, 5));
            }
            _ => {}
        }
        if let Some(text) = format_execution_event(&event) {
            bar.println(text);
        }
    });

    let status = engine.execute(&mut pipeline, &plan).await?;
    progress.finish_and_clear();

    if !cmd.no_history {
        let summary = create_summary(&pipeline);
        store.save_execution(&summary).await?;
        println!(
            "\n{} Execution saved to history (ID: {})",
            INFO,
            style(&summary.execution_id.to_string()[..8]).dim()
        );
    }

    for artifact in &pipeline.state.artifacts {
        println!(
            "{} Artifact {} at {}",
            PACKAGE,
            style(&artifact.name).bold(),
            style(artifact.path.display()).dim()
        );
    }
    if let Some(outcome) = &pipeline.state.release {
        println!("{} Release: {}", ROCKET, format_release(outcome));
    }

    // Print final status
    if status == ExecutionStatus::Completed {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(&pipeline.name).bold(),
            style("successfully").green()
        );
    } else {
        println!(
            "\n{} {} {}",
            CROSS,
            style(&pipeline.name).bold(),
            style("failed").red()
        );
        if let Some(stage_id) = pipeline.failed_stage_id() {
            error!("Stage {} failed; remaining stages were skipped", stage_id);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn show_plan(cmd: &PlanCommand) -> Result<()> {
    let config = load_config(&cmd.file)?;
    let pipeline = config.to_pipeline();
    let event = match trigger_event(&cmd.trigger)? {
        Ok(event) => event,
        Err(tag) => {
            if cmd.json {
                let data = serde_json::json!({
                    "pipeline": pipeline.name,
                    "triggered": false,
                    "plan": null,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                print_tag_push(&pipeline.name, &tag);
            }
            return Ok(());
        }
    };

    let plan = RunPlan::resolve(&pipeline, &event);
    if cmd.json {
        let data = serde_json::json!({
            "pipeline": pipeline.name,
            "triggered": plan.is_some(),
            "plan": plan,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    match plan {
        Some(plan) => {
            println!(
                "{} {} for {}:",
                INFO,
                style(&pipeline.name).bold(),
                style(&plan.event).cyan()
            );
            for planned in &plan.stages {
                println!("  {}", format_decision(planned));
            }
        }
        None => print_not_triggered(&pipeline.name, &event),
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            let triggers: Vec<_> = config
                .triggers
                .enabled_kinds()
                .iter()
                .map(|k| k.to_string())
                .collect();
            println!("  Triggers: {}", style(triggers.join(", ")).cyan());
            println!("  Stages: {}", style(config.stages.len()).cyan());
            for stage in &config.stages {
                let events: Vec<_> = stage
                    .effective_events()
                    .iter()
                    .map(|k| k.to_string())
                    .collect();
                println!(
                    "    {} {} [{}]",
                    style(&stage.id).bold(),
                    style(format!("({:?})", stage.kind).to_lowercase()).dim(),
                    events.join(", ")
                );
            }
            println!(
                "  Secrets: {}",
                style(config.secret_names().join(", ")).cyan()
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = history_store().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    let mut json_data = Vec::new();
    if !cmd.json {
        println!("{} Pipelines in history:", INFO);
    }

    for pipeline_name in &pipelines {
        let executions = store.list_executions(pipeline_name).await?;
        let completed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count();
        let failed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Failed)
            .count();

        if cmd.json {
            json_data.push(serde_json::json!({
                "name": pipeline_name,
                "execution_count": executions.len(),
                "completed": completed,
                "failed": failed,
            }));
        } else if cmd.with_counts {
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(executions.len()).cyan(),
                style(completed).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    if cmd.json {
        let data = serde_json::json!({ "pipelines": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = history_store().await?;

    // If specific execution ID is requested
    if let Some(exec_id_str) = &cmd.execution_id {
        let exec_id =
            uuid::Uuid::parse_str(exec_id_str).context("Invalid execution ID format")?;

        match store.load_execution(exec_id).await? {
            Some(summary) => print_execution_details(&summary, cmd.verbose)?,
            None => println!("{} Execution not found", WARN),
        }
        return Ok(());
    }

    let mut executions = if let Some(pipeline_name) = &cmd.pipeline {
        store.list_executions(pipeline_name).await?
    } else {
        let mut all_execs = Vec::new();
        for pipeline in store.list_pipelines().await? {
            all_execs.extend(store.list_executions(&pipeline).await?);
        }
        all_execs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_execs
    };
    executions.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "executions": executions });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    println!("{} Execution history (showing latest {}):", INFO, cmd.limit);
    for summary in &executions {
        println!("  {}", format_execution_summary(summary));
    }

    Ok(())
}

fn print_execution_details(summary: &ExecutionSummary, verbose: bool) -> Result<()> {
    println!("{} Execution Details", INFO);
    println!("  ID: {}", style(summary.execution_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    if let Some(trigger) = &summary.trigger {
        println!("  Trigger: {}", style(trigger).cyan());
    }
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Stages: {} completed, {} failed, {} skipped of {}",
        style(summary.completed_stages).green(),
        style(summary.failed_stages).red(),
        style(summary.skipped_stages).dim(),
        summary.total_stages
    );
    if let Some(version) = &summary.released_version {
        println!("  Released: {}", style(format!("v{}", version)).green());
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}
