//! CLI output formatting

use crate::{
    core::{ExecutionStatus, PlannedStage, ReleaseOutcome, StageDecision, StageState},
    execution::ExecutionEvent,
    persistence::ExecutionSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "# ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

const DEFAULT_WIDTH: usize = 80;
const MAX_WIDTH: usize = 100;

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Horizontal rule sized to the terminal
pub fn separator() -> String {
    let width = term_size::dimensions()
        .map(|(w, _)| w)
        .unwrap_or(DEFAULT_WIDTH)
        .min(MAX_WIDTH);
    style("─".repeat(width)).dim().to_string()
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a stage state for display
pub fn format_stage_state(state: &StageState) -> String {
    match state {
        StageState::Pending => style("PENDING").dim().to_string(),
        StageState::Running { .. } => style("RUNNING").yellow().to_string(),
        StageState::Completed { .. } => style("COMPLETED").green().to_string(),
        StageState::Failed { .. } => style("FAILED").red().to_string(),
        StageState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format one line of a run plan
pub fn format_decision(stage: &PlannedStage) -> String {
    match &stage.decision {
        StageDecision::Run => format!(
            "{} {} {}",
            CHECK,
            style(&stage.stage_id).cyan(),
            style(format!("({})", stage.kind)).dim()
        ),
        StageDecision::Skip { reason } => format!(
            "{} {} {}",
            SKIP,
            style(&stage.stage_id).dim(),
            style(reason).dim()
        ),
    }
}

/// Format a release outcome
pub fn format_release(outcome: &ReleaseOutcome) -> String {
    match outcome {
        ReleaseOutcome::Published { version: Some(v) } => {
            format!("published {}", style(format!("v{}", v)).green().bold())
        }
        ReleaseOutcome::Published { version: None } => style("published").green().to_string(),
        ReleaseOutcome::NoRelease => style("no new release").dim().to_string(),
    }
}

/// Format execution summary for display
pub fn format_execution_summary(summary: &ExecutionSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::Pending => INFO,
    };

    let mut line = format!(
        "{} {} - {} - {} ({}/{}) - {}",
        status_icon,
        style(short_id(&summary.execution_id)).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.completed_stages,
        summary.total_stages,
        style(summary.trigger.as_deref().unwrap_or("unknown trigger")).dim()
    );
    if let Some(version) = &summary.released_version {
        line.push_str(&format!(" - {}", style(format!("v{}", version)).green()));
    }
    line
}

/// Format an execution event for display
///
/// Returns `None` for live output lines, which the caller prints only when
/// streaming.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let text = match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            trigger,
        } => format!(
            "{} Starting pipeline {} for {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(trigger).cyan(),
            style(short_id(execution_id)).dim()
        ),
        ExecutionEvent::StageStarted { stage_id, kind } => format!(
            "{} {} {}",
            SPINNER,
            style(stage_id).cyan(),
            style(format!("({})", kind)).dim()
        ),
        ExecutionEvent::StageLine { .. } | ExecutionEvent::StageOutput { .. } => return None,
        ExecutionEvent::StageCompleted { stage_id } => {
            format!("{} {}", CHECK, style(stage_id).green())
        }
        ExecutionEvent::StageFailed { stage_id, error } => {
            format!("{} {}: {}", CROSS, style(stage_id).red(), style(error).dim())
        }
        ExecutionEvent::StageSkipped { stage_id, reason } => {
            format!("{} {} {}", SKIP, style(stage_id).dim(), style(reason).dim())
        }
        ExecutionEvent::ArtifactPublished { artifact, .. } => format!(
            "{} {} ({} bytes) → {}",
            PACKAGE,
            style(&artifact.name).bold(),
            artifact.size_bytes,
            style(artifact.path.display()).dim()
        ),
        ExecutionEvent::ReleaseFinished { stage_id, outcome } => format!(
            "{} {} {}",
            ROCKET,
            style(stage_id).cyan(),
            format_release(outcome)
        ),
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => format!("{} completed", style("successfully").green()),
                ExecutionStatus::Failed => style("failed").red().to_string(),
                other => format_status(*other),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(short_id(execution_id)).dim(),
                status_str
            )
        }
    };
    Some(text)
}

/// Format stage output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

/// Format a duration as `1h 2m 3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
