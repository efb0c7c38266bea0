//! Which events start a run, and which stages they schedule

use crate::helpers::*;
use release_pipeline::core::{ExecutionStatus, RunPlan};

const ALL_STAGES: [&str; 4] = ["build", "lint", "artifact", "release"];

#[tokio::test]
async fn test_push_to_main_runs_every_stage() {
    let runner = ScriptedRunner::new().on(
        "semantic-release",
        0,
        semantic_release_published("2.4.0"),
    );
    let mut harness = Harness::bot(runner).with_binary().with_token();

    let status = harness.run(push("main")).await;

    assert_eq!(status, Some(ExecutionStatus::Completed));
    for stage in ALL_STAGES {
        assert!(is_completed(harness.state(stage)), "{} should complete", stage);
    }
    assert_eq!(
        harness.runner().commands(),
        vec![
            "cargo build --release --target x86_64-unknown-linux-musl",
            "cargo clippy --target x86_64-unknown-linux-musl -- -D warnings",
            "npx semantic-release",
        ]
    );
}

#[tokio::test]
async fn test_push_to_dev_is_accepted() {
    let mut harness = Harness::bot(ScriptedRunner::new())
        .with_binary()
        .with_token();

    assert_eq!(
        harness.run(push("dev")).await,
        Some(ExecutionStatus::Completed)
    );
    assert_eq!(harness.pipeline.state.completed_stages, 4);
}

#[tokio::test]
async fn test_push_to_feature_branch_does_not_start_a_run() {
    let mut harness = Harness::bot(ScriptedRunner::new());

    assert_eq!(harness.run(push("feature/slash-commands")).await, None);
    assert!(harness.runner().commands().is_empty());
    assert!(harness.events().is_empty());
    assert_eq!(harness.pipeline.state.status, ExecutionStatus::Pending);
}

#[tokio::test]
async fn test_pull_request_into_any_branch_runs_checks() {
    for base in ["main", "dev", "feature/moderation"] {
        let mut harness = Harness::bot(ScriptedRunner::new()).with_binary();

        let status = harness.run(pull_request("fix/typo", base)).await;

        assert_eq!(status, Some(ExecutionStatus::Completed), "base {}", base);
        assert!(is_completed(harness.state("build")));
        assert!(is_completed(harness.state("lint")));
        assert!(is_completed(harness.state("artifact")));
        assert!(skip_reason(harness.state("release")).is_some());
    }
}

#[tokio::test]
async fn test_manual_dispatch_runs_every_stage() {
    let mut harness = Harness::bot(ScriptedRunner::new())
        .with_binary()
        .with_token();

    assert_eq!(
        harness.run(dispatch()).await,
        Some(ExecutionStatus::Completed)
    );
    assert!(harness
        .runner()
        .commands()
        .iter()
        .any(|c| c == "npx semantic-release"));
}

#[test]
fn test_plans_for_each_event() {
    let harness = Harness::bot(ScriptedRunner::new());
    let pipeline = &harness.pipeline;

    let main = RunPlan::resolve(pipeline, &push("main")).unwrap();
    assert!(ALL_STAGES.iter().all(|id| main.runs(id)));

    let pr = RunPlan::resolve(pipeline, &pull_request("bump-deps", "main")).unwrap();
    assert!(pr.runs("build") && pr.runs("lint") && pr.runs("artifact"));
    assert!(!pr.runs("release"));

    assert!(RunPlan::resolve(pipeline, &push("release/1.x")).is_none());
}
