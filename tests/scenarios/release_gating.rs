//! Release runs only outside pull requests, only after every check passed,
//! and only with a token

use crate::helpers::*;
use release_pipeline::core::config::PipelineConfig;
use release_pipeline::core::{ExecutionStatus, ReleaseOutcome, StageState};
use release_pipeline::execution::ExecutionEvent;

fn release_finished(harness: &Harness) -> Vec<ReleaseOutcome> {
    harness
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ExecutionEvent::ReleaseFinished { outcome, .. } => Some(outcome),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_pull_request_never_releases_even_with_a_token() {
    let runner = ScriptedRunner::new().on(
        "semantic-release",
        0,
        semantic_release_published("9.9.9"),
    );
    let mut harness = Harness::bot(runner).with_binary().with_token();

    let status = harness.run(pull_request("renovate/tokio", "main")).await;

    assert_eq!(status, Some(ExecutionStatus::Completed));
    assert_eq!(
        skip_reason(harness.state("release")),
        Some("release stages never run for pull requests")
    );
    assert!(harness.runner().invocation_for("semantic-release").is_none());
    assert!(harness.pipeline.state.release.is_none());
    assert!(release_finished(&harness).is_empty());
}

#[tokio::test]
async fn test_push_publishes_the_next_version() {
    let runner = ScriptedRunner::new().on(
        "semantic-release",
        0,
        semantic_release_published("2.5.0"),
    );
    let mut harness = Harness::bot(runner).with_binary().with_token();

    harness.run(push("main")).await;

    let expected = ReleaseOutcome::Published {
        version: Some("2.5.0".to_string()),
    };
    assert_eq!(harness.pipeline.state.release, Some(expected.clone()));
    assert_eq!(release_finished(&harness), vec![expected]);
}

#[tokio::test]
async fn test_prerelease_version_from_dev() {
    let runner = ScriptedRunner::new().on(
        "semantic-release",
        0,
        semantic_release_published("2.5.0-dev.3"),
    );
    let mut harness = Harness::bot(runner).with_binary().with_token();

    harness.run(push("dev")).await;

    let release = harness.pipeline.state.release.as_ref().unwrap();
    assert_eq!(release.version(), Some("2.5.0-dev.3"));
}

#[tokio::test]
async fn test_nothing_to_release_still_succeeds() {
    let runner = ScriptedRunner::new().on(
        "semantic-release",
        0,
        ["[semantic-release] › ℹ  There are no relevant changes, so no new version is released."],
    );
    let mut harness = Harness::bot(runner).with_binary().with_token();

    let status = harness.run(push("main")).await;

    assert_eq!(status, Some(ExecutionStatus::Completed));
    assert_eq!(harness.pipeline.state.release, Some(ReleaseOutcome::NoRelease));
}

#[tokio::test]
async fn test_missing_token_fails_without_running_the_tool() {
    let mut harness = Harness::bot(ScriptedRunner::new()).with_binary();

    let status = harness.run(push("main")).await;

    assert_eq!(status, Some(ExecutionStatus::Failed));
    match harness.state("release") {
        StageState::Failed { error, .. } => {
            assert_eq!(error, "Release token $GITHUB_TOKEN is not set")
        }
        other => panic!("release should fail, got {:?}", other),
    }
    assert!(harness.runner().invocation_for("semantic-release").is_none());
    assert!(release_finished(&harness).is_empty());
}

#[tokio::test]
async fn test_missing_token_does_not_matter_for_pull_requests() {
    let mut harness = Harness::bot(ScriptedRunner::new()).with_binary();

    let status = harness.run(pull_request("docs", "dev")).await;

    assert_eq!(status, Some(ExecutionStatus::Completed));
}

#[tokio::test]
async fn test_at_most_one_release_per_run() {
    let yaml = format!(
        "{}\n  - id: release-again\n    name: \"Second release\"\n    kind: release\n    run: \"npx semantic-release --branches dev\"\n",
        bot_pipeline_yaml().trim_end()
    );
    let runner = ScriptedRunner::new().on(
        "semantic-release",
        0,
        semantic_release_published("3.0.0"),
    );
    // Loading rejects a second release stage, so bypass validation
    let config: PipelineConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(config.validate().is_err());
    let mut harness = Harness::new(&config, runner).with_binary().with_token();

    let status = harness.run(push("main")).await;

    assert_eq!(status, Some(ExecutionStatus::Completed));
    assert_eq!(release_finished(&harness).len(), 1);
    assert_eq!(
        harness
            .runner()
            .commands()
            .iter()
            .filter(|c| c.contains("semantic-release"))
            .count(),
        1
    );
    assert_eq!(
        skip_reason(harness.state("release-again")),
        Some("a release already ran in this run")
    );
}
