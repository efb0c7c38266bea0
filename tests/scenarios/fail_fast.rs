//! The first failing stage stops the run

use crate::helpers::*;
use release_pipeline::core::{ExecutionStatus, StageState};

#[tokio::test]
async fn test_build_failure_skips_everything_after_it() {
    let runner = ScriptedRunner::new().on(
        "cargo build",
        101,
        ["error[E0425]: cannot find value `guild_id` in this scope"],
    );
    let mut harness = Harness::bot(runner).with_binary().with_token();

    let status = harness.run(push("main")).await;

    assert_eq!(status, Some(ExecutionStatus::Failed));
    match harness.state("build") {
        StageState::Failed { error, output, .. } => {
            assert!(error.contains("exited with code 101"));
            assert!(output.contains("guild_id"));
        }
        other => panic!("build should fail, got {:?}", other),
    }
    for stage in ["lint", "artifact", "release"] {
        assert_eq!(
            skip_reason(harness.state(stage)),
            Some("not run: stage 'build' failed")
        );
    }
    assert_eq!(harness.runner().commands().len(), 1);
    assert!(harness.pipeline.state.artifacts.is_empty());
    assert!(!harness.artifact_root().exists());
}

#[tokio::test]
async fn test_lint_warning_fails_even_when_clippy_exits_cleanly() {
    let runner = ScriptedRunner::new().on(
        "cargo clippy",
        0,
        [
            "    Checking revanced-discord-bot v2.6.0",
            "warning: this `if` has identical blocks",
            "    Finished dev [unoptimized + debuginfo] target(s)",
        ],
    );
    let mut harness = Harness::bot(runner).with_binary().with_token();

    let status = harness.run(push("main")).await;

    assert_eq!(status, Some(ExecutionStatus::Failed));
    match harness.state("lint") {
        StageState::Failed { error, .. } => assert!(error.contains("identical blocks")),
        other => panic!("lint should fail, got {:?}", other),
    }
    assert!(is_completed(harness.state("build")));
    assert_eq!(
        skip_reason(harness.state("artifact")),
        Some("not run: stage 'lint' failed")
    );
    assert!(harness.runner().invocation_for("semantic-release").is_none());
    assert!(harness.pipeline.state.artifacts.is_empty());
}

#[tokio::test]
async fn test_missing_binary_fails_artifact_and_blocks_release() {
    let mut harness = Harness::bot(ScriptedRunner::new()).with_token();

    let status = harness.run(push("main")).await;

    assert_eq!(status, Some(ExecutionStatus::Failed));
    match harness.state("artifact") {
        StageState::Failed { error, .. } => assert!(error.contains("revanced-discord-bot")),
        other => panic!("artifact should fail, got {:?}", other),
    }
    assert_eq!(
        skip_reason(harness.state("release")),
        Some("not run: stage 'artifact' failed")
    );
    assert!(harness.runner().invocation_for("semantic-release").is_none());
}

#[tokio::test]
async fn test_release_failure_keeps_earlier_results() {
    let runner = ScriptedRunner::new().on(
        "semantic-release",
        1,
        ["[semantic-release] › ✘  EGITNOPERMISSION Cannot push to the Git repository."],
    );
    let mut harness = Harness::bot(runner).with_binary().with_token();

    let status = harness.run(push("main")).await;

    assert_eq!(status, Some(ExecutionStatus::Failed));
    assert!(is_completed(harness.state("build")));
    assert!(is_completed(harness.state("lint")));
    assert!(is_completed(harness.state("artifact")));
    assert!(matches!(harness.state("release"), StageState::Failed { .. }));
    assert_eq!(harness.pipeline.state.artifacts.len(), 1);
    assert!(harness.pipeline.state.release.is_none());
    assert_eq!(harness.pipeline.state.failed_stages, 1);
    assert_eq!(harness.pipeline.state.completed_stages, 3);
}
