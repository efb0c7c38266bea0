//! The release token only reaches the release command

use crate::helpers::*;

#[tokio::test]
async fn test_token_is_withheld_from_build_and_lint() {
    let mut harness = Harness::bot(ScriptedRunner::new())
        .with_binary()
        .with_token();

    harness.run(push("main")).await;

    for pattern in ["cargo build", "cargo clippy"] {
        let invocation = harness.runner().invocation_for(pattern).unwrap();
        assert!(!invocation.env.contains_key("GITHUB_TOKEN"), "{}", pattern);
        assert!(
            invocation.env_remove.iter().any(|name| name == "GITHUB_TOKEN"),
            "{} should clear an inherited token",
            pattern
        );
    }

    let release = harness.runner().invocation_for("semantic-release").unwrap();
    assert_eq!(
        release.env.get("GITHUB_TOKEN").map(String::as_str),
        Some(TOKEN)
    );
}

#[tokio::test]
async fn test_pipeline_env_reaches_every_command() {
    let mut harness = Harness::bot(ScriptedRunner::new())
        .with_binary()
        .with_token();

    harness.run(push("main")).await;

    let invocations = harness.runner().invocations();
    assert_eq!(invocations.len(), 3);
    for invocation in invocations {
        assert_eq!(
            invocation.env.get("CARGO_TERM_COLOR").map(String::as_str),
            Some("always")
        );
        assert_eq!(
            invocation.working_dir.as_deref(),
            Some(harness.workspace.path())
        );
    }
}

#[tokio::test]
async fn test_token_value_never_shows_in_debug_output() {
    let harness = Harness::bot(ScriptedRunner::new()).with_token();

    let debug = format!("{:?}", harness.pipeline);
    assert!(!debug.contains(TOKEN));
    assert_eq!(harness.pipeline.secrets.get("GITHUB_TOKEN"), Some(TOKEN));
}
