//! The compiled binary is published under the run's id

use crate::helpers::*;
use release_pipeline::artifact::{ArtifactStore, LocalArtifactStore};
use release_pipeline::execution::ExecutionEvent;

#[tokio::test]
async fn test_binary_is_copied_into_the_run_directory() {
    let mut harness = Harness::bot(ScriptedRunner::new()).with_binary();
    let run_id = harness.pipeline.state.execution_id;

    harness.run(pull_request("feature/logging", "main")).await;

    let artifacts = &harness.pipeline.state.artifacts;
    assert_eq!(artifacts.len(), 1);
    let artifact = &artifacts[0];
    assert_eq!(artifact.name, "revanced-discord-bot");
    assert_eq!(artifact.run_id, run_id);

    let expected = harness
        .artifact_root()
        .join(run_id.to_string())
        .join("revanced-discord-bot");
    assert_eq!(artifact.path, expected);
    assert_eq!(
        std::fs::read(&expected).unwrap(),
        std::fs::read(harness.workspace.path().join(BINARY_PATH)).unwrap()
    );
    assert_eq!(artifact.size_bytes, std::fs::metadata(&expected).unwrap().len());

    assert!(harness.events().iter().any(|event| matches!(
        event,
        ExecutionEvent::ArtifactPublished { stage_id, .. } if stage_id == "artifact"
    )));
}

#[tokio::test]
async fn test_store_lists_what_the_run_published() {
    let mut harness = Harness::bot(ScriptedRunner::new()).with_binary();
    let run_id = harness.pipeline.state.execution_id;

    harness.run(pull_request("feature/logging", "main")).await;

    let store = LocalArtifactStore::new(harness.artifact_root());
    let listed = store.list(run_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "revanced-discord-bot");
    assert!(store.list(uuid::Uuid::new_v4()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_variable_override_renames_the_artifact() {
    let mut harness = Harness::bot(ScriptedRunner::new());
    harness
        .pipeline
        .variables
        .insert("binary".to_string(), "bot-canary".to_string());
    let source = harness
        .workspace
        .path()
        .join("target/x86_64-unknown-linux-musl/release/bot-canary");
    std::fs::create_dir_all(source.parent().unwrap()).unwrap();
    std::fs::write(&source, b"canary").unwrap();

    harness.run(pull_request("canary", "dev")).await;

    let artifacts = &harness.pipeline.state.artifacts;
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].name, "bot-canary");
    assert_eq!(artifacts[0].size_bytes, 6);
}
