//! Artifact publishing - keeps build outputs retrievable after a run

use crate::core::PublishedArtifact;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Error types for artifact operations
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact source not found: {}", .0.display())]
    MissingSource(PathBuf),

    #[error("Invalid artifact name '{0}'")]
    InvalidName(String),

    #[error("Failed to publish artifact '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Trait for artifact storage backends
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Publish `source` under `name` for the given run, replacing any earlier copy
    async fn publish(
        &self,
        run_id: Uuid,
        name: &str,
        source: &Path,
    ) -> Result<PublishedArtifact, ArtifactError>;

    /// List artifacts published for a run
    async fn list(&self, run_id: Uuid) -> Result<Vec<PublishedArtifact>, ArtifactError>;
}

/// Stores artifacts as files under `<root>/<run_id>/<name>`
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create store with default path
    pub fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        let root = data_dir.join("release-pipeline").join("artifacts");
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create artifact directory {}", root.display()))?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.root.join(run_id.to_string())
    }
}

fn validate_name(name: &str) -> Result<(), ArtifactError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if invalid {
        return Err(ArtifactError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn publish(
        &self,
        run_id: Uuid,
        name: &str,
        source: &Path,
    ) -> Result<PublishedArtifact, ArtifactError> {
        validate_name(name)?;

        let is_file = tokio::fs::metadata(source)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(ArtifactError::MissingSource(source.to_path_buf()));
        }

        let io_err = |source| ArtifactError::Io {
            name: name.to_string(),
            source,
        };

        let dir = self.run_dir(run_id);
        tokio::fs::create_dir_all(&dir).await.map_err(io_err)?;

        let destination = dir.join(name);
        let size_bytes = tokio::fs::copy(source, &destination)
            .await
            .map_err(io_err)?;

        info!(
            "Published artifact {} ({} bytes) to {}",
            name,
            size_bytes,
            destination.display()
        );

        Ok(PublishedArtifact {
            name: name.to_string(),
            run_id,
            path: destination,
            size_bytes,
            published_at: Utc::now(),
        })
    }

    async fn list(&self, run_id: Uuid) -> Result<Vec<PublishedArtifact>, ArtifactError> {
        let dir = self.run_dir(run_id);
        let io_err = |source| ArtifactError::Io {
            name: run_id.to_string(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No artifacts for run {}", run_id);
                return Ok(Vec::new());
            }
            Err(e) => return Err(io_err(e)),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let metadata = entry.metadata().await.map_err(io_err)?;
            if !metadata.is_file() {
                continue;
            }
            let published_at = metadata
                .modified()
                .map(chrono::DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            artifacts.push(PublishedArtifact {
                name: entry.file_name().to_string_lossy().to_string(),
                run_id,
                path: entry.path(),
                size_bytes: metadata.len(),
                published_at,
            });
        }

        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(artifacts)
    }
}
