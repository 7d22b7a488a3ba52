//! Batch review orchestrator: prompt resolution, sequential generation,
//! and per-target artifacts.

pub mod plan;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::cache::{PromptAssetCache, PromptAssetError};
use crate::models::{GenerateRequest, ReviewFailure, ReviewOutcome, ReviewTarget};
use crate::providers::ModelBackend;

pub use plan::{PromptPlan, plan_targets};

/// Errors that abort a whole batch.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    PromptAsset(#[from] PromptAssetError),

    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write review artifact {path}: {source}")]
    WriteArtifact {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Aggregate result of a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Targets with a model response written.
    pub reviewed: usize,
    /// Targets with a failure document written.
    pub failed: usize,
    /// Every artifact written, in target order.
    pub artifacts: Vec<PathBuf>,
}

impl BatchOutcome {
    pub fn any_failure(&self) -> bool {
        self.failed > 0
    }

    /// Fold another batch into this one.
    pub fn absorb(&mut self, other: BatchOutcome) {
        self.reviewed += other.reviewed;
        self.failed += other.failed;
        self.artifacts.extend(other.artifacts);
    }
}

/// Reviews targets one at a time against a model backend.
pub struct BatchReviewOrchestrator {
    backend: Arc<dyn ModelBackend>,
    cache: PromptAssetCache,
    model: String,
}

impl BatchReviewOrchestrator {
    pub fn new(backend: Arc<dyn ModelBackend>, cache: PromptAssetCache, model: impl Into<String>) -> Self {
        Self {
            backend,
            cache,
            model: model.into(),
        }
    }

    /// Review every target and write exactly one artifact per target.
    ///
    /// Per-target problems (missing source, unreadable file, remote error)
    /// become failure documents. Prompt asset errors abort the batch.
    pub async fn run(
        &mut self,
        targets: &[ReviewTarget],
        output_dir: &Path,
    ) -> Result<BatchOutcome, OrchestratorError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| OrchestratorError::OutputDir {
                path: output_dir.to_path_buf(),
                source,
            })?;

        tracing::info!(count = targets.len(), "processing review targets");
        let mut outcome = BatchOutcome::default();

        for target in targets {
            tracing::info!(
                source = %target.source.display(),
                artifact = %target.artifact.display(),
                "reviewing"
            );

            let result = self.review_target(target).await?;
            if let Some(parent) = target.artifact.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| OrchestratorError::OutputDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
            tokio::fs::write(&target.artifact, result.document())
                .await
                .map_err(|source| OrchestratorError::WriteArtifact {
                    path: target.artifact.clone(),
                    source,
                })?;

            match result {
                ReviewOutcome::Reviewed(_) => outcome.reviewed += 1,
                ReviewOutcome::Failed(_) => outcome.failed += 1,
            }
            outcome.artifacts.push(target.artifact.clone());
        }

        tracing::info!(
            reviewed = outcome.reviewed,
            failed = outcome.failed,
            "batch complete: {}/{} files reviewed",
            outcome.reviewed,
            targets.len()
        );
        Ok(outcome)
    }

    async fn review_target(&mut self, target: &ReviewTarget) -> Result<ReviewOutcome, PromptAssetError> {
        let source = &target.source;
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            tracing::warn!(source = %source.display(), "file does not exist");
            return Ok(ReviewOutcome::Failed(ReviewFailure::new(format!(
                "File not found: {}",
                source.display()
            ))));
        }

        let mut files = Vec::with_capacity(target.prompts.len());
        for prompt in &target.prompts {
            let asset = self.cache.resolve(self.backend.as_ref(), prompt).await?;
            files.push(asset.remote);
        }

        let content = match tokio::fs::read_to_string(source).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(source = %source.display(), "failed to read file: {e}");
                return Ok(ReviewOutcome::Failed(ReviewFailure::from_error(&e)));
            }
        };

        let request = GenerateRequest {
            model: self.model.clone(),
            text: review_request_text(source, &content),
            files,
        };

        match self.backend.generate(&request).await {
            Ok(text) => Ok(ReviewOutcome::Reviewed(text)),
            Err(e) => {
                tracing::error!(source = %source.display(), "review failed: {e}");
                Ok(ReviewOutcome::Failed(ReviewFailure::from_error(&e)))
            }
        }
    }

    /// Hand the cache back (e.g. to report stats after a run).
    pub fn into_cache(self) -> PromptAssetCache {
        self.cache
    }
}

/// Leading text block of a review request.
pub fn review_request_text(path: &Path, content: &str) -> String {
    format!("File: {}\n\n```\n{content}\n```", path.display())
}
