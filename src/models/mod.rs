//! Shared types used across all modules.
//!
//! This module defines the remote file handles, review targets, and
//! per-target outcomes. Other modules import from here rather than
//! reaching into each other's internals.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Readiness of an uploaded file on the remote service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum FileState {
    Processing,
    Active,
    Failed,
}

impl FileState {
    /// Map a remote state string.
    ///
    /// A missing, unspecified, or unknown state is treated as ready.
    pub fn from_remote(state: Option<&str>) -> Self {
        state
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
            .unwrap_or(FileState::Active)
    }
}

/// A file handle returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: FileState,
}

impl RemoteFile {
    pub fn is_active(&self) -> bool {
        self.state == FileState::Active
    }
}

/// A local prompt template bound to its uploaded remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAsset {
    /// Absolute local path; the identity key in the asset cache.
    pub local_path: PathBuf,
    pub remote: RemoteFile,
}

impl PromptAsset {
    /// Only active assets may be referenced in a generation request.
    pub fn is_ready(&self) -> bool {
        self.remote.is_active()
    }
}

/// One file selected for review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewTarget {
    /// Path to the file under review, as listed.
    pub source: PathBuf,
    /// Prompt files attached to the request, in order.
    pub prompts: Vec<PathBuf>,
    /// Where the review (or failure) document is written.
    pub artifact: PathBuf,
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    /// Leading text part.
    pub text: String,
    /// File parts appended after the text, in order.
    pub files: Vec<RemoteFile>,
}

/// Fixed lead line of every failure document.
pub const FAILURE_MESSAGE: &str =
    "Automated review failed. Please ask the person in charge to check this file.";

/// Why a single target could not be reviewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewFailure {
    /// Fixed human-readable message.
    pub message: String,
    /// Underlying error (or cause chain) for diagnosis.
    pub detail: String,
}

impl ReviewFailure {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            message: FAILURE_MESSAGE.to_string(),
            detail: detail.into(),
        }
    }

    /// Build a failure from an error, including every source in its chain.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut detail = format!("Original cause: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            detail.push_str(&format!("\nCaused by: {cause}"));
            source = cause.source();
        }
        Self::new(detail)
    }
}

impl fmt::Display for ReviewFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n{}\n", self.message, self.detail)
    }
}

/// Result of reviewing a single target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Model response text, written verbatim.
    Reviewed(String),
    Failed(ReviewFailure),
}

impl ReviewOutcome {
    /// Contents of the artifact file for this outcome.
    pub fn document(&self) -> String {
        match self {
            ReviewOutcome::Reviewed(text) => text.clone(),
            ReviewOutcome::Failed(failure) => failure.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReviewOutcome::Failed(_))
    }
}
