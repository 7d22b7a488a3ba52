//! ModelBackend trait and remote model integration.
//!
//! Provides an abstraction layer over the remote generative-model
//! service so the asset cache and the batch orchestrator can be driven
//! by a mock in tests.

pub mod gemini;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{GenerateRequest, RemoteFile};

/// Errors from the model backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{context}: {source}")]
    Http {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("remote file not found: {0}")]
    NotFound(String),

    #[error("failed to parse API response: {0}")]
    ParseError(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// Remote operations the review pipeline depends on.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Upload a local file and return its handle (usually still processing).
    async fn upload_file(&self, path: &Path, mime_type: &str) -> Result<RemoteFile, BackendError>;

    /// Fetch the current state of an uploaded file by resource name.
    async fn get_file(&self, name: &str) -> Result<RemoteFile, BackendError>;

    /// Run one generation request and return the response text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError>;
}

/// MIME type sent for an uploaded prompt file.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("md" | "markdown") => "text/markdown",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        _ => "text/plain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_by_extension() {
        assert_eq!(mime_type_for(Path::new("docs/instruction-review.md")), "text/markdown");
        assert_eq!(mime_type_for(Path::new("a.JSON")), "application/json");
        assert_eq!(mime_type_for(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_type_for(Path::new("Makefile")), "text/plain");
    }

    #[test]
    fn api_error_display_includes_status() {
        let err = BackendError::ApiError {
            status: 429,
            body: "quota exceeded".into(),
        };
        assert_eq!(err.to_string(), "API error (HTTP 429): quota exceeded");
    }
}
