//! Gemini `generativelanguage` REST client.
//!
//! Implements the three remote operations the pipeline needs: resumable
//! file upload, file state lookup, and `generateContent`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::constants;
use crate::models::{FileState, GenerateRequest, RemoteFile};

use super::{BackendError, ModelBackend};

/// Upper bound for a single HTTP exchange, generation included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of an error body echoed into error messages.
const ERROR_BODY_PREVIEW_LEN: usize = 2000;

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Gemini API backend.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiProvider {
    /// Create a provider from configuration. Fails when no API key is set.
    pub fn new(config: &ProviderConfig) -> Result<Self, BackendError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                BackendError::NotConfigured(format!(
                    "no API key found. Set {} or provider.api_key.",
                    constants::ENV_API_KEY
                ))
            })?
            .to_string();

        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(constants::DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(format!("{}/{}", constants::APP_NAME, constants::VERSION))
            .build()
            .map_err(http("failed to build HTTP client"))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ModelBackend for GeminiProvider {
    async fn upload_file(&self, path: &Path, mime_type: &str) -> Result<RemoteFile, BackendError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| BackendError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "starting upload");

        let start = self
            .client
            .post(self.url("upload/v1beta/files"))
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(http("upload start request failed"))?;
        let start = ensure_success(start).await?;

        let upload_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                BackendError::ParseError(format!(
                    "upload start response has no {UPLOAD_URL_HEADER} header"
                ))
            })?
            .to_string();

        let finished = self
            .client
            .post(&upload_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(http("upload request failed"))?;
        let finished = ensure_success(finished).await?;

        let parsed: UploadResponse = finished
            .json()
            .await
            .map_err(|e| BackendError::ParseError(format!("upload response: {e}")))?;
        Ok(parsed.file.into())
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, BackendError> {
        let name = resource_name(name);
        let response = self
            .client
            .get(self.url(&format!("v1beta/{name}")))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(http("file lookup request failed"))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(name));
        }
        let response = ensure_success(response).await?;

        let file: FileResource = response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(format!("file resource: {e}")))?;
        Ok(file.into())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        let model = request
            .model
            .strip_prefix("models/")
            .unwrap_or(&request.model);
        let body = GenerateBody::from_request(request);

        let response = self
            .client
            .post(self.url(&format!("v1beta/models/{model}:generateContent")))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(http("generateContent request failed"))?;
        let response = ensure_success(response).await?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(format!("generateContent response: {e}")))?;
        parsed.text()
    }
}

/// Wrap a transport error with a short description of the failed step.
fn http(context: &'static str) -> impl FnOnce(reqwest::Error) -> BackendError {
    move |source| BackendError::Http {
        context: context.to_string(),
        source,
    }
}

/// Turn a non-2xx response into [`BackendError::ApiError`].
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    if body.len() > ERROR_BODY_PREVIEW_LEN {
        let cut = (0..=ERROR_BODY_PREVIEW_LEN)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        body.truncate(cut);
        body.push_str("...");
    }
    Err(BackendError::ApiError {
        status: status.as_u16(),
        body,
    })
}

/// Accept both `files/abc` and a bare `abc`.
fn resource_name(name: &str) -> String {
    let name = name.trim();
    if name.starts_with("files/") {
        name.to_string()
    } else {
        format!("files/{name}")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: Option<String>,
}

impl From<FileResource> for RemoteFile {
    fn from(file: FileResource) -> Self {
        RemoteFile {
            state: FileState::from_remote(file.state.as_deref()),
            name: file.name,
            uri: file.uri,
            mime_type: if file.mime_type.is_empty() {
                "text/plain".to_string()
            } else {
                file.mime_type
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

impl<'a> GenerateBody<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        let mut parts = Vec::with_capacity(request.files.len() + 1);
        if !request.text.is_empty() {
            parts.push(Part::Text {
                text: &request.text,
            });
        }
        parts.extend(request.files.iter().map(|f| Part::File {
            file_data: FileData {
                mime_type: &f.mime_type,
                file_uri: &f.uri,
            },
        }));
        GenerateBody {
            contents: vec![Content {
                role: "user",
                parts,
            }],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Result<String, BackendError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(BackendError::ParseError(match block_reason {
                Some(reason) => format!("prompt was blocked ({reason})"),
                None => "response contained no candidates".to_string(),
            }));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(BackendError::ParseError(format!(
                "response contained no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}
