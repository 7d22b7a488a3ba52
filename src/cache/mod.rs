//! Prompt upload cache.
//!
//! Maps local prompt files to their uploaded remote handles so repeated
//! CI runs reuse uploads instead of re-sending the same templates. Every
//! cached handle is re-checked against the remote service before use,
//! and an entry whose prompt content changed is replaced.

pub mod store;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::{FileState, PromptAsset, RemoteFile};
use crate::providers::{BackendError, ModelBackend, mime_type_for};

pub use store::{CacheStats, FileStore};

/// Fatal errors while resolving a prompt asset.
#[derive(Error, Debug)]
pub enum PromptAssetError {
    #[error("prompt file does not exist: {}", .0.display())]
    PromptMissing(PathBuf),

    #[error("failed to read prompt file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to upload prompt file {path}: {source}")]
    UploadFailed {
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    #[error("failed to check state of {name}: {source}")]
    Poll {
        name: String,
        #[source]
        source: BackendError,
    },

    #[error("file processing failed for {name} ({path})")]
    ProcessingFailed { name: String, path: PathBuf },

    #[error("remote file {0} failed processing")]
    RemoteFailed(String),

    #[error("timed out after {}s waiting for {name} to become active", .waited.as_secs())]
    Timeout { name: String, waited: Duration },
}

/// How long and how often to wait for an upload to become active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            interval: Duration::from_secs(2),
        }
    }
}

/// A persisted remote handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEntry")]
pub struct CachedHandle {
    /// Remote resource name (`files/abc123`).
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mime_type: String,
    /// SHA-256 of the prompt content that was uploaded, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// On-disk entry forms: older caches stored only the handle name.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Legacy(String),
    Full {
        name: String,
        #[serde(default)]
        uri: String,
        #[serde(default)]
        mime_type: String,
        #[serde(default)]
        sha256: Option<String>,
    },
}

impl From<RawEntry> for CachedHandle {
    fn from(raw: RawEntry) -> Self {
        match raw {
            RawEntry::Legacy(name) => CachedHandle {
                name,
                uri: String::new(),
                mime_type: String::new(),
                sha256: None,
            },
            RawEntry::Full {
                name,
                uri,
                mime_type,
                sha256,
            } => CachedHandle {
                name,
                uri,
                mime_type,
                sha256,
            },
        }
    }
}

/// Durable local-path to remote-handle map with in-run memoization.
pub struct PromptAssetCache {
    store: FileStore,
    entries: IndexMap<String, CachedHandle>,
    resolved: HashMap<String, PromptAsset>,
    poll: PollSettings,
}

impl PromptAssetCache {
    /// Load the cache from `path`. A missing or corrupt file starts empty.
    pub fn load(path: impl Into<PathBuf>, poll: PollSettings) -> Self {
        let store = FileStore::new(path);
        let entries = store.load();
        Self {
            store,
            entries,
            resolved: HashMap::new(),
            poll,
        }
    }

    /// Persist the current entries. Failures are logged, never returned.
    pub fn save(&self) {
        if let Err(e) = self.store.save(&self.entries) {
            tracing::warn!(path = %self.store.path().display(), "failed to save prompt upload cache: {e}");
        }
    }

    /// Resolve a local prompt file to an active remote asset.
    ///
    /// Reuses a cached handle when the remote copy is still valid and the
    /// prompt content is unchanged, otherwise uploads afresh and waits for
    /// the upload to become active.
    pub async fn resolve(
        &mut self,
        backend: &dyn ModelBackend,
        local: &Path,
    ) -> Result<PromptAsset, PromptAssetError> {
        if !local.exists() {
            return Err(PromptAssetError::PromptMissing(local.to_path_buf()));
        }
        let absolute = std::path::absolute(local).map_err(|source| PromptAssetError::Read {
            path: local.to_path_buf(),
            source,
        })?;
        let key = absolute.to_string_lossy().into_owned();

        if let Some(asset) = self.resolved.get(&key) {
            return Ok(asset.clone());
        }

        let content = tokio::fs::read(&absolute)
            .await
            .map_err(|source| PromptAssetError::Read {
                path: absolute.clone(),
                source,
            })?;
        let digest = hex::encode(Sha256::digest(&content));

        let reused = match self.entries.get(&key).cloned() {
            Some(entry) if entry.sha256.as_deref().is_some_and(|d| d != digest) => {
                tracing::info!(path = %absolute.display(), "prompt content changed, uploading again");
                None
            }
            Some(entry) => self.revalidate(backend, &entry).await?,
            None => None,
        };

        let remote = match reused {
            Some(remote) => {
                tracing::info!(path = %absolute.display(), name = %remote.name, "reusing uploaded prompt");
                remote
            }
            None => self.upload(backend, &absolute).await?,
        };

        let entry = CachedHandle {
            name: remote.name.clone(),
            uri: remote.uri.clone(),
            mime_type: remote.mime_type.clone(),
            sha256: Some(digest),
        };
        if self.entries.get(&key) != Some(&entry) {
            self.entries.insert(key.clone(), entry);
            self.save();
        }

        let asset = PromptAsset {
            local_path: absolute,
            remote,
        };
        self.resolved.insert(key, asset.clone());
        Ok(asset)
    }

    /// Check a cached handle. `None` means the handle is unusable and the
    /// prompt must be uploaded again.
    async fn revalidate(
        &self,
        backend: &dyn ModelBackend,
        entry: &CachedHandle,
    ) -> Result<Option<RemoteFile>, PromptAssetError> {
        let file = match backend.get_file(&entry.name).await {
            Ok(file) => file,
            Err(e) => {
                tracing::info!(name = %entry.name, "cached prompt handle is no longer valid: {e}");
                return Ok(None);
            }
        };

        let file = match settle(backend, file, self.poll).await {
            Ok(file) => file,
            Err(PromptAssetError::Poll { name, source }) => {
                tracing::info!(name = %name, "cached prompt handle could not be checked: {source}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match file {
            file if file.is_active() => Ok(Some(file)),
            file => {
                tracing::info!(name = %file.name, "cached prompt handle failed processing");
                Ok(None)
            }
        }
    }

    async fn upload(
        &self,
        backend: &dyn ModelBackend,
        path: &Path,
    ) -> Result<RemoteFile, PromptAssetError> {
        let uploaded = backend
            .upload_file(path, mime_type_for(path))
            .await
            .map_err(|source| PromptAssetError::UploadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!(path = %path.display(), name = %uploaded.name, "uploaded prompt file");

        let file = settle(backend, uploaded, self.poll).await?;
        if file.state == FileState::Failed {
            return Err(PromptAssetError::ProcessingFailed {
                name: file.name,
                path: path.to_path_buf(),
            });
        }
        Ok(file)
    }

    /// The persisted handle for a local prompt path, if any.
    pub fn get(&self, local: &Path) -> Option<&CachedHandle> {
        let absolute = std::path::absolute(local).ok()?;
        self.entries.get(absolute.to_string_lossy().as_ref())
    }

    /// Remove all cached handles and delete the cache file.
    pub fn clear(&mut self) -> Result<CacheStats, std::io::Error> {
        let stats = self.stats();
        self.store.clear()?;
        self.entries.clear();
        self.resolved.clear();
        Ok(stats)
    }

    /// Compute statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            total_bytes: self.store.size(),
        }
    }

    /// Return the cache file path.
    pub fn path(&self) -> &Path {
        self.store.path()
    }
}

/// Wait for an already uploaded file to become active.
///
/// Lookup errors and a `Failed` state are both reported as errors.
pub async fn wait_until_active(
    backend: &dyn ModelBackend,
    name: &str,
    poll: PollSettings,
) -> Result<RemoteFile, PromptAssetError> {
    let file = backend
        .get_file(name)
        .await
        .map_err(|source| PromptAssetError::Poll {
            name: name.to_string(),
            source,
        })?;
    let file = settle(backend, file, poll).await?;
    if file.state == FileState::Failed {
        return Err(PromptAssetError::RemoteFailed(file.name));
    }
    Ok(file)
}

/// Poll while the file is processing. Returns once it is active or
/// failed; running past the deadline is an error.
async fn settle(
    backend: &dyn ModelBackend,
    mut file: RemoteFile,
    poll: PollSettings,
) -> Result<RemoteFile, PromptAssetError> {
    let started = Instant::now();
    while file.state == FileState::Processing {
        let waited = started.elapsed();
        if waited >= poll.timeout {
            return Err(PromptAssetError::Timeout {
                name: file.name,
                waited,
            });
        }
        tracing::debug!(name = %file.name, "waiting for file to become active");
        tokio::time::sleep(poll.interval).await;

        file = backend
            .get_file(&file.name)
            .await
            .map_err(|source| PromptAssetError::Poll {
                name: file.name.clone(),
                source,
            })?;
    }
    Ok(file)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerateRequest;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted backend: upload states and lookup results are queued per call.
    #[derive(Default)]
    struct ScriptedBackend {
        uploads: Mutex<usize>,
        lookups: Mutex<usize>,
        upload_state: Mutex<Option<FileState>>,
        lookup_results: Mutex<VecDeque<Result<FileState, ()>>>,
    }

    impl ScriptedBackend {
        fn with_lookups(lookups: Vec<Result<FileState, ()>>) -> Self {
            Self {
                lookup_results: Mutex::new(lookups.into()),
                ..Self::default()
            }
        }

        fn uploads(&self) -> usize {
            *self.uploads.lock().unwrap()
        }

        fn lookups(&self) -> usize {
            *self.lookups.lock().unwrap()
        }
    }

    fn remote(name: &str, state: FileState) -> RemoteFile {
        RemoteFile {
            name: name.to_string(),
            uri: format!("https://example.invalid/{name}"),
            mime_type: "text/markdown".to_string(),
            state,
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn upload_file(&self, _path: &Path, _mime: &str) -> Result<RemoteFile, BackendError> {
            let mut uploads = self.uploads.lock().unwrap();
            *uploads += 1;
            let state = self.upload_state.lock().unwrap().unwrap_or(FileState::Active);
            Ok(remote(&format!("files/upload-{}", *uploads), state))
        }

        async fn get_file(&self, name: &str) -> Result<RemoteFile, BackendError> {
            *self.lookups.lock().unwrap() += 1;
            match self.lookup_results.lock().unwrap().pop_front() {
                Some(Ok(state)) => Ok(remote(name, state)),
                Some(Err(())) => Err(BackendError::NotFound(name.to_string())),
                None => Ok(remote(name, FileState::Active)),
            }
        }

        async fn generate(&self, _request: &GenerateRequest) -> Result<String, BackendError> {
            Ok(String::new())
        }
    }

    fn fast_poll() -> PollSettings {
        PollSettings {
            timeout: Duration::from_millis(200),
            interval: Duration::from_millis(1),
        }
    }

    fn write_legacy_entry(cache_path: &Path, prompt: &Path, name: &str) {
        let key = std::path::absolute(prompt).unwrap().to_string_lossy().into_owned();
        let mut doc = serde_json::Map::new();
        doc.insert(key, serde_json::Value::String(name.to_string()));
        std::fs::write(cache_path, serde_json::Value::Object(doc).to_string()).unwrap();
    }

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let prompt = dir.path().join("instruction-review.md");
        std::fs::write(&prompt, "# Review rules\n").unwrap();
        let cache_path = dir.path().join(".prompt_upload_cache.json");
        (dir, prompt, cache_path)
    }

    #[tokio::test]
    async fn first_resolve_uploads_and_persists() {
        let (_dir, prompt, cache_path) = setup();
        let backend = ScriptedBackend::default();
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());

        let asset = cache.resolve(&backend, &prompt).await.unwrap();
        assert_eq!(asset.remote.name, "files/upload-1");
        assert!(asset.is_ready());
        assert_eq!(backend.uploads(), 1);

        let reloaded = PromptAssetCache::load(&cache_path, fast_poll());
        let entry = reloaded.get(&prompt).unwrap();
        assert_eq!(entry.name, "files/upload-1");
        assert!(entry.sha256.is_some());
    }

    #[tokio::test]
    async fn resolve_is_memoized_within_a_run() {
        let (_dir, prompt, cache_path) = setup();
        let backend = ScriptedBackend::default();
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());

        let first = cache.resolve(&backend, &prompt).await.unwrap();
        let second = cache.resolve(&backend, &prompt).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.uploads(), 1);
        assert_eq!(backend.lookups(), 0);
    }

    #[tokio::test]
    async fn valid_cached_handle_is_reused_across_runs() {
        let (_dir, prompt, cache_path) = setup();
        let backend = ScriptedBackend::default();
        PromptAssetCache::load(&cache_path, fast_poll())
            .resolve(&backend, &prompt)
            .await
            .unwrap();

        let mut next_run = PromptAssetCache::load(&cache_path, fast_poll());
        let asset = next_run.resolve(&backend, &prompt).await.unwrap();
        assert_eq!(asset.remote.name, "files/upload-1");
        assert_eq!(backend.uploads(), 1);
        assert_eq!(backend.lookups(), 1);
    }

    #[tokio::test]
    async fn legacy_string_entry_is_reused() {
        let (_dir, prompt, cache_path) = setup();
        write_legacy_entry(&cache_path, &prompt, "files/legacy");

        let backend = ScriptedBackend::default();
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());
        let asset = cache.resolve(&backend, &prompt).await.unwrap();

        assert_eq!(asset.remote.name, "files/legacy");
        assert_eq!(backend.uploads(), 0);
        // upgraded in place with the content digest
        let reloaded = PromptAssetCache::load(&cache_path, fast_poll());
        assert!(reloaded.get(&prompt).unwrap().sha256.is_some());
    }

    #[tokio::test]
    async fn invalid_cached_handle_triggers_reupload() {
        let (_dir, prompt, cache_path) = setup();
        write_legacy_entry(&cache_path, &prompt, "files/expired");

        let backend = ScriptedBackend::with_lookups(vec![Err(())]);
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());
        let asset = cache.resolve(&backend, &prompt).await.unwrap();

        assert_eq!(asset.remote.name, "files/upload-1");
        assert_eq!(backend.uploads(), 1);
        let reloaded = PromptAssetCache::load(&cache_path, fast_poll());
        assert_eq!(reloaded.get(&prompt).unwrap().name, "files/upload-1");
    }

    #[tokio::test]
    async fn failed_cached_handle_triggers_reupload() {
        let (_dir, prompt, cache_path) = setup();
        write_legacy_entry(&cache_path, &prompt, "files/broken");

        let backend = ScriptedBackend::with_lookups(vec![Ok(FileState::Failed)]);
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());
        let asset = cache.resolve(&backend, &prompt).await.unwrap();
        assert_eq!(asset.remote.name, "files/upload-1");
    }

    #[tokio::test]
    async fn processing_cached_handle_is_polled_until_active() {
        let (_dir, prompt, cache_path) = setup();
        write_legacy_entry(&cache_path, &prompt, "files/warming");

        let backend = ScriptedBackend::with_lookups(vec![
            Ok(FileState::Processing),
            Ok(FileState::Processing),
            Ok(FileState::Active),
        ]);
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());
        let asset = cache.resolve(&backend, &prompt).await.unwrap();

        assert_eq!(asset.remote.name, "files/warming");
        assert_eq!(backend.uploads(), 0);
        assert_eq!(backend.lookups(), 3);
    }

    #[tokio::test]
    async fn processing_cached_handle_that_disappears_is_uploaded_again() {
        let (_dir, prompt, cache_path) = setup();
        write_legacy_entry(&cache_path, &prompt, "files/old");

        let backend =
            ScriptedBackend::with_lookups(vec![Ok(FileState::Processing), Err(())]);
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());
        let asset = cache.resolve(&backend, &prompt).await.unwrap();

        assert_eq!(asset.remote.name, "files/upload-1");
        assert_eq!(backend.uploads(), 1);
        assert_eq!(cache.get(&prompt).unwrap().name, "files/upload-1");
    }

    #[tokio::test]
    async fn poll_error_after_fresh_upload_is_fatal() {
        let (_dir, prompt, cache_path) = setup();
        let backend = ScriptedBackend::with_lookups(vec![Err(())]);
        *backend.upload_state.lock().unwrap() = Some(FileState::Processing);
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());

        let err = cache.resolve(&backend, &prompt).await.unwrap_err();
        assert!(matches!(err, PromptAssetError::Poll { .. }), "got: {err}");
        assert_eq!(backend.uploads(), 1);
    }

    #[tokio::test]
    async fn wait_until_active_polls_a_processing_file() {
        let backend = ScriptedBackend::with_lookups(vec![
            Ok(FileState::Processing),
            Ok(FileState::Active),
        ]);
        let file = wait_until_active(&backend, "files/shared", fast_poll()).await.unwrap();
        assert_eq!(file.name, "files/shared");
        assert!(file.is_active());
        assert_eq!(backend.lookups(), 2);
    }

    #[tokio::test]
    async fn wait_until_active_reports_unknown_and_failed_files() {
        let backend = ScriptedBackend::with_lookups(vec![Err(())]);
        let err = wait_until_active(&backend, "files/gone", fast_poll()).await.unwrap_err();
        assert!(matches!(err, PromptAssetError::Poll { .. }), "got: {err}");

        let backend = ScriptedBackend::with_lookups(vec![Ok(FileState::Failed)]);
        let err = wait_until_active(&backend, "files/broken", fast_poll()).await.unwrap_err();
        assert!(matches!(err, PromptAssetError::RemoteFailed(ref name) if name == "files/broken"));
        assert_eq!(backend.uploads(), 0);
    }

    #[tokio::test]
    async fn changed_prompt_content_forces_reupload() {
        let (_dir, prompt, cache_path) = setup();
        let backend = ScriptedBackend::default();
        PromptAssetCache::load(&cache_path, fast_poll())
            .resolve(&backend, &prompt)
            .await
            .unwrap();

        std::fs::write(&prompt, "# Review rules, edited\n").unwrap();
        let mut next_run = PromptAssetCache::load(&cache_path, fast_poll());
        let asset = next_run.resolve(&backend, &prompt).await.unwrap();

        assert_eq!(asset.remote.name, "files/upload-2");
        assert_eq!(backend.uploads(), 2);
        assert_eq!(backend.lookups(), 0);
    }

    #[tokio::test]
    async fn missing_prompt_is_fatal_without_remote_calls() {
        let (dir, _prompt, cache_path) = setup();
        let backend = ScriptedBackend::default();
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());

        let err = cache
            .resolve(&backend, &dir.path().join("missing.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, PromptAssetError::PromptMissing(_)));
        assert_eq!(backend.uploads(), 0);
        assert_eq!(backend.lookups(), 0);
    }

    #[tokio::test]
    async fn upload_that_never_activates_times_out() {
        let (_dir, prompt, cache_path) = setup();
        let backend = ScriptedBackend::with_lookups(vec![Ok(FileState::Processing); 10_000]);
        *backend.upload_state.lock().unwrap() = Some(FileState::Processing);
        let poll = PollSettings {
            timeout: Duration::from_millis(30),
            interval: Duration::from_millis(5),
        };
        let mut cache = PromptAssetCache::load(&cache_path, poll);

        let err = cache.resolve(&backend, &prompt).await.unwrap_err();
        assert!(matches!(err, PromptAssetError::Timeout { .. }), "got: {err}");
        assert!(!cache_path.exists());
    }

    #[tokio::test]
    async fn upload_that_fails_processing_is_fatal() {
        let (_dir, prompt, cache_path) = setup();
        let backend = ScriptedBackend::with_lookups(vec![Ok(FileState::Failed)]);
        *backend.upload_state.lock().unwrap() = Some(FileState::Processing);
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());

        let err = cache.resolve(&backend, &prompt).await.unwrap_err();
        assert!(matches!(err, PromptAssetError::ProcessingFailed { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn stats_and_clear() {
        let (_dir, prompt, cache_path) = setup();
        let backend = ScriptedBackend::default();
        let mut cache = PromptAssetCache::load(&cache_path, fast_poll());
        cache.resolve(&backend, &prompt).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert!(stats.total_bytes > 0);

        let cleared = cache.clear().unwrap();
        assert_eq!(cleared.entries, 1);
        assert!(!cache_path.exists());
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.path(), cache_path.as_path());
    }

    #[test]
    fn save_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // parent is a regular file, so the write must fail
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let cache = PromptAssetCache::load(blocker.join("cache.json"), fast_poll());
        cache.save();
    }

    #[test]
    fn cached_handle_serializes_full_form() {
        let entry = CachedHandle {
            name: "files/a".into(),
            uri: String::new(),
            mime_type: "text/markdown".into(),
            sha256: Some("ab".into()),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": "files/a", "mime_type": "text/markdown", "sha256": "ab" })
        );
        let back: CachedHandle = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
