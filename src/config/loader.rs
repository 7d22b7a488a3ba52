//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.kensa.toml` in the working directory
//! 4. `~/.config/kensa/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::PollSettings;
use crate::constants;
use crate::env::Env;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub review: ReviewConfig,
    pub filter: FilterConfig,
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
}

/// Pipeline input/output locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Parent of the dated output directories.
    pub base_dir: PathBuf,
    /// Decoded changed-file list.
    pub code_list: PathBuf,
    /// OCR text file list.
    pub ocr_list: PathBuf,
    pub default_prompt: PathBuf,
    /// Used only when present on disk.
    pub default_custom_prompt: PathBuf,
    /// Extension table (CSV) with per-extension prompt overrides.
    pub prompt_map: PathBuf,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(constants::DEFAULT_REVIEW_BASE_DIR),
            code_list: PathBuf::from(constants::CODE_LIST_FILENAME),
            ocr_list: PathBuf::from(constants::OCR_LIST_FILENAME),
            default_prompt: PathBuf::from(constants::DEFAULT_PROMPT_PATH),
            default_custom_prompt: PathBuf::from(constants::DEFAULT_CUSTOM_PROMPT_PATH),
            prompt_map: PathBuf::from(constants::EXTENSION_TABLE_PATH),
        }
    }
}

/// Review-scope exclusions applied on top of the extension allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Directory prefixes never reviewed (matched case-insensitively).
    pub excluded_prefixes: Vec<String>,
    /// Declaration-only suffixes never reviewed.
    pub excluded_suffixes: Vec<String>,
    /// Base names of the pipeline's own list files.
    pub generated_lists: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_prefixes: vec![
                ".github/".to_string(),
                "docs/".to_string(),
                format!("{}/", constants::DEFAULT_REVIEW_BASE_DIR),
                "ocr_outputs/".to_string(),
            ],
            excluded_suffixes: vec![".d.ts".to_string()],
            generated_lists: vec![
                constants::CODE_LIST_FILENAME.to_string(),
                constants::OCR_LIST_FILENAME.to_string(),
            ],
        }
    }
}

/// Remote model configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: constants::DEFAULT_MODEL.to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

impl ProviderConfig {
    /// Pick the model for a call: an explicit non-blank name wins, then
    /// the configured model, then the built-in default.
    pub fn resolve_model(&self, explicit: Option<&str>) -> String {
        [explicit, Some(self.model.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|m| !m.is_empty())
            .unwrap_or(constants::DEFAULT_MODEL)
            .to_string()
    }
}

/// Prompt upload cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
    /// Upper bound on waiting for an upload to become ready.
    pub upload_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::PROMPT_CACHE_FILENAME),
            upload_timeout_secs: 120,
            poll_interval_secs: 2,
        }
    }
}

impl CacheConfig {
    /// Readiness polling parameters.
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            timeout: Duration::from_secs(self.upload_timeout_secs),
            interval: Duration::from_secs(self.poll_interval_secs),
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, the working-directory config, then
    /// applies environment variable overrides.
    pub fn load(work_dir: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: working-directory config
        if let Some(dir) = work_dir {
            let local_path = dir.join(constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        // Review settings
        let default_review = ReviewConfig::default();
        if other.review.base_dir != default_review.base_dir {
            self.review.base_dir = other.review.base_dir;
        }
        if other.review.code_list != default_review.code_list {
            self.review.code_list = other.review.code_list;
        }
        if other.review.ocr_list != default_review.ocr_list {
            self.review.ocr_list = other.review.ocr_list;
        }
        if other.review.default_prompt != default_review.default_prompt {
            self.review.default_prompt = other.review.default_prompt;
        }
        if other.review.default_custom_prompt != default_review.default_custom_prompt {
            self.review.default_custom_prompt = other.review.default_custom_prompt;
        }
        if other.review.prompt_map != default_review.prompt_map {
            self.review.prompt_map = other.review.prompt_map;
        }

        // Filter settings
        let default_filter = FilterConfig::default();
        if other.filter.excluded_prefixes != default_filter.excluded_prefixes {
            self.filter.excluded_prefixes = other.filter.excluded_prefixes;
        }
        if other.filter.excluded_suffixes != default_filter.excluded_suffixes {
            self.filter.excluded_suffixes = other.filter.excluded_suffixes;
        }
        if other.filter.generated_lists != default_filter.generated_lists {
            self.filter.generated_lists = other.filter.generated_lists;
        }

        // Provider settings
        if other.provider.model != ProviderConfig::default().model {
            self.provider.model = other.provider.model;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }

        // Cache settings
        let default_cache = CacheConfig::default();
        if other.cache.path != default_cache.path {
            self.cache.path = other.cache.path;
        }
        if other.cache.upload_timeout_secs != default_cache.upload_timeout_secs {
            self.cache.upload_timeout_secs = other.cache.upload_timeout_secs;
        }
        if other.cache.poll_interval_secs != default_cache.poll_interval_secs {
            self.cache.poll_interval_secs = other.cache.poll_interval_secs;
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Blank values are ignored so an empty CI input never clobbers a
    /// configured value.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(val) = env.non_blank(constants::ENV_API_KEY) {
            self.provider.api_key = Some(val);
        }
        if let Some(val) = env.non_blank(constants::ENV_MODEL) {
            self.provider.model = val;
        }
        if let Some(val) = env.non_blank(constants::ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }
        if let Some(dir) = env.path(constants::ENV_REVIEW_BASE_DIR) {
            self.review.base_dir = dir;
        }
        if let Some(path) = env.path(constants::ENV_CACHE_PATH) {
            self.cache.path = path;
        }
    }
}
