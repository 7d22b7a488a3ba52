//! App-wide constants.
//!
//! Centralises the tool name, config paths, file names, environment
//! variable names, and model defaults so a rename only requires changing
//! this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "kensa";

/// Crate version, as reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local config filename (e.g. `.kensa.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".kensa.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "kensa";

/// Model used when `GEMINI_MODEL` is unset or blank.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Root of the Gemini REST API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

// ── Pipeline file names ─────────────────────────────────────────────

/// Decoded, filtered changed-file list written by `kensa decode`.
pub const CODE_LIST_FILENAME: &str = "decoded_files.txt";

/// List of OCR text files written by the OCR collaborator.
pub const OCR_LIST_FILENAME: &str = "ocr_files_list.txt";

/// Durable prompt upload cache.
pub const PROMPT_CACHE_FILENAME: &str = ".prompt_upload_cache.json";

/// Extension allow-list with per-extension prompt overrides.
pub const EXTENSION_TABLE_PATH: &str = "docs/target-extensions.csv";

/// Base review instructions.
pub const DEFAULT_PROMPT_PATH: &str = "docs/instruction-review.md";

/// Supplementary review instructions (optional on disk).
pub const DEFAULT_CUSTOM_PROMPT_PATH: &str = "docs/instruction-review-custom.md";

/// Base directory for dated review output directories.
pub const DEFAULT_REVIEW_BASE_DIR: &str = "review";

/// Extension of review artifacts.
pub const REVIEW_DOCUMENT_EXTENSION: &str = "md";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_REVIEW_BASE_DIR: &str = "REVIEW_BASE_DIR";
pub const ENV_CACHE_PATH: &str = "KENSA_CACHE_PATH";
pub const ENV_CHANGED_FILES: &str = "CHANGED_FILES_RAW";
pub const ENV_LOG: &str = "KENSA_LOG";
pub const ENV_GITHUB_OUTPUT: &str = "GITHUB_OUTPUT";
