//! Clap argument types.

use clap::Parser;
use std::path::PathBuf;

/// Decode changed file paths and drive automated LLM reviews in CI.
#[derive(Parser, Debug)]
#[command(name = "kensa", version = kensa::constants::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Decode and filter the changed-file list, then write the review list.
    Decode(DecodeArgs),

    /// Print glob patterns for the allow-listed extensions.
    Extensions(ExtensionsArgs),

    /// Run the full review step: code list, then OCR list.
    Review(ReviewArgs),

    /// Review every file in a list and write one document per file.
    BatchReview(BatchReviewArgs),

    /// Upload a prompt file (or reuse its cached upload) and print the handle.
    UploadPrompt(UploadPromptArgs),

    /// Send a one-shot prompt and print the response.
    Ask(AskArgs),

    /// Manage the prompt upload cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Arguments for the `decode` subcommand.
#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// Comma-separated changed paths as reported by git.
    #[arg(long, env = kensa::constants::ENV_CHANGED_FILES, allow_hyphen_values = true)]
    pub raw: Option<String>,

    /// Where to write the accepted paths (default: review.code_list).
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Extension table CSV (default: review.prompt_map).
    #[arg(long)]
    pub extensions: Option<PathBuf>,
}

/// Arguments for the `extensions` subcommand.
#[derive(Parser, Debug)]
pub struct ExtensionsArgs {
    /// Extension table CSV (default: review.prompt_map).
    pub csv: Option<PathBuf>,
}

/// Arguments for the `review` subcommand.
#[derive(Parser, Debug)]
pub struct ReviewArgs {
    /// Parent directory for dated review output (default: review.base_dir).
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Model name (default: provider.model).
    #[arg(long)]
    pub model: Option<String>,
}

/// Arguments for the `batch-review` subcommand.
#[derive(Parser, Debug)]
pub struct BatchReviewArgs {
    /// File listing the paths to review, one per line.
    pub list: PathBuf,

    /// Directory the review documents are written to.
    pub output_dir: PathBuf,

    /// Prompt attached when no extension-specific prompt applies.
    #[arg(long)]
    pub default_prompt: Option<PathBuf>,

    /// Extra prompt attached with the default one, if it exists.
    #[arg(long)]
    pub default_custom: Option<PathBuf>,

    /// Extension table CSV with per-extension prompts.
    #[arg(long)]
    pub prompt_map: Option<PathBuf>,

    /// Model name (default: provider.model).
    #[arg(long)]
    pub model: Option<String>,
}

/// Arguments for the `upload-prompt` subcommand.
#[derive(Parser, Debug)]
pub struct UploadPromptArgs {
    /// Local prompt file.
    pub path: PathBuf,
}

/// Arguments for the `ask` subcommand.
#[derive(Parser, Debug)]
pub struct AskArgs {
    /// Prompt text.
    pub prompt: String,

    /// File whose content is appended to the prompt.
    #[arg(long)]
    pub file_path: Option<PathBuf>,

    /// Uploaded prompt file handle to attach (repeatable).
    #[arg(long = "prompt-file-id", value_name = "ID")]
    pub prompt_file_ids: Vec<String>,

    /// Model name (default: provider.model).
    #[arg(long)]
    pub model: Option<String>,
}

/// Cache management subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum CacheAction {
    /// Remove all cached prompt handles.
    Clear,
    /// Show cache statistics (entry count and size).
    Stats,
    /// Print the cache file path.
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_batch_review() {
        let cli = Cli::try_parse_from([
            "kensa",
            "batch-review",
            "decoded_files.txt",
            "review/20260101",
            "--default-prompt",
            "docs/instruction-review.md",
            "--default-custom",
            "docs/instruction-review-custom.md",
            "--prompt-map",
            "docs/target-extensions.csv",
        ])
        .unwrap();
        match cli.command {
            Command::BatchReview(args) => {
                assert_eq!(args.list, PathBuf::from("decoded_files.txt"));
                assert_eq!(args.output_dir, PathBuf::from("review/20260101"));
                assert_eq!(args.prompt_map, Some(PathBuf::from("docs/target-extensions.csv")));
                assert!(args.model.is_none());
            }
            _ => panic!("expected BatchReview command"),
        }
    }

    #[test]
    fn parse_ask_with_repeated_prompt_ids() {
        let cli = Cli::try_parse_from([
            "kensa",
            "ask",
            "Review this",
            "--file-path",
            "src/a.ts",
            "--prompt-file-id",
            "files/a",
            "--prompt-file-id",
            "files/b",
        ])
        .unwrap();
        match cli.command {
            Command::Ask(args) => {
                assert_eq!(args.prompt, "Review this");
                assert_eq!(args.file_path, Some(PathBuf::from("src/a.ts")));
                assert_eq!(args.prompt_file_ids, vec!["files/a", "files/b"]);
            }
            _ => panic!("expected Ask command"),
        }
    }

    #[test]
    fn parse_decode_raw_flag() {
        let cli = Cli::try_parse_from(["kensa", "decode", "--raw", "src/a.ts,docs/b.md"]).unwrap();
        match cli.command {
            Command::Decode(args) => assert_eq!(args.raw.as_deref(), Some("src/a.ts,docs/b.md")),
            _ => panic!("expected Decode command"),
        }
    }

    #[test]
    fn parse_cache_actions() {
        for (arg, expected) in [("clear", "Clear"), ("stats", "Stats"), ("path", "Path")] {
            let cli = Cli::try_parse_from(["kensa", "cache", arg]).unwrap();
            match cli.command {
                Command::Cache { action } => assert_eq!(format!("{action:?}"), expected),
                _ => panic!("expected Cache command"),
            }
        }
    }

    #[test]
    fn batch_review_requires_positionals() {
        assert!(Cli::try_parse_from(["kensa", "batch-review", "list.txt"]).is_err());
    }

    #[test]
    fn clap_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
