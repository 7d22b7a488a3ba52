//! kensa: changed-file decoding and LLM review driver for CI.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use kensa::cache::{self, PromptAssetCache};
use kensa::changes::list;
use kensa::config::Config;
use kensa::constants;
use kensa::env::Env;
use kensa::extensions::ExtensionTable;
use kensa::models::GenerateRequest;
use kensa::orchestrator::{BatchReviewOrchestrator, PromptPlan};
use kensa::pipeline::{self, PipelineSummary};
use kensa::providers::ModelBackend;
use kensa::providers::gemini::GeminiProvider;

use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::args::{
    AskArgs, BatchReviewArgs, CacheAction, Cli, Command, DecodeArgs, ExtensionsArgs, ReviewArgs,
    UploadPromptArgs,
};

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

/// Log to stderr, filtered by `KENSA_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_env(constants::ENV_LOG)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let env = Env::real();
    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    let config = Config::load(Some(&cwd), &env).context("failed to load configuration")?;

    match cli.command {
        Command::Decode(args) => run_decode(args, &config),
        Command::Extensions(args) => run_extensions(args, &config),
        Command::Review(args) => run_review(args, &config, &env).await,
        Command::BatchReview(args) => run_batch_review(args, &config).await,
        Command::UploadPrompt(args) => run_upload_prompt(args, &config).await,
        Command::Ask(args) => run_ask(args, &config).await,
        Command::Cache { action } => run_cache(action, &config),
    }
}

/// Decode the raw changed-file string and write the review list.
fn run_decode(args: DecodeArgs, config: &Config) -> Result<()> {
    let output = args.output.unwrap_or_else(|| config.review.code_list.clone());
    let raw = args.raw.unwrap_or_default();

    if raw.trim().is_empty() {
        list::write_list(&output, &[])?;
        cli::status_info("No changed files to decode.");
        return Ok(());
    }

    let table_path = args
        .extensions
        .unwrap_or_else(|| config.review.prompt_map.clone());
    let table = ExtensionTable::load(&table_path).context("failed to load extension table")?;

    let set = pipeline::decode_to_list(&raw, &table, &config.filter, &output)
        .context("failed to write review list")?;

    if set.accepted.is_empty() {
        cli::status_info("No changed files qualify for review.");
    } else {
        cli::status_ok(format!(
            "{} file(s) queued for review in {} ({} skipped)",
            set.accepted.len(),
            output.display(),
            set.rejected.len(),
        ));
    }
    Ok(())
}

/// Print one glob pattern per allow-listed extension.
fn run_extensions(args: ExtensionsArgs, config: &Config) -> Result<()> {
    let path = args.csv.unwrap_or_else(|| config.review.prompt_map.clone());
    let table = ExtensionTable::load(&path).context("failed to load extension table")?;
    for pattern in table.glob_patterns() {
        println!("{pattern}");
    }
    Ok(())
}

/// The full CI review step.
async fn run_review(args: ReviewArgs, config: &Config, env: &Env) -> Result<()> {
    let review = &config.review;
    if !pipeline::has_review_targets(&[&review.code_list, &review.ocr_list]) {
        cli::status_info("No files to review.");
        PipelineSummary::empty()
            .emit(env)
            .context("failed to write pipeline summary")?;
        return Ok(());
    }

    let mut orchestrator = build_orchestrator(config, args.model.as_deref())?;
    let base_dir = args.base_dir.unwrap_or_else(|| review.base_dir.clone());
    let output_dir = pipeline::determine_review_dir(&base_dir)
        .with_context(|| format!("failed to create review directory under {}", base_dir.display()))?;
    cli::status_info(format!("Writing reviews to {}", output_dir.display()));

    let outcome = pipeline::review_lists(&mut orchestrator, review, &output_dir)
        .await
        .context("review failed")?;

    report_cache(orchestrator);
    PipelineSummary::for_dir(&output_dir)
        .emit(env)
        .context("failed to write pipeline summary")?;

    if outcome.any_failure() {
        cli::status_fail(format!("{} file(s) could not be reviewed", outcome.failed));
        bail!(
            "{} of {} review(s) failed; see the failure documents in {}",
            outcome.failed,
            outcome.reviewed + outcome.failed,
            output_dir.display(),
        );
    }
    cli::status_ok(format!("{} file(s) reviewed", outcome.reviewed));
    Ok(())
}

/// Review one list into an explicit output directory.
async fn run_batch_review(args: BatchReviewArgs, config: &Config) -> Result<()> {
    if !args.list.exists() {
        bail!("file list not found: {}", args.list.display());
    }
    if !list::has_entries(&args.list) {
        cli::status_warn(format!("{} lists no files", args.list.display()));
    }

    let table = match &args.prompt_map {
        Some(path) => Some(ExtensionTable::load(path).context("failed to load prompt map")?),
        None => None,
    };
    let plan = PromptPlan {
        table: table.as_ref(),
        default_prompt: args
            .default_prompt
            .unwrap_or_else(|| config.review.default_prompt.clone()),
        default_custom_prompt: Some(
            args.default_custom
                .unwrap_or_else(|| config.review.default_custom_prompt.clone()),
        ),
    };

    let mut orchestrator = build_orchestrator(config, args.model.as_deref())?;
    let outcome = pipeline::review_list(&mut orchestrator, &args.list, &plan, &args.output_dir)
        .await
        .context("batch review failed")?;
    report_cache(orchestrator);

    if outcome.any_failure() {
        bail!(
            "{} of {} review(s) failed",
            outcome.failed,
            outcome.reviewed + outcome.failed,
        );
    }
    cli::status_ok(format!(
        "{} file(s) reviewed into {}",
        outcome.reviewed,
        args.output_dir.display(),
    ));
    Ok(())
}

/// Resolve a prompt file through the cache and print its handle name.
async fn run_upload_prompt(args: UploadPromptArgs, config: &Config) -> Result<()> {
    let provider = GeminiProvider::new(&config.provider).context("failed to set up Gemini client")?;
    let mut cache = PromptAssetCache::load(&config.cache.path, config.cache.poll_settings());
    let asset = cache
        .resolve(&provider, &args.path)
        .await
        .with_context(|| format!("failed to upload {}", args.path.display()))?;
    println!("{}", asset.remote.name);
    Ok(())
}

/// One-shot generation, optionally with a file and uploaded prompts.
async fn run_ask(args: AskArgs, config: &Config) -> Result<()> {
    let provider = GeminiProvider::new(&config.provider).context("failed to set up Gemini client")?;

    let mut text = args.prompt;
    if let Some(path) = &args.file_path {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        text = format!("{text}\n\n{}", kensa::orchestrator::review_request_text(path, &content));
    }

    let poll = config.cache.poll_settings();
    let mut files = Vec::with_capacity(args.prompt_file_ids.len());
    for id in &args.prompt_file_ids {
        match cache::wait_until_active(&provider, id, poll).await {
            Ok(file) => files.push(file),
            Err(e) => {
                tracing::warn!(name = %id, "skipping prompt file: {e}");
                cli::status_warn(format!("Skipping prompt file {id}: {e}"));
            }
        }
    }

    let request = GenerateRequest {
        model: config.provider.resolve_model(args.model.as_deref()),
        text,
        files,
    };
    let response = provider.generate(&request).await.context("generation failed")?;
    println!("{response}");
    Ok(())
}

/// Manage the prompt upload cache.
fn run_cache(action: CacheAction, config: &Config) -> Result<()> {
    let mut cache = PromptAssetCache::load(&config.cache.path, config.cache.poll_settings());

    match action {
        CacheAction::Clear => {
            let stats = cache.clear().context("failed to clear cache")?;
            println!(
                "Cleared {} cached prompt handle(s) ({}).",
                stats.entries,
                stats.human_size(),
            );
        }
        CacheAction::Stats => {
            let stats = cache.stats();
            println!("Cache entries: {}", stats.entries);
            println!("Cache size:    {}", stats.human_size());
        }
        CacheAction::Path => println!("{}", display_path(cache.path())),
    }
    Ok(())
}

fn build_orchestrator(config: &Config, model: Option<&str>) -> Result<BatchReviewOrchestrator> {
    let provider = GeminiProvider::new(&config.provider).context("failed to set up Gemini client")?;
    let backend: Arc<dyn ModelBackend> = Arc::new(provider);
    let cache = PromptAssetCache::load(&config.cache.path, config.cache.poll_settings());
    Ok(BatchReviewOrchestrator::new(
        backend,
        cache,
        config.provider.resolve_model(model),
    ))
}

fn report_cache(orchestrator: BatchReviewOrchestrator) {
    let stats = orchestrator.into_cache().stats();
    tracing::debug!(
        entries = stats.entries,
        size = %stats.human_size(),
        "prompt upload cache after run"
    );
}

fn display_path(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
