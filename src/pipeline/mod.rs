//! CI pipeline glue around the batch orchestrator.
//!
//! Decides whether a run has anything to review, picks the dated output
//! directory, and renders the `key=value` summary consumed by later
//! workflow steps.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use thiserror::Error;

use crate::changes::{self, ChangeError, ChangeSet, FilterRules, list};
use crate::config::{FilterConfig, ReviewConfig};
use crate::constants::REVIEW_DOCUMENT_EXTENSION;
use crate::env::Env;
use crate::extensions::{ExtensionError, ExtensionTable};
use crate::orchestrator::{
    BatchOutcome, BatchReviewOrchestrator, OrchestratorError, PromptPlan, plan_targets,
};

/// Errors that abort a pipeline step.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Extension(#[from] ExtensionError),

    #[error(transparent)]
    Change(#[from] ChangeError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// Decode and filter the raw changed-file string and write the accepted
/// paths to `output`. Nothing accepted removes `output`.
pub fn decode_to_list(
    raw: &str,
    table: &ExtensionTable,
    filter: &FilterConfig,
    output: &Path,
) -> Result<ChangeSet, ChangeError> {
    let rules = FilterRules::new(table.extensions(), filter);
    let set = changes::collect_changes(raw, &rules);
    list::write_list(output, &set.accepted)?;
    Ok(set)
}

/// Review every path listed in `list_path` into `output_dir`.
pub async fn review_list(
    orchestrator: &mut BatchReviewOrchestrator,
    list_path: &Path,
    plan: &PromptPlan<'_>,
    output_dir: &Path,
) -> Result<BatchOutcome, PipelineError> {
    let paths = list::read_list(list_path)?;
    let targets = plan_targets(&paths, plan, output_dir);
    Ok(orchestrator.run(&targets, output_dir).await?)
}

/// The full review step: the code list with per-extension prompts, then
/// the OCR list with the default prompts only. Absent lists are skipped.
pub async fn review_lists(
    orchestrator: &mut BatchReviewOrchestrator,
    review: &ReviewConfig,
    output_dir: &Path,
) -> Result<BatchOutcome, PipelineError> {
    let mut total = BatchOutcome::default();
    let defaults = PromptPlan {
        table: None,
        default_prompt: review.default_prompt.clone(),
        default_custom_prompt: Some(review.default_custom_prompt.clone()),
    };

    if review.code_list.exists() {
        tracing::info!(list = %review.code_list.display(), "reviewing code files");
        let table = ExtensionTable::load(&review.prompt_map)?;
        let plan = PromptPlan {
            table: Some(&table),
            ..defaults.clone()
        };
        total.absorb(review_list(orchestrator, &review.code_list, &plan, output_dir).await?);
    }

    if review.ocr_list.exists() {
        tracing::info!(list = %review.ocr_list.display(), "reviewing OCR output");
        total.absorb(review_list(orchestrator, &review.ocr_list, &defaults, output_dir).await?);
    }

    Ok(total)
}

/// Returns `true` if any of the list files has at least one entry.
pub fn has_review_targets<P: AsRef<Path>>(lists: &[P]) -> bool {
    lists.iter().any(|p| list::has_entries(p.as_ref()))
}

/// Create `<base>/<YYYYMMDD>` for today, or `<base>/<YYYYMMDD>_N` with the
/// smallest free `N` when earlier runs already used the date.
pub fn determine_review_dir(base: &Path) -> io::Result<PathBuf> {
    review_dir_for(base, Local::now().date_naive())
}

fn review_dir_for(base: &Path, date: NaiveDate) -> io::Result<PathBuf> {
    let stamp = date.format("%Y%m%d").to_string();
    let mut dir = base.join(&stamp);
    let mut index = 0;
    while dir.exists() {
        index += 1;
        dir = base.join(format!("{stamp}_{index}"));
    }
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Number of review documents in `dir` (0 when it does not exist).
pub fn count_reviews(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|x| x == REVIEW_DOCUMENT_EXTENSION)
        })
        .count()
}

/// Summary handed to later workflow steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Directory holding the artifacts; `None` when nothing was produced.
    pub files_to_commit: Option<PathBuf>,
    pub review_count: usize,
}

impl PipelineSummary {
    /// Summary for a run that produced nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Summary for `dir`, counting the documents it holds.
    pub fn for_dir(dir: &Path) -> Self {
        let review_count = count_reviews(dir);
        Self {
            files_to_commit: (review_count > 0).then(|| dir.to_path_buf()),
            review_count,
        }
    }

    /// Print the summary to stdout and append it to `$GITHUB_OUTPUT` when set.
    pub fn emit(&self, env: &Env) -> io::Result<()> {
        print!("{self}");
        io::stdout().flush()?;

        if let Some(path) = env.path(crate::constants::ENV_GITHUB_OUTPUT) {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            write!(file, "{self}")?;
        }
        Ok(())
    }
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.files_to_commit, self.review_count) {
            (Some(dir), count) if count > 0 => {
                writeln!(f, "files_to_commit={}", dir.display())?;
                writeln!(f, "review_count={count}")
            }
            _ => {
                writeln!(f, "files_to_commit=")?;
                writeln!(f, "review_count=0")
            }
        }
    }
}
