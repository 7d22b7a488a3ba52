//! Review target planning: prompt selection and artifact naming.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::constants::REVIEW_DOCUMENT_EXTENSION;
use crate::extensions::ExtensionTable;
use crate::models::ReviewTarget;

/// Prompt sources for a batch.
#[derive(Debug, Clone)]
pub struct PromptPlan<'a> {
    /// Per-extension overrides; `None` means defaults for every file.
    pub table: Option<&'a ExtensionTable>,
    pub default_prompt: PathBuf,
    /// Attached only when it exists on disk.
    pub default_custom_prompt: Option<PathBuf>,
}

impl PromptPlan<'_> {
    /// Ordered prompt files for one path.
    ///
    /// The most specific table entry with a base prompt wins; otherwise
    /// the default pair is used.
    pub fn prompts_for(&self, path: &str) -> Vec<PathBuf> {
        let (base, custom) = match self.table.and_then(|t| t.prompts_for(path)) {
            Some(pair) => (pair.base.to_path_buf(), pair.custom.map(Path::to_path_buf)),
            None => (self.default_prompt.clone(), self.default_custom_prompt.clone()),
        };

        let mut prompts = vec![base];
        if let Some(custom) = custom {
            if custom.exists() {
                prompts.push(custom);
            } else {
                tracing::debug!(path = %custom.display(), "custom prompt not found, not attaching");
            }
        }
        prompts
    }
}

/// Build one target per path, in input order.
///
/// Artifact names are the file stem plus `.md`. Names already taken in
/// this batch or present in `output_dir` get a `_1`, `_2`... suffix so no
/// artifact is overwritten.
pub fn plan_targets(paths: &[String], prompts: &PromptPlan<'_>, output_dir: &Path) -> Vec<ReviewTarget> {
    let mut taken = HashSet::new();

    paths
        .iter()
        .map(|path| {
            let artifact = unique_artifact_path(path, output_dir, &mut taken);
            ReviewTarget {
                source: PathBuf::from(path),
                prompts: prompts.prompts_for(path),
                artifact,
            }
        })
        .collect()
}

fn unique_artifact_path(source: &str, output_dir: &Path, taken: &mut HashSet<String>) -> PathBuf {
    let stem = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "review".to_string());

    let mut name = format!("{stem}.{REVIEW_DOCUMENT_EXTENSION}");
    let mut index = 0;
    while taken.contains(&name) || output_dir.join(&name).exists() {
        index += 1;
        name = format!("{stem}_{index}.{REVIEW_DOCUMENT_EXTENSION}");
    }
    taken.insert(name.clone());
    output_dir.join(name)
}
