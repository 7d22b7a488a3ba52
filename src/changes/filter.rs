//! Review-scope filter for decoded paths.
//!
//! Applies, in order: blank check, excluded directory prefixes, the
//! pipeline's own generated list files, declaration-only suffixes, and
//! finally the extension allow-list.

use std::collections::HashSet;
use std::fmt;

use crate::config::FilterConfig;

/// Allow-list plus exclusion rules for one pipeline run.
#[derive(Debug, Clone)]
pub struct FilterRules {
    allowed: HashSet<String>,
    excluded_prefixes: Vec<String>,
    excluded_suffixes: Vec<String>,
    generated_lists: Vec<String>,
}

impl FilterRules {
    /// Build rules from an allow-list and the configured exclusions.
    pub fn new<I, S>(allowed: I, config: &FilterConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .filter_map(|e| normalize_extension(e.as_ref()))
                .collect(),
            excluded_prefixes: config
                .excluded_prefixes
                .iter()
                .map(|p| normalize_path(p).to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            excluded_suffixes: config
                .excluded_suffixes
                .iter()
                .filter_map(|s| normalize_extension(s))
                .collect(),
            generated_lists: config.generated_lists.clone(),
        }
    }
}

/// Why a path was left out of the review set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Blank,
    ExcludedPrefix(String),
    GeneratedList,
    DeclarationFile(String),
    NoExtension,
    NotAllowed(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Blank => write!(f, "blank path"),
            Rejection::ExcludedPrefix(prefix) => write!(f, "under excluded directory '{prefix}'"),
            Rejection::GeneratedList => write!(f, "pipeline-generated list file"),
            Rejection::DeclarationFile(suffix) => write!(f, "declaration file ({suffix})"),
            Rejection::NoExtension => write!(f, "no file extension"),
            Rejection::NotAllowed(suffix) => write!(f, "extension {suffix} not in allow-list"),
        }
    }
}

/// Filter decision for a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

/// Evaluate a decoded path against the rules.
pub fn evaluate(path: &str, rules: &FilterRules) -> Verdict {
    if path.trim().is_empty() {
        return Verdict::Rejected(Rejection::Blank);
    }

    let normalized = normalize_path(path);
    let lowered = normalized.to_lowercase();
    if let Some(prefix) = rules
        .excluded_prefixes
        .iter()
        .find(|p| lowered.starts_with(p.as_str()))
    {
        return Verdict::Rejected(Rejection::ExcludedPrefix(prefix.clone()));
    }

    let name = base_name(&normalized);
    if rules.generated_lists.iter().any(|g| g == name) {
        return Verdict::Rejected(Rejection::GeneratedList);
    }

    let candidates = extension_candidates(&normalized);
    let (Some(full), Some(last)) = (candidates.first(), candidates.last()) else {
        return Verdict::Rejected(Rejection::NoExtension);
    };

    if let Some(suffix) = rules
        .excluded_suffixes
        .iter()
        .find(|s| full.ends_with(s.as_str()))
    {
        return Verdict::Rejected(Rejection::DeclarationFile(suffix.clone()));
    }

    if rules.allowed.contains(last) || rules.allowed.contains(full) {
        Verdict::Accepted
    } else {
        Verdict::Rejected(Rejection::NotAllowed(full.clone()))
    }
}

/// Returns `true` if the path is in scope for review.
pub fn accept(path: &str, rules: &FilterRules) -> bool {
    evaluate(path, rules) == Verdict::Accepted
}

/// Lowercased extension suffixes from most to least specific.
///
/// `src/a.test.d.ts` yields `[".test.d.ts", ".d.ts", ".ts"]`. Leading
/// dots of hidden files are not extensions, so `.eslintrc` yields nothing.
pub fn extension_candidates(path: &str) -> Vec<String> {
    let name = base_name(path).trim_start_matches('.');
    let parts: Vec<String> = name
        .split('.')
        .skip(1)
        .filter(|p| !p.is_empty())
        .map(|p| format!(".{}", p.to_lowercase()))
        .collect();

    (0..parts.len()).map(|i| parts[i..].concat()).collect()
}

/// Normalize an extension to lowercase with a single leading dot.
///
/// Returns `None` for blank input.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!(".{}", trimmed.to_lowercase()))
    }
}

/// Forward slashes only, without a leading `./`.
fn normalize_path(path: &str) -> String {
    let slashed = path.trim().replace('\\', "/");
    let mut rest = slashed.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
