//! Changed-file intake: path decoding, review-scope filtering, and list files.

pub mod decode;
pub mod filter;
pub mod list;

use std::path::PathBuf;

use indexmap::IndexSet;
use thiserror::Error;

pub use decode::{decode, split_raw};
pub use filter::{FilterRules, Rejection, Verdict, accept, evaluate};

/// Errors reading or writing path list files.
#[derive(Error, Debug)]
pub enum ChangeError {
    #[error("failed to read path list {path}: {source}")]
    ReadList {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write path list {path}: {source}")]
    WriteList {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result of decoding and filtering a raw changed-file string.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Decoded paths in scope for review, in input order, without duplicates.
    pub accepted: Vec<String>,
    /// Decoded paths that were filtered out, with the reason.
    pub rejected: Vec<(String, Rejection)>,
}

/// Decode every token of the comma-separated input and filter it.
///
/// Every rejected path is logged with its reason.
pub fn collect_changes(raw: &str, rules: &FilterRules) -> ChangeSet {
    let mut accepted = IndexSet::new();
    let mut rejected = Vec::new();

    for token in split_raw(raw) {
        let decoded = decode(token);
        match evaluate(&decoded, rules) {
            Verdict::Accepted => {
                if decoded != token {
                    tracing::debug!(raw = token, decoded = %decoded, "decoded changed path");
                }
                if !accepted.insert(decoded.clone()) {
                    tracing::debug!(path = %decoded, "duplicate changed path ignored");
                }
            }
            Verdict::Rejected(reason) => {
                tracing::info!(path = %decoded, raw = token, "skipping: {reason}");
                rejected.push((decoded, reason));
            }
        }
    }

    ChangeSet {
        accepted: accepted.into_iter().collect(),
        rejected,
    }
}
