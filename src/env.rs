//! Process environment access.
//!
//! CI inputs arrive as environment variables that are often exported as
//! empty strings. Everything here treats blank values as unset. Tests
//! build an [`Env::mock`] instead of mutating the real process
//! environment.

use std::collections::HashMap;
use std::path::PathBuf;

/// Source of environment variables: the process, or a fixed map.
#[derive(Clone, Debug, Default)]
pub struct Env {
    fixed: Option<HashMap<String, String>>,
}

impl Env {
    /// Read from the process environment.
    pub fn real() -> Self {
        Self { fixed: None }
    }

    /// Read only from the given pairs.
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        let fixed = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { fixed: Some(fixed) }
    }

    fn raw(&self, name: &str) -> Option<String> {
        match &self.fixed {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }

    /// Trimmed value of `name`, or `None` when unset or blank.
    pub fn non_blank(&self, name: &str) -> Option<String> {
        self.raw(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// [`non_blank`](Self::non_blank) as a path.
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.non_blank(name).map(PathBuf::from)
    }
}
