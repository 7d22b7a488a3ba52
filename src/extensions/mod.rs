//! Extension allow-list table.
//!
//! Loaded from a CSV file of `extension[,base_prompt,custom_prompt]` rows.
//! A header row is optional and detected by a first cell of `extension`;
//! with a header, columns may appear in any order.

use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

use crate::changes::filter::{extension_candidates, normalize_extension};

/// Errors while loading the extension table.
#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("extension table not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read extension table {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("malformed extension table: {0}")]
    Csv(#[from] csv::Error),
}

/// One allow-listed extension and its optional prompt overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowlistEntry {
    /// Lowercased, dot-prefixed extension (`.ts`, `.d.ts`).
    pub extension: String,
    pub base_prompt: Option<PathBuf>,
    pub custom_prompt: Option<PathBuf>,
}

/// Prompt files selected by the table for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptPair<'a> {
    /// The table entry that matched.
    pub extension: &'a str,
    pub base: &'a Path,
    pub custom: Option<&'a Path>,
}

/// Ordered extension table for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct ExtensionTable {
    entries: IndexMap<String, AllowlistEntry>,
}

/// Column positions resolved from the header (or the positional default).
struct Columns {
    extension: usize,
    base_prompt: Option<usize>,
    custom_prompt: Option<usize>,
}

impl Columns {
    const POSITIONAL: Columns = Columns {
        extension: 0,
        base_prompt: Some(1),
        custom_prompt: Some(2),
    };

    fn from_header(header: &csv::StringRecord) -> Self {
        let find = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));
        Columns {
            extension: find("extension").unwrap_or(0),
            base_prompt: find("base_prompt"),
            custom_prompt: find("custom_prompt"),
        }
    }
}

impl ExtensionTable {
    /// Load the table from a CSV file.
    pub fn load(path: &Path) -> Result<Self, ExtensionError> {
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ExtensionError::NotFound(path.to_path_buf()),
            _ => ExtensionError::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let table = Self::from_reader(file)?;
        if table.is_empty() {
            tracing::warn!(path = %path.display(), "no extensions found in extension table");
        }
        Ok(table)
    }

    /// Parse the table from any CSV source.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, ExtensionError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = ExtensionTable::default();
        let mut columns = Columns::POSITIONAL;

        for (index, record) in csv_reader.records().enumerate() {
            let record = record?;
            if index == 0
                && record
                    .get(0)
                    .is_some_and(|c| c.eq_ignore_ascii_case("extension"))
            {
                columns = Columns::from_header(&record);
                continue;
            }

            let cell = |i: Option<usize>| {
                i.and_then(|i| record.get(i))
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
            };

            let Some(extension) = cell(Some(columns.extension)).and_then(normalize_extension)
            else {
                continue;
            };

            if table.entries.contains_key(&extension) {
                tracing::warn!(extension = %extension, "duplicate extension row ignored");
                continue;
            }

            table.entries.insert(
                extension.clone(),
                AllowlistEntry {
                    extension,
                    base_prompt: cell(columns.base_prompt).map(PathBuf::from),
                    custom_prompt: cell(columns.custom_prompt).map(PathBuf::from),
                },
            );
        }

        Ok(table)
    }

    /// Allow-listed extensions in table order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Look up an entry by extension (any case, with or without dot).
    pub fn get(&self, extension: &str) -> Option<&AllowlistEntry> {
        normalize_extension(extension).and_then(|e| self.entries.get(&e))
    }

    /// The most specific entry for `path` that carries a base prompt.
    ///
    /// Tries the full compound suffix first, then progressively shorter
    /// suffixes down to the last single extension.
    pub fn prompts_for(&self, path: &str) -> Option<PromptPair<'_>> {
        extension_candidates(path)
            .iter()
            .filter_map(|candidate| self.entries.get(candidate))
            .find_map(|entry| {
                Some(PromptPair {
                    extension: &entry.extension,
                    base: entry.base_prompt.as_deref()?,
                    custom: entry.custom_prompt.as_deref(),
                })
            })
    }

    /// Glob patterns (`**/*.ts`) for workflow path filters.
    pub fn glob_patterns(&self) -> Vec<String> {
        self.extensions().map(|e| format!("**/*{e}")).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_table_with_header() {
        let csv = "extension,base_prompt,custom_prompt\n\
                   .ts,prompts/ts.md,prompts/ts-custom.md\n\
                   .py,,\n\
                   .java\n";
        let table = ExtensionTable::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.extensions().collect::<Vec<_>>(), vec![".ts", ".py", ".java"]);
        let ts = table.get("TS").unwrap();
        assert_eq!(ts.base_prompt, Some(PathBuf::from("prompts/ts.md")));
        assert_eq!(ts.custom_prompt, Some(PathBuf::from("prompts/ts-custom.md")));
        let py = table.get(".py").unwrap();
        assert_eq!(py.base_prompt, None);
        assert_eq!(py.custom_prompt, None);
    }

    #[test]
    fn parses_headerless_table() {
        let csv = ".ts\n.JS , base.md\n\n";
        let table = ExtensionTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.extensions().collect::<Vec<_>>(), vec![".ts", ".js"]);
        assert_eq!(table.get("js").unwrap().base_prompt, Some(PathBuf::from("base.md")));
    }

    #[test]
    fn header_columns_may_be_reordered() {
        let csv = "extension,custom_prompt,base_prompt\n.rs,custom.md,base.md\n";
        let table = ExtensionTable::from_reader(csv.as_bytes()).unwrap();
        let rs = table.get(".rs").unwrap();
        assert_eq!(rs.base_prompt, Some(PathBuf::from("base.md")));
        assert_eq!(rs.custom_prompt, Some(PathBuf::from("custom.md")));
    }

    #[test]
    fn extensions_without_dot_are_normalized() {
        let table = ExtensionTable::from_reader("ts\nd.ts\n".as_bytes()).unwrap();
        assert_eq!(table.extensions().collect::<Vec<_>>(), vec![".ts", ".d.ts"]);
    }

    #[test]
    fn duplicate_rows_keep_first() {
        let csv = ".ts,first.md\n.TS,second.md\n";
        let table = ExtensionTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(".ts").unwrap().base_prompt, Some(PathBuf::from("first.md")));
    }

    #[test]
    fn glob_patterns_follow_table_order() {
        let table = ExtensionTable::from_reader(".java\n.py\n.ts\n".as_bytes()).unwrap();
        assert_eq!(table.glob_patterns(), vec!["**/*.java", "**/*.py", "**/*.ts"]);
    }

    #[test]
    fn prompts_for_prefers_compound_extension() {
        let csv = ".ts,ts.md\n.test.ts,test-ts.md\n";
        let table = ExtensionTable::from_reader(csv.as_bytes()).unwrap();

        let pair = table.prompts_for("src/app.test.ts").unwrap();
        assert_eq!(pair.extension, ".test.ts");
        assert_eq!(pair.base, Path::new("test-ts.md"));
        assert_eq!(pair.custom, None);
        let pair = table.prompts_for("src/app.ts").unwrap();
        assert_eq!(pair.base, Path::new("ts.md"));
    }

    #[test]
    fn prompts_for_skips_entries_without_base_prompt() {
        let csv = ".ts,ts.md\n.spec.ts\n";
        let table = ExtensionTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.prompts_for("a.spec.ts").unwrap().extension, ".ts");
        assert!(table.prompts_for("a.py").is_none());
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let err = ExtensionTable::load(Path::new("/tmp/kensa_missing_table.csv")).unwrap_err();
        assert!(matches!(err, ExtensionError::NotFound(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target-extensions.csv");
        std::fs::write(&path, "extension,base_prompt,custom_prompt\n.java,,\n.py,,\n").unwrap();
        let table = ExtensionTable::load(&path).unwrap();
        assert_eq!(table.glob_patterns(), vec!["**/*.java", "**/*.py"]);
    }
}
