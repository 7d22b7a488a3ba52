//! Plain-text path lists (one path per line).

use std::io;
use std::path::Path;

use super::ChangeError;

/// Read a path list, skipping blank lines and trimming whitespace.
pub fn read_list(path: &Path) -> Result<Vec<String>, ChangeError> {
    let content = std::fs::read_to_string(path).map_err(|source| ChangeError::ReadList {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Returns `true` if the list file exists and has at least one non-blank line.
///
/// Unreadable files count as empty.
pub fn has_entries(path: &Path) -> bool {
    read_list(path).is_ok_and(|entries| !entries.is_empty())
}

/// Write `paths` one per line.
///
/// An empty set removes any stale list instead, so downstream steps can
/// rely on "file absent" meaning "nothing qualified". Returns whether a
/// file was written.
pub fn write_list(path: &Path, paths: &[String]) -> Result<bool, ChangeError> {
    let write_err = |source| ChangeError::WriteList {
        path: path.to_path_buf(),
        source,
    };

    if paths.is_empty() {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(write_err(e)),
        }
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let mut content = paths.join("\n");
    content.push('\n');
    std::fs::write(path, content).map_err(write_err)?;
    Ok(true)
}
