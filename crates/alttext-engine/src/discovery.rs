use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::EngineError;

/// Directory names skipped when ignore rules are on, besides hidden entries.
const IGNORED_DIRS: &[&str] = &["node_modules"];

/// Collect files under `root` whose extension is one of `extensions`
/// (case-insensitive, with or without the leading dot), sorted by path.
///
/// A file `root` is returned on its own when its extension matches. With
/// `respect_ignore`, hidden entries below the root and `node_modules`
/// directories are not descended into.
pub fn discover_files(
    root: &Path,
    extensions: &[&str],
    respect_ignore: bool,
) -> Result<Vec<PathBuf>, EngineError> {
    if !root.exists() {
        return Err(EngineError::PathNotFound(root.to_path_buf()));
    }

    if root.is_file() {
        return Ok(if has_extension(root, extensions) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !respect_ignore || e.depth() == 0 || !is_ignored(e));

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
                    files.push(entry.into_path());
                }
            }
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
            }
        }
    }

    files.sort();
    tracing::debug!(root = %root.display(), count = files.len(), "discovered files");
    Ok(files)
}

fn is_ignored(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && IGNORED_DIRS.contains(&name.as_ref()))
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    extensions
        .iter()
        .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
}
