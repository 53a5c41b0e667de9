//! Directory traversal utilities
//!
//! Filesystem search (tier 3 resolution) and `discover` both enumerate candidate
//! workflow files through this module.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Maximum directory depth walked below the search root
pub const MAX_DIRECTORY_DEPTH: usize = 32;

/// Check whether `path` has one of the given extensions (without dots)
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| extensions.iter().any(|wanted| wanted == ext))
        .unwrap_or(false)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Walk a directory recursively to find files with specific extensions
///
/// Hidden files and directories (`.git`, `.cache`, ...) are skipped, as are entries
/// that cannot be read. The iterator is lazy so callers can stop early with `take`.
pub fn walk_files_with_extensions<'a>(
    dir: &Path,
    extensions: &'a [String],
) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(dir)
        .max_depth(MAX_DIRECTORY_DEPTH)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(move |entry| match entry {
            Ok(e) if e.file_type().is_file() && has_extension(e.path(), extensions) => {
                Some(e.into_path())
            }
            Ok(_) => None,
            Err(err) => {
                tracing::debug!("Skipping unreadable entry during walk: {}", err);
                None
            }
        })
}
