use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::Result;

/// Returns true if `path` is an existing directory.
pub fn is_dir(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_dir()
}

/// Finds all files below `root` that are named `name` or have `name` as their extension, ignoring
/// case. Hidden directories are searched too. Paths are returned relative to `root` in sorted
/// order.
pub fn all_with_extension(root: &Path, name: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{root}/**/*",
        root = Pattern::escape(&root.to_string_lossy())
    );
    let options = MatchOptions {
        require_literal_leading_dot: false,
        ..MatchOptions::new()
    };

    let mut files = Vec::new();
    for entry in glob::glob_with(&pattern, options)? {
        let path = entry?;
        if !path.is_file() || !has_name_or_extension(&path, name) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
        files.push(relative);
    }
    files.sort();
    Ok(files)
}

fn has_name_or_extension(path: &Path, name: &str) -> bool {
    let matches = |value: Option<&std::ffi::OsStr>| {
        value
            .and_then(|value| value.to_str())
            .is_some_and(|value| value.eq_ignore_ascii_case(name))
    };
    matches(path.file_name()) || matches(path.extension())
}
