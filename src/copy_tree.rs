use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::Language;
use crate::guard::BACKUP_SUFFIX;

const SKIP_NAMES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    "node_modules",
    "target",
    ".mutest-state.json",
];

/// Directories the Go toolchain never builds as part of the module.
const SKIP_SOURCE_DIRS: &[&str] = &["vendor", "testdata"];

const ROOT_MARKERS: &[&str] = &["go.mod", "Cargo.toml", ".git"];

fn should_skip(name: &str) -> bool {
    SKIP_NAMES.iter().any(|s| *s == name) || name.ends_with(BACKUP_SUFFIX)
}

fn copy_dir_filtered(src: &Path, dst: &Path) -> std::io::Result<u64> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    let entries = WalkDir::new(src)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !should_skip(&e.file_name().to_string_lossy()));
    for entry in entries {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).map_err(std::io::Error::other)?;
        let dst_path = dst.join(relative);
        let ft = entry.file_type();
        if ft.is_dir() {
            fs::create_dir_all(&dst_path)?;
        } else if ft.is_file() {
            fs::copy(entry.path(), &dst_path)?;
            copied += 1;
        }
        // Skip symlinks and other special files
    }
    Ok(copied)
}

/// Find the module root by walking up from `start` looking for markers.
/// Falls back to `start` itself (or its parent, for a file).
pub fn find_project_root(start: &Path) -> PathBuf {
    let first = if start.is_dir() {
        start
    } else {
        start.parent().unwrap_or(start)
    };
    let mut dir = first;
    loop {
        if ROOT_MARKERS.iter().any(|marker| dir.join(marker).exists()) {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => break,
        }
    }
    first.to_path_buf()
}

/// Copy the module tree into `dest_root`, returning how many files were copied.
pub fn copy_tree(project_root: &Path, dest_root: &Path) -> std::io::Result<u64> {
    let copied = copy_dir_filtered(project_root, dest_root)?;
    tracing::info!(
        from = %project_root.display(),
        to = %dest_root.display(),
        files = copied,
        "copied module tree"
    );
    Ok(copied)
}

/// Every regular file under `root`, relative to it, in sorted order.
/// Directories for which `skip_dir(relative, name)` holds are not entered.
pub fn walk_files(
    root: &Path,
    skip_dir: &dyn Fn(&Path, &str) -> bool,
) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| {
            if !e.file_type().is_dir() {
                return true;
            }
            let relative = e.path().strip_prefix(root).unwrap_or(e.path());
            !skip_dir(relative, &e.file_name().to_string_lossy())
        });
    for entry in entries {
        let entry = entry?;
        if entry.file_type().is_file() {
            let relative = entry.path().strip_prefix(root).map_err(std::io::Error::other)?;
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Mutable source files of `language` under `root`, relative to it.
///
/// `exclude` holds glob patterns matched against the relative path with `/`
/// separators. Nested modules (a subdirectory with its own manifest) are
/// skipped along with hidden, vendored and test-data directories.
pub fn find_source_files(
    root: &Path,
    language: Language,
    exclude: &[String],
) -> std::io::Result<Vec<PathBuf>> {
    let manifest = match language {
        Language::Go => "go.mod",
        Language::Rust => "Cargo.toml",
    };
    let skip_dir = |relative: &Path, name: &str| {
        should_skip(name)
            || name.starts_with('.')
            || name.starts_with('_')
            || SKIP_SOURCE_DIRS.contains(&name)
            || root.join(relative).join(manifest).exists()
    };
    let files = walk_files(root, &skip_dir)?
        .into_iter()
        .filter(|path| language.is_mutable_source(path))
        .filter(|path| {
            let normalized = path.to_string_lossy().replace('\\', "/");
            !exclude
                .iter()
                .any(|pattern| glob_match::glob_match(pattern, &normalized))
        })
        .collect();
    Ok(files)
}
