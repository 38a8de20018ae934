//! File mutation guard.
//!
//! A [`FileGuard`] owns one file for one mutant's apply/test/rollback cycle.
//! Guards on the same path serialize through a shared [`FileLocks`] registry;
//! guards on different paths never wait on each other.

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Condvar, Mutex};

use crate::copy_tree::walk_files;
use crate::mutator::{Applied, Mutate, Mutation, MutationError};

pub const BACKUP_SUFFIX: &str = ".mutest.bak";

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error("could not verify restore of {path} ({detail}); original bytes are in {backup}")]
    Restore {
        path: PathBuf,
        backup: PathBuf,
        detail: String,
    },
}

/// Registry of files currently owned by a guard.
#[derive(Debug, Default)]
pub struct FileLocks {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other guard holds `path`, then take it.
    pub fn lock(&self, path: &Path) -> FileLock<'_> {
        let mut held = self.held.lock();
        while held.contains(path) {
            self.released.wait(&mut held);
        }
        held.insert(path.to_path_buf());
        FileLock {
            locks: self,
            path: path.to_path_buf(),
        }
    }

    pub fn is_locked(&self, path: &Path) -> bool {
        self.held.lock().contains(path)
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }
}

/// Exclusive claim on one path; released on drop.
#[derive(Debug)]
pub struct FileLock<'l> {
    locks: &'l FileLocks,
    path: PathBuf,
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.path);
        self.locks.released.notify_all();
    }
}

struct Active {
    mutation: Mutation,
    applied: Applied,
}

/// Scoped owner of one file's bytes.
///
/// The snapshot is taken at acquisition. [`FileGuard::release`] restores and
/// verifies it; if the guard is dropped without a release (early return,
/// panic unwinding) the restore still happens, with failures logged.
pub struct FileGuard<'l> {
    path: PathBuf,
    snapshot: String,
    active: Option<Active>,
    _lock: FileLock<'l>,
}

impl<'l> FileGuard<'l> {
    pub fn acquire(locks: &'l FileLocks, path: &Path) -> Result<Self, GuardError> {
        let lock = locks.lock(path);
        let snapshot = std::fs::read_to_string(path).map_err(|source| GuardError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(FileGuard {
            path: path.to_path_buf(),
            snapshot,
            active: None,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    /// Apply `mutation` to the snapshot and write the result to disk.
    ///
    /// The original bytes go to a sidecar backup first, so a killed process
    /// leaves something [`recover_interrupted`] can restore from.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<&Applied, GuardError> {
        if self.active.is_some() {
            self.restore()?;
        }
        let applied = mutation.apply(&self.snapshot)?;
        let backup = backup_path(&self.path);
        write_atomic(&backup, &self.snapshot)?;
        if let Err(e) = write_atomic(&self.path, &applied.source) {
            let _ = std::fs::remove_file(&backup);
            return Err(e);
        }
        let active = self.active.insert(Active {
            mutation: mutation.clone(),
            applied,
        });
        Ok(&active.applied)
    }

    /// Restore the snapshot and verify it. Consumes the guard; the file lock
    /// is released afterwards.
    pub fn release(mut self) -> Result<(), GuardError> {
        self.restore()
    }

    fn restore(&mut self) -> Result<(), GuardError> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        let backup = backup_path(&self.path);
        let current = std::fs::read_to_string(&self.path).unwrap_or_default();
        let restored = match active.mutation.rollback(&active.applied, &current) {
            Ok(text) if text == self.snapshot => text,
            Ok(_) | Err(_) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "file changed while mutated; restoring from snapshot"
                );
                self.snapshot.clone()
            }
        };

        let failure = |detail: String| GuardError::Restore {
            path: self.path.clone(),
            backup: backup.clone(),
            detail,
        };
        write_atomic(&self.path, &restored).map_err(|e| failure(e.to_string()))?;
        let on_disk = std::fs::read_to_string(&self.path)
            .map_err(|e| failure(format!("read back failed: {e}")))?;
        if on_disk != self.snapshot {
            return Err(failure("content differs from snapshot".to_string()));
        }

        if let Err(e) = std::fs::remove_file(&backup) {
            tracing::warn!(backup = %backup.display(), error = %e, "failed to remove backup");
        }
        Ok(())
    }
}

impl Drop for FileGuard<'_> {
    fn drop(&mut self) {
        if self.active.is_none() {
            return;
        }
        if let Err(e) = self.restore() {
            tracing::error!(path = %self.path.display(), error = %e, "restore failed");
        }
    }
}

pub fn backup_path(source_file: &Path) -> PathBuf {
    let mut backup = source_file.to_path_buf();
    let name = format!(
        ".{}{}",
        source_file.file_name().unwrap_or_default().to_string_lossy(),
        BACKUP_SUFFIX
    );
    backup.set_file_name(name);
    backup
}

fn original_for_backup(backup: &Path) -> Option<PathBuf> {
    let name = backup.file_name()?.to_str()?;
    let original = name.strip_prefix('.')?.strip_suffix(BACKUP_SUFFIX)?;
    if original.is_empty() {
        return None;
    }
    Some(backup.with_file_name(original))
}

/// Restore every file under `root` whose backup survived an interrupted run.
/// Returns the restored paths, relative to `root`.
pub fn recover_interrupted(root: &Path) -> Result<Vec<PathBuf>, GuardError> {
    let skip = |_: &Path, name: &str| matches!(name, ".git" | "target" | "node_modules");
    let files = walk_files(root, &skip).map_err(|source| GuardError::Read {
        path: root.to_path_buf(),
        source,
    })?;

    let mut restored = Vec::new();
    for backup in files {
        let Some(original) = original_for_backup(&backup) else {
            continue;
        };
        let backup_abs = root.join(&backup);
        let bytes = std::fs::read_to_string(&backup_abs).map_err(|source| GuardError::Read {
            path: backup_abs.clone(),
            source,
        })?;
        write_atomic(&root.join(&original), &bytes)?;
        std::fs::remove_file(&backup_abs).map_err(|source| GuardError::Write {
            path: backup_abs.clone(),
            source,
        })?;
        tracing::warn!(file = %original.display(), "restored file from interrupted run");
        restored.push(original);
    }
    Ok(restored)
}

/// Replace `path` with `contents` via a temp file in the same directory.
/// Existing permissions are kept.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), GuardError> {
    let err = |source: io::Error| GuardError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(err)?;
    tmp.write_all(contents.as_bytes()).map_err(err)?;
    tmp.as_file().sync_all().map_err(err)?;
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions()).map_err(err)?;
    }
    tmp.persist(path).map_err(|e| err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_path_format() {
        assert_eq!(
            backup_path(Path::new("/tmp/calc.go")),
            Path::new("/tmp/.calc.go.mutest.bak")
        );
    }

    #[test]
    fn backup_name_maps_back_to_original() {
        assert_eq!(
            original_for_backup(Path::new("pkg/.calc.go.mutest.bak")),
            Some(PathBuf::from("pkg/calc.go"))
        );
        assert_eq!(original_for_backup(Path::new("pkg/calc.go")), None);
        assert_eq!(original_for_backup(Path::new(".mutest.bak")), None);
    }
}
