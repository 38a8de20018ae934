use std::path::{Path, PathBuf};

use crate::config::ConfigError;
use crate::coverage::CoverageError;
use crate::guard::GuardError;
use crate::mutants::StatusError;
use crate::parser::ParseError;
use crate::runner::RunnerError;

/// Run-level failure. Per-mutant problems never surface here; they end up
/// as a terminal status instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Coverage(#[from] CoverageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Status(#[from] StatusError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl EngineError {
    /// Source on disk may be left mutated.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, EngineError::Guard(GuardError::Restore { .. }))
    }

    /// The file an operator should check by hand after an integrity failure.
    pub fn suspect_file(&self) -> Option<&Path> {
        match self {
            EngineError::Guard(GuardError::Restore { path, .. }) => Some(path),
            _ => None,
        }
    }
}
