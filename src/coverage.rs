//! Coverage collaborator.
//!
//! The engine only asks one question: does any test execute this position?
//! [`ProfileIndex`] answers it from a `go test -coverprofile` file.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

pub trait CoverageIndex: Send + Sync {
    /// `file` is relative to the module root; `line` and `column` are 1-based.
    fn covers(&self, file: &Path, line: usize, column: usize) -> bool;
}

/// Index for toolchains without a profile format: every position counts as
/// covered so that sites are still tested.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeCovered;

impl CoverageIndex for AssumeCovered {
    fn covers(&self, _file: &Path, _line: usize, _column: usize) -> bool {
        true
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoverageError {
    #[error("failed to read coverage profile {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("coverage profile has no `mode:` header")]
    MissingMode,
    #[error("malformed coverage profile line {line}: `{content}`")]
    Malformed { line: usize, content: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    start_line: usize,
    start_column: usize,
    end_line: usize,
    end_column: usize,
    count: u64,
}

impl Block {
    fn contains(&self, line: usize, column: usize) -> bool {
        (self.start_line, self.start_column) <= (line, column)
            && (line, column) <= (self.end_line, self.end_column)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileIndex {
    blocks: HashMap<PathBuf, Vec<Block>>,
}

impl ProfileIndex {
    /// Parse profile text. Paths in the profile are import paths; the
    /// `module_path` prefix is stripped so keys are root-relative.
    pub fn parse(text: &str, module_path: &str) -> Result<Self, CoverageError> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        match lines.next() {
            Some((_, header)) if header.starts_with("mode:") => {}
            _ => return Err(CoverageError::MissingMode),
        }

        let mut index = ProfileIndex::default();
        for (idx, line) in lines {
            let (file, block) = parse_block(line).ok_or_else(|| CoverageError::Malformed {
                line: idx + 1,
                content: line.to_string(),
            })?;
            index
                .blocks
                .entry(relative_to_module(file, module_path))
                .or_default()
                .push(block);
        }
        Ok(index)
    }

    pub fn load(path: &Path, module_path: &str) -> Result<Self, CoverageError> {
        let text = std::fs::read_to_string(path).map_err(|source| CoverageError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, module_path)
    }

    pub fn file_count(&self) -> usize {
        self.blocks.len()
    }
}

impl CoverageIndex for ProfileIndex {
    fn covers(&self, file: &Path, line: usize, column: usize) -> bool {
        self.blocks
            .get(file)
            .is_some_and(|blocks| blocks.iter().any(|b| b.count > 0 && b.contains(line, column)))
    }
}

// name.go:L1.C1,L2.C2 statements count
fn parse_block(line: &str) -> Option<(&str, Block)> {
    let mut fields = line.trim().rsplitn(3, ' ');
    let count = fields.next()?.parse().ok()?;
    let _statements: u64 = fields.next()?.parse().ok()?;
    let (file, range) = fields.next()?.rsplit_once(':')?;
    let (start, end) = range.split_once(',')?;
    let (start_line, start_column) = position(start)?;
    let (end_line, end_column) = position(end)?;
    Some((
        file,
        Block {
            start_line,
            start_column,
            end_line,
            end_column,
            count,
        },
    ))
}

fn position(text: &str) -> Option<(usize, usize)> {
    let (line, column) = text.split_once('.')?;
    Some((line.parse().ok()?, column.parse().ok()?))
}

fn relative_to_module(file: &str, module_path: &str) -> PathBuf {
    let trimmed = file
        .strip_prefix(module_path)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(file);
    PathBuf::from(trimmed)
}

/// The `module` path declared in `root/go.mod`.
pub fn read_module_path(root: &Path) -> Option<String> {
    let text = std::fs::read_to_string(root.join("go.mod")).ok()?;
    text.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        Some(rest.trim().trim_matches('"').to_string())
    })
}
