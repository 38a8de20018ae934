use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::Language;
use crate::catalog::MutationType;

/// Byte range plus 1-based line/column bounds of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    pub fn of(node: Node<'_>) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Span {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1,
            start_column: start.column + 1,
            end_line: end.row + 1,
            end_column: end.column + 1,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start_byte..self.end_byte
    }

    pub fn len(&self) -> usize {
        self.end_byte - self.start_byte
    }

    pub fn is_empty(&self) -> bool {
        self.start_byte == self.end_byte
    }
}

/// A located, context-resolved point in a source file.
#[derive(Debug, Clone, Serialize)]
pub struct Site {
    /// Path relative to the module root.
    pub file: PathBuf,
    pub language: Language,
    pub span: Span,
    pub node_kind: &'static str,
    /// Kind of the node's immediate parent; this is what resolved the site.
    pub parent_kind: &'static str,
    pub original: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

impl Site {
    /// Directory of the file relative to the module root, i.e. its package.
    pub fn package(&self) -> &Path {
        self.file.parent().unwrap_or(Path::new(""))
    }

    pub fn location(&self) -> String {
        format!(
            "{}:{}:{}",
            self.file.display(),
            self.span.start_line,
            self.span.start_column
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    NotCovered,
    Runnable,
    Killed,
    Lived,
    TimedOut,
    NotViable,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Killed | Status::Lived | Status::TimedOut | Status::NotViable
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::NotCovered => "NOT COVERED",
            Status::Runnable => "RUNNABLE",
            Status::Killed => "KILLED",
            Status::Lived => "LIVED",
            Status::TimedOut => "TIMED OUT",
            Status::NotViable => "NOT VIABLE",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("illegal mutant status transition {from} -> {to}")]
pub struct StatusError {
    pub from: Status,
    pub to: Status,
}

/// One mutation type bound to one site.
///
/// Site and type are fixed at creation. Status is seeded from coverage and
/// moves forward at most once more, from `Runnable` to a terminal status.
#[derive(Debug, Clone)]
pub struct Mutant {
    id: usize,
    mutation_type: MutationType,
    site: Site,
    status: Status,
    diff: Option<String>,
    duration: Option<Duration>,
}

impl Mutant {
    pub fn new(site: Site, mutation_type: MutationType, covered: bool) -> Self {
        Mutant {
            id: 0,
            mutation_type,
            site,
            status: if covered {
                Status::Runnable
            } else {
                Status::NotCovered
            },
            diff: None,
            duration: None,
        }
    }

    /// Assign the discovery ordinal used to report mutants in a stable order.
    pub fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn mutation_type(&self) -> MutationType {
        self.mutation_type
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn diff(&self) -> Option<&str> {
        self.diff.as_deref()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn finalize(&mut self, status: Status) -> Result<(), StatusError> {
        if self.status != Status::Runnable || !status.is_terminal() {
            return Err(StatusError {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        Ok(())
    }

    pub(crate) fn record_diff(&mut self, diff: String) {
        self.diff = Some(diff);
    }

    pub(crate) fn record_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }
}

pub fn generate_diff(original: &str, mutated: &str) -> String {
    use similar::TextDiff;
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                output.push_str(&format!("- {}", change));
            }
            similar::ChangeTag::Insert => {
                output.push_str(&format!("+ {}", change));
            }
            _ => {}
        }
    }
    output
}
