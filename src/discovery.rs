//! Discovery walker: one lazy pre-order pass over a syntax tree.
//!
//! Every leaf token is looked up in the catalog together with its parent kind.
//! Each applicable, enabled type yields one [`Mutant`]; several types at the
//! same token share its [`Site`].

use std::collections::VecDeque;

use tree_sitter::{Node, TreeCursor};

use crate::Language;
use crate::catalog::{self, EnabledTypes, MutationKind, MutationType};
use crate::coverage::CoverageIndex;
use crate::mutants::{Mutant, Site, Span};
use crate::parser::{ParsedFile, find_function, node_text};

const CONTEXT_LINES: usize = 2;

pub struct Discovery<'a> {
    file: &'a ParsedFile,
    cursor: TreeCursor<'a>,
    lines: Vec<&'a str>,
    enabled: &'a EnabledTypes,
    coverage: Option<&'a dyn CoverageIndex>,
    pending: VecDeque<Mutant>,
    done: bool,
}

impl<'a> Discovery<'a> {
    /// Walk the whole file. Without a coverage index every site is `Runnable`.
    pub fn new(
        file: &'a ParsedFile,
        enabled: &'a EnabledTypes,
        coverage: Option<&'a dyn CoverageIndex>,
    ) -> Self {
        Self::from_node(file, file.tree().root_node(), enabled, coverage)
    }

    /// Walk only the body of function `name`, or `None` if the file has no
    /// such function.
    pub fn scoped(
        file: &'a ParsedFile,
        name: &str,
        enabled: &'a EnabledTypes,
        coverage: Option<&'a dyn CoverageIndex>,
    ) -> Option<Self> {
        let root = file.tree().root_node();
        let function = find_function(root, name, file.source(), file.language())?;
        Some(Self::from_node(file, function, enabled, coverage))
    }

    fn from_node(
        file: &'a ParsedFile,
        node: Node<'a>,
        enabled: &'a EnabledTypes,
        coverage: Option<&'a dyn CoverageIndex>,
    ) -> Self {
        Discovery {
            file,
            cursor: node.walk(),
            lines: file.source().lines().collect(),
            enabled,
            coverage,
            pending: VecDeque::new(),
            done: false,
        }
    }

    /// Step to the next node in pre-order. The cursor never leaves the
    /// subtree it was created on.
    fn advance(&mut self, descend: bool) -> bool {
        if descend && self.cursor.goto_first_child() {
            return true;
        }
        loop {
            if self.cursor.goto_next_sibling() {
                return true;
            }
            if !self.cursor.goto_parent() {
                return false;
            }
        }
    }

    fn skips_subtree(&self, node: Node<'_>) -> bool {
        match self.file.language() {
            Language::Rust => {
                node.kind() == "mod_item"
                    && node
                        .child_by_field_name("name")
                        .is_some_and(|name| node_text(name, self.file.source()) == "tests")
            }
            Language::Go => false,
        }
    }

    fn visit(&mut self, node: Node<'a>) {
        if node.is_named() || node.child_count() > 0 {
            return;
        }
        let Some(parent) = node.parent() else {
            return;
        };
        let types = catalog::applicable(self.file.language(), node.kind(), parent.kind());
        for &mutation_type in types {
            if !self.enabled.contains(mutation_type) {
                continue;
            }
            if let Some(site) = self.site_for(mutation_type, node, parent) {
                let covered = self.coverage.is_none_or(|index| {
                    index.covers(&site.file, site.span.start_line, site.span.start_column)
                });
                tracing::debug!(
                    file = %site.file.display(),
                    line = site.span.start_line,
                    mutation = %mutation_type,
                    covered,
                    "discovered mutant"
                );
                self.pending.push_back(Mutant::new(site, mutation_type, covered));
            }
        }
    }

    /// Token mutations sit on the token itself; expression mutations sit on
    /// the expression the token belongs to.
    fn site_for(&self, mutation_type: MutationType, token: Node<'a>, parent: Node<'a>) -> Option<Site> {
        let (node, context) = match mutation_type.kind() {
            MutationKind::Token => (token, parent),
            MutationKind::Expression => (parent, parent.parent()?),
        };
        let span = Span::of(node);
        let (context_before, context_after) =
            get_context(&self.lines, span.start_line - 1, CONTEXT_LINES);
        Some(Site {
            file: self.file.path().to_path_buf(),
            language: self.file.language(),
            span,
            node_kind: node.kind(),
            parent_kind: context.kind(),
            original: node_text(node, self.file.source()).to_string(),
            context_before,
            context_after,
        })
    }
}

impl Iterator for Discovery<'_> {
    type Item = Mutant;

    fn next(&mut self) -> Option<Mutant> {
        loop {
            if let Some(mutant) = self.pending.pop_front() {
                return Some(mutant);
            }
            if self.done {
                return None;
            }
            let node = self.cursor.node();
            let skip = self.skips_subtree(node);
            if !skip {
                self.visit(node);
            }
            if !self.advance(!skip) {
                self.done = true;
            }
        }
    }
}

/// Lazily discover mutants across `files` in order, numbering them from 1.
pub fn discover<'a>(
    files: &'a [ParsedFile],
    enabled: &'a EnabledTypes,
    coverage: Option<&'a dyn CoverageIndex>,
) -> impl Iterator<Item = Mutant> + 'a {
    files
        .iter()
        .flat_map(move |file| Discovery::new(file, enabled, coverage))
        .enumerate()
        .map(|(idx, mutant)| mutant.with_id(idx + 1))
}

pub fn discover_all(
    files: &[ParsedFile],
    enabled: &EnabledTypes,
    coverage: Option<&dyn CoverageIndex>,
) -> Vec<Mutant> {
    discover(files, enabled, coverage).collect()
}

fn get_context(lines: &[&str], line_idx: usize, range: usize) -> (Vec<String>, Vec<String>) {
    let line_idx = line_idx.min(lines.len());
    let start = line_idx.saturating_sub(range);
    let end = (line_idx + range + 1).min(lines.len());
    let before = lines[start..line_idx].iter().map(|s| s.to_string()).collect();
    let after = if line_idx + 1 < end {
        lines[line_idx + 1..end].iter().map(|s| s.to_string()).collect()
    } else {
        vec![]
    };
    (before, after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_clamped_at_file_edges() {
        let lines = ["a", "b", "c"];
        let (before, after) = get_context(&lines, 0, 2);
        assert!(before.is_empty());
        assert_eq!(after, vec!["b", "c"]);

        let (before, after) = get_context(&lines, 2, 2);
        assert_eq!(before, vec!["a", "b"]);
        assert!(after.is_empty());
    }
}
