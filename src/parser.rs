//! Parser collaborator: source text in, tree-sitter syntax tree out.

use std::io;
use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser, Tree};

use crate::{Language, detect_language};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported source file {0}")]
    Unsupported(PathBuf),
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to load {0} grammar")]
    Grammar(Language),
    #[error("parser produced no tree for {0}")]
    NoTree(PathBuf),
    #[error("syntax error in {path} at line {line}")]
    Syntax { path: PathBuf, line: usize },
}

/// A source file together with its syntax tree.
pub struct ParsedFile {
    language: Language,
    path: PathBuf,
    source: String,
    tree: Tree,
}

impl ParsedFile {
    pub fn language(&self) -> Language {
        self.language
    }

    /// Path relative to the module root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }
}

impl std::fmt::Debug for ParsedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedFile")
            .field("language", &self.language)
            .field("path", &self.path)
            .field("bytes", &self.source.len())
            .finish()
    }
}

/// Read and parse `root/relative`.
pub fn parse_file(root: &Path, relative: &Path) -> Result<ParsedFile, ParseError> {
    let language =
        detect_language(relative).ok_or_else(|| ParseError::Unsupported(relative.to_path_buf()))?;
    let full = root.join(relative);
    let source = std::fs::read_to_string(&full).map_err(|source| ParseError::Read {
        path: full.clone(),
        source,
    })?;
    parse_source(language, relative, source)
}

pub fn parse_source(
    language: Language,
    path: &Path,
    source: String,
) -> Result<ParsedFile, ParseError> {
    let tree = parse_tree(language, path, &source)?;
    let root = tree.root_node();
    if root.has_error() {
        let line = first_error(root).map_or(1, |n| n.start_position().row + 1);
        return Err(ParseError::Syntax {
            path: path.to_path_buf(),
            line,
        });
    }
    Ok(ParsedFile {
        language,
        path: path.to_path_buf(),
        source,
        tree,
    })
}

pub(crate) fn parse_tree(language: Language, path: &Path, source: &str) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language.grammar())
        .map_err(|_| ParseError::Grammar(language))?;
    parser
        .parse(source, None)
        .ok_or_else(|| ParseError::NoTree(path.to_path_buf()))
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let count = node.child_count();
    for i in 0..count {
        if let Some(child) = node.child(i) {
            if child.has_error() {
                if let Some(found) = first_error(child) {
                    return Some(found);
                }
            }
        }
    }
    None
}

pub(crate) fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

fn is_function(language: Language, kind: &str) -> bool {
    match language {
        Language::Go => kind == "function_declaration" || kind == "method_declaration",
        Language::Rust => kind == "function_item",
    }
}

/// Find a function or method declaration by name.
pub(crate) fn find_function<'a>(
    node: Node<'a>,
    name: &str,
    source: &str,
    language: Language,
) -> Option<Node<'a>> {
    if is_function(language, node.kind()) {
        if let Some(name_node) = node.child_by_field_name("name") {
            if node_text(name_node, source) == name {
                return Some(node);
            }
        }
    }
    let count = node.child_count();
    for i in 0..count {
        if let Some(child) = node.child(i) {
            if let Some(found) = find_function(child, name, source, language) {
                return Some(found);
            }
        }
    }
    None
}

/// Names of every function and method declared in the file.
pub fn list_functions(file: &ParsedFile) -> Vec<String> {
    let mut names = Vec::new();
    collect_function_names(file.tree.root_node(), file, &mut names);
    names
}

fn collect_function_names(node: Node<'_>, file: &ParsedFile, names: &mut Vec<String>) {
    if is_function(file.language, node.kind()) {
        if let Some(name_node) = node.child_by_field_name("name") {
            names.push(node_text(name_node, &file.source).to_string());
        }
    }
    let count = node.child_count();
    for i in 0..count {
        if let Some(child) = node.child(i) {
            collect_function_names(child, file, names);
        }
    }
}
