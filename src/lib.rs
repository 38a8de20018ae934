pub mod catalog;
pub mod config;
pub mod copy_tree;
pub mod coverage;
pub mod discovery;
pub mod error;
pub mod guard;
pub mod mutants;
pub mod mutator;
pub mod output;
pub mod parser;
pub mod runner;
pub mod scheduler;
pub mod state;

pub use error::EngineError;

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Rust,
}

impl Language {
    /// Detect the language of a module root from its manifest.
    pub fn detect(root: &Path) -> Option<Self> {
        if root.join("go.mod").exists() {
            return Some(Language::Go);
        }
        if root.join("Cargo.toml").exists() {
            return Some(Language::Rust);
        }
        None
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::Go => "Go",
            Language::Rust => "Rust",
        }
    }

    pub fn grammar(self) -> tree_sitter::Language {
        match self {
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }

    /// Whether `path` is a source file of this language that may be mutated.
    /// Go test files are never mutated.
    pub fn is_mutable_source(self, path: &Path) -> bool {
        if detect_language(path) != Some(self) {
            return false;
        }
        match self {
            Language::Go => !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_test.go")),
            Language::Rust => true,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn detect_language(path: &Path) -> Option<Language> {
    match path.extension()?.to_str()? {
        "go" => Some(Language::Go),
        "rs" => Some(Language::Rust),
        _ => None,
    }
}
