//! Applying and rolling back a single mutation on source text.
//!
//! Both mutation kinds go through [`Mutate`]; the scheduler only ever sees the
//! [`Mutation`] enum and never branches on the kind itself.

pub mod expression;
pub mod token;

use std::ops::Range;

pub use expression::{Expr, ExpressionMutation, SpliceSlot};
pub use token::TokenMutation;

use crate::catalog::{MutationKind, MutationType};
use crate::mutants::Mutant;

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// The text at the site no longer matches what discovery saw.
    #[error("stale site at byte {offset}: expected `{expected}`, found `{found}`")]
    StaleSite {
        offset: usize,
        expected: String,
        found: String,
    },
    #[error("{mutation_type} cannot be applied under `{parent}`")]
    Unapplicable {
        mutation_type: MutationType,
        parent: String,
    },
    #[error("mutated source could not be re-parsed: {0}")]
    Unparsable(String),
}

/// Result of applying a mutation: which bytes changed and the new source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Byte offset of the rewritten span in the original source.
    pub start: usize,
    pub original: String,
    pub replacement: String,
    pub source: String,
}

impl Applied {
    /// The rewritten span as it sits in the mutated source.
    pub fn mutated_range(&self) -> Range<usize> {
        self.start..self.start + self.replacement.len()
    }
}

pub trait Mutate {
    fn apply(&self, source: &str) -> Result<Applied, MutationError>;

    /// Undo `applied` on `current`, which must still hold the mutated span.
    fn rollback(&self, applied: &Applied, current: &str) -> Result<String, MutationError> {
        splice(current, applied.mutated_range(), &applied.replacement, &applied.original)
    }

    fn describe(&self) -> String;
}

/// A mutation ready to apply, one variant per [`MutationKind`].
#[derive(Debug, Clone)]
pub enum Mutation {
    Token(TokenMutation),
    Expression(ExpressionMutation),
}

impl Mutation {
    pub fn for_mutant(mutant: &Mutant) -> Result<Self, MutationError> {
        let mutation_type = mutant.mutation_type();
        match mutation_type.kind() {
            MutationKind::Token => {
                TokenMutation::new(mutation_type, mutant.site()).map(Mutation::Token)
            }
            MutationKind::Expression => {
                ExpressionMutation::new(mutation_type, mutant.site()).map(Mutation::Expression)
            }
        }
    }
}

impl Mutate for Mutation {
    fn apply(&self, source: &str) -> Result<Applied, MutationError> {
        match self {
            Mutation::Token(m) => m.apply(source),
            Mutation::Expression(m) => m.apply(source),
        }
    }

    fn rollback(&self, applied: &Applied, current: &str) -> Result<String, MutationError> {
        match self {
            Mutation::Token(m) => m.rollback(applied, current),
            Mutation::Expression(m) => m.rollback(applied, current),
        }
    }

    fn describe(&self) -> String {
        match self {
            Mutation::Token(m) => m.describe(),
            Mutation::Expression(m) => m.describe(),
        }
    }
}

/// Replace `range` of `source` with `with`, after checking it holds `expected`.
pub(crate) fn splice(
    source: &str,
    range: Range<usize>,
    expected: &str,
    with: &str,
) -> Result<String, MutationError> {
    let found = source.get(range.clone()).unwrap_or("");
    if found != expected {
        return Err(MutationError::StaleSite {
            offset: range.start,
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    let mut out = String::with_capacity(source.len() - found.len() + with.len());
    out.push_str(&source[..range.start]);
    out.push_str(with);
    out.push_str(&source[range.end..]);
    Ok(out)
}
