use super::{Applied, Mutate, MutationError, splice};
use crate::catalog::MutationType;
use crate::mutants::{Site, Span};

/// Byte-exact swap of one operator or keyword token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMutation {
    mutation_type: MutationType,
    span: Span,
    original: String,
    replacement: &'static str,
}

impl TokenMutation {
    pub fn new(mutation_type: MutationType, site: &Site) -> Result<Self, MutationError> {
        let replacement = mutation_type.substitute(&site.original).ok_or_else(|| {
            MutationError::Unapplicable {
                mutation_type,
                parent: site.parent_kind.to_string(),
            }
        })?;
        Ok(TokenMutation {
            mutation_type,
            span: site.span,
            original: site.original.clone(),
            replacement,
        })
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn replacement(&self) -> &'static str {
        self.replacement
    }
}

impl Mutate for TokenMutation {
    fn apply(&self, source: &str) -> Result<Applied, MutationError> {
        let mutated = splice(source, self.span.range(), &self.original, self.replacement)?;
        Ok(Applied {
            start: self.span.start_byte,
            original: self.original.clone(),
            replacement: self.replacement.to_string(),
            source: mutated,
        })
    }

    fn describe(&self) -> String {
        format!(
            "{}: `{}` -> `{}`",
            self.mutation_type, self.original, self.replacement
        )
    }
}
