use std::ops::Range;
use std::path::PathBuf;

use tree_sitter::Node;

use super::{Applied, Mutate, MutationError, splice};
use crate::Language;
use crate::catalog::{MutationKind, MutationType};
use crate::mutants::{Site, Span};
use crate::parser::parse_tree;

/// Replacement subtree built by an expression mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Original source kept verbatim.
    Source(String),
    Not(Box<Expr>),
}

impl Expr {
    pub fn render(&self) -> String {
        match self {
            Expr::Source(text) => text.clone(),
            Expr::Not(inner) => format!("!{}", inner.render()),
        }
    }
}

/// The syntactic slot an expression occupies in its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceSlot {
    Condition,
    Argument,
    AssignmentRhs,
    Return,
    ListElement,
    UnaryOperand,
    BinaryOperand,
    CastOperand,
    Parenthesized,
    Statement,
}

impl SpliceSlot {
    pub fn for_parent(parent_kind: &str) -> Option<Self> {
        match parent_kind {
            "if_statement" | "for_statement" | "for_clause" | "if_expression" | "while_expression" => {
                Some(SpliceSlot::Condition)
            }
            "argument_list" | "arguments" => Some(SpliceSlot::Argument),
            "assignment_statement"
            | "short_var_declaration"
            | "var_spec"
            | "let_declaration"
            | "assignment_expression"
            | "field_initializer" => Some(SpliceSlot::AssignmentRhs),
            // A closure body and a match arm value are what the enclosing
            // expression evaluates to.
            "return_statement" | "return_expression" | "closure_expression" | "match_arm" => {
                Some(SpliceSlot::Return)
            }
            "expression_list" | "literal_element" | "keyed_element" | "array_expression" => {
                Some(SpliceSlot::ListElement)
            }
            "unary_expression" => Some(SpliceSlot::UnaryOperand),
            "binary_expression" => Some(SpliceSlot::BinaryOperand),
            "type_cast_expression" => Some(SpliceSlot::CastOperand),
            "parenthesized_expression" => Some(SpliceSlot::Parenthesized),
            "block" | "expression_statement" => Some(SpliceSlot::Statement),
            _ => None,
        }
    }

    /// Slots that never need the expression parenthesized.
    fn takes_bare_expression(self) -> bool {
        matches!(
            self,
            SpliceSlot::Condition
                | SpliceSlot::Argument
                | SpliceSlot::AssignmentRhs
                | SpliceSlot::Return
                | SpliceSlot::ListElement
        )
    }

    /// Where `replacement` goes when `target` sits in this slot of `parent`,
    /// and the text written there.
    pub fn splice(self, parent: Node<'_>, target: Node<'_>, replacement: &Expr) -> (Range<usize>, String) {
        if self == SpliceSlot::Parenthesized {
            let outer = parent
                .parent()
                .and_then(|grandparent| SpliceSlot::for_parent(grandparent.kind()));
            if outer.is_some_and(SpliceSlot::takes_bare_expression) {
                // `if (!ok)` becomes `if !!ok`
                return (parent.byte_range(), replacement.render());
            }
        }
        // A prefix `!` binds tighter than every binary operator and cast, so
        // the negated operand never needs new parentheses.
        (target.byte_range(), replacement.render())
    }
}

/// Rebuilds the expression at a site and splices it back by parent slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionMutation {
    mutation_type: MutationType,
    language: Language,
    file: PathBuf,
    span: Span,
    original: String,
}

impl ExpressionMutation {
    pub fn new(mutation_type: MutationType, site: &Site) -> Result<Self, MutationError> {
        if mutation_type.kind() != MutationKind::Expression {
            return Err(MutationError::Unapplicable {
                mutation_type,
                parent: site.parent_kind.to_string(),
            });
        }
        Ok(ExpressionMutation {
            mutation_type,
            language: site.language,
            file: site.file.clone(),
            span: site.span,
            original: site.original.clone(),
        })
    }

    pub fn reconstruct(&self) -> Expr {
        match self.mutation_type {
            MutationType::InvertLogicalNot => Expr::Not(Box::new(Expr::Source(self.original.clone()))),
            _ => Expr::Source(self.original.clone()),
        }
    }

    fn locate<'t>(&self, root: Node<'t>) -> Option<Node<'t>> {
        let range = self.span.range();
        let mut node = root.descendant_for_byte_range(range.start, range.end)?;
        while node.byte_range() == range {
            if node.kind() == "unary_expression" {
                return Some(node);
            }
            node = node.parent()?;
        }
        None
    }
}

impl Mutate for ExpressionMutation {
    fn apply(&self, source: &str) -> Result<Applied, MutationError> {
        let found = source.get(self.span.range()).unwrap_or("");
        if found != self.original {
            return Err(MutationError::StaleSite {
                offset: self.span.start_byte,
                expected: self.original.clone(),
                found: found.to_string(),
            });
        }

        let tree = parse_tree(self.language, &self.file, source)
            .map_err(|e| MutationError::Unparsable(e.to_string()))?;
        let target = self
            .locate(tree.root_node())
            .ok_or_else(|| MutationError::StaleSite {
                offset: self.span.start_byte,
                expected: self.original.clone(),
                found: found.to_string(),
            })?;
        let parent = target.parent().ok_or_else(|| MutationError::Unapplicable {
            mutation_type: self.mutation_type,
            parent: "<root>".to_string(),
        })?;
        let slot = SpliceSlot::for_parent(parent.kind()).ok_or_else(|| {
            MutationError::Unapplicable {
                mutation_type: self.mutation_type,
                parent: parent.kind().to_string(),
            }
        })?;

        let (range, text) = slot.splice(parent, target, &self.reconstruct());
        let original = source[range.clone()].to_string();
        let mutated = splice(source, range.clone(), &original, &text)?;
        Ok(Applied {
            start: range.start,
            original,
            replacement: text,
            source: mutated,
        })
    }

    fn describe(&self) -> String {
        format!(
            "{}: `{}` -> `{}`",
            self.mutation_type,
            self.original,
            self.reconstruct().render()
        )
    }
}
