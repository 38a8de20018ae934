//! Closed registry of mutation types.
//!
//! Which types apply at a syntax node is decided by a lookup keyed on
//! (language, token kind, parent kind). Supporting a new ambiguous token or a
//! new grammar means adding rows to [`RULES`], not new branches.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationType {
    ArithmeticBase,
    ConditionalsBoundary,
    ConditionalsNegation,
    IncrementDecrement,
    InvertAssignments,
    InvertBitwise,
    InvertBitwiseAssignments,
    InvertLogical,
    InvertLogicalNot,
    InvertLoopCtrl,
    InvertNegatives,
    RemoveSelfAssignments,
}

/// How a mutation type rewrites source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Swap one operator or keyword token for another.
    Token,
    /// Rebuild the enclosing expression and splice it back.
    Expression,
}

impl MutationType {
    pub const ALL: [MutationType; 12] = [
        MutationType::ArithmeticBase,
        MutationType::ConditionalsBoundary,
        MutationType::ConditionalsNegation,
        MutationType::IncrementDecrement,
        MutationType::InvertAssignments,
        MutationType::InvertBitwise,
        MutationType::InvertBitwiseAssignments,
        MutationType::InvertLogical,
        MutationType::InvertLogicalNot,
        MutationType::InvertLoopCtrl,
        MutationType::InvertNegatives,
        MutationType::RemoveSelfAssignments,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MutationType::ArithmeticBase => "ARITHMETIC_BASE",
            MutationType::ConditionalsBoundary => "CONDITIONALS_BOUNDARY",
            MutationType::ConditionalsNegation => "CONDITIONALS_NEGATION",
            MutationType::IncrementDecrement => "INCREMENT_DECREMENT",
            MutationType::InvertAssignments => "INVERT_ASSIGNMENTS",
            MutationType::InvertBitwise => "INVERT_BITWISE",
            MutationType::InvertBitwiseAssignments => "INVERT_BITWISE_ASSIGNMENTS",
            MutationType::InvertLogical => "INVERT_LOGICAL",
            MutationType::InvertLogicalNot => "INVERT_LOGICAL_NOT",
            MutationType::InvertLoopCtrl => "INVERT_LOOP_CTRL",
            MutationType::InvertNegatives => "INVERT_NEGATIVES",
            MutationType::RemoveSelfAssignments => "REMOVE_SELF_ASSIGNMENTS",
        }
    }

    pub fn kind(self) -> MutationKind {
        match self {
            MutationType::InvertLogicalNot => MutationKind::Expression,
            _ => MutationKind::Token,
        }
    }

    /// Static default used when no configuration mentions the type.
    pub fn enabled_by_default(self) -> bool {
        match self {
            MutationType::ArithmeticBase
            | MutationType::ConditionalsBoundary
            | MutationType::ConditionalsNegation
            | MutationType::IncrementDecrement
            | MutationType::InvertLogicalNot
            | MutationType::InvertNegatives => true,
            MutationType::InvertAssignments
            | MutationType::InvertBitwise
            | MutationType::InvertBitwiseAssignments
            | MutationType::InvertLogical
            | MutationType::InvertLoopCtrl
            | MutationType::RemoveSelfAssignments => false,
        }
    }

    /// Accepts `ARITHMETIC_BASE`, `arithmetic_base` and `arithmetic-base`.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.name() == wanted)
    }

    /// The single replacement token this type produces for `token`.
    pub fn substitute(self, token: &str) -> Option<&'static str> {
        SUBSTITUTIONS
            .iter()
            .find(|(t, from, _)| *t == self && *from == token)
            .map(|(_, _, to)| *to)
    }
}

impl fmt::Display for MutationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

use MutationType::*;

const COMPOUND_ARITH: &[&str] = &["+=", "-=", "*=", "/=", "%="];

static SUBSTITUTIONS: &[(MutationType, &str, &str)] = &[
    (ArithmeticBase, "+", "-"),
    (ArithmeticBase, "-", "+"),
    (ArithmeticBase, "*", "/"),
    (ArithmeticBase, "/", "*"),
    (ArithmeticBase, "%", "*"),
    (ConditionalsBoundary, ">", ">="),
    (ConditionalsBoundary, ">=", ">"),
    (ConditionalsBoundary, "<", "<="),
    (ConditionalsBoundary, "<=", "<"),
    (ConditionalsNegation, "==", "!="),
    (ConditionalsNegation, "!=", "=="),
    (ConditionalsNegation, ">", "<="),
    (ConditionalsNegation, "<=", ">"),
    (ConditionalsNegation, "<", ">="),
    (ConditionalsNegation, ">=", "<"),
    (IncrementDecrement, "++", "--"),
    (IncrementDecrement, "--", "++"),
    (InvertAssignments, "+=", "-="),
    (InvertAssignments, "-=", "+="),
    (InvertAssignments, "*=", "/="),
    (InvertAssignments, "/=", "*="),
    (InvertAssignments, "%=", "*="),
    (InvertBitwise, "&", "|"),
    (InvertBitwise, "|", "&"),
    (InvertBitwise, "^", "&"),
    (InvertBitwise, "&^", "&"),
    (InvertBitwise, "<<", ">>"),
    (InvertBitwise, ">>", "<<"),
    (InvertBitwiseAssignments, "&=", "|="),
    (InvertBitwiseAssignments, "|=", "&="),
    (InvertBitwiseAssignments, "^=", "&="),
    (InvertBitwiseAssignments, "&^=", "&="),
    (InvertBitwiseAssignments, "<<=", ">>="),
    (InvertBitwiseAssignments, ">>=", "<<="),
    (InvertLogical, "&&", "||"),
    (InvertLogical, "||", "&&"),
    (InvertLoopCtrl, "break", "continue"),
    (InvertLoopCtrl, "continue", "break"),
    (InvertNegatives, "-", "+"),
    (RemoveSelfAssignments, "+=", "="),
    (RemoveSelfAssignments, "-=", "="),
    (RemoveSelfAssignments, "*=", "="),
    (RemoveSelfAssignments, "/=", "="),
    (RemoveSelfAssignments, "%=", "="),
    (RemoveSelfAssignments, "&=", "="),
    (RemoveSelfAssignments, "|=", "="),
    (RemoveSelfAssignments, "^=", "="),
    (RemoveSelfAssignments, "&^=", "="),
    (RemoveSelfAssignments, "<<=", "="),
    (RemoveSelfAssignments, ">>=", "="),
];

struct Rule {
    language: Language,
    parent: &'static str,
    tokens: &'static [&'static str],
    types: &'static [MutationType],
}

static RULES: &[Rule] = &[
    // Go
    Rule {
        language: Language::Go,
        parent: "binary_expression",
        tokens: &["+", "-", "*", "/", "%"],
        types: &[ArithmeticBase],
    },
    Rule {
        language: Language::Go,
        parent: "binary_expression",
        tokens: &[">", ">=", "<", "<="],
        types: &[ConditionalsBoundary, ConditionalsNegation],
    },
    Rule {
        language: Language::Go,
        parent: "binary_expression",
        tokens: &["==", "!="],
        types: &[ConditionalsNegation],
    },
    Rule {
        language: Language::Go,
        parent: "binary_expression",
        tokens: &["&", "|", "^", "&^", "<<", ">>"],
        types: &[InvertBitwise],
    },
    Rule {
        language: Language::Go,
        parent: "binary_expression",
        tokens: &["&&", "||"],
        types: &[InvertLogical],
    },
    Rule {
        language: Language::Go,
        parent: "unary_expression",
        tokens: &["-"],
        types: &[InvertNegatives],
    },
    Rule {
        language: Language::Go,
        parent: "unary_expression",
        tokens: &["!"],
        types: &[InvertLogicalNot],
    },
    Rule {
        language: Language::Go,
        parent: "inc_statement",
        tokens: &["++"],
        types: &[IncrementDecrement],
    },
    Rule {
        language: Language::Go,
        parent: "dec_statement",
        tokens: &["--"],
        types: &[IncrementDecrement],
    },
    Rule {
        language: Language::Go,
        parent: "assignment_statement",
        tokens: COMPOUND_ARITH,
        types: &[InvertAssignments, RemoveSelfAssignments],
    },
    Rule {
        language: Language::Go,
        parent: "assignment_statement",
        tokens: &["&=", "|=", "^=", "&^=", "<<=", ">>="],
        types: &[InvertBitwiseAssignments, RemoveSelfAssignments],
    },
    Rule {
        language: Language::Go,
        parent: "break_statement",
        tokens: &["break"],
        types: &[InvertLoopCtrl],
    },
    Rule {
        language: Language::Go,
        parent: "continue_statement",
        tokens: &["continue"],
        types: &[InvertLoopCtrl],
    },
    // Rust. No `++`/`--`, and no unary plus to invert a negation into.
    Rule {
        language: Language::Rust,
        parent: "binary_expression",
        tokens: &["+", "-", "*", "/", "%"],
        types: &[ArithmeticBase],
    },
    Rule {
        language: Language::Rust,
        parent: "binary_expression",
        tokens: &[">", ">=", "<", "<="],
        types: &[ConditionalsBoundary, ConditionalsNegation],
    },
    Rule {
        language: Language::Rust,
        parent: "binary_expression",
        tokens: &["==", "!="],
        types: &[ConditionalsNegation],
    },
    Rule {
        language: Language::Rust,
        parent: "binary_expression",
        tokens: &["&", "|", "^", "<<", ">>"],
        types: &[InvertBitwise],
    },
    Rule {
        language: Language::Rust,
        parent: "binary_expression",
        tokens: &["&&", "||"],
        types: &[InvertLogical],
    },
    Rule {
        language: Language::Rust,
        parent: "unary_expression",
        tokens: &["!"],
        types: &[InvertLogicalNot],
    },
    Rule {
        language: Language::Rust,
        parent: "compound_assignment_expr",
        tokens: COMPOUND_ARITH,
        types: &[InvertAssignments, RemoveSelfAssignments],
    },
    Rule {
        language: Language::Rust,
        parent: "compound_assignment_expr",
        tokens: &["&=", "|=", "^=", "<<=", ">>="],
        types: &[InvertBitwiseAssignments, RemoveSelfAssignments],
    },
    Rule {
        language: Language::Rust,
        parent: "break_expression",
        tokens: &["break"],
        types: &[InvertLoopCtrl],
    },
    Rule {
        language: Language::Rust,
        parent: "continue_expression",
        tokens: &["continue"],
        types: &[InvertLoopCtrl],
    },
];

/// Mutation types that apply to `token` when it sits directly under `parent`.
///
/// An empty slice is the normal answer for most nodes.
pub fn applicable(language: Language, token: &str, parent: &str) -> &'static [MutationType] {
    RULES
        .iter()
        .find(|rule| rule.language == language && rule.parent == parent && rule.tokens.contains(&token))
        .map(|rule| rule.types)
        .unwrap_or(&[])
}

/// The set of mutation types a run is allowed to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnabledTypes(BTreeSet<MutationType>);

impl Default for EnabledTypes {
    fn default() -> Self {
        Self(
            MutationType::ALL
                .into_iter()
                .filter(|t| t.enabled_by_default())
                .collect(),
        )
    }
}

impl EnabledTypes {
    pub fn all() -> Self {
        Self(MutationType::ALL.into_iter().collect())
    }

    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn set(&mut self, mutation_type: MutationType, enabled: bool) {
        if enabled {
            self.0.insert(mutation_type);
        } else {
            self.0.remove(&mutation_type);
        }
    }

    pub fn with(mut self, mutation_type: MutationType, enabled: bool) -> Self {
        self.set(mutation_type, enabled);
        self
    }

    pub fn contains(&self, mutation_type: MutationType) -> bool {
        self.0.contains(&mutation_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = MutationType> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
