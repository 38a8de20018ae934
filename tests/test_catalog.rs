use mutest::Language;
use mutest::catalog::{self, EnabledTypes, MutationKind, MutationType};

// --- applicability ---

#[test]
fn minus_depends_on_parent() {
    assert_eq!(
        catalog::applicable(Language::Go, "-", "unary_expression"),
        &[MutationType::InvertNegatives]
    );
    assert_eq!(
        catalog::applicable(Language::Go, "-", "binary_expression"),
        &[MutationType::ArithmeticBase]
    );
}

#[test]
fn relational_operators_get_boundary_and_negation() {
    for op in [">", ">=", "<", "<="] {
        let types = catalog::applicable(Language::Go, op, "binary_expression");
        assert_eq!(
            types,
            &[
                MutationType::ConditionalsBoundary,
                MutationType::ConditionalsNegation
            ],
            "{op}"
        );
    }
}

#[test]
fn equality_gets_only_negation() {
    assert_eq!(
        catalog::applicable(Language::Go, "==", "binary_expression"),
        &[MutationType::ConditionalsNegation]
    );
}

#[test]
fn logical_not_is_an_expression_mutation() {
    let types = catalog::applicable(Language::Go, "!", "unary_expression");
    assert_eq!(types, &[MutationType::InvertLogicalNot]);
    assert_eq!(types[0].kind(), MutationKind::Expression);
}

#[test]
fn unsupported_combinations_are_empty() {
    assert!(catalog::applicable(Language::Go, "&", "unary_expression").is_empty());
    assert!(catalog::applicable(Language::Go, ">", "type_arguments").is_empty());
    assert!(catalog::applicable(Language::Go, "identifier", "binary_expression").is_empty());
    assert!(catalog::applicable(Language::Rust, "!", "macro_invocation").is_empty());
}

#[test]
fn rust_has_no_increment_or_unary_minus() {
    assert!(catalog::applicable(Language::Rust, "-", "unary_expression").is_empty());
    assert!(catalog::applicable(Language::Rust, "++", "inc_statement").is_empty());
    assert_eq!(
        catalog::applicable(Language::Rust, "-", "binary_expression"),
        &[MutationType::ArithmeticBase]
    );
}

#[test]
fn compound_assignments_offer_inversion_and_removal() {
    assert_eq!(
        catalog::applicable(Language::Go, "+=", "assignment_statement"),
        &[
            MutationType::InvertAssignments,
            MutationType::RemoveSelfAssignments
        ]
    );
    assert_eq!(
        catalog::applicable(Language::Rust, "<<=", "compound_assignment_expr"),
        &[
            MutationType::InvertBitwiseAssignments,
            MutationType::RemoveSelfAssignments
        ]
    );
}

// --- substitution table ---

#[test]
fn boundary_substitution_composes_back() {
    for op in [">", ">=", "<", "<="] {
        let forward = MutationType::ConditionalsBoundary.substitute(op).unwrap();
        let back = MutationType::ConditionalsBoundary.substitute(forward).unwrap();
        assert_eq!(back, op);
    }
}

#[test]
fn involutive_pairs_compose_back() {
    let pairs = [
        (MutationType::ConditionalsNegation, "=="),
        (MutationType::ConditionalsNegation, ">"),
        (MutationType::ConditionalsNegation, "<"),
        (MutationType::ArithmeticBase, "+"),
        (MutationType::ArithmeticBase, "*"),
        (MutationType::IncrementDecrement, "++"),
        (MutationType::InvertLogical, "&&"),
        (MutationType::InvertLoopCtrl, "break"),
        (MutationType::InvertBitwise, "<<"),
        (MutationType::InvertAssignments, "+="),
    ];
    for (t, op) in pairs {
        let forward = t.substitute(op).unwrap();
        assert_ne!(forward, op);
        assert_eq!(t.substitute(forward), Some(op), "{t} {op}");
    }
}

#[test]
fn remove_self_assignment_drops_the_operator() {
    assert_eq!(MutationType::RemoveSelfAssignments.substitute("&^="), Some("="));
    assert_eq!(MutationType::RemoveSelfAssignments.substitute("="), None);
}

#[test]
fn expression_types_have_no_token_substitution() {
    assert_eq!(MutationType::InvertLogicalNot.substitute("!"), None);
}

// --- names and defaults ---

#[test]
fn names_round_trip() {
    for t in MutationType::ALL {
        assert_eq!(MutationType::from_name(t.name()), Some(t));
        assert_eq!(t.to_string(), t.name());
    }
}

#[test]
fn from_name_is_lenient_about_case_and_dashes() {
    assert_eq!(
        MutationType::from_name("conditionals_boundary"),
        Some(MutationType::ConditionalsBoundary)
    );
    assert_eq!(
        MutationType::from_name("invert-loop-ctrl"),
        Some(MutationType::InvertLoopCtrl)
    );
    assert_eq!(MutationType::from_name("FLIP_EVERYTHING"), None);
}

#[test]
fn default_set_matches_static_defaults() {
    let enabled = EnabledTypes::default();
    for t in MutationType::ALL {
        assert_eq!(enabled.contains(t), t.enabled_by_default(), "{t}");
    }
    assert!(enabled.contains(MutationType::ConditionalsBoundary));
    assert!(!enabled.contains(MutationType::InvertLoopCtrl));
}

#[test]
fn enabled_types_toggle() {
    let enabled = EnabledTypes::none()
        .with(MutationType::InvertLogical, true)
        .with(MutationType::ArithmeticBase, true)
        .with(MutationType::ArithmeticBase, false);
    assert_eq!(enabled.iter().collect::<Vec<_>>(), vec![MutationType::InvertLogical]);
    assert!(EnabledTypes::none().is_empty());
    assert_eq!(EnabledTypes::all().iter().count(), MutationType::ALL.len());
}

#[test]
fn serde_uses_screaming_snake_names() {
    let json = serde_json::to_string(&MutationType::InvertBitwiseAssignments).unwrap();
    assert_eq!(json, "\"INVERT_BITWISE_ASSIGNMENTS\"");
}
