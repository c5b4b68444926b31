//! Algebraic properties of the exposure condition expressions.
//!
//! The installer tables group entries by rendered condition text, so the
//! constructors have to produce one canonical shape per condition: constants
//! folded, nested conjunctions flattened, duplicates dropped.

use proptest::prelude::*;

use web_idl::{Exposure, SecureContextMode};
use widlgen::codegen::exposure::{expr_from_exposure, Expr};

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        Just(Expr::True),
        Just(Expr::False),
        "[a-z]{1,6}".prop_map(Expr::atom),
    ];
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(Expr::negate),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Expr::and),
            prop::collection::vec(inner, 0..4).prop_map(Expr::or),
        ]
    })
}

proptest! {
    #[test]
    fn double_negation_is_identity(e in arb_expr()) {
        prop_assert_eq!(e.clone().negate().negate(), e);
    }

    #[test]
    fn singleton_conjunction_is_identity(e in arb_expr()) {
        prop_assert_eq!(Expr::and(vec![e.clone()]), e.clone());
        prop_assert_eq!(Expr::or(vec![e.clone()]), e);
    }

    #[test]
    fn duplicate_operands_collapse(e in arb_expr()) {
        prop_assert_eq!(Expr::and(vec![e.clone(), e.clone()]), e.clone());
        prop_assert_eq!(Expr::or(vec![e.clone(), e.clone()]), e);
    }

    #[test]
    fn false_dominates_conjunction(e in arb_expr()) {
        prop_assert_eq!(Expr::and(vec![e.clone(), Expr::False]), Expr::False);
        prop_assert_eq!(Expr::or(vec![e, Expr::True]), Expr::True);
    }

    #[test]
    fn neutral_operands_drop_out(e in arb_expr()) {
        prop_assert_eq!(Expr::and(vec![Expr::True, e.clone()]), e.clone());
        prop_assert_eq!(Expr::or(vec![Expr::False, e.clone()]), e);
    }

    #[test]
    fn nested_same_op_flattens(a in arb_expr(), b in arb_expr(), c in arb_expr()) {
        let nested = Expr::and(vec![a.clone(), Expr::and(vec![b.clone(), c.clone()])]);
        let flat = Expr::and(vec![a.clone(), b.clone(), c.clone()]);
        prop_assert_eq!(nested, flat);
        let nested = Expr::or(vec![a.clone(), Expr::or(vec![b.clone(), c.clone()])]);
        let flat = Expr::or(vec![a, b, c]);
        prop_assert_eq!(nested, flat);
    }

    #[test]
    fn rendered_text_is_nonempty_and_balanced(e in arb_expr()) {
        let text = e.to_text();
        prop_assert!(!text.is_empty());
        let mut depth: i64 = 0;
        for c in text.chars() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    prop_assert!(depth >= 0);
                }
                _ => {}
            }
        }
        prop_assert_eq!(depth, 0);
    }

    #[test]
    fn exposure_lowering_is_deterministic(
        secure in any::<bool>(),
        features in prop::collection::vec("[A-Z][a-z]{1,8}", 0..3),
    ) {
        let exposure = Exposure {
            only_in_secure_contexts: if secure {
                SecureContextMode::Always
            } else {
                SecureContextMode::None
            },
            runtime_enabled_features: features,
            ..Exposure::default()
        };
        let first = expr_from_exposure(&exposure, false);
        let second = expr_from_exposure(&exposure, false);
        prop_assert_eq!(first.to_text(), second.to_text());
    }
}

#[test]
fn compound_operands_are_parenthesized() {
    let conjunction = Expr::and(vec![Expr::atom("x"), Expr::atom("y")]);
    let condition = Expr::or(vec![conjunction, Expr::atom("z")]);
    insta::assert_snapshot!(condition.to_text(), @"(x && y) || z");

    let negated = Expr::or(vec![Expr::atom("x"), Expr::atom("y")]).negate();
    insta::assert_snapshot!(negated.to_text(), @"!(x || y)");
}

#[test]
fn unconditional_exposure_lowers_to_true() {
    let expr = expr_from_exposure(&Exposure::default(), false);
    assert_eq!(expr, Expr::True);
    assert_eq!(expr.to_text(), "true");
}

#[test]
fn secure_context_and_runtime_feature_combine() {
    let exposure = Exposure {
        only_in_secure_contexts: SecureContextMode::Always,
        runtime_enabled_features: vec!["TestFeature".to_string()],
        ..Exposure::default()
    };
    insta::assert_snapshot!(
        expr_from_exposure(&exposure, false).to_text(),
        @"${is_in_secure_context} && RuntimeEnabledFeatures::TestFeatureEnabled()"
    );
}
