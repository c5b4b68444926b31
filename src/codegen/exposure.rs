//! Exposure-predicate algebra.
//!
//! Installer tables gate property installation on boolean conditions built
//! from runtime features, security context, global object kind and origin
//! trials. Conditions are immutable symbolic expressions with `true`/`false`
//! identities folded at construction, so a trivially-true gate disappears
//! and a trivially-false gate elides the whole member.

use web_idl::{Exposure, SecureContextMode};

use crate::codegen::name_style;

/// An immutable boolean expression over C++ condition atoms.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    True,
    False,
    Atom(String),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    pub fn atom(text: impl Into<String>) -> Expr {
        Expr::Atom(text.into())
    }

    pub fn is_always_true(&self) -> bool {
        matches!(self, Expr::True)
    }

    pub fn is_always_false(&self) -> bool {
        matches!(self, Expr::False)
    }

    /// `!e`, folding constants and double negation.
    pub fn negate(self) -> Expr {
        match self {
            Expr::True => Expr::False,
            Expr::False => Expr::True,
            Expr::Not(inner) => *inner,
            other => Expr::Not(Box::new(other)),
        }
    }

    /// Conjunction: any false operand wins, true operands drop out,
    /// duplicates keep their leftmost occurrence.
    pub fn and(operands: Vec<Expr>) -> Expr {
        let mut terms: Vec<Expr> = Vec::new();
        for operand in operands {
            match operand {
                Expr::False => return Expr::False,
                Expr::True => {}
                Expr::And(inner) => {
                    for term in inner {
                        if !terms.contains(&term) {
                            terms.push(term);
                        }
                    }
                }
                other => {
                    if !terms.contains(&other) {
                        terms.push(other);
                    }
                }
            }
        }
        match terms.len() {
            0 => Expr::True,
            1 => terms.into_iter().next().unwrap_or(Expr::True),
            _ => Expr::And(terms),
        }
    }

    /// Disjunction, dual of [`and`](Self::and).
    pub fn or(operands: Vec<Expr>) -> Expr {
        let mut terms: Vec<Expr> = Vec::new();
        for operand in operands {
            match operand {
                Expr::True => return Expr::True,
                Expr::False => {}
                Expr::Or(inner) => {
                    for term in inner {
                        if !terms.contains(&term) {
                            terms.push(term);
                        }
                    }
                }
                other => {
                    if !terms.contains(&other) {
                        terms.push(other);
                    }
                }
            }
        }
        match terms.len() {
            0 => Expr::False,
            1 => terms.into_iter().next().unwrap_or(Expr::False),
            _ => Expr::Or(terms),
        }
    }

    /// Printable C++ form. Non-atomic operands are parenthesized.
    pub fn to_text(&self) -> String {
        fn term_text(expr: &Expr) -> String {
            match expr {
                Expr::Atom(_) | Expr::True | Expr::False | Expr::Not(_) => expr.to_text(),
                compound => format!("({})", compound.to_text()),
            }
        }
        match self {
            Expr::True => "true".to_string(),
            Expr::False => "false".to_string(),
            Expr::Atom(text) => text.clone(),
            Expr::Not(inner) => format!("!{}", term_text(inner)),
            Expr::And(terms) => {
                terms.iter().map(term_text).collect::<Vec<_>>().join(" && ")
            }
            Expr::Or(terms) => {
                terms.iter().map(term_text).collect::<Vec<_>>().join(" || ")
            }
        }
    }
}

fn runtime_feature_enabled(feature: &str) -> Expr {
    Expr::atom(format!("RuntimeEnabledFeatures::{feature}Enabled()"))
}

fn origin_trial_feature_enabled(feature: &str) -> Expr {
    Expr::atom(format!("RuntimeEnabledFeatures::{feature}Enabled(${{execution_context}})"))
}

fn context_feature_enabled(feature: &str) -> Expr {
    Expr::atom(format!(
        "ContextFeatureSettings::IsEnabled(${{execution_context}}, ContextFeature::k{feature})"
    ))
}

/// Build the compound exposure condition for one construct.
///
/// `may_use_feature_selector` is true for context-dependent installers,
/// where origin-trial features are modeled as the disjunction of the two
/// installation phases: initial install (`feature_selector.IsAll()` with the
/// feature enabled in the context) and retroactive per-feature install
/// (`feature_selector.IsAnyOf(...)`).
pub fn expr_from_exposure(exposure: &Exposure, may_use_feature_selector: bool) -> Expr {
    let mut terms: Vec<Expr> = Vec::new();

    if exposure.only_in_coi_contexts {
        terms.push(Expr::atom("${is_cross_origin_isolated}"));
    }
    if exposure.only_in_injection_mitigated_contexts {
        terms.push(Expr::atom("${is_injection_mitigated}"));
    }
    if exposure.only_in_isolated_contexts {
        terms.push(Expr::atom("${is_in_isolated_context}"));
    }
    match &exposure.only_in_secure_contexts {
        SecureContextMode::None => {}
        SecureContextMode::Always => terms.push(Expr::atom("${is_in_secure_context}")),
        SecureContextMode::WhenEnabled(features) => {
            // The restriction applies only while the gating features are on.
            let mut operands = vec![Expr::atom("${is_in_secure_context}")];
            operands
                .extend(features.iter().map(|f| runtime_feature_enabled(f).negate()));
            terms.push(Expr::or(operands));
        }
    }

    // [Exposed(Global Feature)] pairs; a wildcard or featureless entry makes
    // the whole disjunction vacuous for the current global.
    let feature_gated: Vec<&web_idl::GlobalNameAndFeature> = exposure
        .global_names_and_features
        .iter()
        .filter(|g| g.feature.is_some())
        .collect();
    if !feature_gated.is_empty()
        && feature_gated.len() == exposure.global_names_and_features.len()
    {
        let operands = feature_gated
            .iter()
            .map(|g| {
                let global = Expr::atom(format!(
                    "${{is_global_{}}}",
                    name_style::snake_case(&g.global_name)
                ));
                let feature = g
                    .feature
                    .as_deref()
                    .map(origin_trial_feature_enabled)
                    .unwrap_or(Expr::True);
                Expr::and(vec![global, feature])
            })
            .collect();
        terms.push(Expr::or(operands));
    }

    for feature in &exposure.runtime_enabled_features {
        terms.push(runtime_feature_enabled(feature));
    }
    for feature in &exposure.context_enabled_features {
        terms.push(context_feature_enabled(feature));
    }

    if !exposure.origin_trial_features.is_empty() {
        let enabled_in_context = Expr::and(
            exposure.origin_trial_features.iter().map(|f| origin_trial_feature_enabled(f)).collect(),
        );
        if may_use_feature_selector {
            let selectors = exposure
                .origin_trial_features
                .iter()
                .map(|f| format!("mojom::blink::OriginTrialFeature::k{f}"))
                .collect::<Vec<_>>()
                .join(", ");
            terms.push(Expr::or(vec![
                Expr::and(vec![
                    Expr::atom("${feature_selector}.IsAll()"),
                    enabled_in_context,
                ]),
                Expr::atom(format!("${{feature_selector}}.IsAnyOf({selectors})")),
            ]));
        } else {
            terms.push(enabled_in_context);
        }
    }

    Expr::and(terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_idl::GlobalNameAndFeature;

    fn a(name: &str) -> Expr {
        Expr::atom(name)
    }

    #[test]
    fn and_identities() {
        assert_eq!(Expr::and(vec![a("e"), Expr::True]), a("e"));
        assert_eq!(Expr::and(vec![a("e"), Expr::False]), Expr::False);
        assert_eq!(Expr::and(vec![]), Expr::True);
    }

    #[test]
    fn or_identities() {
        assert_eq!(Expr::or(vec![a("e"), Expr::True]), Expr::True);
        assert_eq!(Expr::or(vec![a("e"), Expr::False]), a("e"));
        assert_eq!(Expr::or(vec![]), Expr::False);
    }

    #[test]
    fn double_negation() {
        assert_eq!(a("e").negate().negate(), a("e"));
        assert_eq!(Expr::True.negate(), Expr::False);
    }

    #[test]
    fn dedup_preserves_leftmost_order() {
        let e = Expr::and(vec![a("x"), a("y"), a("x")]);
        assert_eq!(e.to_text(), "x && y");
        let e = Expr::or(vec![a("y"), a("x"), a("y")]);
        assert_eq!(e.to_text(), "y || x");
    }

    #[test]
    fn compound_operands_are_parenthesized() {
        let e = Expr::and(vec![a("x"), Expr::or(vec![a("y"), a("z")])]);
        assert_eq!(e.to_text(), "x && (y || z)");
    }

    #[test]
    fn exposure_with_nothing_is_true() {
        let expr = expr_from_exposure(&Exposure::default(), false);
        assert!(expr.is_always_true());
    }

    #[test]
    fn secure_context_and_runtime_feature() {
        let exposure = Exposure {
            only_in_secure_contexts: SecureContextMode::Always,
            runtime_enabled_features: vec!["SharedFeature".to_string()],
            ..Exposure::default()
        };
        let expr = expr_from_exposure(&exposure, false);
        assert_eq!(
            expr.to_text(),
            "${is_in_secure_context} && RuntimeEnabledFeatures::SharedFeatureEnabled()"
        );
    }

    #[test]
    fn origin_trial_uses_feature_selector_phases() {
        let exposure = Exposure {
            origin_trial_features: vec!["TrialFeature".to_string()],
            ..Exposure::default()
        };
        let expr = expr_from_exposure(&exposure, true);
        let text = expr.to_text();
        assert!(text.contains("${feature_selector}.IsAll()"));
        assert!(text
            .contains("${feature_selector}.IsAnyOf(mojom::blink::OriginTrialFeature::kTrialFeature)"));
    }

    #[test]
    fn global_feature_pairs_form_a_disjunction() {
        let exposure = Exposure {
            global_names_and_features: vec![
                GlobalNameAndFeature::with_feature("Window", "FeatureA"),
                GlobalNameAndFeature::with_feature("DedicatedWorker", "FeatureB"),
            ],
            ..Exposure::default()
        };
        let expr = expr_from_exposure(&exposure, false);
        let text = expr.to_text();
        assert!(text.contains("${is_global_window}"));
        assert!(text.contains("${is_global_dedicated_worker}"));
        assert!(text.contains(" || "));
    }
}
