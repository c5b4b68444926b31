//! Exposure descriptors.
//!
//! The frontend condenses `[Exposed]`, `[SecureContext]`, `[RuntimeEnabled]`,
//! `[ContextEnabled]`, `[CrossOriginIsolated]`, `[InjectionMitigated]` and
//! `[IsolatedContext]` into one descriptor per construct. The generator turns
//! this into its boolean exposure algebra; nothing here evaluates anything.

use serde::Deserialize;

/// How `[SecureContext]` applies to a construct.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecureContextMode {
    /// No secure-context restriction.
    #[default]
    None,
    /// Always restricted to secure contexts.
    Always,
    /// Restricted to secure contexts only while any of these runtime-enabled
    /// features is on (`[SecureContext=Feature]`).
    WhenEnabled(Vec<String>),
}

/// One `[Exposed=Global]` or `[Exposed(Global Feature)]` entry.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GlobalNameAndFeature {
    pub global_name: String,
    #[serde(default)]
    pub feature: Option<String>,
}

impl GlobalNameAndFeature {
    pub fn new(global_name: impl Into<String>) -> Self {
        Self { global_name: global_name.into(), feature: None }
    }

    pub fn with_feature(global_name: impl Into<String>, feature: impl Into<String>) -> Self {
        Self { global_name: global_name.into(), feature: Some(feature.into()) }
    }
}

/// The full exposure condition of a definition or member.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Exposure {
    /// `[CrossOriginIsolated]`
    pub only_in_coi_contexts: bool,
    /// `[InjectionMitigated]`
    pub only_in_injection_mitigated_contexts: bool,
    /// `[IsolatedContext]`
    pub only_in_isolated_contexts: bool,
    /// `[SecureContext]` / `[SecureContext=Feature]`
    pub only_in_secure_contexts: SecureContextMode,
    /// `[Exposed=...]`; empty means inherited from the owner and already
    /// folded in by the frontend. `global_name == "*"` is the wildcard.
    pub global_names_and_features: Vec<GlobalNameAndFeature>,
    /// `[RuntimeEnabled=...]` features that are enabled per-process.
    pub runtime_enabled_features: Vec<String>,
    /// `[ContextEnabled=...]` features that are enabled per-context.
    pub context_enabled_features: Vec<String>,
    /// `[RuntimeEnabled=...]` features that are origin trials (per-context).
    pub origin_trial_features: Vec<String>,
}

impl Exposure {
    /// Whether any gate depends on the context rather than only the isolate.
    pub fn is_context_dependent(&self) -> bool {
        self.only_in_coi_contexts
            || self.only_in_injection_mitigated_contexts
            || self.only_in_isolated_contexts
            || !matches!(self.only_in_secure_contexts, SecureContextMode::None)
            || self.global_names_and_features.iter().any(|g| g.feature.is_some())
            || !self.context_enabled_features.is_empty()
            || !self.origin_trial_features.is_empty()
    }

    /// Whether no gate at all applies.
    pub fn is_unconditional(&self) -> bool {
        !self.is_context_dependent() && self.runtime_enabled_features.is_empty()
    }
}
