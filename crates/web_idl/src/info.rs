//! Per-definition bookkeeping attached by the frontend: component placement,
//! implementation names and headers, and debug locations for diagnostics.

use serde::Deserialize;

/// The engine component a definition belongs to.
///
/// `Core` is the lower layer; `Modules` is the upper layer. A definition
/// declared in both (via partials) has its API in core and its
/// implementation in modules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    #[default]
    Core,
    Modules,
}

impl Component {
    /// The higher (more dependent) of two components.
    pub fn max(self, other: Component) -> Component {
        std::cmp::max(self, other)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Component::Core => "core",
            Component::Modules => "modules",
        }
    }
}

/// Code-generator-facing metadata the frontend computed for a definition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodeGeneratorInfo {
    /// Definition exists only for testing bindings themselves.
    pub for_testing: bool,
    /// `[ImplementedAs=...]` override of the native class name.
    pub receiver_implemented_as: Option<String>,
    /// Headers declaring the native implementation class.
    pub blink_headers: Vec<String>,
    /// Some members were merged in from a partial definition.
    pub defined_in_partial: bool,
    /// Component of the main (API) definition.
    pub component: Component,
    /// Component of the partial that contributed members, when different.
    pub component_of_partial: Option<Component>,
}

impl CodeGeneratorInfo {
    /// Component pair `(api, impl)`. They differ only for definitions split
    /// across components by a partial.
    pub fn components(&self) -> (Component, Component) {
        let api = self.component;
        let impl_ = self.component_of_partial.unwrap_or(api).max(api);
        (api, impl_)
    }

    pub fn is_cross_component(&self) -> bool {
        let (api, impl_) = self.components();
        api != impl_
    }
}

/// Location of a definition or member in the source IDL, for error messages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DebugInfo {
    pub filepath: String,
    pub line: u32,
}

impl std::fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.filepath.is_empty() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}", self.filepath, self.line)
        }
    }
}
