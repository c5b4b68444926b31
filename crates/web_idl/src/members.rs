//! Members of class-like definitions: attributes, constants, constructors,
//! operations (and their overload groups), special properties, stringifiers,
//! exposed constructs and dictionary members.

use serde::Deserialize;

use crate::exposure::Exposure;
use crate::extended_attributes::ExtendedAttributes;
use crate::info::{CodeGeneratorInfo, DebugInfo};
use crate::types::IdlType;

/// A default value written in IDL (`optional long x = 1`, `= null`, `= []`).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Null,
    Undefined,
    Boolean(bool),
    Integer(i64),
    FloatingPoint(f64),
    String(String),
    EmptySequence,
    EmptyDictionary,
}

impl DefaultValue {
    /// The literal as written, for diagnostics.
    pub fn literal(&self) -> String {
        match self {
            DefaultValue::Null => "null".to_string(),
            DefaultValue::Undefined => "undefined".to_string(),
            DefaultValue::Boolean(value) => value.to_string(),
            DefaultValue::Integer(value) => value.to_string(),
            DefaultValue::FloatingPoint(value) => value.to_string(),
            DefaultValue::String(value) => format!("\"{value}\""),
            DefaultValue::EmptySequence => "[]".to_string(),
            DefaultValue::EmptyDictionary => "{}".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Argument {
    pub identifier: String,
    pub idl_type: IdlType,
    /// Zero-based position in the argument list.
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default)]
    pub default_value: Option<DefaultValue>,
}

impl Argument {
    pub fn is_variadic(&self) -> bool {
        self.idl_type.is_variadic()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Attribute {
    pub identifier: String,
    pub idl_type: IdlType,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_readonly: bool,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

impl Attribute {
    pub fn does_have_setter(&self) -> bool {
        !self.is_readonly
            || self.ext_attrs.has("PutForwards")
            || self.ext_attrs.has("Replaceable")
    }
}

/// Constant values arrive as pre-rendered C++ literal spellings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Constant {
    pub identifier: String,
    pub idl_type: IdlType,
    /// Literal spelling of the value (`"0x01"`, `"3.14"`, ...).
    pub value_literal: String,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Constructor {
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

impl Constructor {
    pub fn num_of_required_arguments(&self) -> usize {
        self.arguments.iter().filter(|a| !a.is_optional && !a.is_variadic()).count()
    }
}

/// Overload group of constructors. `[LegacyFactoryFunction]` groups carry the
/// factory function name as the identifier.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ConstructorGroup {
    /// Empty for the regular `constructor(...)` group.
    #[serde(default)]
    pub identifier: String,
    pub constructors: Vec<Constructor>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialOperationKind {
    #[default]
    None,
    IndexedGetter,
    IndexedSetter,
    NamedGetter,
    NamedSetter,
    NamedDeleter,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Operation {
    /// Empty for anonymous special operations.
    #[serde(default)]
    pub identifier: String,
    pub arguments: Vec<Argument>,
    pub return_type: IdlType,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub special_kind: SpecialOperationKind,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

impl Operation {
    pub fn num_of_required_arguments(&self) -> usize {
        self.arguments.iter().filter(|a| !a.is_optional && !a.is_variadic()).count()
    }
}

/// Overload group of operations sharing one identifier.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct OperationGroup {
    pub identifier: String,
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
}

impl OperationGroup {
    pub fn is_static(&self) -> bool {
        self.operations.iter().all(|op| op.is_static)
    }

    /// Minimum number of required arguments across overloads; used for the
    /// `length` property of the function.
    pub fn min_num_of_required_arguments(&self) -> usize {
        self.operations.iter().map(Operation::num_of_required_arguments).min().unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Stringifier {
    /// The attribute or operation the stringifier forwards to, by identifier.
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

/// Indexed and named special operations of a legacy platform object.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct IndexedAndNamedProperties {
    pub indexed_getter: Option<Operation>,
    pub indexed_setter: Option<Operation>,
    pub named_getter: Option<Operation>,
    pub named_setter: Option<Operation>,
    pub named_deleter: Option<Operation>,
}

impl IndexedAndNamedProperties {
    pub fn has_indexed_properties(&self) -> bool {
        self.indexed_getter.is_some() || self.indexed_setter.is_some()
    }

    pub fn has_named_properties(&self) -> bool {
        self.named_getter.is_some() || self.named_setter.is_some() || self.named_deleter.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_indexed_properties() && !self.has_named_properties()
    }
}

/// An interface-like exposed on a global object as a data property of the
/// global (`[Exposed=Window] interface Foo` makes `window.Foo`).
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ExposedConstruct {
    /// Identifier of the exposed interface-like.
    pub identifier: String,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

/// `[LegacyWindowAlias=Foo]`: an extra global data property aliasing an
/// exposed construct under another name.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LegacyWindowAlias {
    pub identifier: String,
    pub original: String,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DictionaryMember {
    pub identifier: String,
    pub idl_type: IdlType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub default_value: Option<DefaultValue>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub debug_info: DebugInfo,
}
