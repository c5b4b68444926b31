//! Top-level IDL definitions.

use serde::Deserialize;

use crate::database::Database;
use crate::exposure::Exposure;
use crate::extended_attributes::ExtendedAttributes;
use crate::info::{CodeGeneratorInfo, DebugInfo};
use crate::members::{
    Argument, Attribute, Constant, ConstructorGroup, ExposedConstruct, IndexedAndNamedProperties,
    LegacyWindowAlias, OperationGroup, Stringifier,
};
use crate::types::IdlType;

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Interface {
    pub identifier: String,
    #[serde(default)]
    pub inherited: Option<String>,
    #[serde(default)]
    pub is_mixin: bool,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub constructor_groups: Vec<ConstructorGroup>,
    /// `[LegacyFactoryFunction]` groups; the group identifier is the factory
    /// function name.
    #[serde(default)]
    pub legacy_factory_function_groups: Vec<ConstructorGroup>,
    #[serde(default)]
    pub operation_groups: Vec<OperationGroup>,
    #[serde(default)]
    pub stringifier: Option<Stringifier>,
    #[serde(default)]
    pub indexed_and_named_properties: Option<IndexedAndNamedProperties>,
    #[serde(default)]
    pub iterable: Option<Iterable>,
    #[serde(default)]
    pub maplike: Option<Maplike>,
    #[serde(default)]
    pub setlike: Option<Setlike>,
    #[serde(default)]
    pub async_iterable: Option<AsyncIterable>,
    /// Constructs exposed on this global (only for global interfaces).
    #[serde(default)]
    pub exposed_constructs: Vec<ExposedConstruct>,
    #[serde(default)]
    pub legacy_window_aliases: Vec<LegacyWindowAlias>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

impl Interface {
    /// Depth of the inheritance chain; used to order platform-object type
    /// tests most-derived first.
    pub fn inheritance_depth(&self, db: &Database) -> usize {
        let mut depth = 0;
        let mut current = self.inherited.as_deref();
        while let Some(identifier) = current {
            depth += 1;
            current = db.find_interface(identifier).and_then(|i| i.inherited.as_deref());
        }
        depth
    }

    /// Whether `ancestor` appears in this interface's inheritance chain
    /// (not counting the interface itself).
    pub fn does_inherit_from(&self, db: &Database, ancestor: &str) -> bool {
        let mut current = self.inherited.as_deref();
        while let Some(identifier) = current {
            if identifier == ancestor {
                return true;
            }
            current = db.find_interface(identifier).and_then(|i| i.inherited.as_deref());
        }
        false
    }

    /// A global interface defines a global object (`[Global]`).
    pub fn is_global(&self) -> bool {
        self.ext_attrs.has("Global")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IteratorKind {
    /// `iterable<V>` on an interface with an indexed getter and `length`.
    Value,
    /// `iterable<K, V>`.
    Pair,
    Maplike,
    Setlike,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Iterable {
    #[serde(default)]
    pub key_type: Option<IdlType>,
    pub value_type: IdlType,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
}

impl Iterable {
    pub fn kind(&self) -> IteratorKind {
        if self.key_type.is_some() {
            IteratorKind::Pair
        } else {
            IteratorKind::Value
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Maplike {
    pub key_type: IdlType,
    pub value_type: IdlType,
    #[serde(default)]
    pub is_readonly: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Setlike {
    pub value_type: IdlType,
    #[serde(default)]
    pub is_readonly: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AsyncIterable {
    #[serde(default)]
    pub key_type: Option<IdlType>,
    pub value_type: IdlType,
    #[serde(default)]
    pub init_arguments: Vec<Argument>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Namespace {
    pub identifier: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub operation_groups: Vec<OperationGroup>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Dictionary {
    pub identifier: String,
    #[serde(default)]
    pub inherited: Option<String>,
    /// Own members in declaration order.
    #[serde(default)]
    pub own_members: Vec<crate::members::DictionaryMember>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

impl Dictionary {
    pub fn has_required_members(&self, db: &Database) -> bool {
        if self.own_members.iter().any(|m| m.is_required) {
            return true;
        }
        self.inherited
            .as_deref()
            .and_then(|id| db.find_dictionary(id))
            .is_some_and(|parent| parent.has_required_members(db))
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Enumeration {
    pub identifier: String,
    /// String values in declaration order.
    pub values: Vec<String>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CallbackFunction {
    pub identifier: String,
    pub arguments: Vec<Argument>,
    pub return_type: IdlType,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

impl CallbackFunction {
    /// `[LegacyTreatNonObjectAsNull]` callbacks accept non-callable values.
    pub fn is_legacy_treat_non_object_as_null(&self) -> bool {
        self.ext_attrs.has("LegacyTreatNonObjectAsNull")
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CallbackInterface {
    pub identifier: String,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub operation_groups: Vec<OperationGroup>,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

impl CallbackInterface {
    /// Single-operation callback interfaces are callable like functions.
    /// Constants do not disqualify; only the operation count matters.
    pub fn is_single_operation(&self) -> bool {
        self.operation_groups.len() == 1 && self.operation_groups[0].operations.len() == 1
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Typedef {
    pub identifier: String,
    pub idl_type: IdlType,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

/// A union type, keyed by its canonical identifier (member tokens joined
/// with `Or`).
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Union {
    pub identifier: String,
    /// Flattened member types per the Web IDL flattening algorithm, in
    /// declaration order, nullability stripped.
    pub flattened_member_types: Vec<IdlType>,
    #[serde(default)]
    pub does_include_nullable_type: bool,
    /// Identifiers of typedefs that name this union.
    #[serde(default)]
    pub typedef_members: Vec<String>,
    /// Identifiers of smaller unions among the flattened members.
    #[serde(default)]
    pub union_members: Vec<String>,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

impl Union {
    /// `(Node or DOMString)` spelling used in TypeError messages.
    pub fn name_in_idl(&self, db: &Database) -> String {
        let names: Vec<String> =
            self.flattened_member_types.iter().map(|t| t.display_name(db)).collect();
        let mut joined = names.join(" or ");
        if self.does_include_nullable_type {
            joined.push_str(" or null");
        }
        format!("({joined})")
    }
}

/// An `ObservableArray<T>` attribute type, uniqued by element type across
/// the database.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ObservableArray {
    /// Generated identifier, e.g. `ObservableArrayNode`.
    pub identifier: String,
    pub element_type: IdlType,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

/// Companion iterator of an iterable/maplike/setlike interface.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SyncIterator {
    pub identifier: String,
    /// The interface this iterator iterates.
    pub interface: String,
    pub kind: IteratorKind,
    #[serde(default)]
    pub key_type: Option<IdlType>,
    pub value_type: IdlType,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}

/// Companion iterator of an async-iterable interface.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AsyncIterator {
    pub identifier: String,
    pub interface: String,
    #[serde(default)]
    pub key_type: Option<IdlType>,
    pub value_type: IdlType,
    #[serde(default)]
    pub exposure: Exposure,
    #[serde(default)]
    pub code_generator_info: CodeGeneratorInfo,
    #[serde(default)]
    pub debug_info: DebugInfo,
}
