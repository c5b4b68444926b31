//! IDL types.
//!
//! Types are structural values; references to named definitions (interfaces,
//! dictionaries, enumerations, callbacks, typedefs, unions) are stored by
//! identifier and resolved against the [`Database`](crate::Database) on
//! demand. Every type carries the extended attributes written on it in the
//! IDL (`[Clamp]`, `[EnforceRange]`, `[AllowShared]`, ...).

use serde::Deserialize;

use crate::database::Database;
use crate::extended_attributes::ExtendedAttributes;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegerKind {
    Byte,
    Octet,
    Short,
    UnsignedShort,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
}

impl IntegerKind {
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            IntegerKind::Octet
                | IntegerKind::UnsignedShort
                | IntegerKind::UnsignedLong
                | IntegerKind::UnsignedLongLong
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatKind {
    Float,
    Double,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringKind {
    DomString,
    ByteString,
    UsvString,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum BufferSourceKind {
    ArrayBuffer,
    ArrayBufferView,
    DataView,
    Int8Array,
    Int16Array,
    Int32Array,
    Uint8Array,
    Uint16Array,
    Uint32Array,
    Uint8ClampedArray,
    BigInt64Array,
    BigUint64Array,
    Float16Array,
    Float32Array,
    Float64Array,
}

impl BufferSourceKind {
    /// Typed arrays, excluding `ArrayBuffer`, `ArrayBufferView`, `DataView`.
    pub fn is_typed_array(self) -> bool {
        !matches!(
            self,
            BufferSourceKind::ArrayBuffer
                | BufferSourceKind::ArrayBufferView
                | BufferSourceKind::DataView
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BufferSourceKind::ArrayBuffer => "ArrayBuffer",
            BufferSourceKind::ArrayBufferView => "ArrayBufferView",
            BufferSourceKind::DataView => "DataView",
            BufferSourceKind::Int8Array => "Int8Array",
            BufferSourceKind::Int16Array => "Int16Array",
            BufferSourceKind::Int32Array => "Int32Array",
            BufferSourceKind::Uint8Array => "Uint8Array",
            BufferSourceKind::Uint16Array => "Uint16Array",
            BufferSourceKind::Uint32Array => "Uint32Array",
            BufferSourceKind::Uint8ClampedArray => "Uint8ClampedArray",
            BufferSourceKind::BigInt64Array => "BigInt64Array",
            BufferSourceKind::BigUint64Array => "BigUint64Array",
            BufferSourceKind::Float16Array => "Float16Array",
            BufferSourceKind::Float32Array => "Float32Array",
            BufferSourceKind::Float64Array => "Float64Array",
        }
    }
}

/// The structural shape of an IDL type.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Undefined,
    Boolean,
    Integer(IntegerKind),
    FloatingPoint { kind: FloatKind, unrestricted: bool },
    Bigint,
    String(StringKind),
    Object,
    Any,
    Promise(Box<IdlType>),
    Sequence(Box<IdlType>),
    FrozenArray(Box<IdlType>),
    ObservableArray(Box<IdlType>),
    Record { key: Box<IdlType>, value: Box<IdlType> },
    Nullable(Box<IdlType>),
    Variadic(Box<IdlType>),
    BufferSource { kind: BufferSourceKind, allow_shared: bool },
    /// Named reference: interface, dictionary, enumeration, callback
    /// function, callback interface, typedef or union.
    Reference(String),
}

/// Which wrappers [`IdlType::unwrap`] should see through.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnwrapFlags {
    pub typedef: bool,
    pub nullable: bool,
    pub variadic: bool,
}

impl UnwrapFlags {
    /// See through everything.
    pub fn all() -> Self {
        Self { typedef: true, nullable: true, variadic: true }
    }

    pub fn typedefs_only() -> Self {
        Self { typedef: true, ..Self::default() }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct IdlType {
    pub kind: TypeKind,
    #[serde(default)]
    pub ext_attrs: ExtendedAttributes,
}

impl IdlType {
    pub fn new(kind: TypeKind) -> Self {
        Self { kind, ext_attrs: ExtendedAttributes::new() }
    }

    pub fn with_ext_attrs(kind: TypeKind, ext_attrs: ExtendedAttributes) -> Self {
        Self { kind, ext_attrs }
    }

    pub fn reference(identifier: impl Into<String>) -> Self {
        Self::new(TypeKind::Reference(identifier.into()))
    }

    pub fn nullable(inner: IdlType) -> Self {
        Self::new(TypeKind::Nullable(Box::new(inner)))
    }

    /// Resolve through the requested wrappers.
    ///
    /// With all flags set, the result is the innermost type after following
    /// typedef chains and stripping nullability and variadic markers.
    pub fn unwrap<'a>(&'a self, db: &'a Database, flags: UnwrapFlags) -> &'a IdlType {
        let mut current = self;
        loop {
            match &current.kind {
                TypeKind::Nullable(inner) if flags.nullable => current = inner,
                TypeKind::Variadic(inner) if flags.variadic => current = inner,
                TypeKind::Reference(identifier) if flags.typedef => {
                    match db.find_typedef(identifier) {
                        Some(typedef) => current = &typedef.idl_type,
                        None => return current,
                    }
                }
                _ => return current,
            }
        }
    }

    /// The identifier of a named reference, if this is one.
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Reference(identifier) => Some(identifier),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.kind, TypeKind::Undefined)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.kind, TypeKind::Boolean)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.kind, TypeKind::Integer(_))
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self.kind, TypeKind::FloatingPoint { .. })
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_floating_point()
    }

    pub fn is_bigint(&self) -> bool {
        matches!(self.kind, TypeKind::Bigint)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, TypeKind::String(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, TypeKind::Object)
    }

    pub fn is_any(&self) -> bool {
        matches!(self.kind, TypeKind::Any)
    }

    pub fn is_promise(&self) -> bool {
        matches!(self.kind, TypeKind::Promise(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, TypeKind::Sequence(_))
    }

    pub fn is_frozen_array(&self) -> bool {
        matches!(self.kind, TypeKind::FrozenArray(_))
    }

    pub fn is_observable_array(&self) -> bool {
        matches!(self.kind, TypeKind::ObservableArray(_))
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Record { .. })
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self.kind, TypeKind::Nullable(_))
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.kind, TypeKind::Variadic(_))
    }

    pub fn is_buffer_source(&self) -> bool {
        matches!(self.kind, TypeKind::BufferSource { .. })
    }

    /// The element type of a sequence, frozen array, observable array or
    /// variadic type.
    pub fn element_type(&self) -> Option<&IdlType> {
        match &self.kind {
            TypeKind::Sequence(inner)
            | TypeKind::FrozenArray(inner)
            | TypeKind::ObservableArray(inner)
            | TypeKind::Variadic(inner) => Some(inner),
            _ => None,
        }
    }

    /// The inner type of a nullable or promise type.
    pub fn inner_type(&self) -> Option<&IdlType> {
        match &self.kind {
            TypeKind::Nullable(inner) | TypeKind::Promise(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_interface(&self, db: &Database) -> bool {
        self.identifier().is_some_and(|id| db.find_interface(id).is_some())
    }

    pub fn is_dictionary(&self, db: &Database) -> bool {
        self.identifier().is_some_and(|id| db.find_dictionary(id).is_some())
    }

    pub fn is_enumeration(&self, db: &Database) -> bool {
        self.identifier().is_some_and(|id| db.find_enumeration(id).is_some())
    }

    pub fn is_callback_function(&self, db: &Database) -> bool {
        self.identifier().is_some_and(|id| db.find_callback_function(id).is_some())
    }

    pub fn is_callback_interface(&self, db: &Database) -> bool {
        self.identifier().is_some_and(|id| db.find_callback_interface(id).is_some())
    }

    pub fn is_union(&self, db: &Database) -> bool {
        self.identifier().is_some_and(|id| db.find_union(id).is_some())
    }

    pub fn is_typedef(&self, db: &Database) -> bool {
        self.identifier().is_some_and(|id| db.find_typedef(id).is_some())
    }

    /// The flattened member types of a union, or `None` for non-unions.
    pub fn flattened_member_types<'a>(&'a self, db: &'a Database) -> Option<&'a [IdlType]> {
        let union = db.find_union(self.identifier()?)?;
        Some(&union.flattened_member_types)
    }

    /// UpperCamel token used when concatenating union member names
    /// (`(Node or DOMString)` => `NodeOrString`).
    pub fn union_token(&self, db: &Database) -> String {
        let unwrapped = self.unwrap(db, UnwrapFlags::typedefs_only());
        match &unwrapped.kind {
            TypeKind::Undefined => "Undefined".to_string(),
            TypeKind::Boolean => "Boolean".to_string(),
            TypeKind::Integer(kind) => match kind {
                IntegerKind::Byte => "Byte",
                IntegerKind::Octet => "Octet",
                IntegerKind::Short => "Short",
                IntegerKind::UnsignedShort => "UnsignedShort",
                IntegerKind::Long => "Long",
                IntegerKind::UnsignedLong => "UnsignedLong",
                IntegerKind::LongLong => "LongLong",
                IntegerKind::UnsignedLongLong => "UnsignedLongLong",
            }
            .to_string(),
            TypeKind::FloatingPoint { kind, unrestricted } => {
                let base = match kind {
                    FloatKind::Float => "Float",
                    FloatKind::Double => "Double",
                };
                if *unrestricted {
                    format!("Unrestricted{base}")
                } else {
                    base.to_string()
                }
            }
            TypeKind::Bigint => "BigInt".to_string(),
            TypeKind::String(kind) => match kind {
                StringKind::DomString => "String",
                StringKind::ByteString => "ByteString",
                StringKind::UsvString => "USVString",
            }
            .to_string(),
            TypeKind::Object => "Object".to_string(),
            TypeKind::Any => "Any".to_string(),
            TypeKind::Promise(_) => "Promise".to_string(),
            TypeKind::Sequence(element) => format!("{}Sequence", element.union_token(db)),
            TypeKind::FrozenArray(element) => format!("{}Array", element.union_token(db)),
            TypeKind::ObservableArray(element) => {
                format!("Observable{}Array", element.union_token(db))
            }
            TypeKind::Record { key, value } => {
                format!("{}{}Record", key.union_token(db), value.union_token(db))
            }
            TypeKind::Nullable(inner) => inner.union_token(db),
            TypeKind::Variadic(inner) => inner.union_token(db),
            TypeKind::BufferSource { kind, .. } => kind.as_str().to_string(),
            TypeKind::Reference(identifier) => identifier.clone(),
        }
    }

    /// The type's spelling in IDL, used in TypeError messages.
    pub fn display_name(&self, db: &Database) -> String {
        match &self.kind {
            TypeKind::Undefined => "undefined".to_string(),
            TypeKind::Boolean => "boolean".to_string(),
            TypeKind::Integer(kind) => match kind {
                IntegerKind::Byte => "byte",
                IntegerKind::Octet => "octet",
                IntegerKind::Short => "short",
                IntegerKind::UnsignedShort => "unsigned short",
                IntegerKind::Long => "long",
                IntegerKind::UnsignedLong => "unsigned long",
                IntegerKind::LongLong => "long long",
                IntegerKind::UnsignedLongLong => "unsigned long long",
            }
            .to_string(),
            TypeKind::FloatingPoint { kind, unrestricted } => {
                let base = match kind {
                    FloatKind::Float => "float",
                    FloatKind::Double => "double",
                };
                if *unrestricted {
                    format!("unrestricted {base}")
                } else {
                    base.to_string()
                }
            }
            TypeKind::Bigint => "bigint".to_string(),
            TypeKind::String(kind) => match kind {
                StringKind::DomString => "DOMString",
                StringKind::ByteString => "ByteString",
                StringKind::UsvString => "USVString",
            }
            .to_string(),
            TypeKind::Object => "object".to_string(),
            TypeKind::Any => "any".to_string(),
            TypeKind::Promise(inner) => format!("Promise<{}>", inner.display_name(db)),
            TypeKind::Sequence(element) => format!("sequence<{}>", element.display_name(db)),
            TypeKind::FrozenArray(element) => {
                format!("FrozenArray<{}>", element.display_name(db))
            }
            TypeKind::ObservableArray(element) => {
                format!("ObservableArray<{}>", element.display_name(db))
            }
            TypeKind::Record { key, value } => {
                format!("record<{}, {}>", key.display_name(db), value.display_name(db))
            }
            TypeKind::Nullable(inner) => format!("{}?", inner.display_name(db)),
            TypeKind::Variadic(inner) => format!("{}...", inner.display_name(db)),
            TypeKind::BufferSource { kind, .. } => kind.as_str().to_string(),
            TypeKind::Reference(identifier) => match db.find_union(identifier) {
                Some(union) => union.name_in_idl(db),
                None => identifier.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(kind: TypeKind) -> IdlType {
        IdlType::new(kind)
    }

    #[test]
    fn unwrap_strips_nullable_and_variadic() {
        let db = Database::default();
        let t = ty(TypeKind::Variadic(Box::new(ty(TypeKind::Nullable(Box::new(ty(
            TypeKind::Boolean,
        )))))));
        assert!(t.unwrap(&db, UnwrapFlags::all()).is_boolean());
        assert!(t.unwrap(&db, UnwrapFlags::default()).is_variadic());
    }

    #[test]
    fn element_type_of_sequence() {
        let t = ty(TypeKind::Sequence(Box::new(ty(TypeKind::Any))));
        assert!(t.element_type().is_some_and(IdlType::is_any));
    }

    #[test]
    fn union_token_of_string_kinds() {
        let db = Database::default();
        assert_eq!(ty(TypeKind::String(StringKind::DomString)).union_token(&db), "String");
        assert_eq!(ty(TypeKind::String(StringKind::UsvString)).union_token(&db), "USVString");
    }
}
