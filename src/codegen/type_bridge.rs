//! IDL-to-C++ type bridge.
//!
//! For every IDL type this module answers three questions: how the native
//! side spells the type (value, reference and member storage forms), which
//! conversion-trait tag marshals it across the boundary
//! (`NativeValueTraits<TAG>` / `ToV8Traits<TAG>`), and how a default value
//! written in IDL is spelled as a C++ expression.

use web_idl::{
    BufferSourceKind, Database, DefaultValue, FloatKind, IdlType, IntegerKind, StringKind,
    TypeKind, UnwrapFlags,
};

use crate::codegen::error::GenerationError;

/// Native spelling of one IDL type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeInfo {
    /// Value-storage spelling (`int32_t`, `String`, `Node*`, ...).
    pub value_t: String,
    /// Reference spelling for locals.
    pub ref_t: String,
    pub const_ref_t: String,
    /// Spelling when held as a class member (`Member<Node>`, ...).
    pub member_t: String,
    /// Spelling when read through a member (`Node*`, `const String&`).
    pub member_ref_t: String,
    /// The native type itself encodes null (pointer, `String`, ...);
    /// nullable wrapping needs no `std::optional`.
    pub has_null_value: bool,
    pub is_gc_type: bool,
    pub is_traceable: bool,
    pub is_heap_vector_type: bool,
    pub is_move_effective: bool,
}

impl TypeInfo {
    fn by_value(value_t: &str) -> TypeInfo {
        TypeInfo {
            value_t: value_t.to_string(),
            ref_t: value_t.to_string(),
            const_ref_t: value_t.to_string(),
            member_t: value_t.to_string(),
            member_ref_t: value_t.to_string(),
            has_null_value: false,
            is_gc_type: false,
            is_traceable: false,
            is_heap_vector_type: false,
            is_move_effective: false,
        }
    }

    fn string_like(value_t: &str) -> TypeInfo {
        TypeInfo {
            value_t: value_t.to_string(),
            ref_t: format!("{value_t}&"),
            const_ref_t: format!("const {value_t}&"),
            member_t: value_t.to_string(),
            member_ref_t: format!("const {value_t}&"),
            has_null_value: true,
            is_gc_type: false,
            is_traceable: false,
            is_heap_vector_type: false,
            is_move_effective: true,
        }
    }

    fn gc_pointer(class_name: &str) -> TypeInfo {
        TypeInfo {
            value_t: format!("{class_name}*"),
            ref_t: format!("{class_name}*"),
            const_ref_t: format!("const {class_name}*"),
            member_t: format!("Member<{class_name}>"),
            member_ref_t: format!("{class_name}*"),
            has_null_value: true,
            is_gc_type: true,
            is_traceable: true,
            is_heap_vector_type: false,
            is_move_effective: false,
        }
    }

    fn vector_like(value_t: String, is_heap: bool) -> TypeInfo {
        TypeInfo {
            ref_t: format!("{value_t}&"),
            const_ref_t: format!("const {value_t}&"),
            member_t: value_t.clone(),
            member_ref_t: format!("const {value_t}&"),
            value_t,
            has_null_value: false,
            is_gc_type: false,
            is_traceable: is_heap,
            is_heap_vector_type: is_heap,
            is_move_effective: true,
        }
    }

    /// Expression reading a member variable as `member_ref_t`.
    pub fn member_var_to_ref_expr(&self, name: &str) -> String {
        if self.is_gc_type {
            format!("{name}.Get()")
        } else {
            name.to_string()
        }
    }

    /// Statement expression resetting a member variable.
    pub fn clear_member_var_expr(&self, name: &str) -> String {
        if self.is_gc_type {
            format!("{name}.Clear()")
        } else {
            format!("{name} = {}()", self.member_t)
        }
    }
}

fn integer_info(kind: IntegerKind) -> TypeInfo {
    TypeInfo::by_value(match kind {
        IntegerKind::Byte => "int8_t",
        IntegerKind::Octet => "uint8_t",
        IntegerKind::Short => "int16_t",
        IntegerKind::UnsignedShort => "uint16_t",
        IntegerKind::Long => "int32_t",
        IntegerKind::UnsignedLong => "uint32_t",
        IntegerKind::LongLong => "int64_t",
        IntegerKind::UnsignedLongLong => "uint64_t",
    })
}

fn buffer_source_info(kind: BufferSourceKind, allow_shared: bool) -> TypeInfo {
    if kind == BufferSourceKind::ArrayBuffer {
        return TypeInfo::gc_pointer(if allow_shared {
            "DOMArrayBufferBase"
        } else {
            "DOMArrayBuffer"
        });
    }
    let wrapped = format!("DOM{}", kind.as_str());
    let shell = if allow_shared { "MaybeShared" } else { "NotShared" };
    let value_t = format!("{shell}<{wrapped}>");
    TypeInfo {
        ref_t: value_t.clone(),
        const_ref_t: value_t.clone(),
        member_t: value_t.clone(),
        member_ref_t: value_t.clone(),
        value_t,
        has_null_value: true,
        is_gc_type: false,
        is_traceable: true,
        is_heap_vector_type: false,
        is_move_effective: false,
    }
}

fn script_value_like(value_t: &str) -> TypeInfo {
    TypeInfo {
        value_t: value_t.to_string(),
        ref_t: format!("{value_t}&"),
        const_ref_t: format!("const {value_t}&"),
        member_t: value_t.to_string(),
        member_ref_t: value_t.to_string(),
        has_null_value: false,
        is_gc_type: false,
        is_traceable: true,
        is_heap_vector_type: false,
        is_move_effective: false,
    }
}

/// Element spelling inside a `Vector` / `HeapVector`.
fn element_storage(db: &Database, element: &IdlType) -> Result<(String, bool), GenerationError> {
    let info = blink_type_info(db, element)?;
    if info.is_gc_type {
        let class_name = info.value_t.trim_end_matches('*').to_string();
        Ok((format!("Member<{class_name}>"), true))
    } else {
        Ok((info.value_t, info.is_traceable))
    }
}

/// Map an IDL type to its native representation.
pub fn blink_type_info(db: &Database, idl_type: &IdlType) -> Result<TypeInfo, GenerationError> {
    let unwrapped = idl_type.unwrap(db, UnwrapFlags::typedefs_only());
    match &unwrapped.kind {
        TypeKind::Undefined => Ok(TypeInfo::by_value("void")),
        TypeKind::Boolean => Ok(TypeInfo::by_value("bool")),
        TypeKind::Integer(kind) => Ok(integer_info(*kind)),
        TypeKind::FloatingPoint { kind, .. } => Ok(TypeInfo::by_value(match kind {
            FloatKind::Float => "float",
            FloatKind::Double => "double",
        })),
        TypeKind::Bigint => Ok(TypeInfo::string_like("BigInt")),
        TypeKind::String(_) => Ok(TypeInfo::string_like("String")),
        TypeKind::Object | TypeKind::Any => Ok(script_value_like("ScriptValue")),
        TypeKind::Promise(inner) => {
            let tag = native_value_tag(db, inner)?;
            Ok(script_value_like(&format!("ScriptPromise<{tag}>")))
        }
        TypeKind::Sequence(element)
        | TypeKind::FrozenArray(element)
        | TypeKind::Variadic(element) => {
            let (storage, is_heap) = element_storage(db, element)?;
            let vector = if is_heap { "HeapVector" } else { "Vector" };
            Ok(TypeInfo::vector_like(format!("{vector}<{storage}>"), is_heap))
        }
        TypeKind::ObservableArray(element) => {
            Ok(TypeInfo::gc_pointer(&format!("V8ObservableArray{}", element.union_token(db))))
        }
        TypeKind::Record { key, value } => {
            let key_info = blink_type_info(db, key)?;
            let (value_storage, is_heap) = element_storage(db, value)?;
            let vector = if is_heap { "HeapVector" } else { "Vector" };
            Ok(TypeInfo::vector_like(
                format!("{vector}<std::pair<{}, {value_storage}>>", key_info.value_t),
                is_heap,
            ))
        }
        TypeKind::Nullable(inner) => {
            let inner_info = blink_type_info(db, inner)?;
            if inner_info.has_null_value {
                return Ok(inner_info);
            }
            let value_t = format!("std::optional<{}>", inner_info.value_t);
            Ok(TypeInfo {
                ref_t: format!("{value_t}&"),
                const_ref_t: format!("const {value_t}&"),
                member_t: value_t.clone(),
                member_ref_t: format!("const {value_t}&"),
                value_t,
                has_null_value: true,
                is_gc_type: false,
                is_traceable: inner_info.is_traceable,
                is_heap_vector_type: inner_info.is_heap_vector_type,
                is_move_effective: inner_info.is_move_effective,
            })
        }
        TypeKind::BufferSource { kind, allow_shared } => {
            Ok(buffer_source_info(*kind, *allow_shared))
        }
        TypeKind::Reference(identifier) => {
            if db.find_interface(identifier).is_some() || db.find_dictionary(identifier).is_some()
            {
                return Ok(TypeInfo::gc_pointer(identifier));
            }
            if db.find_enumeration(identifier).is_some() {
                let class_name = format!("V8{identifier}");
                let mut info = TypeInfo::by_value(&class_name);
                info.const_ref_t = format!("const {class_name}&");
                return Ok(info);
            }
            if db.find_callback_function(identifier).is_some()
                || db.find_callback_interface(identifier).is_some()
            {
                return Ok(TypeInfo::gc_pointer(&format!("V8{identifier}")));
            }
            if db.find_union(identifier).is_some() {
                return Ok(TypeInfo::gc_pointer(&format!("V8Union{identifier}")));
            }
            if db.find_observable_array(identifier).is_some() {
                return Ok(TypeInfo::gc_pointer(&format!("V8{identifier}")));
            }
            Err(GenerationError::invariant(
                format!("unknown IDL type `{identifier}`"),
                "<type bridge>",
            ))
        }
    }
}

/// Tag identifying the conversion traits of a type
/// (`NativeValueTraits<TAG>`, `ToV8Traits<TAG>`).
pub fn native_value_tag(db: &Database, idl_type: &IdlType) -> Result<String, GenerationError> {
    let unwrapped = idl_type.unwrap(db, UnwrapFlags::typedefs_only());
    let ext_attrs = &unwrapped.ext_attrs;
    match &unwrapped.kind {
        TypeKind::Undefined => Ok("IDLUndefined".to_string()),
        TypeKind::Boolean => Ok("IDLBoolean".to_string()),
        TypeKind::Integer(kind) => {
            let base = match kind {
                IntegerKind::Byte => "IDLByte",
                IntegerKind::Octet => "IDLOctet",
                IntegerKind::Short => "IDLShort",
                IntegerKind::UnsignedShort => "IDLUnsignedShort",
                IntegerKind::Long => "IDLLong",
                IntegerKind::UnsignedLong => "IDLUnsignedLong",
                IntegerKind::LongLong => "IDLLongLong",
                IntegerKind::UnsignedLongLong => "IDLUnsignedLongLong",
            };
            if ext_attrs.has("Clamp") {
                Ok(format!("{base}Clamp"))
            } else if ext_attrs.has("EnforceRange") {
                Ok(format!("{base}EnforceRange"))
            } else {
                Ok(base.to_string())
            }
        }
        TypeKind::FloatingPoint { kind, unrestricted } => Ok(match (kind, unrestricted) {
            (FloatKind::Float, false) => "IDLFloat",
            (FloatKind::Float, true) => "IDLUnrestrictedFloat",
            (FloatKind::Double, false) => "IDLDouble",
            (FloatKind::Double, true) => "IDLUnrestrictedDouble",
        }
        .to_string()),
        TypeKind::Bigint => Ok("IDLBigint".to_string()),
        TypeKind::String(kind) => {
            let base = match kind {
                StringKind::DomString => "IDLString",
                StringKind::ByteString => "IDLByteString",
                StringKind::UsvString => "IDLUSVString",
            };
            if let Some(context) = ext_attrs.value_of("StringContext") {
                Ok(format!("{base}StringContext{context}"))
            } else {
                Ok(base.to_string())
            }
        }
        TypeKind::Object => Ok("IDLObject".to_string()),
        TypeKind::Any => Ok("IDLAny".to_string()),
        TypeKind::Promise(inner) => {
            Ok(format!("IDLPromise<{}>", native_value_tag(db, inner)?))
        }
        TypeKind::Sequence(element) => {
            Ok(format!("IDLSequence<{}>", native_value_tag(db, element)?))
        }
        TypeKind::FrozenArray(element) => {
            Ok(format!("IDLFrozenArray<{}>", native_value_tag(db, element)?))
        }
        TypeKind::ObservableArray(element) => {
            Ok(format!("IDLObservableArray<{}>", native_value_tag(db, element)?))
        }
        TypeKind::Record { key, value } => Ok(format!(
            "IDLRecord<{}, {}>",
            native_value_tag(db, key)?,
            native_value_tag(db, value)?
        )),
        TypeKind::Nullable(inner) => {
            Ok(format!("IDLNullable<{}>", native_value_tag(db, inner)?))
        }
        TypeKind::Variadic(element) => native_value_tag(db, element),
        TypeKind::BufferSource { kind, allow_shared } => {
            if *kind == BufferSourceKind::ArrayBuffer {
                return Ok(if *allow_shared {
                    "DOMArrayBufferBase".to_string()
                } else {
                    "DOMArrayBuffer".to_string()
                });
            }
            let shell = if *allow_shared { "MaybeShared" } else { "NotShared" };
            Ok(format!("{shell}<DOM{}>", kind.as_str()))
        }
        TypeKind::Reference(identifier) => {
            if db.find_enumeration(identifier).is_some()
                || db.find_callback_function(identifier).is_some()
                || db.find_callback_interface(identifier).is_some()
            {
                return Ok(format!("V8{identifier}"));
            }
            if db.find_union(identifier).is_some() {
                return Ok(format!("V8Union{identifier}"));
            }
            if db.find_interface(identifier).is_some() || db.find_dictionary(identifier).is_some()
            {
                return Ok(identifier.clone());
            }
            Err(GenerationError::invariant(
                format!("unknown IDL type `{identifier}`"),
                "<type bridge>",
            ))
        }
    }
}

/// A default value rendered into the two C++ forms plus the local symbols
/// the initializer references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultValueExpr {
    /// Brace/direct-initializer form, `None` when default-initialization
    /// already produces the value.
    pub initializer_expr: Option<String>,
    /// Right-hand side of an assignment.
    pub assignment_expr: String,
    /// Local symbols the expressions reference (currently only `isolate`).
    pub deps: Vec<&'static str>,
    /// Cheap enough to initialize eagerly in the member declaration.
    pub is_lightweight: bool,
}

/// Spell an IDL default value for a variable of `idl_type`.
pub fn make_default_value_expr(
    db: &Database,
    idl_type: &IdlType,
    default: &DefaultValue,
) -> Result<DefaultValueExpr, GenerationError> {
    let info = blink_type_info(db, idl_type)?;
    let unwrapped = idl_type.unwrap(db, UnwrapFlags::all());
    let expr = |initializer: Option<&str>, assignment: &str, lightweight: bool| {
        Ok(DefaultValueExpr {
            initializer_expr: initializer.map(str::to_string),
            assignment_expr: assignment.to_string(),
            deps: vec![],
            is_lightweight: lightweight,
        })
    };
    match default {
        DefaultValue::Null => {
            if info.is_gc_type {
                expr(None, "nullptr", true)
            } else if info.value_t.starts_with("std::optional<") {
                expr(None, "std::nullopt", true)
            } else if info.value_t == "String" {
                expr(None, "String()", true)
            } else if unwrapped.is_any() {
                Ok(DefaultValueExpr {
                    initializer_expr: Some(
                        "ScriptValue(${isolate}, v8::Null(${isolate}))".to_string(),
                    ),
                    assignment_expr: "ScriptValue(${isolate}, v8::Null(${isolate}))".to_string(),
                    deps: vec!["isolate"],
                    is_lightweight: false,
                })
            } else {
                Err(GenerationError::invariant(
                    format!("null is not a valid default for `{}`", info.value_t),
                    "<type bridge>",
                ))
            }
        }
        DefaultValue::Undefined => Ok(DefaultValueExpr {
            initializer_expr: Some(
                "ScriptValue(${isolate}, v8::Undefined(${isolate}))".to_string(),
            ),
            assignment_expr: "ScriptValue(${isolate}, v8::Undefined(${isolate}))".to_string(),
            deps: vec!["isolate"],
            is_lightweight: false,
        }),
        DefaultValue::Boolean(value) => {
            let text = if *value { "true" } else { "false" };
            expr(Some(text), text, true)
        }
        DefaultValue::Integer(value) => {
            let text = value.to_string();
            expr(Some(&text), &text, true)
        }
        DefaultValue::FloatingPoint(value) => {
            let text = if value.fract() == 0.0 && value.is_finite() {
                format!("{value:.1}")
            } else {
                value.to_string()
            };
            expr(Some(&text), &text, true)
        }
        DefaultValue::String(value) => {
            if unwrapped.is_enumeration(db) {
                let identifier = unwrapped.identifier().unwrap_or_default();
                let enum_value = crate::codegen::name_style::constant(value);
                let text = format!("V8{identifier}(V8{identifier}::Enum::{enum_value})");
                expr(Some(&text), &text, true)
            } else {
                let text = format!("\"{value}\"");
                expr(Some(&text), &text, true)
            }
        }
        DefaultValue::EmptySequence => expr(None, &format!("{}()", info.value_t), true),
        DefaultValue::EmptyDictionary => {
            let unwrapped_info = blink_type_info(db, unwrapped)?;
            let class_name = unwrapped_info.value_t.trim_end_matches('*');
            let text = format!("{class_name}::Create()");
            expr(Some(&text), &text, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use web_idl::{Enumeration, ExtendedAttributes};

    fn db_with_enum() -> Database {
        let mut db = Database::default();
        db.add_enumeration(Enumeration {
            identifier: "Mode".to_string(),
            values: vec!["open".to_string(), "closed".to_string()],
            ext_attrs: ExtendedAttributes::new(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        db
    }

    fn ty(kind: TypeKind) -> IdlType {
        IdlType::new(kind)
    }

    #[test]
    fn long_maps_to_int32() {
        let db = Database::default();
        let info = blink_type_info(&db, &ty(TypeKind::Integer(IntegerKind::Long))).unwrap();
        assert_eq!(info.value_t, "int32_t");
        assert!(!info.has_null_value);
    }

    #[test]
    fn nullable_string_needs_no_optional() {
        let db = Database::default();
        let t = IdlType::nullable(ty(TypeKind::String(StringKind::DomString)));
        let info = blink_type_info(&db, &t).unwrap();
        assert_eq!(info.value_t, "String");
        assert!(info.has_null_value);
    }

    #[test]
    fn nullable_long_wraps_in_optional() {
        let db = Database::default();
        let t = IdlType::nullable(ty(TypeKind::Integer(IntegerKind::Long)));
        let info = blink_type_info(&db, &t).unwrap();
        assert_eq!(info.value_t, "std::optional<int32_t>");
    }

    #[test]
    fn sequence_of_gc_type_is_heap_vector() {
        let mut db = Database::default();
        db.add_interface(web_idl::Interface {
            identifier: "Node".to_string(),
            inherited: None,
            is_mixin: false,
            attributes: vec![],
            constants: vec![],
            constructor_groups: vec![],
            legacy_factory_function_groups: vec![],
            operation_groups: vec![],
            stringifier: None,
            indexed_and_named_properties: None,
            iterable: None,
            maplike: None,
            setlike: None,
            async_iterable: None,
            exposed_constructs: vec![],
            legacy_window_aliases: vec![],
            ext_attrs: ExtendedAttributes::new(),
            exposure: Default::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        let t = ty(TypeKind::Sequence(Box::new(IdlType::reference("Node"))));
        let info = blink_type_info(&db, &t).unwrap();
        assert_eq!(info.value_t, "HeapVector<Member<Node>>");
        assert!(info.is_heap_vector_type && info.is_traceable);
    }

    #[test]
    fn native_value_tags() {
        let db = db_with_enum();
        assert_eq!(
            native_value_tag(&db, &ty(TypeKind::Integer(IntegerKind::Long))).unwrap(),
            "IDLLong"
        );
        let nullable_seq = IdlType::nullable(ty(TypeKind::Sequence(Box::new(ty(
            TypeKind::String(StringKind::DomString),
        )))));
        assert_eq!(
            native_value_tag(&db, &nullable_seq).unwrap(),
            "IDLNullable<IDLSequence<IDLString>>"
        );
        assert_eq!(native_value_tag(&db, &IdlType::reference("Mode")).unwrap(), "V8Mode");
    }

    #[test]
    fn enforce_range_tag() {
        let db = Database::default();
        let t = IdlType::with_ext_attrs(
            TypeKind::Integer(IntegerKind::Long),
            ExtendedAttributes::from_pairs([("EnforceRange", Vec::<String>::new())]),
        );
        assert_eq!(native_value_tag(&db, &t).unwrap(), "IDLLongEnforceRange");
    }

    #[test]
    fn default_value_for_nullable_string_is_null_string() {
        let db = Database::default();
        let t = IdlType::nullable(ty(TypeKind::String(StringKind::DomString)));
        let expr = make_default_value_expr(&db, &t, &DefaultValue::Null).unwrap();
        assert_eq!(expr.initializer_expr, None);
        assert_eq!(expr.assignment_expr, "String()");
    }

    #[test]
    fn default_value_for_any_null_depends_on_isolate() {
        let db = Database::default();
        let expr = make_default_value_expr(&db, &ty(TypeKind::Any), &DefaultValue::Null).unwrap();
        assert_eq!(expr.deps, ["isolate"]);
        assert!(expr.assignment_expr.contains("v8::Null(${isolate})"));
    }

    #[test]
    fn default_enum_value_spells_the_enum_class() {
        let db = db_with_enum();
        let expr = make_default_value_expr(
            &db,
            &IdlType::reference("Mode"),
            &DefaultValue::String("open".to_string()),
        )
        .unwrap();
        assert_eq!(expr.assignment_expr, "V8Mode(V8Mode::Enum::kOpen)");
    }
}
