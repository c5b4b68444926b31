//! Dictionary bindings.
//!
//! An IDL dictionary becomes a garbage-collected value-bag class: one storage
//! field per member, a presence flag where the native type has no null
//! sentinel, and the V8 conversion pair (`FillMembersFromV8Object` /
//! `FillV8ObjectWithMembers`) walking members in declaration order.

use web_idl::{Database, Dictionary, DictionaryMember};

use crate::codegen::accumulator::{include, AccumulatorOp};
use crate::codegen::code_node::{CodeNodeTree, NodeId};
use crate::codegen::cxx::{self, ClassSpec};
use crate::codegen::error::GenerationError;
use crate::codegen::exposure::expr_from_exposure;
use crate::codegen::generators::{common, render_pair, GeneratedFile};
use crate::codegen::name_style;
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::path_manager::TargetPaths;
use crate::codegen::source_file;
use crate::codegen::type_bridge::{self, TypeInfo};

/// Everything the builders need to know about one member.
struct MemberCtx {
    identifier: String,
    type_info: TypeInfo,
    native_value_tag: String,
    var: String,
    has_flag: Option<String>,
    default_initializer: Option<String>,
    default_assignment: Option<String>,
    is_required: bool,
    deprecate_as: Option<String>,
}

/// Whether the member's storage itself can answer "is a value present".
fn presence_expr(info: &TypeInfo, var: &str) -> Option<String> {
    if info.is_gc_type {
        return Some(format!("{var} != nullptr"));
    }
    if info.value_t == "String" || info.value_t == "BigInt" {
        return Some(format!("!{var}.IsNull()"));
    }
    if info.value_t.starts_with("std::optional<") {
        return Some(format!("{var}.has_value()"));
    }
    if info.value_t == "ScriptValue" {
        return Some(format!("!{var}.IsEmpty()"));
    }
    None
}

fn member_ctx(
    db: &Database,
    member: &DictionaryMember,
) -> Result<MemberCtx, GenerationError> {
    let type_info = type_bridge::blink_type_info(db, &member.idl_type)?;
    let native_value_tag = type_bridge::native_value_tag(db, &member.idl_type)?;
    let var = format!("member_{}_", name_style::arg(&member.identifier));
    let (default_initializer, default_assignment) = match &member.default_value {
        Some(default) => {
            let expr = type_bridge::make_default_value_expr(db, &member.idl_type, default)?;
            let initializer = if expr.is_lightweight { expr.initializer_expr } else { None };
            (initializer, Some(expr.assignment_expr))
        }
        None => (None, None),
    };
    // Present always (default) or detectable from storage: no flag.
    let has_flag = if member.default_value.is_some() || presence_expr(&type_info, &var).is_some()
    {
        None
    } else {
        Some(format!("has_{}_", name_style::arg(&member.identifier)))
    };
    Ok(MemberCtx {
        identifier: member.identifier.clone(),
        type_info,
        native_value_tag,
        var,
        has_flag,
        default_initializer,
        default_assignment,
        is_required: member.is_required,
        deprecate_as: member.ext_attrs.value_of("DeprecateAs").map(str::to_string),
    })
}

pub fn generate_dictionary(
    env: &RuntimeEnv,
    identifier: &str,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let dictionary = env.database.find_dictionary(identifier).ok_or_else(|| {
        GenerationError::invariant(format!("no dictionary `{identifier}`"), "<database>")
    })?;
    let target = TargetPaths::bindings(&dictionary.identifier, &dictionary.code_generator_info);

    // Trivially-unexposed members vanish from the class entirely.
    let members: Vec<MemberCtx> = dictionary
        .own_members
        .iter()
        .filter(|m| !expr_from_exposure(&m.exposure, false).is_always_false())
        .map(|m| member_ctx(&env.database, m))
        .collect::<Result<_, _>>()?;

    let mut header_tree = CodeNodeTree::new();
    let header = source_file::header_file(&mut header_tree, &target.api_header(&env.paths));
    make_header_class(&mut header_tree, header.body, dictionary, &members, &target);

    let mut source_tree = CodeNodeTree::new();
    let source = source_file::source_file(&mut source_tree, &target.api_header(&env.paths));
    make_source_defs(&mut source_tree, source.body, env, dictionary, &members)?;

    render_pair(
        env,
        target.api_component,
        &target.basename,
        &mut header_tree,
        header.root,
        &mut source_tree,
        source.root,
    )
}

fn base_class(dictionary: &Dictionary) -> String {
    match &dictionary.inherited {
        Some(parent) => parent.clone(),
        None => "bindings::DictionaryBase".to_string(),
    }
}

fn make_header_class(
    tree: &mut CodeNodeTree,
    body: NodeId,
    dictionary: &Dictionary,
    members: &[MemberCtx],
    target: &TargetPaths,
) {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/dictionary_base.h"),
    );
    tree.accumulate(body, include("third_party/blink/renderer/platform/heap/visitor.h"));
    tree.accumulate(body, include("base/containers/span.h"));
    source_file::add_common_includes(tree, body);

    let class_name = dictionary.identifier.as_str();
    let class = cxx::class_def(
        tree,
        &ClassSpec {
            name: class_name,
            base_names: &[base_class(dictionary)],
            is_final: false,
            export: Some(common::component_export(target.api_component)),
            ..ClassSpec::default()
        },
    );

    let factory = tree.literal(format!(
        "  static {class_name}* Create() {{\n\
         \x20   return MakeGarbageCollected<{class_name}>();\n\
         \x20 }}\n\
         \x20 static {class_name}* Create(v8::Isolate* isolate,\n\
         \x20                             v8::Local<v8::Value> v8_value,\n\
         \x20                             ExceptionState& exception_state);\n\n\
         \x20 {class_name}() = default;\n"
    ));
    tree.append(class.public_section, factory);

    for member in members {
        let api = name_style::api_func(&member.identifier);
        let setter = name_style::func(&member.identifier);
        let has_body = match (&member.has_flag, &member.default_assignment) {
            (_, Some(_)) => "return true;".to_string(),
            (Some(flag), None) => format!("return {flag};"),
            (None, None) => {
                let expr = presence_expr(&member.type_info, &member.var)
                    .unwrap_or_else(|| "true".to_string());
                format!("return {expr};")
            }
        };
        let getter_expr = member.type_info.member_var_to_ref_expr(&member.var);
        let accessors = tree.literal(format!(
            "\n  bool has{setter}() const {{ {has_body} }}\n\
             \x20 {ref_t} {api}() const {{ return {getter_expr}; }}\n\
             \x20 void set{setter}({value_t} value);\n",
            ref_t = member.type_info.member_ref_t,
            value_t = member.type_info.value_t,
        ));
        tree.append(class.public_section, accessors);
    }

    let overrides = tree.literal(
        "\n  void Trace(Visitor* visitor) const override;\n\n\
         \x20 bool FillV8ObjectWithMembers(ScriptState* script_state,\n\
         \x20                              v8::Local<v8::Object> v8_object) const;\n\
         \x20 void FillMembersFromV8Object(v8::Isolate* isolate,\n\
         \x20                              v8::Local<v8::Value> v8_value,\n\
         \x20                              ExceptionState& exception_state);\n\
         \x20 static base::span<const v8::Eternal<v8::Name>> GetV8OwnMemberNames(\n\
         \x20     v8::Isolate* isolate);\n",
    );
    tree.append(class.public_section, overrides);

    for member in members {
        let initializer = match &member.default_initializer {
            Some(expr) => format!(" = {expr}"),
            None => String::new(),
        };
        let field = tree.literal(format!(
            "  {member_t} {var}{initializer};\n",
            member_t = member.type_info.member_t,
            var = member.var,
        ));
        tree.append(class.private_section, field);
        if let Some(flag) = &member.has_flag {
            let field = tree.literal(format!("  bool {flag} = false;\n"));
            tree.append(class.private_section, field);
        }
    }

    tree.append(body, class.node);
}

/// Locals the fill functions may demand; parameters are `isolate`,
/// `v8_value` and `exception_state`.
fn bind_fill_local_vars(tree: &mut CodeNodeTree, scope: NodeId) {
    common::register_local_symbol(
        tree,
        scope,
        "current_context",
        "v8::Local<v8::Context> current_context = isolate->GetCurrentContext();\n",
        &[],
    );
    common::register_local_symbol(
        tree,
        scope,
        "execution_context",
        "ExecutionContext* execution_context = ToExecutionContext(${current_context});\n",
        &["current_context"],
    );
    for var in ["current_context", "execution_context"] {
        let reference = tree.symbol_ref(var);
        tree.bind_base(scope, var, reference);
    }
}

fn make_source_defs(
    tree: &mut CodeNodeTree,
    body: NodeId,
    env: &RuntimeEnv,
    dictionary: &Dictionary,
    members: &[MemberCtx],
) -> Result<(), GenerationError> {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/generated_code_helper.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/native_value_traits_impl.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/to_v8_traits.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/exception_messages.h"),
    );
    tree.accumulate(body, AccumulatorOp::StdcppIncludeHeader("utility".to_string()));
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/v8_per_isolate_data.h"),
    );

    let class_name = dictionary.identifier.as_str();
    let idl_name = &dictionary.identifier;

    // Member name literals, cached as eternal V8 names per isolate.
    let mut names_def =
        String::from("namespace {\n\nconst char* const kOwnMemberNames[] = {\n");
    for member in members {
        names_def.push_str(&format!("    \"{}\",\n", member.identifier));
    }
    names_def.push_str("};\n\n}  // namespace\n\n");
    let names_def = tree.literal(names_def);
    tree.append(body, names_def);

    let eternal_names = tree.literal(format!(
        "// static\n\
         base::span<const v8::Eternal<v8::Name>> {class_name}::GetV8OwnMemberNames(\n\
         \x20   v8::Isolate* isolate) {{\n\
         \x20 return V8PerIsolateData::From(isolate)->FindOrCreateEternalNameCache(\n\
         \x20     kOwnMemberNames, kOwnMemberNames);\n\
         }}\n\n"
    ));
    tree.append(body, eternal_names);

    let strict = dictionary.has_required_members(&env.database)
        && !dictionary.ext_attrs.has("PermissiveDictionaryConversion");
    let null_check = if strict {
        format!(
            "  if (v8_value->IsNullOrUndefined()) {{\n\
             \x20   exception_state.ThrowTypeError(\n\
             \x20       ExceptionMessages::FailedToConstruct(\n\
             \x20           \"{idl_name}\", \"has required members, but null/undefined was passed\"));\n\
             \x20   return nullptr;\n\
             \x20 }}\n"
        )
    } else {
        String::new()
    };
    let create = tree.literal(format!(
        "// static\n\
         {class_name}* {class_name}::Create(v8::Isolate* isolate,\n\
         \x20                                v8::Local<v8::Value> v8_value,\n\
         \x20                                ExceptionState& exception_state) {{\n\
         {null_check}\
         \x20 {class_name}* dictionary = MakeGarbageCollected<{class_name}>();\n\
         \x20 dictionary->FillMembersFromV8Object(isolate, v8_value, exception_state);\n\
         \x20 if (exception_state.HadException()) {{\n\
         \x20   return nullptr;\n\
         \x20 }}\n\
         \x20 return dictionary;\n\
         }}\n\n"
    ));
    tree.append(body, create);

    make_setters(tree, body, class_name, members);
    make_fill_from_v8(tree, body, class_name, idl_name, members);
    make_fill_v8_object(tree, body, class_name, members);
    make_trace(tree, body, class_name, dictionary, members);
    Ok(())
}

fn make_setters(
    tree: &mut CodeNodeTree,
    body: NodeId,
    class_name: &str,
    members: &[MemberCtx],
) {
    for member in members {
        let setter = name_style::func(&member.identifier);
        let assign = if member.type_info.is_move_effective {
            format!("{} = std::move(value);", member.var)
        } else {
            format!("{} = value;", member.var)
        };
        let mark_present = match &member.has_flag {
            Some(flag) => format!("\n  {flag} = true;"),
            None => String::new(),
        };
        let def = tree.literal(format!(
            "void {class_name}::set{setter}({value_t} value) {{\n\
             \x20 {assign}{mark_present}\n\
             }}\n\n",
            value_t = member.type_info.value_t,
        ));
        tree.append(body, def);
    }
}

fn make_fill_from_v8(
    tree: &mut CodeNodeTree,
    body: NodeId,
    class_name: &str,
    idl_name: &str,
    members: &[MemberCtx],
) {
    let func = cxx::func_def(
        tree,
        &format!("{class_name}::FillMembersFromV8Object"),
        &[
            "v8::Isolate* isolate".to_string(),
            "v8::Local<v8::Value> v8_value".to_string(),
            "ExceptionState& exception_state".to_string(),
        ],
        "void",
        &Default::default(),
    );
    bind_fill_local_vars(tree, func.body);

    let preamble = tree.literal(format!(
        "if (v8_value->IsNullOrUndefined()) {{\n\
         \x20 return;\n\
         }}\n\
         if (!v8_value->IsObject()) {{\n\
         \x20 exception_state.ThrowTypeError(\n\
         \x20     ExceptionMessages::ValueNotOfType(\"{idl_name}\"));\n\
         \x20 return;\n\
         }}\n\
         v8::Local<v8::Object> v8_object = v8_value.As<v8::Object>();\n"
    ));
    tree.append(func.body, preamble);

    for (index, member) in members.iter().enumerate() {
        let name = &member.identifier;
        let local = format!("{}_value", name_style::arg(name));
        let get = common::text_with_symbols(
            tree,
            &format!(
                "v8::Local<v8::Value> {local};\n\
                 if (!v8_object->Get(${{current_context}}, \
                 V8AtomicString(isolate, kOwnMemberNames[{index}]))\n\
                 \x20        .ToLocal(&{local})) {{\n\
                 \x20 return;\n\
                 }}\n"
            ),
            &["current_context"],
        );
        tree.append(func.body, get);

        let missing = if member.is_required {
            format!(
                "  exception_state.ThrowTypeError(\n\
                 \x20     ExceptionMessages::FailedToGet(\n\
                 \x20         \"{name}\", \"{idl_name}\", \"Required member is undefined.\"));\n\
                 \x20 return;\n"
            )
        } else {
            String::new()
        };

        let deprecation = match &member.deprecate_as {
            Some(feature) => format!(
                "  Deprecation::CountDeprecation(${{execution_context}}, \
                 WebFeature::k{feature});\n"
            ),
            None => String::new(),
        };
        let assign = if member.type_info.is_move_effective {
            format!("{} = std::move(converted_value);", member.var)
        } else {
            format!("{} = converted_value;", member.var)
        };
        let mark_present = match &member.has_flag {
            Some(flag) => format!("\n  {flag} = true;"),
            None => String::new(),
        };
        let deps: &[&str] =
            if member.deprecate_as.is_some() { &["execution_context"] } else { &[] };
        let convert = common::text_with_symbols(
            tree,
            &format!(
                "if ({local}->IsUndefined()) {{\n\
                 {missing}\
                 }} else {{\n\
                 {deprecation}\
                 \x20 auto&& converted_value = NativeValueTraits<{tag}>::NativeValue(\n\
                 \x20     isolate, {local}, exception_state);\n\
                 \x20 if (exception_state.HadException()) {{\n\
                 \x20   return;\n\
                 \x20 }}\n\
                 \x20 {assign}{mark_present}\n\
                 }}\n",
                tag = member.native_value_tag,
            ),
            deps,
        );
        tree.append(func.body, convert);
    }

    tree.append(body, func.node);
    let spacer = tree.literal("\n");
    tree.append(body, spacer);
}

fn make_fill_v8_object(
    tree: &mut CodeNodeTree,
    body: NodeId,
    class_name: &str,
    members: &[MemberCtx],
) {
    let func = cxx::func_def(
        tree,
        &format!("{class_name}::FillV8ObjectWithMembers"),
        &[
            "ScriptState* script_state".to_string(),
            "v8::Local<v8::Object> v8_object".to_string(),
        ],
        "bool",
        &cxx::FuncQuals { is_const: true, ..Default::default() },
    );

    let preamble = tree.literal(
        "v8::Isolate* isolate = script_state->GetIsolate();\n\
         v8::Local<v8::Context> current_context = script_state->GetContext();\n",
    );
    tree.append(func.body, preamble);

    for (index, member) in members.iter().enumerate() {
        let setter = name_style::func(&member.identifier);
        let value_expr = member.type_info.member_var_to_ref_expr(&member.var);
        let write = tree.literal(format!(
            "if (has{setter}()) {{\n\
             \x20 if (!v8_object\n\
             \x20          ->CreateDataProperty(\n\
             \x20              current_context,\n\
             \x20              V8AtomicString(isolate, kOwnMemberNames[{index}]),\n\
             \x20              ToV8Traits<{tag}>::ToV8(script_state, {value_expr}))\n\
             \x20          .ToChecked()) {{\n\
             \x20   return false;\n\
             \x20 }}\n\
             }}\n",
            tag = member.native_value_tag,
        ));
        tree.append(func.body, write);
    }
    let epilogue = tree.literal("return true;\n");
    tree.append(func.body, epilogue);

    tree.append(body, func.node);
    let spacer = tree.literal("\n");
    tree.append(body, spacer);
}

fn make_trace(
    tree: &mut CodeNodeTree,
    body: NodeId,
    class_name: &str,
    dictionary: &Dictionary,
    members: &[MemberCtx],
) {
    let mut trace = format!("void {class_name}::Trace(Visitor* visitor) const {{\n");
    for member in members {
        if member.type_info.is_traceable {
            trace.push_str(&format!("  visitor->Trace({});\n", member.var));
        }
    }
    trace.push_str(&format!("  {}::Trace(visitor);\n}}\n", base_class(dictionary)));
    let trace = tree.literal(trace);
    tree.append(body, trace);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::package_initializer::{GenOptions, PackageInitializer};
    use crate::codegen::path_manager::PathConfig;
    use std::sync::Arc;
    use web_idl::{
        DefaultValue, Enumeration, ExtendedAttributes, IdlType, IntegerKind, StringKind, TypeKind,
    };

    fn member(identifier: &str, idl_type: IdlType) -> DictionaryMember {
        DictionaryMember {
            identifier: identifier.to_string(),
            idl_type,
            is_required: false,
            default_value: None,
            ext_attrs: ExtendedAttributes::new(),
            exposure: Default::default(),
            debug_info: Default::default(),
        }
    }

    fn env_with_dict(members: Vec<DictionaryMember>) -> Arc<RuntimeEnv> {
        let mut db = Database::default();
        db.add_enumeration(Enumeration {
            identifier: "ShadowRootMode".to_string(),
            values: vec!["open".to_string(), "closed".to_string()],
            ext_attrs: ExtendedAttributes::new(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        db.add_dictionary(Dictionary {
            identifier: "ShadowRootInit".to_string(),
            inherited: None,
            own_members: members,
            ext_attrs: ExtendedAttributes::new(),
            exposure: Default::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        PackageInitializer::new(
            Arc::new(db),
            PathConfig::chromium_default("/out/gen"),
            GenOptions::default(),
        )
        .init()
    }

    #[test]
    fn presence_flag_only_where_storage_cannot_tell() {
        let env = env_with_dict(vec![
            member("delegatesFocus", IdlType::new(TypeKind::Boolean)),
            member("name", IdlType::new(TypeKind::String(StringKind::DomString))),
        ]);
        let files = generate_dictionary(&env, "ShadowRootInit").unwrap();
        let header = &files[0].content;
        // bool has no null sentinel: flag. String does: no flag.
        assert!(header.contains("bool has_delegates_focus_ = false;"));
        assert!(!header.contains("has_name_"));
        assert!(header.contains("bool hasName() const { return !member_name_.IsNull(); }"));
    }

    #[test]
    fn required_member_throws_when_undefined() {
        let mut required = member("mode", IdlType::reference("ShadowRootMode"));
        required.is_required = true;
        let env = env_with_dict(vec![required]);
        let files = generate_dictionary(&env, "ShadowRootInit").unwrap();
        let source = &files[1].content;
        assert!(source.contains("Required member is undefined."));
        // Required members also force strict null handling in Create.
        assert!(source.contains("has required members, but null/undefined was passed"));
        assert!(source.contains("NativeValueTraits<V8ShadowRootMode>::NativeValue"));
    }

    #[test]
    fn default_value_initializes_storage_inline() {
        let mut with_default = member("count", IdlType::new(TypeKind::Integer(IntegerKind::Long)));
        with_default.default_value = Some(DefaultValue::Integer(4));
        let env = env_with_dict(vec![with_default]);
        let files = generate_dictionary(&env, "ShadowRootInit").unwrap();
        let header = &files[0].content;
        assert!(header.contains("int32_t member_count_ = 4;"));
        assert!(header.contains("bool hasCount() const { return true; }"));
    }

    #[test]
    fn members_fill_in_declaration_order() {
        let env = env_with_dict(vec![
            member("b", IdlType::new(TypeKind::Boolean)),
            member("a", IdlType::new(TypeKind::Boolean)),
        ]);
        let files = generate_dictionary(&env, "ShadowRootInit").unwrap();
        let source = &files[1].content;
        let b_at = source.find("kOwnMemberNames[0]").unwrap();
        let a_at = source.find("kOwnMemberNames[1]").unwrap();
        assert!(b_at < a_at);
        assert!(source.contains("    \"b\",\n    \"a\",\n"));
    }
}
