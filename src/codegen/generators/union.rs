//! Union bindings.
//!
//! A union type becomes a garbage-collected tagged value: a content-type
//! enum naming every flattened member, one storage field per member, and a
//! `Create` conversion that walks the Web IDL union-conversion categories in
//! algorithm order, skipping categories the union cannot hit.

use web_idl::{Database, IdlType, TypeKind, Union, UnwrapFlags};

use crate::codegen::accumulator::include;
use crate::codegen::code_node::{CodeNodeTree, NodeId};
use crate::codegen::cxx::{self, ClassSpec};
use crate::codegen::error::GenerationError;
use crate::codegen::generators::{common, render_pair, GeneratedFile};
use crate::codegen::name_style;
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::path_manager::TargetPaths;
use crate::codegen::source_file;
use crate::codegen::type_bridge::{self, TypeInfo};

/// One flattened member with everything its arms and accessors need.
struct MemberArm {
    token: String,
    type_info: TypeInfo,
    native_value_tag: String,
    var: String,
    /// Position in the conversion-category order; `None` participates only
    /// as a terminal fallback.
    test: Option<ArmTest>,
    terminal_rank: Option<u8>,
}

struct ArmTest {
    priority: u8,
    cond: String,
    /// Platform-object arms convert via `ToWrappableUnsafe` instead of
    /// `NativeValueTraits`.
    wrappable_class: Option<String>,
}

fn classify(db: &Database, idl_type: &IdlType, arm: &mut MemberArm) {
    let unwrapped = idl_type.unwrap(db, UnwrapFlags::typedefs_only());
    if let Some(identifier) = unwrapped.identifier() {
        if let Some(interface) = db.find_interface(identifier) {
            // More derived interfaces test first.
            let depth = interface.inheritance_depth(db) as u8;
            arm.test = Some(ArmTest {
                priority: 20u8.saturating_sub(depth.min(18)),
                cond: format!("V8{identifier}::HasInstance(isolate, v8_value)"),
                wrappable_class: Some(format!("V8{identifier}")),
            });
            return;
        }
        if db.find_callback_function(identifier).is_some() {
            arm.test = Some(ArmTest {
                priority: 40,
                cond: "v8_value->IsFunction()".to_string(),
                wrappable_class: None,
            });
            return;
        }
        if db.find_dictionary(identifier).is_some()
            || db.find_callback_interface(identifier).is_some()
        {
            arm.test = Some(ArmTest {
                priority: 60,
                cond: "v8_value->IsObject()".to_string(),
                wrappable_class: None,
            });
            return;
        }
        if db.find_enumeration(identifier).is_some() {
            arm.terminal_rank = Some(1);
            return;
        }
    }
    match &unwrapped.kind {
        TypeKind::BufferSource { kind, .. } => {
            let cond = match kind {
                web_idl::BufferSourceKind::ArrayBuffer => {
                    "v8_value->IsArrayBuffer() || v8_value->IsSharedArrayBuffer()".to_string()
                }
                web_idl::BufferSourceKind::ArrayBufferView => {
                    "v8_value->IsArrayBufferView()".to_string()
                }
                other => format!("v8_value->Is{}()", other.as_str()),
            };
            arm.test = Some(ArmTest { priority: 30, cond, wrappable_class: None });
        }
        TypeKind::Sequence(_) | TypeKind::FrozenArray(_) => {
            arm.test = Some(ArmTest {
                priority: 50,
                cond: "v8_value->IsArray()".to_string(),
                wrappable_class: None,
            });
        }
        TypeKind::Record { .. } | TypeKind::Object => {
            arm.test = Some(ArmTest {
                priority: 60,
                cond: "v8_value->IsObject()".to_string(),
                wrappable_class: None,
            });
        }
        TypeKind::Boolean => {
            arm.test = Some(ArmTest {
                priority: 70,
                cond: "v8_value->IsBoolean()".to_string(),
                wrappable_class: None,
            });
            arm.terminal_rank = Some(3);
        }
        TypeKind::Integer(_) | TypeKind::FloatingPoint { .. } | TypeKind::Bigint => {
            arm.test = Some(ArmTest {
                priority: 80,
                cond: "v8_value->IsNumber()".to_string(),
                wrappable_class: None,
            });
            arm.terminal_rank = Some(2);
        }
        TypeKind::String(_) => {
            arm.terminal_rank = Some(1);
        }
        TypeKind::Any => {
            arm.terminal_rank = Some(0);
        }
        _ => {}
    }
}

fn member_arm(db: &Database, idl_type: &IdlType) -> Result<MemberArm, GenerationError> {
    let token = idl_type.union_token(db);
    let mut arm = MemberArm {
        var: format!("member_{}_", name_style::file(&token)),
        type_info: type_bridge::blink_type_info(db, idl_type)?,
        native_value_tag: type_bridge::native_value_tag(db, idl_type)?,
        token,
        test: None,
        terminal_rank: None,
    };
    classify(db, idl_type, &mut arm);
    Ok(arm)
}

/// The class name, honoring per-union overrides.
pub fn union_class_name(env: &RuntimeEnv, union: &Union) -> String {
    match env.options.union_names.class_name_override(&union.identifier) {
        Some(name) => name.to_string(),
        None => format!("V8Union{}", union.identifier),
    }
}

pub fn generate_union(
    env: &RuntimeEnv,
    identifier: &str,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let union = env.database.find_union(identifier).ok_or_else(|| {
        GenerationError::invariant(format!("no union `{identifier}`"), "<database>")
    })?;
    let class_name = union_class_name(env, union);
    let component = union.code_generator_info.components().0;
    let target = TargetPaths::union_class(&class_name, component);

    let arms: Vec<MemberArm> = union
        .flattened_member_types
        .iter()
        .map(|t| member_arm(&env.database, t))
        .collect::<Result<_, _>>()?;
    if arms.is_empty() {
        return Err(GenerationError::invariant(
            format!("union `{identifier}` has no flattened members"),
            "<database>",
        ));
    }

    let mut header_tree = CodeNodeTree::new();
    let header = source_file::header_file(&mut header_tree, &target.api_header(&env.paths));
    make_header_class(&mut header_tree, header.body, env, union, &class_name, &arms, &target);

    let mut source_tree = CodeNodeTree::new();
    let source = source_file::source_file(&mut source_tree, &target.api_header(&env.paths));
    make_source_defs(&mut source_tree, source.body, env, union, &class_name, &arms);

    render_pair(
        env,
        component,
        &target.basename,
        &mut header_tree,
        header.root,
        &mut source_tree,
        source.root,
    )
}

fn content_type_token(token: &str) -> String {
    format!("ContentType::k{token}")
}

#[allow(clippy::too_many_arguments)]
fn make_header_class(
    tree: &mut CodeNodeTree,
    body: NodeId,
    env: &RuntimeEnv,
    union: &Union,
    class_name: &str,
    arms: &[MemberArm],
    target: &TargetPaths,
) {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/union_base.h"),
    );
    source_file::add_common_includes(tree, body);

    let class = cxx::class_def(
        tree,
        &ClassSpec {
            name: class_name,
            base_names: &["bindings::UnionBase".to_string()],
            is_final: true,
            export: Some(common::component_export(target.api_component)),
            ..ClassSpec::default()
        },
    );

    let mut content_enum = String::from("  enum class ContentType {\n");
    for arm in arms {
        content_enum.push_str(&format!("    k{},\n", arm.token));
    }
    if union.does_include_nullable_type {
        content_enum.push_str("    kNull,\n");
    }
    content_enum.push_str("  };\n\n");
    let content_enum = tree.literal(content_enum);
    tree.append(class.public_section, content_enum);

    let create = tree.literal(format!(
        "  static {class_name}* Create(v8::Isolate* isolate,\n\
         \x20                            v8::Local<v8::Value> v8_value,\n\
         \x20                            ExceptionState& exception_state);\n\n\
         \x20 ContentType GetContentType() const {{ return content_type_; }}\n\
         \x20 static const char* UnionNameInIDL() {{ return \"{name_in_idl}\"; }}\n",
        name_in_idl = union.name_in_idl(&env.database),
    ));
    tree.append(class.public_section, create);

    if union.does_include_nullable_type {
        let null_api = tree.literal(format!(
            "\n  {class_name}() : content_type_(ContentType::kNull) {{}}\n\
             \x20 bool IsNull() const {{ return content_type_ == ContentType::kNull; }}\n"
        ));
        tree.append(class.public_section, null_api);
    }

    for arm in arms {
        let token = &arm.token;
        let content = content_type_token(token);
        let getter_expr = arm.type_info.member_var_to_ref_expr(&arm.var);
        let ctor_store = if arm.type_info.is_move_effective {
            format!("{} = std::move(value);", arm.var)
        } else {
            format!("{} = value;", arm.var)
        };
        let accessors = tree.literal(format!(
            "\n  explicit {class_name}({value_t} value)\n\
             \x20     : content_type_({content}) {{\n\
             \x20   {ctor_store}\n\
             \x20 }}\n\
             \x20 bool Is{token}() const {{ return content_type_ == {content}; }}\n\
             \x20 {ref_t} GetAs{token}() const {{\n\
             \x20   DCHECK(Is{token}());\n\
             \x20   return {getter_expr};\n\
             \x20 }}\n\
             \x20 void Set({value_t} value);\n",
            value_t = arm.type_info.value_t,
            ref_t = arm.type_info.member_ref_t,
        ));
        tree.append(class.public_section, accessors);
    }

    for subunion in env.options.union_names.subunions_of(&union.identifier) {
        let sub_class = match env.database.find_union(subunion) {
            Some(sub) => union_class_name(env, sub),
            None => format!("V8Union{subunion}"),
        };
        let decl = tree.literal(format!(
            "\n  {sub_class}* ToSubUnion{subunion}() const;\n"
        ));
        tree.append(class.public_section, decl);
    }

    let tail = tree.literal(
        "\n  void Clear();\n\
         \x20 v8::MaybeLocal<v8::Value> ToV8Value(ScriptState* script_state) const;\n\
         \x20 void Trace(Visitor* visitor) const override;\n",
    );
    tree.append(class.public_section, tail);

    for arm in arms {
        let field = tree.literal(format!(
            "  {member_t} {var};\n",
            member_t = arm.type_info.member_t,
            var = arm.var,
        ));
        tree.append(class.private_section, field);
    }
    let initial_tag = if union.does_include_nullable_type {
        "ContentType::kNull".to_string()
    } else {
        content_type_token(&arms[0].token)
    };
    let tag_field = tree.literal(format!("  ContentType content_type_ = {initial_tag};\n"));
    tree.append(class.private_section, tag_field);

    tree.append(body, class.node);
}

fn make_source_defs(
    tree: &mut CodeNodeTree,
    body: NodeId,
    env: &RuntimeEnv,
    union: &Union,
    class_name: &str,
    arms: &[MemberArm],
) {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/native_value_traits_impl.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/to_v8_traits.h"),
    );

    make_create(tree, body, &env.database, union, class_name, arms);
    make_setters(tree, body, class_name, arms);
    make_subunions(tree, body, env, union, class_name, arms);
    make_clear(tree, body, union, class_name, arms);
    make_to_v8_value(tree, body, union, class_name, arms);
    make_trace(tree, body, class_name, arms);
}

fn make_create(
    tree: &mut CodeNodeTree,
    body: NodeId,
    db: &Database,
    union: &Union,
    class_name: &str,
    arms: &[MemberArm],
) {
    let mut text = format!(
        "// static\n\
         {class_name}* {class_name}::Create(v8::Isolate* isolate,\n\
         \x20                                 v8::Local<v8::Value> v8_value,\n\
         \x20                                 ExceptionState& exception_state) {{\n"
    );

    if union.does_include_nullable_type {
        text.push_str(&format!(
            "  if (v8_value->IsNullOrUndefined()) {{\n\
             \x20   return MakeGarbageCollected<{class_name}>();\n\
             \x20 }}\n"
        ));
    }

    // Conditional categories in algorithm order, then one terminal
    // conversion through coercion.
    let mut tested: Vec<(u8, usize, &ArmTest, &MemberArm)> = arms
        .iter()
        .enumerate()
        .filter_map(|(i, arm)| arm.test.as_ref().map(|t| (t.priority, i, t, arm)))
        .collect();
    tested.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    for (_, _, test, arm) in &tested {
        match &test.wrappable_class {
            Some(v8_class) => text.push_str(&format!(
                "  if ({cond}) {{\n\
                 \x20   return MakeGarbageCollected<{class_name}>(\n\
                 \x20       {v8_class}::ToWrappableUnsafe(isolate, v8_value.As<v8::Object>()));\n\
                 \x20 }}\n",
                cond = test.cond,
            )),
            None => text.push_str(&format!(
                "  if ({cond}) {{\n\
                 \x20   auto&& converted_value = NativeValueTraits<{tag}>::NativeValue(\n\
                 \x20       isolate, v8_value, exception_state);\n\
                 \x20   if (exception_state.HadException()) {{\n\
                 \x20     return nullptr;\n\
                 \x20   }}\n\
                 \x20   return MakeGarbageCollected<{class_name}>(std::move(converted_value));\n\
                 \x20 }}\n",
                cond = test.cond,
                tag = arm.native_value_tag,
            )),
        }
    }

    let terminal = arms
        .iter()
        .filter(|arm| arm.terminal_rank.is_some())
        .min_by_key(|arm| arm.terminal_rank.unwrap_or(u8::MAX));
    match terminal {
        Some(arm) => text.push_str(&format!(
            "  auto&& converted_value = NativeValueTraits<{tag}>::NativeValue(\n\
             \x20     isolate, v8_value, exception_state);\n\
             \x20 if (exception_state.HadException()) {{\n\
             \x20   return nullptr;\n\
             \x20 }}\n\
             \x20 return MakeGarbageCollected<{class_name}>(std::move(converted_value));\n",
            tag = arm.native_value_tag,
        )),
        None => text.push_str(&format!(
            "  exception_state.ThrowTypeError(\n\
             \x20     ExceptionMessages::ValueNotOfType(\"{}\"));\n\
             \x20 return nullptr;\n",
            union.name_in_idl(db),
        )),
    }
    text.push_str("}\n\n");
    let node = tree.literal(text);
    tree.append(body, node);
}

fn make_setters(tree: &mut CodeNodeTree, body: NodeId, class_name: &str, arms: &[MemberArm]) {
    for arm in arms {
        let store = if arm.type_info.is_move_effective {
            format!("{} = std::move(value);", arm.var)
        } else {
            format!("{} = value;", arm.var)
        };
        let def = tree.literal(format!(
            "void {class_name}::Set({value_t} value) {{\n\
             \x20 Clear();\n\
             \x20 {store}\n\
             \x20 content_type_ = {content};\n\
             }}\n\n",
            value_t = arm.type_info.value_t,
            content = content_type_token(&arm.token),
        ));
        tree.append(body, def);
    }
}

fn make_subunions(
    tree: &mut CodeNodeTree,
    body: NodeId,
    env: &RuntimeEnv,
    union: &Union,
    class_name: &str,
    arms: &[MemberArm],
) {
    for subunion in env.options.union_names.subunions_of(&union.identifier) {
        let Some(sub) = env.database.find_union(subunion) else { continue };
        let sub_class = union_class_name(env, sub);
        let shared: Vec<&MemberArm> = arms
            .iter()
            .filter(|arm| {
                sub.flattened_member_types
                    .iter()
                    .any(|t| t.union_token(&env.database) == arm.token)
            })
            .collect();
        let mut text = format!(
            "{sub_class}* {class_name}::ToSubUnion{subunion}() const {{\n\
             \x20 switch (content_type_) {{\n"
        );
        for arm in shared {
            let getter_expr = arm.type_info.member_var_to_ref_expr(&arm.var);
            text.push_str(&format!(
                "    case {content}:\n\
                 \x20     return MakeGarbageCollected<{sub_class}>({getter_expr});\n",
                content = content_type_token(&arm.token),
            ));
        }
        text.push_str(
            "    default:\n\
             \x20     NOTREACHED();\n\
             \x20 }\n\
             }\n\n",
        );
        let node = tree.literal(text);
        tree.append(body, node);
    }
}

fn make_clear(
    tree: &mut CodeNodeTree,
    body: NodeId,
    union: &Union,
    class_name: &str,
    arms: &[MemberArm],
) {
    let mut text = format!("void {class_name}::Clear() {{\n");
    for arm in arms {
        text.push_str(&format!("  {};\n", arm.type_info.clear_member_var_expr(&arm.var)));
    }
    let initial_tag = if union.does_include_nullable_type {
        "ContentType::kNull".to_string()
    } else {
        content_type_token(&arms[0].token)
    };
    text.push_str(&format!("  content_type_ = {initial_tag};\n}}\n\n"));
    let node = tree.literal(text);
    tree.append(body, node);
}

fn make_to_v8_value(
    tree: &mut CodeNodeTree,
    body: NodeId,
    union: &Union,
    class_name: &str,
    arms: &[MemberArm],
) {
    let mut text = format!(
        "v8::MaybeLocal<v8::Value> {class_name}::ToV8Value(ScriptState* script_state) const {{\n\
         \x20 switch (content_type_) {{\n"
    );
    for arm in arms {
        let getter_expr = arm.type_info.member_var_to_ref_expr(&arm.var);
        text.push_str(&format!(
            "    case {content}:\n\
             \x20     return ToV8Traits<{tag}>::ToV8(script_state, {getter_expr});\n",
            content = content_type_token(&arm.token),
            tag = arm.native_value_tag,
        ));
    }
    if union.does_include_nullable_type {
        text.push_str(
            "    case ContentType::kNull:\n\
             \x20     return v8::Null(script_state->GetIsolate());\n",
        );
    }
    text.push_str(
        "  }\n\
         \x20 NOTREACHED();\n\
         }\n\n",
    );
    let node = tree.literal(text);
    tree.append(body, node);
}

fn make_trace(tree: &mut CodeNodeTree, body: NodeId, class_name: &str, arms: &[MemberArm]) {
    let mut text = format!("void {class_name}::Trace(Visitor* visitor) const {{\n");
    for arm in arms {
        if arm.type_info.is_traceable {
            text.push_str(&format!("  visitor->Trace({});\n", arm.var));
        }
    }
    text.push_str("  bindings::UnionBase::Trace(visitor);\n}\n");
    let node = tree.literal(text);
    tree.append(body, node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::package_initializer::{GenOptions, PackageInitializer};
    use crate::codegen::path_manager::PathConfig;
    use std::sync::Arc;
    use web_idl::{ExtendedAttributes, StringKind};

    fn node_interface() -> web_idl::Interface {
        web_idl::Interface {
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
        }
    }

    fn env_with_union(nullable: bool, options: GenOptions) -> Arc<RuntimeEnv> {
        let mut db = Database::default();
        db.add_interface(node_interface());
        db.add_union(Union {
            identifier: "NodeOrString".to_string(),
            flattened_member_types: vec![
                IdlType::reference("Node"),
                IdlType::new(TypeKind::String(StringKind::DomString)),
            ],
            does_include_nullable_type: nullable,
            typedef_members: vec![],
            union_members: vec![],
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        PackageInitializer::new(Arc::new(db), PathConfig::chromium_default("/out/gen"), options)
            .init()
    }

    #[test]
    fn content_type_tag_and_accessors() {
        let env = env_with_union(false, GenOptions::default());
        let files = generate_union(&env, "NodeOrString").unwrap();
        let header = &files[0].content;
        assert!(header.contains("class CORE_EXPORT V8UnionNodeOrString final : public bindings::UnionBase {"));
        assert!(header.contains("    kNode,\n    kString,\n"));
        assert!(header.contains("bool IsNode() const"));
        assert!(header.contains("bool IsString() const"));
        assert!(header.contains("Member<Node> member_node_;"));
        assert!(header.contains("String member_string_;"));
        assert!(!header.contains("kNull"));
    }

    #[test]
    fn create_tests_platform_object_before_string_fallback() {
        let env = env_with_union(false, GenOptions::default());
        let files = generate_union(&env, "NodeOrString").unwrap();
        let source = &files[1].content;
        let node_test = source.find("V8Node::HasInstance(isolate, v8_value)").unwrap();
        let string_fallback = source
            .find("NativeValueTraits<IDLString>::NativeValue")
            .unwrap();
        assert!(node_test < string_fallback);
        assert!(source.contains("ToWrappableUnsafe(isolate, v8_value.As<v8::Object>())"));
    }

    #[test]
    fn nullable_union_accepts_null_and_tracks_it() {
        let env = env_with_union(true, GenOptions::default());
        let files = generate_union(&env, "NodeOrString").unwrap();
        let header = &files[0].content;
        assert!(header.contains("    kNull,\n"));
        assert!(header.contains("bool IsNull() const"));
        let source = &files[1].content;
        assert!(source.contains("if (v8_value->IsNullOrUndefined()) {"));
    }

    #[test]
    fn name_override_changes_class_and_file() {
        let mut options = GenOptions::default();
        options.union_names.insert_class_name("NodeOrString", "V8UnionNodeOrText");
        let env = env_with_union(false, options);
        let files = generate_union(&env, "NodeOrString").unwrap();
        assert!(files[0].path.to_string_lossy().ends_with("v8_union_node_or_text.h"));
        assert!(files[0].content.contains("class CORE_EXPORT V8UnionNodeOrText final"));
    }
}
