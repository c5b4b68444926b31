//! Callback interface bindings.
//!
//! A callback interface wraps an arbitrary JS object. Invoking an operation
//! first resolves the callable: the object itself when it is callable,
//! otherwise the property named after the operation. Interfaces with
//! constants additionally get a `WrapperTypeInfo` and an interface template
//! that installs the constant table.

use web_idl::{CallbackInterface, Database, Operation};

use crate::codegen::accumulator::include;
use crate::codegen::code_node::{CodeNodeTree, NodeId};
use crate::codegen::cxx::{self, ClassSpec};
use crate::codegen::error::GenerationError;
use crate::codegen::exposure::expr_from_exposure;
use crate::codegen::generators::{common, render_pair, GeneratedFile};
use crate::codegen::name_style;
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::path_manager::TargetPaths;
use crate::codegen::source_file;
use crate::codegen::type_bridge;

pub fn generate_callback_interface(
    env: &RuntimeEnv,
    identifier: &str,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let interface = env.database.find_callback_interface(identifier).ok_or_else(|| {
        GenerationError::invariant(format!("no callback interface `{identifier}`"), "<database>")
    })?;
    let class_name = format!("V8{}", interface.identifier);
    let target = TargetPaths::bindings(&interface.identifier, &interface.code_generator_info);

    let mut header_tree = CodeNodeTree::new();
    let header = source_file::header_file(&mut header_tree, &target.api_header(&env.paths));
    make_header_class(&mut header_tree, header.body, env, interface, &class_name, &target)?;

    let mut source_tree = CodeNodeTree::new();
    let source = source_file::source_file(&mut source_tree, &target.api_header(&env.paths));
    make_source_defs(&mut source_tree, source.body, env, interface, &class_name)?;

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

/// Callback interfaces never overload; each group carries one operation.
fn single_operation<'a>(
    interface: &'a CallbackInterface,
    group_index: usize,
) -> Result<&'a Operation, GenerationError> {
    let group = &interface.operation_groups[group_index];
    if group.operations.len() != 1 {
        return Err(GenerationError::invariant(
            format!("callback interface operation `{}` is overloaded", group.identifier),
            &interface.identifier,
        ));
    }
    Ok(&group.operations[0])
}

fn maybe_return(db: &Database, operation: &Operation) -> Result<(String, String), GenerationError> {
    if operation.return_type.is_undefined() {
        return Ok(("v8::Maybe<void>".to_string(), "void".to_string()));
    }
    let info = type_bridge::blink_type_info(db, &operation.return_type)?;
    Ok((format!("v8::Maybe<{}>", info.value_t), info.value_t))
}

fn operation_args(db: &Database, operation: &Operation) -> Result<Vec<String>, GenerationError> {
    let mut decls =
        vec!["bindings::V8ValueOrScriptWrappableAdapter callback_this_value".to_string()];
    for arg in &operation.arguments {
        let info = type_bridge::blink_type_info(db, &arg.idl_type)?;
        // GC pointers pass by value; everything else by const reference.
        let spelling = if info.is_gc_type { &info.value_t } else { &info.const_ref_t };
        decls.push(format!("{spelling} {}", name_style::arg(&arg.identifier)));
    }
    Ok(decls)
}

fn make_header_class(
    tree: &mut CodeNodeTree,
    body: NodeId,
    env: &RuntimeEnv,
    interface: &CallbackInterface,
    class_name: &str,
    target: &TargetPaths,
) -> Result<(), GenerationError> {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/callback_interface_base.h"),
    );
    source_file::add_common_includes(tree, body);

    let class = cxx::class_def(
        tree,
        &ClassSpec {
            name: class_name,
            base_names: &["CallbackInterfaceBase".to_string()],
            is_final: true,
            export: Some(common::component_export(target.api_component)),
            ..ClassSpec::default()
        },
    );

    let callable_kind = if interface.is_single_operation() {
        "kSingleOperation"
    } else {
        "kNotSingleOperation"
    };
    let factory = tree.literal(format!(
        "  static {class_name}* Create(v8::Local<v8::Object> callback_object) {{\n\
         \x20   return MakeGarbageCollected<{class_name}>(callback_object);\n\
         \x20 }}\n\n\
         \x20 explicit {class_name}(v8::Local<v8::Object> callback_object)\n\
         \x20     : CallbackInterfaceBase(callback_object, {callable_kind}) {{}}\n\n"
    ));
    tree.append(class.public_section, factory);

    if !interface.constants.is_empty() {
        let wti = common::wrapper_type_info_decls(tree);
        tree.append(class.public_section, wti);
        let install = tree.literal(
            "  static void InstallInterfaceTemplate(\n\
             \x20     v8::Isolate* isolate,\n\
             \x20     const DOMWrapperWorld& world,\n\
             \x20     v8::Local<v8::Template> interface_template);\n\n"
                .to_string(),
        );
        tree.append(class.public_section, install);
    }

    for group_index in 0..interface.operation_groups.len() {
        let operation = single_operation(interface, group_index)?;
        let (maybe_ret, _) = maybe_return(&env.database, operation)?;
        let args = operation_args(&env.database, operation)?;
        let decl = tree.literal(format!(
            "  {maybe_ret} {}({});\n",
            name_style::class_name(&operation.identifier),
            args.join(", ")
        ));
        tree.append(class.public_section, decl);
    }

    tree.append(body, class.node);
    Ok(())
}

fn constant_table(db: &Database, interface: &CallbackInterface) -> Result<String, GenerationError> {
    let mut table =
        String::from("  static constexpr bindings::ConstantConfig kConstantTable[] = {\n");
    for constant in &interface.constants {
        if expr_from_exposure(&constant.exposure, false).is_always_false() {
            continue;
        }
        let value_t = type_bridge::blink_type_info(db, &constant.idl_type)?.value_t;
        table.push_str(&format!(
            "      {{\"{}\", static_cast<{value_t}>({})}},\n",
            constant.identifier, constant.value_literal
        ));
    }
    table.push_str("  };\n");
    Ok(table)
}

fn make_source_defs(
    tree: &mut CodeNodeTree,
    body: NodeId,
    env: &RuntimeEnv,
    interface: &CallbackInterface,
    class_name: &str,
) -> Result<(), GenerationError> {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/to_v8_traits.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/v8_script_runner.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/exception_messages.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/v8_throw_exception.h"),
    );

    let db = &env.database;
    let idl_name = &interface.identifier;

    if !interface.constants.is_empty() {
        let wti = common::wrapper_type_info_def(
            tree,
            &common::WrapperTypeInfoSpec {
                class_name,
                idl_name,
                parent: None,
                kind: common::IdlDefinitionKind::CallbackInterface,
                has_prototype: false,
                is_node: false,
                is_active_script_wrappable: false,
                has_context_dependent_properties: false,
                skipped_in_interface_object_prototype_chain: false,
            },
        );
        tree.append(body, wti);

        let table = constant_table(db, interface)?;
        let install = tree.literal(format!(
            "\n// static\n\
             void {class_name}::InstallInterfaceTemplate(\n\
             \x20   v8::Isolate* isolate,\n\
             \x20   const DOMWrapperWorld& world,\n\
             \x20   v8::Local<v8::Template> interface_template) {{\n\
             \x20 bindings::SetupIDLCallbackInterfaceTemplate(\n\
             \x20     isolate, GetWrapperTypeInfo(),\n\
             \x20     interface_template.As<v8::FunctionTemplate>());\n\n\
             {table}\
             \x20 bindings::InstallConstants(isolate, interface_template, kConstantTable);\n\
             }}\n\n"
        ));
        tree.append(body, install);
    }

    let mut converts_return = false;
    for group_index in 0..interface.operation_groups.len() {
        let operation = single_operation(interface, group_index)?;
        converts_return |= !operation.return_type.is_undefined();
        let def = operation_def(db, interface, operation, class_name)?;
        let def = tree.literal(def);
        tree.append(body, def);
    }
    if converts_return {
        tree.accumulate(
            body,
            include("third_party/blink/renderer/bindings/core/v8/native_value_traits_impl.h"),
        );
    }
    Ok(())
}

fn operation_def(
    db: &Database,
    interface: &CallbackInterface,
    operation: &Operation,
    class_name: &str,
) -> Result<String, GenerationError> {
    let idl_name = &interface.identifier;
    let property_name = &operation.identifier;
    let method_name = name_style::class_name(property_name);
    let (maybe_ret, native_ret) = maybe_return(db, operation)?;
    let nothing = if operation.return_type.is_undefined() {
        "v8::Nothing<void>()".to_string()
    } else {
        format!("v8::Nothing<{native_ret}>()")
    };
    let args = operation_args(db, operation)?;

    let mut text = format!(
        "{maybe_ret} {class_name}::{method_name}({args}) {{\n\
         \x20 ScriptState* script_state =\n\
         \x20     CallbackRelevantScriptStateOrThrowException(\"{idl_name}\", \"{property_name}\");\n\
         \x20 if (!script_state) {{\n\
         \x20   return {nothing};\n\
         \x20 }}\n\
         \x20 if (!IsCallbackFunctionRunnable(script_state, IncumbentScriptState())) {{\n\
         \x20   return {nothing};\n\
         \x20 }}\n\
         \x20 ScriptState::Scope callback_relevant_context_scope(script_state);\n\n\
         \x20 v8::Local<v8::Function> function;\n\
         \x20 if (IsCallbackObjectCallable()) {{\n\
         \x20   function = CallbackObject().As<v8::Function>();\n\
         \x20 }} else {{\n\
         \x20   v8::Local<v8::Value> value;\n\
         \x20   if (!CallbackObject()\n\
         \x20            ->Get(script_state->GetContext(),\n\
         \x20                  V8String(GetIsolate(), \"{property_name}\"))\n\
         \x20            .ToLocal(&value)) {{\n\
         \x20     return {nothing};\n\
         \x20   }}\n\
         \x20   if (!value->IsFunction()) {{\n\
         \x20     V8ThrowException::ThrowTypeError(\n\
         \x20         GetIsolate(),\n\
         \x20         ExceptionMessages::FailedToExecute(\n\
         \x20             \"{property_name}\", \"{idl_name}\",\n\
         \x20             \"The provided callback is not callable.\"));\n\
         \x20     return {nothing};\n\
         \x20   }}\n\
         \x20   function = value.As<v8::Function>();\n\
         \x20 }}\n",
        args = args.join(", "),
    );

    if operation.arguments.is_empty() {
        text.push_str(
            "  const int argc = 0;\n  v8::Local<v8::Value>* argv = nullptr;\n",
        );
    } else {
        text.push_str("  v8::Local<v8::Value> argv_array[] = {\n");
        for arg in &operation.arguments {
            let tag = type_bridge::native_value_tag(db, &arg.idl_type)?;
            text.push_str(&format!(
                "      ToV8Traits<{tag}>::ToV8(script_state, {}),\n",
                name_style::arg(&arg.identifier)
            ));
        }
        text.push_str(
            "  };\n\
             \x20 const int argc = std::size(argv_array);\n\
             \x20 v8::Local<v8::Value>* argv = argv_array;\n",
        );
    }

    // A non-callable callback object is its own receiver.
    text.push_str(&format!(
        "  v8::Local<v8::Value> this_value =\n\
         \x20     IsCallbackObjectCallable()\n\
         \x20         ? callback_this_value.V8Value(script_state)\n\
         \x20         : CallbackObject().As<v8::Value>();\n\
         \x20 v8::Local<v8::Value> call_result;\n\
         \x20 if (!V8ScriptRunner::CallFunction(\n\
         \x20          function, ExecutionContext::From(script_state), this_value,\n\
         \x20          argc, argv, GetIsolate())\n\
         \x20          .ToLocal(&call_result)) {{\n\
         \x20   return {nothing};\n\
         \x20 }}\n"
    ));

    if operation.return_type.is_undefined() {
        text.push_str("  return v8::JustVoid();\n}\n\n");
    } else {
        let tag = type_bridge::native_value_tag(db, &operation.return_type)?;
        text.push_str(&format!(
            "  {{\n\
             \x20   ExceptionState exception_state(GetIsolate(),\n\
             \x20                                  v8::ExceptionContext::kOperation,\n\
             \x20                                  \"{idl_name}\", \"{property_name}\");\n\
             \x20   auto&& native_result = NativeValueTraits<{tag}>::NativeValue(\n\
             \x20       GetIsolate(), call_result, exception_state);\n\
             \x20   if (exception_state.HadException()) {{\n\
             \x20     return {nothing};\n\
             \x20   }}\n\
             \x20   return v8::Just<{native_ret}>(std::move(native_result));\n\
             \x20 }}\n\
             }}\n\n"
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::package_initializer::{GenOptions, PackageInitializer};
    use crate::codegen::path_manager::PathConfig;
    use std::sync::Arc;
    use web_idl::{
        Argument, Constant, ExtendedAttributes, IdlType, IntegerKind, OperationGroup, TypeKind,
    };

    fn node_filter() -> CallbackInterface {
        let accept_node = Operation {
            identifier: "acceptNode".to_string(),
            arguments: vec![Argument {
                identifier: "node".to_string(),
                idl_type: IdlType::new(TypeKind::Reference("Node".to_string())),
                index: 0,
                is_optional: false,
                default_value: None,
            }],
            return_type: IdlType::new(TypeKind::Integer(IntegerKind::UnsignedShort)),
            is_static: false,
            special_kind: Default::default(),
            ext_attrs: ExtendedAttributes::new(),
            exposure: Default::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        };
        CallbackInterface {
            identifier: "NodeFilter".to_string(),
            constants: vec![Constant {
                identifier: "FILTER_ACCEPT".to_string(),
                idl_type: IdlType::new(TypeKind::Integer(IntegerKind::UnsignedShort)),
                value_literal: "1".to_string(),
                ext_attrs: ExtendedAttributes::new(),
                exposure: Default::default(),
                debug_info: Default::default(),
            }],
            operation_groups: vec![OperationGroup {
                identifier: "acceptNode".to_string(),
                operations: vec![accept_node],
                ext_attrs: ExtendedAttributes::new(),
                exposure: Default::default(),
            }],
            ext_attrs: ExtendedAttributes::new(),
            exposure: Default::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        }
    }

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

    fn env() -> Arc<RuntimeEnv> {
        let mut db = Database::default();
        db.add_callback_interface(node_filter());
        db.add_interface(node_interface());
        PackageInitializer::new(
            Arc::new(db),
            PathConfig::chromium_default("/out/gen"),
            GenOptions::default(),
        )
        .init()
    }

    #[test]
    fn operation_resolves_property_when_not_callable() {
        let env = env();
        let files = generate_callback_interface(&env, "NodeFilter").unwrap();
        let source = &files[1].content;
        assert!(source.contains("v8::Maybe<uint16_t> V8NodeFilter::AcceptNode("));
        assert!(source.contains("V8String(GetIsolate(), \"acceptNode\")"));
        assert!(source.contains("\"The provided callback is not callable.\""));
        assert!(source.contains("NativeValueTraits<IDLUnsignedShort>::NativeValue"));
    }

    #[test]
    fn constants_install_under_wrapper_type_info() {
        let env = env();
        let files = generate_callback_interface(&env, "NodeFilter").unwrap();
        let header = &files[0].content;
        assert!(header.contains("static const WrapperTypeInfo* GetWrapperTypeInfo()"));
        let source = &files[1].content;
        assert!(source.contains("WrapperTypeInfo::kIdlCallbackInterface"));
        assert!(source.contains("{\"FILTER_ACCEPT\", static_cast<uint16_t>(1)},"));
        assert!(source.contains("bindings::InstallConstants(isolate, interface_template, kConstantTable);"));
    }

    #[test]
    fn single_operation_interface_wraps_callable() {
        let env = env();
        let files = generate_callback_interface(&env, "NodeFilter").unwrap();
        let header = &files[0].content;
        assert!(header.contains(": CallbackInterfaceBase(callback_object, kSingleOperation)"));
    }
}
