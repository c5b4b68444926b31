//! Callback function bindings.
//!
//! A callback function becomes a class holding the JS callable. `Invoke`
//! converts native arguments to V8, calls through the relevant script state
//! with runnability checks, and converts the return value back. Callbacks
//! returning `undefined` additionally get the fire-and-forget
//! `InvokeAndReportException`.

use web_idl::{Argument, CallbackFunction, Database};

use crate::codegen::accumulator::include;
use crate::codegen::code_node::{CodeNodeTree, NodeId};
use crate::codegen::cxx::{self, ClassSpec};
use crate::codegen::error::GenerationError;
use crate::codegen::generators::{common, render_pair, GeneratedFile};
use crate::codegen::name_style;
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::path_manager::TargetPaths;
use crate::codegen::source_file;
use crate::codegen::type_bridge;

pub fn generate_callback_function(
    env: &RuntimeEnv,
    identifier: &str,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let callback = env.database.find_callback_function(identifier).ok_or_else(|| {
        GenerationError::invariant(format!("no callback function `{identifier}`"), "<database>")
    })?;
    let class_name = format!("V8{}", callback.identifier);
    let target = TargetPaths::bindings(&callback.identifier, &callback.code_generator_info);

    let mut header_tree = CodeNodeTree::new();
    let header = source_file::header_file(&mut header_tree, &target.api_header(&env.paths));
    make_header_class(&mut header_tree, header.body, env, callback, &class_name, &target)?;

    let mut source_tree = CodeNodeTree::new();
    let source = source_file::source_file(&mut source_tree, &target.api_header(&env.paths));
    make_source_defs(&mut source_tree, source.body, env, callback, &class_name)?;

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

fn native_arg_decls(db: &Database, arguments: &[Argument]) -> Result<Vec<String>, GenerationError> {
    let mut decls = Vec::with_capacity(arguments.len());
    for arg in arguments {
        let info = type_bridge::blink_type_info(db, &arg.idl_type)?;
        let name = name_style::arg(&arg.identifier);
        if arg.is_variadic() {
            decls.push(format!("const {}& {name}", info.value_t));
        } else if info.is_gc_type {
            decls.push(format!("{} {name}", info.value_t));
        } else {
            decls.push(format!("{} {name}", info.const_ref_t));
        }
    }
    Ok(decls)
}

/// `v8::Maybe<T>` return spelling of the callback.
fn maybe_return(
    db: &Database,
    callback: &CallbackFunction,
) -> Result<(String, String), GenerationError> {
    if callback.return_type.is_undefined() {
        return Ok(("v8::Maybe<void>".to_string(), "void".to_string()));
    }
    let info = type_bridge::blink_type_info(db, &callback.return_type)?;
    Ok((format!("v8::Maybe<{}>", info.value_t), info.value_t))
}

fn make_header_class(
    tree: &mut CodeNodeTree,
    body: NodeId,
    env: &RuntimeEnv,
    callback: &CallbackFunction,
    class_name: &str,
    target: &TargetPaths,
) -> Result<(), GenerationError> {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/callback_function_base.h"),
    );
    source_file::add_common_includes(tree, body);

    let class = cxx::class_def(
        tree,
        &ClassSpec {
            name: class_name,
            base_names: &["CallbackFunctionBase".to_string()],
            is_final: true,
            export: Some(common::component_export(target.api_component)),
            ..ClassSpec::default()
        },
    );

    let factory = tree.literal(format!(
        "  static {class_name}* Create(v8::Local<v8::Function> callback_function) {{\n\
         \x20   return MakeGarbageCollected<{class_name}>(callback_function);\n\
         \x20 }}\n\n\
         \x20 explicit {class_name}(v8::Local<v8::Function> callback_function)\n\
         \x20     : CallbackFunctionBase(callback_function) {{}}\n\n"
    ));
    tree.append(class.public_section, factory);

    let (maybe_ret, _) = maybe_return(&env.database, callback)?;
    let mut invoke_args =
        vec!["bindings::V8ValueOrScriptWrappableAdapter callback_this_value".to_string()];
    invoke_args.extend(native_arg_decls(&env.database, &callback.arguments)?);

    let invoke = tree.literal(format!("  {maybe_ret} Invoke({});\n", invoke_args.join(", ")));
    tree.append(class.public_section, invoke);

    if is_event_handler(&callback.identifier) {
        let variant = tree.literal(format!(
            "\n\
             \x20 // Event dispatch checks runnability up front with\n\
             \x20 // IsRunnableOrThrowException(IgnorePause) and then invokes\n\
             \x20 // through this variant.\n\
             \x20 {maybe_ret} InvokeWithoutRunnabilityCheck({});\n",
            invoke_args.join(", ")
        ));
        tree.append(class.public_section, variant);
    }
    if callback.return_type.is_undefined() {
        let report = tree.literal(format!(
            "  void InvokeAndReportException({});\n",
            invoke_args.join(", ")
        ));
        tree.append(class.public_section, report);
    }
    if callback.ext_attrs.has("Constructor") {
        let construct_args = native_arg_decls(&env.database, &callback.arguments)?;
        let construct = tree.literal(format!(
            "  {maybe_ret} Construct({});\n",
            construct_args.join(", ")
        ));
        tree.append(class.public_section, construct);
    }

    tree.append(body, class.node);
    Ok(())
}

/// Blink-to-V8 argument marshaling shared by `Invoke` and `Construct`.
fn argv_setup(
    db: &Database,
    arguments: &[Argument],
) -> Result<String, GenerationError> {
    if arguments.is_empty() {
        return Ok("  const int argc = 0;\n  v8::Local<v8::Value>* argv = nullptr;\n".to_string());
    }
    let has_variadic = arguments.iter().any(Argument::is_variadic);
    let mut text = String::new();
    if has_variadic {
        // The variadic tail spills past any fixed-size array.
        text.push_str(
            "  v8::LocalVector<v8::Value> argv_vector(GetIsolate());\n",
        );
        for arg in arguments {
            let name = name_style::arg(&arg.identifier);
            if arg.is_variadic() {
                let element_tag = type_bridge::native_value_tag(
                    db,
                    arg.idl_type.element_type().ok_or_else(|| {
                        GenerationError::invariant("variadic without element type", "<callback>")
                    })?,
                )?;
                text.push_str(&format!(
                    "  for (const auto& element : {name}) {{\n\
                     \x20   argv_vector.push_back(\n\
                     \x20       ToV8Traits<{element_tag}>::ToV8(script_state, element));\n\
                     \x20 }}\n"
                ));
            } else {
                let tag = type_bridge::native_value_tag(db, &arg.idl_type)?;
                text.push_str(&format!(
                    "  argv_vector.push_back(ToV8Traits<{tag}>::ToV8(script_state, {name}));\n"
                ));
            }
        }
        text.push_str(
            "  const int argc = static_cast<int>(argv_vector.size());\n\
             \x20 v8::Local<v8::Value>* argv = argv_vector.data();\n",
        );
    } else {
        // Fixed argument counts fit an inline array (ten arguments at most
        // in practice).
        text.push_str("  v8::Local<v8::Value> argv_array[] = {\n");
        for arg in arguments {
            let name = name_style::arg(&arg.identifier);
            let tag = type_bridge::native_value_tag(db, &arg.idl_type)?;
            text.push_str(&format!(
                "      ToV8Traits<{tag}>::ToV8(script_state, {name}),\n"
            ));
        }
        text.push_str(
            "  };\n\
             \x20 const int argc = std::size(argv_array);\n\
             \x20 v8::Local<v8::Value>* argv = argv_array;\n",
        );
    }
    Ok(text)
}

/// Event handlers check runnability at the dispatch site, not inside the
/// invocation itself.
fn is_event_handler(identifier: &str) -> bool {
    matches!(
        identifier,
        "EventHandlerNonNull" | "OnBeforeUnloadEventHandlerNonNull" | "OnErrorEventHandlerNonNull"
    )
}

fn invoke_def(
    db: &Database,
    callback: &CallbackFunction,
    class_name: &str,
    func_name: &str,
    invoke_args: &[String],
    check_runnability: bool,
) -> Result<String, GenerationError> {
    let idl_name = &callback.identifier;
    let (maybe_ret, native_ret) = maybe_return(db, callback)?;
    let nothing = if callback.return_type.is_undefined() {
        "v8::Nothing<void>()".to_string()
    } else {
        format!("v8::Nothing<{native_ret}>()")
    };

    let mut text = format!(
        "{maybe_ret} {class_name}::{func_name}({args}) {{\n\
         \x20 ScriptState* script_state =\n\
         \x20     CallbackRelevantScriptStateOrThrowException(\"{idl_name}\", \"invoke\");\n\
         \x20 if (!script_state) {{\n\
         \x20   return {nothing};\n\
         \x20 }}\n",
        args = invoke_args.join(", "),
    );
    if check_runnability {
        text.push_str(&format!(
            "  if (!IsCallbackFunctionRunnable(script_state, IncumbentScriptState())) {{\n\
             \x20   // Wrapper-tracing holds the callable alive past its context.\n\
             \x20   return {nothing};\n\
             \x20 }}\n"
        ));
    }
    text.push_str("  ScriptState::Scope callback_relevant_context_scope(script_state);\n");
    text.push_str(&argv_setup(db, &callback.arguments)?);
    text.push_str(&format!(
        "  v8::Local<v8::Value> this_value =\n\
         \x20     callback_this_value.V8Value(script_state);\n\
         \x20 v8::Local<v8::Value> call_result;\n\
         \x20 if (!V8ScriptRunner::CallFunction(\n\
         \x20          CallbackFunction(), ExecutionContext::From(script_state), this_value,\n\
         \x20          argc, argv, GetIsolate())\n\
         \x20          .ToLocal(&call_result)) {{\n\
         \x20   return {nothing};\n\
         \x20 }}\n"
    ));
    if callback.return_type.is_undefined() {
        text.push_str("  return v8::JustVoid();\n}\n\n");
    } else {
        let tag = type_bridge::native_value_tag(db, &callback.return_type)?;
        text.push_str(&format!(
            "  {{\n\
             \x20   ExceptionState exception_state(GetIsolate(),\n\
             \x20                                  v8::ExceptionContext::kOperation,\n\
             \x20                                  \"{idl_name}\", \"invoke\");\n\
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

fn make_source_defs(
    tree: &mut CodeNodeTree,
    body: NodeId,
    env: &RuntimeEnv,
    callback: &CallbackFunction,
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

    let db = &env.database;
    let idl_name = &callback.identifier;
    let (maybe_ret, native_ret) = maybe_return(db, callback)?;
    let nothing = if callback.return_type.is_undefined() {
        "v8::Nothing<void>()".to_string()
    } else {
        format!("v8::Nothing<{native_ret}>()")
    };

    let mut invoke_args =
        vec!["bindings::V8ValueOrScriptWrappableAdapter callback_this_value".to_string()];
    invoke_args.extend(native_arg_decls(db, &callback.arguments)?);

    let invoke_text =
        invoke_def(db, callback, class_name, "Invoke", &invoke_args, true)?;
    let invoke = tree.literal(invoke_text);
    tree.append(body, invoke);
    if !callback.return_type.is_undefined() {
        tree.accumulate(
            body,
            include("third_party/blink/renderer/bindings/core/v8/native_value_traits_impl.h"),
        );
    }

    if is_event_handler(&callback.identifier) {
        let text = invoke_def(
            db,
            callback,
            class_name,
            "InvokeWithoutRunnabilityCheck",
            &invoke_args,
            false,
        )?;
        let variant = tree.literal(text);
        tree.append(body, variant);
    }

    if callback.return_type.is_undefined() {
        let arg_names: Vec<String> = std::iter::once("callback_this_value".to_string())
            .chain(callback.arguments.iter().map(|a| name_style::arg(&a.identifier)))
            .collect();
        let report = tree.literal(format!(
            "void {class_name}::InvokeAndReportException({args}) {{\n\
             \x20 v8::TryCatch try_catch(GetIsolate());\n\
             \x20 try_catch.SetVerbose(true);\n\n\
             \x20 std::ignore = Invoke({forward});\n\
             }}\n\n",
            args = invoke_args.join(", "),
            forward = arg_names.join(", "),
        ));
        tree.append(body, report);
    }

    if callback.ext_attrs.has("Constructor") {
        let construct_args = native_arg_decls(db, &callback.arguments)?;
        let mut text = format!(
            "{maybe_ret} {class_name}::Construct({args}) {{\n\
             \x20 ScriptState* script_state =\n\
             \x20     CallbackRelevantScriptStateOrThrowException(\"{idl_name}\", \"construct\");\n\
             \x20 if (!script_state) {{\n\
             \x20   return {nothing};\n\
             \x20 }}\n\
             \x20 ScriptState::Scope callback_relevant_context_scope(script_state);\n",
            args = construct_args.join(", "),
        );
        text.push_str(&argv_setup(db, &callback.arguments)?);
        text.push_str(&format!(
            "  v8::Local<v8::Value> construct_result;\n\
             \x20 if (!V8ScriptRunner::CallAsConstructor(\n\
             \x20          GetIsolate(), CallbackFunction(),\n\
             \x20          ExecutionContext::From(script_state), argc, argv)\n\
             \x20          .ToLocal(&construct_result)) {{\n\
             \x20   return {nothing};\n\
             \x20 }}\n"
        ));
        if callback.return_type.is_undefined() {
            text.push_str("  return v8::JustVoid();\n}\n\n");
        } else {
            let tag = type_bridge::native_value_tag(db, &callback.return_type)?;
            text.push_str(&format!(
                "  ExceptionState exception_state(GetIsolate(),\n\
                 \x20                                v8::ExceptionContext::kConstructor,\n\
                 \x20                                \"{idl_name}\", \"construct\");\n\
                 \x20 auto&& native_result = NativeValueTraits<{tag}>::NativeValue(\n\
                 \x20     GetIsolate(), construct_result, exception_state);\n\
                 \x20 if (exception_state.HadException()) {{\n\
                 \x20   return {nothing};\n\
                 \x20 }}\n\
                 \x20 return v8::Just<{native_ret}>(std::move(native_result));\n\
                 }}\n\n"
            ));
        }
        let construct = tree.literal(text);
        tree.append(body, construct);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::package_initializer::{GenOptions, PackageInitializer};
    use crate::codegen::path_manager::PathConfig;
    use std::sync::Arc;
    use web_idl::{ExtendedAttributes, IdlType, IntegerKind, TypeKind};

    fn env_with_callback(return_type: IdlType, arguments: Vec<Argument>) -> Arc<RuntimeEnv> {
        let mut db = Database::default();
        db.add_callback_function(CallbackFunction {
            identifier: "FrameRequestCallback".to_string(),
            arguments,
            return_type,
            ext_attrs: ExtendedAttributes::new(),
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

    fn arg(identifier: &str, kind: TypeKind, index: usize) -> Argument {
        Argument {
            identifier: identifier.to_string(),
            idl_type: IdlType::new(kind),
            index,
            is_optional: false,
            default_value: None,
        }
    }

    #[test]
    fn undefined_return_gets_report_exception_variant() {
        let env = env_with_callback(
            IdlType::new(TypeKind::Undefined),
            vec![arg("highResTime", TypeKind::FloatingPoint {
                kind: web_idl::FloatKind::Double,
                unrestricted: false,
            }, 0)],
        );
        let files = generate_callback_function(&env, "FrameRequestCallback").unwrap();
        let header = &files[0].content;
        assert!(header.contains("class CORE_EXPORT V8FrameRequestCallback final : public CallbackFunctionBase {"));
        assert!(header.contains("v8::Maybe<void> Invoke("));
        assert!(header.contains("void InvokeAndReportException("));
        let source = &files[1].content;
        assert!(source.contains("return v8::JustVoid();"));
        assert!(source.contains("try_catch.SetVerbose(true);"));
        assert!(source.contains("ToV8Traits<IDLDouble>::ToV8(script_state, high_res_time)"));
    }

    #[test]
    fn event_handler_gets_unchecked_invoke_variant() {
        let mut db = Database::default();
        db.add_callback_function(CallbackFunction {
            identifier: "EventHandlerNonNull".to_string(),
            arguments: vec![],
            return_type: IdlType::new(TypeKind::Any),
            ext_attrs: ExtendedAttributes::new(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        let env = PackageInitializer::new(
            Arc::new(db),
            PathConfig::chromium_default("/out/gen"),
            GenOptions::default(),
        )
        .init();
        let files = generate_callback_function(&env, "EventHandlerNonNull").unwrap();
        assert!(files[0].content.contains("InvokeWithoutRunnabilityCheck("));
        let source = &files[1].content;
        let unchecked = source
            .split("InvokeWithoutRunnabilityCheck")
            .nth(1)
            .unwrap();
        assert!(!unchecked.contains("IsCallbackFunctionRunnable"));
        assert!(source.contains("V8EventHandlerNonNull::Invoke("));
    }

    #[test]
    fn non_undefined_return_converts_the_result() {
        let env = env_with_callback(IdlType::new(TypeKind::Integer(IntegerKind::Long)), vec![]);
        let files = generate_callback_function(&env, "FrameRequestCallback").unwrap();
        let header = &files[0].content;
        assert!(header.contains("v8::Maybe<int32_t> Invoke("));
        assert!(!header.contains("InvokeAndReportException"));
        let source = &files[1].content;
        assert!(source.contains("NativeValueTraits<IDLLong>::NativeValue"));
        assert!(source.contains("return v8::Just<int32_t>(std::move(native_result));"));
        assert!(source.contains("v8::Local<v8::Value>* argv = nullptr;"));
    }
}
