//! Namespace bindings.
//!
//! A namespace has no wrappable instances: every member is static and lives
//! on the namespace object itself. Callbacks call straight into the static
//! implementation class; the installers reuse the interface machinery with
//! empty instance and prototype sites.

use web_idl::{Argument, Database, ExtendedAttributes, IdlType, Namespace};

use crate::codegen::accumulator::include;
use crate::codegen::code_node::{CodeNodeTree, NodeId};
use crate::codegen::cxx::{self, FuncQuals};
use crate::codegen::error::GenerationError;
use crate::codegen::exposure::expr_from_exposure;
use crate::codegen::generators::{common, render_pair, GeneratedFile};
use crate::codegen::name_style;
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::path_manager::TargetPaths;
use crate::codegen::source_file;
use crate::codegen::type_bridge;

pub fn generate_namespace(
    env: &RuntimeEnv,
    identifier: &str,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let namespace = env.database.find_namespace(identifier).ok_or_else(|| {
        GenerationError::invariant(format!("no namespace `{identifier}`"), "<database>")
    })?;
    let class_name = format!("V8{}", namespace.identifier);
    let target = TargetPaths::bindings(&namespace.identifier, &namespace.code_generator_info);
    let has_context_dependent = has_context_dependent_members(namespace);

    let mut header_tree = CodeNodeTree::new();
    let header = source_file::header_file(&mut header_tree, &target.api_header(&env.paths));
    make_header_class(
        &mut header_tree,
        header.body,
        &class_name,
        &target,
        has_context_dependent,
    );

    let mut source_tree = CodeNodeTree::new();
    let source = source_file::source_file(&mut source_tree, &target.api_header(&env.paths));
    make_source_defs(
        &mut source_tree,
        source.body,
        env,
        namespace,
        &class_name,
        has_context_dependent,
    )?;

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

fn has_context_dependent_members(namespace: &Namespace) -> bool {
    namespace.attributes.iter().any(|a| a.exposure.is_context_dependent())
        || namespace.constants.iter().any(|c| c.exposure.is_context_dependent())
        || namespace.operation_groups.iter().any(|g| g.exposure.is_context_dependent())
}

fn impl_class(namespace: &Namespace) -> String {
    namespace
        .code_generator_info
        .receiver_implemented_as
        .clone()
        .unwrap_or_else(|| namespace.identifier.clone())
}

fn make_header_class(
    tree: &mut CodeNodeTree,
    body: NodeId,
    class_name: &str,
    target: &TargetPaths,
    has_context_dependent: bool,
) {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/wrapper_type_info.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/v8_interface_bridge_base.h"),
    );
    source_file::add_common_includes(tree, body);

    let class = cxx::class_def(
        tree,
        &cxx::ClassSpec {
            name: class_name,
            base_names: &[],
            is_final: true,
            export: Some(common::component_export(target.api_component)),
            ..cxx::ClassSpec::default()
        },
    );

    let deleted = tree.literal(format!("  {class_name}() = delete;\n\n"));
    tree.append(class.public_section, deleted);

    let wti = common::wrapper_type_info_decls(tree);
    tree.append(class.public_section, wti);

    let install = tree.literal(
        "\n\
         \x20 static void InstallInterfaceTemplate(\n\
         \x20     v8::Isolate* isolate,\n\
         \x20     const DOMWrapperWorld& world,\n\
         \x20     v8::Local<v8::Template> interface_template);\n"
            .to_string(),
    );
    tree.append(class.public_section, install);

    if has_context_dependent {
        let install_context = tree.literal(
            "  static void InstallContextDependentProperties(\n\
             \x20     ScriptState* script_state,\n\
             \x20     const DOMWrapperWorld& world,\n\
             \x20     v8::Local<v8::Object> instance_object,\n\
             \x20     v8::Local<v8::Object> prototype_object,\n\
             \x20     v8::Local<v8::Object> interface_object,\n\
             \x20     v8::Local<v8::Template> interface_template,\n\
             \x20     bindings::V8InterfaceBridgeBase::FeatureSelector feature_selector);\n"
                .to_string(),
        );
        tree.append(class.public_section, install_context);
    }

    tree.append(body, class.node);
}

/// `[CallWith=...]` values become leading implementation arguments.
fn call_with_args(ext_attrs: &ExtendedAttributes) -> (Vec<&'static str>, Vec<String>) {
    let mut deps = Vec::new();
    let mut exprs = Vec::new();
    for value in ext_attrs.values_of("CallWith") {
        match value.as_str() {
            "ScriptState" => {
                deps.push("script_state");
                exprs.push("${script_state}".to_string());
            }
            "ExecutionContext" => {
                deps.push("execution_context");
                exprs.push("${execution_context}".to_string());
            }
            "Isolate" => {
                deps.push("isolate");
                exprs.push("${isolate}".to_string());
            }
            _ => {}
        }
    }
    (deps, exprs)
}

/// The implementation call, result capture, exception check and return-value
/// write for a static member.
fn make_impl_call(
    tree: &mut CodeNodeTree,
    db: &Database,
    impl_class: &str,
    impl_property: &str,
    ext_attrs: &ExtendedAttributes,
    arguments: &[Argument],
    return_type: &IdlType,
) -> Result<Vec<NodeId>, GenerationError> {
    let mut nodes = Vec::new();
    for arg in arguments {
        nodes.push(common::make_v8_to_blink_argument(tree, db, arg)?);
    }

    let (mut deps, mut call_args) = call_with_args(ext_attrs);
    call_args.extend(arguments.iter().map(common::argument_var_name));
    let may_throw = ext_attrs.has("RaisesException");
    if may_throw {
        deps.push("exception_state");
        call_args.push("${exception_state}".to_string());
    }

    let call_expr = format!("{impl_class}::{impl_property}({})", call_args.join(", "));
    let call_text = if return_type.is_undefined() {
        format!("{call_expr};\n")
    } else {
        format!("auto&& return_value = {call_expr};\n")
    };
    nodes.push(common::text_with_symbols(tree, &call_text, &deps));

    if may_throw {
        nodes.push(common::text_with_symbols(
            tree,
            "if (${exception_state}.HadException()) [[unlikely]] {\n  return;\n}\n",
            &["exception_state"],
        ));
    }
    if let Some(set) = common::make_v8_set_return_value(tree, db, return_type, "return_value")? {
        nodes.push(set);
    }
    Ok(nodes)
}

fn make_callback_def(
    tree: &mut CodeNodeTree,
    callback_name: &str,
    namespace_identifier: &str,
    property_name: &str,
    exception_context: &str,
    prologue: common::PrologueSpec<'_>,
    body_nodes: Vec<NodeId>,
) -> NodeId {
    let func = cxx::func_def(
        tree,
        callback_name,
        &["const v8::FunctionCallbackInfo<v8::Value>& info".to_string()],
        "void",
        &FuncQuals::default(),
    );
    common::bind_callback_local_vars(
        tree,
        func.body,
        namespace_identifier,
        property_name,
        exception_context,
    );
    for step in common::make_prologue(tree, &prologue) {
        tree.append(func.body, step);
    }
    for node in body_nodes {
        tree.append(func.body, node);
    }
    func.node
}

fn make_source_defs(
    tree: &mut CodeNodeTree,
    body: NodeId,
    env: &RuntimeEnv,
    namespace: &Namespace,
    class_name: &str,
    has_context_dependent: bool,
) -> Result<(), GenerationError> {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/native_value_traits_impl.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/v8_set_return_value.h"),
    );
    for header in &namespace.code_generator_info.blink_headers {
        tree.accumulate(body, include(header));
    }

    let db = &env.database;
    let impl_class = impl_class(namespace);
    let mut callbacks: Vec<NodeId> = Vec::new();

    let mut attribute_entries: Vec<common::InstallEntry> = Vec::new();
    for attribute in &namespace.attributes {
        let exposure = expr_from_exposure(&attribute.exposure, true);
        if exposure.is_always_false() {
            continue;
        }
        let callback_name =
            format!("{}AttributeGetCallback", name_style::class_name(&attribute.identifier));
        let impl_property = attribute
            .ext_attrs
            .value_of("ImplementedAs")
            .unwrap_or(&attribute.identifier);
        let call = make_impl_call(
            tree,
            db,
            &impl_class,
            impl_property,
            &attribute.ext_attrs,
            &[],
            &attribute.idl_type,
        )?;
        let def = make_callback_def(
            tree,
            &callback_name,
            &namespace.identifier,
            &attribute.identifier,
            "AttributeGet",
            common::PrologueSpec {
                class_name: &namespace.identifier,
                property_name: &attribute.identifier,
                ext_attrs: &attribute.ext_attrs,
                num_required_args: 0,
                counter_suffix: "_Getter",
            },
            call,
        );
        callbacks.push(def);
        attribute_entries.push(common::InstallEntry {
            exposure,
            entry_text: format!(
                "{{\"{}\", {callback_name}, nullptr, unsigned(v8::ReadOnly)}}",
                attribute.identifier
            ),
        });
    }

    let mut constant_entries: Vec<common::InstallEntry> = Vec::new();
    for constant in &namespace.constants {
        let exposure = expr_from_exposure(&constant.exposure, true);
        if exposure.is_always_false() {
            continue;
        }
        let value_t = type_bridge::blink_type_info(db, &constant.idl_type)?.value_t;
        constant_entries.push(common::InstallEntry {
            exposure,
            entry_text: format!(
                "{{\"{}\", static_cast<{value_t}>({})}}",
                constant.identifier, constant.value_literal
            ),
        });
    }

    let mut operation_entries: Vec<common::InstallEntry> = Vec::new();
    for group in &namespace.operation_groups {
        let exposure = expr_from_exposure(&group.exposure, true);
        if exposure.is_always_false() {
            continue;
        }
        let camel = name_style::class_name(&group.identifier);
        let entry_callback = format!("{camel}OperationCallback");

        if group.operations.len() == 1 {
            let operation = &group.operations[0];
            let impl_property = operation
                .ext_attrs
                .value_of("ImplementedAs")
                .unwrap_or(&operation.identifier);
            let call = make_impl_call(
                tree,
                db,
                &impl_class,
                impl_property,
                &operation.ext_attrs,
                &operation.arguments,
                &operation.return_type,
            )?;
            let def = make_callback_def(
                tree,
                &entry_callback,
                &namespace.identifier,
                &operation.identifier,
                "Operation",
                common::PrologueSpec {
                    class_name: &namespace.identifier,
                    property_name: &operation.identifier,
                    ext_attrs: &operation.ext_attrs,
                    num_required_args: operation.num_of_required_arguments(),
                    counter_suffix: "_Method",
                },
                call,
            );
            callbacks.push(def);
        } else {
            let mut targets: Vec<common::OverloadTarget<'_>> = Vec::new();
            for (index, operation) in group.operations.iter().enumerate() {
                let callback_name = format!("{camel}Overload{}Callback", index + 1);
                let impl_property = operation
                    .ext_attrs
                    .value_of("ImplementedAs")
                    .unwrap_or(&operation.identifier);
                let call = make_impl_call(
                    tree,
                    db,
                    &impl_class,
                    impl_property,
                    &operation.ext_attrs,
                    &operation.arguments,
                    &operation.return_type,
                )?;
                let def = make_callback_def(
                    tree,
                    &callback_name,
                    &namespace.identifier,
                    &operation.identifier,
                    "Operation",
                    common::PrologueSpec {
                        class_name: &namespace.identifier,
                        property_name: &operation.identifier,
                        ext_attrs: &operation.ext_attrs,
                        num_required_args: operation.num_of_required_arguments(),
                        counter_suffix: "_Method",
                    },
                    call,
                );
                callbacks.push(def);
                targets.push(common::OverloadTarget {
                    callback_name,
                    arguments: &operation.arguments,
                });
            }
            let dispatcher = common::make_overload_dispatcher(tree, db, &targets)?;
            let def = make_callback_def(
                tree,
                &entry_callback,
                &namespace.identifier,
                &group.identifier,
                "Operation",
                common::PrologueSpec {
                    class_name: &namespace.identifier,
                    property_name: &group.identifier,
                    ext_attrs: &group.ext_attrs,
                    num_required_args: 0,
                    counter_suffix: "_Method",
                },
                vec![dispatcher],
            );
            callbacks.push(def);
        }
        operation_entries.push(common::InstallEntry {
            exposure,
            entry_text: format!(
                "{{\"{}\", {entry_callback}, {}, unsigned(v8::None)}}",
                group.identifier,
                group.min_num_of_required_arguments()
            ),
        });
    }

    let anon = cxx::namespace(tree, "", callbacks);
    tree.append(body, anon);

    let wti = common::wrapper_type_info_def(
        tree,
        &common::WrapperTypeInfoSpec {
            class_name,
            idl_name: &namespace.identifier,
            parent: None,
            kind: common::IdlDefinitionKind::Namespace,
            has_prototype: false,
            is_node: false,
            is_active_script_wrappable: false,
            has_context_dependent_properties: has_context_dependent,
            skipped_in_interface_object_prototype_chain: false,
        },
    );
    tree.append(body, wti);

    // Context-independent entries install at template setup; the rest wait
    // for a context.
    let (attr_template, attr_context) = split_by_context(attribute_entries);
    let (const_template, const_context) = split_by_context(constant_entries);
    let (op_template, op_context) = split_by_context(operation_entries);

    let install = cxx::func_def(
        tree,
        &format!("{class_name}::InstallInterfaceTemplate"),
        &[
            "v8::Isolate* isolate".to_string(),
            "const DOMWrapperWorld& world".to_string(),
            "v8::Local<v8::Template> interface_template".to_string(),
        ],
        "// static\nvoid",
        &FuncQuals::default(),
    );
    let setup = tree.literal(format!(
        "bindings::SetupIDLNamespaceTemplate(\n\
         \x20   isolate, {class_name}::GetWrapperTypeInfo(),\n\
         \x20   interface_template.As<v8::ObjectTemplate>());\n\n"
    ));
    tree.append(install.body, setup);
    common::install_entries_grouped(
        tree,
        install.body,
        &common::TableSpec {
            entry_type: "bindings::AttributeConfig",
            table_var: "kAttributeTable",
            install_call: "bindings::InstallAttributes(isolate, world, \
                           v8::Local<v8::Template>(), v8::Local<v8::Template>(), \
                           interface_template, {table});",
        },
        attr_template,
    );
    common::install_entries_grouped(
        tree,
        install.body,
        &common::TableSpec {
            entry_type: "bindings::ConstantConfig",
            table_var: "kConstantTable",
            install_call: "bindings::InstallConstants(isolate, interface_template, {table});",
        },
        const_template,
    );
    common::install_entries_grouped(
        tree,
        install.body,
        &common::TableSpec {
            entry_type: "bindings::OperationConfig",
            table_var: "kOperationTable",
            install_call: "bindings::InstallOperations(isolate, world, \
                           v8::Local<v8::Template>(), v8::Local<v8::Template>(), \
                           interface_template, {table});",
        },
        op_template,
    );
    tree.append(body, install.node);

    if has_context_dependent {
        let install_context = cxx::func_def(
            tree,
            &format!("{class_name}::InstallContextDependentProperties"),
            &[
                "ScriptState* script_state".to_string(),
                "const DOMWrapperWorld& world".to_string(),
                "v8::Local<v8::Object> instance_object".to_string(),
                "v8::Local<v8::Object> prototype_object".to_string(),
                "v8::Local<v8::Object> interface_object".to_string(),
                "v8::Local<v8::Template> interface_template".to_string(),
                "bindings::V8InterfaceBridgeBase::FeatureSelector feature_selector".to_string(),
            ],
            "\n// static\nvoid",
            &FuncQuals::default(),
        );
        common::bind_installer_local_vars(
            tree,
            install_context.body,
            &global_names(namespace),
        );
        let isolate = tree.literal(
            "v8::Isolate* isolate = script_state->GetIsolate();\n\n".to_string(),
        );
        tree.append(install_context.body, isolate);
        common::install_entries_grouped(
            tree,
            install_context.body,
            &common::TableSpec {
                entry_type: "bindings::AttributeConfig",
                table_var: "kAttributeTable",
                install_call: "bindings::InstallAttributes(isolate, world, \
                               v8::Local<v8::Object>(), v8::Local<v8::Object>(), \
                               interface_object, {table});",
            },
            attr_context,
        );
        common::install_entries_grouped(
            tree,
            install_context.body,
            &common::TableSpec {
                entry_type: "bindings::ConstantConfig",
                table_var: "kConstantTable",
                install_call: "bindings::InstallConstants(isolate, interface_object, {table});",
            },
            const_context,
        );
        common::install_entries_grouped(
            tree,
            install_context.body,
            &common::TableSpec {
                entry_type: "bindings::OperationConfig",
                table_var: "kOperationTable",
                install_call: "bindings::InstallOperations(isolate, world, \
                               v8::Local<v8::Object>(), v8::Local<v8::Object>(), \
                               interface_object, {table});",
            },
            op_context,
        );
        tree.append(body, install_context.node);
    }
    Ok(())
}

/// Globals the namespace is exposed on, for the installer's
/// `is_global_...` locals.
fn global_names(namespace: &Namespace) -> Vec<String> {
    let mut names: Vec<String> = namespace
        .exposure
        .global_names_and_features
        .iter()
        .map(|g| g.global_name.clone())
        .filter(|g| g != "*")
        .collect();
    names.sort();
    names.dedup();
    names
}

fn split_by_context(
    entries: Vec<common::InstallEntry>,
) -> (Vec<common::InstallEntry>, Vec<common::InstallEntry>) {
    entries
        .into_iter()
        .partition(|entry| !entry.exposure.to_text().contains("${"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::package_initializer::{GenOptions, PackageInitializer};
    use crate::codegen::path_manager::PathConfig;
    use std::sync::Arc;
    use web_idl::{
        Attribute, Exposure, Operation, OperationGroup, SecureContextMode, StringKind, TypeKind,
    };

    fn supports_group() -> OperationGroup {
        OperationGroup {
            identifier: "supports".to_string(),
            operations: vec![Operation {
                identifier: "supports".to_string(),
                arguments: vec![Argument {
                    identifier: "conditionText".to_string(),
                    idl_type: IdlType::new(TypeKind::String(StringKind::DomString)),
                    index: 0,
                    is_optional: false,
                    default_value: None,
                }],
                return_type: IdlType::new(TypeKind::Boolean),
                is_static: true,
                special_kind: Default::default(),
                ext_attrs: ExtendedAttributes::new(),
                exposure: Default::default(),
                code_generator_info: Default::default(),
                debug_info: Default::default(),
            }],
            ext_attrs: ExtendedAttributes::new(),
            exposure: Default::default(),
        }
    }

    fn css_namespace(attributes: Vec<Attribute>) -> Namespace {
        Namespace {
            identifier: "CSS".to_string(),
            attributes,
            constants: vec![],
            operation_groups: vec![supports_group()],
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        }
    }

    fn env_with(namespace: Namespace) -> Arc<RuntimeEnv> {
        let mut db = Database::default();
        db.add_namespace(namespace);
        PackageInitializer::new(
            Arc::new(db),
            PathConfig::chromium_default("/out/gen"),
            GenOptions::default(),
        )
        .init()
    }

    #[test]
    fn operation_callback_calls_static_impl() {
        let env = env_with(css_namespace(vec![]));
        let files = generate_namespace(&env, "CSS").unwrap();
        let source = &files[1].content;
        assert!(source.contains("void SupportsOperationCallback(const v8::FunctionCallbackInfo<v8::Value>& info)"));
        assert!(source.contains("auto&& return_value = CSS::supports(arg0_condition_text);"));
        assert!(source.contains("bindings::V8SetReturnValue(info, return_value);"));
        assert!(source.contains("{\"supports\", SupportsOperationCallback, 1, unsigned(v8::None)}"));
        assert!(source.contains("WrapperTypeInfo::kIdlNamespace"));
        assert!(source.contains("WrapperTypeInfo::kWrapperTypeNoPrototype"));
    }

    #[test]
    fn runtime_enabled_member_guards_in_template_phase() {
        let mut attribute = Attribute {
            identifier: "highlights".to_string(),
            idl_type: IdlType::new(TypeKind::Boolean),
            is_static: true,
            is_readonly: true,
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        };
        attribute.exposure.runtime_enabled_features.push("HighlightAPI".to_string());
        let env = env_with(css_namespace(vec![attribute]));
        let files = generate_namespace(&env, "CSS").unwrap();
        let header = &files[0].content;
        assert!(!header.contains("InstallContextDependentProperties"));
        let source = &files[1].content;
        assert!(source.contains("if (RuntimeEnabledFeatures::HighlightAPIEnabled()) {"));
        assert!(source.contains("HighlightsAttributeGetCallback, nullptr, unsigned(v8::ReadOnly)"));
    }

    #[test]
    fn secure_context_member_installs_context_dependently() {
        let mut attribute = Attribute {
            identifier: "highlights".to_string(),
            idl_type: IdlType::new(TypeKind::Boolean),
            is_static: true,
            is_readonly: true,
            ext_attrs: ExtendedAttributes::new(),
            exposure: Exposure::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        };
        attribute.exposure.only_in_secure_contexts = SecureContextMode::Always;
        let env = env_with(css_namespace(vec![attribute]));
        let files = generate_namespace(&env, "CSS").unwrap();
        let header = &files[0].content;
        assert!(header.contains("static void InstallContextDependentProperties("));
        let source = &files[1].content;
        assert!(source.contains("V8CSS::InstallContextDependentProperties("));
        assert!(source.contains("if (is_in_secure_context) {"));
        assert!(source
            .contains("const bool is_in_secure_context = execution_context->IsSecureContext();"));
    }
}
