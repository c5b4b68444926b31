//! Iterator companion bindings.
//!
//! Every iterable, maplike, setlike or async-iterable interface gets a
//! companion iterator class. Its prototype hangs under the matching V8
//! intrinsic prototype so generated iterators behave like built-in ones, and
//! the only own property is `next`.

use web_idl::IteratorKind;

use crate::codegen::accumulator::include;
use crate::codegen::code_node::{CodeNodeTree, NodeId};
use crate::codegen::cxx::{self, FuncQuals};
use crate::codegen::error::GenerationError;
use crate::codegen::generators::{common, render_pair, GeneratedFile};
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::path_manager::TargetPaths;
use crate::codegen::source_file;

/// Everything the two entry points share.
struct IteratorSpec<'a> {
    identifier: &'a str,
    interface: &'a str,
    code_generator_info: &'a web_idl::CodeGeneratorInfo,
    /// `SyncIterator` or `AsyncIterator`; the Blink-side class is
    /// `{base}<{interface}>`.
    receiver_template: &'a str,
    receiver_header: &'a str,
    intrinsic_prototype: &'a str,
    idl_display_name: String,
}

pub fn generate_sync_iterator(
    env: &RuntimeEnv,
    identifier: &str,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let iterator = env.database.find_sync_iterator(identifier).ok_or_else(|| {
        GenerationError::invariant(format!("no sync iterator `{identifier}`"), "<database>")
    })?;
    let intrinsic = match iterator.kind {
        IteratorKind::Value | IteratorKind::Pair => "kIteratorPrototype",
        IteratorKind::Maplike => "kMapIteratorPrototype",
        IteratorKind::Setlike => "kSetIteratorPrototype",
    };
    generate(
        env,
        &IteratorSpec {
            identifier: &iterator.identifier,
            interface: &iterator.interface,
            code_generator_info: &iterator.code_generator_info,
            receiver_template: "SyncIterator",
            receiver_header:
                "third_party/blink/renderer/platform/bindings/sync_iterator_base.h",
            intrinsic_prototype: intrinsic,
            idl_display_name: format!("{} Iterator", iterator.interface),
        },
    )
}

pub fn generate_async_iterator(
    env: &RuntimeEnv,
    identifier: &str,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let iterator = env.database.find_async_iterator(identifier).ok_or_else(|| {
        GenerationError::invariant(format!("no async iterator `{identifier}`"), "<database>")
    })?;
    generate(
        env,
        &IteratorSpec {
            identifier: &iterator.identifier,
            interface: &iterator.interface,
            code_generator_info: &iterator.code_generator_info,
            receiver_template: "AsyncIterator",
            receiver_header:
                "third_party/blink/renderer/platform/bindings/async_iterator_base.h",
            intrinsic_prototype: "kAsyncIteratorPrototype",
            idl_display_name: format!("{} AsyncIterator", iterator.interface),
        },
    )
}

fn generate(
    env: &RuntimeEnv,
    spec: &IteratorSpec<'_>,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let class_name = format!("V8{}", spec.identifier);
    let target = TargetPaths::bindings(spec.identifier, spec.code_generator_info);

    let mut header_tree = CodeNodeTree::new();
    let header = source_file::header_file(&mut header_tree, &target.api_header(&env.paths));
    make_header_class(&mut header_tree, header.body, spec, &class_name, &target);

    let mut source_tree = CodeNodeTree::new();
    let source = source_file::source_file(&mut source_tree, &target.api_header(&env.paths));
    make_source_defs(&mut source_tree, source.body, spec, &class_name);

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

fn make_header_class(
    tree: &mut CodeNodeTree,
    body: NodeId,
    spec: &IteratorSpec<'_>,
    class_name: &str,
    target: &TargetPaths,
) {
    tree.accumulate(body, include(spec.receiver_header));
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/wrapper_type_info.h"),
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

    let blink_class = format!("{}<{}>", spec.receiver_template, spec.interface);
    let decls = tree.literal(format!(
        "  {class_name}() = delete;\n\n\
         \x20 using IterationSourceType = {blink_class};\n\n"
    ));
    tree.append(class.public_section, decls);

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

    tree.append(body, class.node);
}

fn make_source_defs(
    tree: &mut CodeNodeTree,
    body: NodeId,
    spec: &IteratorSpec<'_>,
    class_name: &str,
) {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/v8_set_return_value.h"),
    );
    for header in &spec.code_generator_info.blink_headers {
        tree.accumulate(body, include(header));
    }

    let blink_class = format!("{}<{}>", spec.receiver_template, spec.interface);

    // The single own property: next().
    let next = cxx::func_def(
        tree,
        "NextOperationCallback",
        &["const v8::FunctionCallbackInfo<v8::Value>& info".to_string()],
        "void",
        &FuncQuals::default(),
    );
    common::bind_callback_local_vars_with_receiver(
        tree,
        next.body,
        class_name,
        &blink_class,
        &spec.idl_display_name,
        "next",
        "Operation",
    );
    let prologue = common::make_prologue(
        tree,
        &common::PrologueSpec {
            class_name: spec.interface,
            property_name: "next",
            ext_attrs: &Default::default(),
            num_required_args: 0,
            counter_suffix: "_Method",
        },
    );
    for step in prologue {
        tree.append(next.body, step);
    }
    let call = common::text_with_symbols(
        tree,
        "auto&& return_value = \
         ${blink_receiver}->Next(${script_state}, ${exception_state});\n\
         if (${exception_state}.HadException()) [[unlikely]] {\n\
         \x20 return;\n\
         }\n\
         bindings::V8SetReturnValue(info, return_value);\n",
        &["blink_receiver", "script_state", "exception_state"],
    );
    tree.append(next.body, call);

    let anon = cxx::namespace(tree, "", vec![next.node]);
    tree.append(body, anon);

    let wti = common::wrapper_type_info_def(
        tree,
        &common::WrapperTypeInfoSpec {
            class_name,
            idl_name: &spec.idl_display_name,
            parent: None,
            kind: common::IdlDefinitionKind::Iterator,
            has_prototype: true,
            is_node: false,
            is_active_script_wrappable: false,
            has_context_dependent_properties: false,
            skipped_in_interface_object_prototype_chain: false,
        },
    );
    tree.append(body, wti);

    let install = tree.literal(format!(
        "\n// static\n\
         void {class_name}::InstallInterfaceTemplate(\n\
         \x20   v8::Isolate* isolate,\n\
         \x20   const DOMWrapperWorld& world,\n\
         \x20   v8::Local<v8::Template> interface_template) {{\n\
         \x20 bindings::SetupIDLIteratorTemplate(\n\
         \x20     isolate, {class_name}::GetWrapperTypeInfo(),\n\
         \x20     interface_template.As<v8::FunctionTemplate>(),\n\
         \x20     v8::Intrinsic::{intrinsic});\n\n\
         \x20 static const bindings::OperationConfig kOperationTable[] = {{\n\
         \x20     {{\"next\", NextOperationCallback, 0, unsigned(v8::None)}},\n\
         \x20 }};\n\
         \x20 bindings::InstallOperations(\n\
         \x20     isolate, world, v8::Local<v8::Template>(),\n\
         \x20     interface_template.As<v8::FunctionTemplate>()->PrototypeTemplate(),\n\
         \x20     v8::Local<v8::Template>(), kOperationTable);\n\
         }}\n",
        intrinsic = spec.intrinsic_prototype,
    ));
    tree.append(body, install);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::package_initializer::{GenOptions, PackageInitializer};
    use crate::codegen::path_manager::PathConfig;
    use std::sync::Arc;
    use web_idl::{AsyncIterator, Database, IdlType, StringKind, SyncIterator, TypeKind};

    fn env() -> Arc<RuntimeEnv> {
        let mut db = Database::default();
        db.add_sync_iterator(SyncIterator {
            identifier: "FontFaceSetIterator".to_string(),
            interface: "FontFaceSet".to_string(),
            kind: IteratorKind::Setlike,
            key_type: None,
            value_type: IdlType::new(TypeKind::String(StringKind::DomString)),
            exposure: Default::default(),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        db.add_async_iterator(AsyncIterator {
            identifier: "FileSystemDirectoryHandleIterator".to_string(),
            interface: "FileSystemDirectoryHandle".to_string(),
            key_type: Some(IdlType::new(TypeKind::String(StringKind::UsvString))),
            value_type: IdlType::new(TypeKind::String(StringKind::UsvString)),
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
    fn setlike_iterator_hangs_under_set_iterator_prototype() {
        let env = env();
        let files = generate_sync_iterator(&env, "FontFaceSetIterator").unwrap();
        let header = &files[0].content;
        assert!(header.contains("using IterationSourceType = SyncIterator<FontFaceSet>;"));
        let source = &files[1].content;
        assert!(source.contains("v8::Intrinsic::kSetIteratorPrototype"));
        assert!(source.contains("{\"next\", NextOperationCallback, 0, unsigned(v8::None)}"));
        assert!(source.contains("WrapperTypeInfo::kIdlIterator"));
        assert!(source.contains("\"FontFaceSet Iterator\""));
    }

    #[test]
    fn next_callback_propagates_exceptions() {
        let env = env();
        let files = generate_sync_iterator(&env, "FontFaceSetIterator").unwrap();
        let source = &files[1].content;
        assert!(source.contains(
            "SyncIterator<FontFaceSet>* blink_receiver = \
             V8FontFaceSetIterator::ToWrappableUnsafe(isolate, v8_receiver);"
        ));
        assert!(source.contains("blink_receiver->Next(script_state, exception_state);"));
        assert!(source.contains("if (exception_state.HadException()) [[unlikely]] {"));
    }

    #[test]
    fn async_iterator_uses_async_prototype() {
        let env = env();
        let files =
            generate_async_iterator(&env, "FileSystemDirectoryHandleIterator").unwrap();
        let source = &files[1].content;
        assert!(source.contains("v8::Intrinsic::kAsyncIteratorPrototype"));
        assert!(source.contains("AsyncIterator<FileSystemDirectoryHandle>* blink_receiver"));
    }
}
