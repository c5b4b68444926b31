//! Observable array bindings.
//!
//! An `ObservableArray<T>` attribute is backed by a generated list class
//! wrapped in a JS proxy. The proxy traps live in a runtime handler template
//! parameterized over this class; the generated code wires the nine traps
//! into the handler object template and exposes `PerformAttributeSet` for
//! the owning interface's attribute setter.

use web_idl::ObservableArray;

use crate::codegen::accumulator::include;
use crate::codegen::code_node::{CodeNodeTree, NodeId};
use crate::codegen::cxx::{self, ClassSpec};
use crate::codegen::error::GenerationError;
use crate::codegen::generators::{common, render_pair, GeneratedFile};
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::path_manager::TargetPaths;
use crate::codegen::source_file;
use crate::codegen::type_bridge;

/// The nine proxy traps the handler object implements.
const PROXY_TRAPS: [(&str, &str); 9] = [
    ("defineProperty", "TrapDefinePropertyCallback"),
    ("deleteProperty", "TrapDeletePropertyCallback"),
    ("get", "TrapGetCallback"),
    ("getOwnPropertyDescriptor", "TrapGetOwnPropertyDescriptorCallback"),
    ("getPrototypeOf", "TrapGetPrototypeOfCallback"),
    ("has", "TrapHasCallback"),
    ("ownKeys", "TrapOwnKeysCallback"),
    ("preventExtensions", "TrapPreventExtensionsCallback"),
    ("set", "TrapSetCallback"),
];

pub fn generate_observable_array(
    env: &RuntimeEnv,
    identifier: &str,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let array = env.database.find_observable_array(identifier).ok_or_else(|| {
        GenerationError::invariant(format!("no observable array `{identifier}`"), "<database>")
    })?;
    let class_name = format!("V8{}", array.identifier);
    let target = TargetPaths::bindings(&array.identifier, &array.code_generator_info);

    let db = &env.database;
    let element_info = type_bridge::blink_type_info(db, &array.element_type)?;
    let element_tag = type_bridge::native_value_tag(db, &array.element_type)?;
    let idl_name = format!("ObservableArray<{}>", array.element_type.display_name(db));

    let mut header_tree = CodeNodeTree::new();
    let header = source_file::header_file(&mut header_tree, &target.api_header(&env.paths));
    make_header_class(
        &mut header_tree,
        header.body,
        &class_name,
        &target,
        &element_info.value_t,
        &element_info.member_t,
    );

    let mut source_tree = CodeNodeTree::new();
    let source = source_file::source_file(&mut source_tree, &target.api_header(&env.paths));
    make_source_defs(
        &mut source_tree,
        source.body,
        array,
        &class_name,
        &idl_name,
        &element_tag,
    );

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
    class_name: &str,
    target: &TargetPaths,
    element_value_t: &str,
    element_member_t: &str,
) {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/observable_array_base.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/wrapper_type_info.h"),
    );
    source_file::add_common_includes(tree, body);

    let class = cxx::class_def(
        tree,
        &ClassSpec {
            name: class_name,
            base_names: &["bindings::ObservableArrayBase".to_string()],
            is_final: true,
            export: Some(common::component_export(target.api_component)),
            ..ClassSpec::default()
        },
    );

    let decls = tree.literal(format!(
        "  using ElementType = {element_value_t};\n\
         \x20 using BackingListType = HeapVector<{element_member_t}>;\n\
         \x20 using SetAlgorithmCallback =\n\
         \x20     void (*)(ScriptWrappable* platform_object, {class_name}& array,\n\
         \x20              ElementType& value, ExceptionState& exception_state);\n\
         \x20 using DeleteAlgorithmCallback =\n\
         \x20     void (*)(ScriptWrappable* platform_object, {class_name}& array,\n\
         \x20              uint32_t index, ExceptionState& exception_state);\n\n\
         \x20 {class_name}(ScriptWrappable* platform_object,\n\
         \x20              SetAlgorithmCallback set_algorithm_callback,\n\
         \x20              DeleteAlgorithmCallback delete_algorithm_callback);\n\n"
    ));
    tree.append(class.public_section, decls);

    let wti = common::wrapper_type_info_decls(tree);
    tree.append(class.public_section, wti);

    let api = tree.literal(format!(
        "\n\
         \x20 BackingListType& backing_list() {{ return backing_list_; }}\n\
         \x20 const BackingListType& backing_list() const {{ return backing_list_; }}\n\n\
         \x20 // The owning interface's attribute setter delegates here.\n\
         \x20 void PerformAttributeSet(ScriptState* script_state,\n\
         \x20                          v8::Local<v8::Value> v8_value,\n\
         \x20                          ExceptionState& exception_state);\n\n\
         \x20 v8::Local<v8::ObjectTemplate> GetProxyHandlerTemplate(\n\
         \x20     v8::Isolate* isolate) override;\n\n\
         \x20 void Trace(Visitor* visitor) const override {{\n\
         \x20   visitor->Trace(backing_list_);\n\
         \x20   bindings::ObservableArrayBase::Trace(visitor);\n\
         \x20 }}\n"
    ));
    tree.append(class.public_section, api);

    let storage = tree.literal(format!(
        "  BackingListType backing_list_;\n\
         \x20 SetAlgorithmCallback set_algorithm_callback_;\n\
         \x20 DeleteAlgorithmCallback delete_algorithm_callback_;\n"
    ));
    tree.append(class.private_section, storage);
    tree.append(body, class.node);
}

fn make_source_defs(
    tree: &mut CodeNodeTree,
    body: NodeId,
    array: &ObservableArray,
    class_name: &str,
    idl_name: &str,
    element_tag: &str,
) {
    tree.accumulate(
        body,
        include(
            "third_party/blink/renderer/platform/bindings/observable_array_exotic_object_handler.h",
        ),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/native_value_traits_impl.h"),
    );
    for header in &array.code_generator_info.blink_headers {
        tree.accumulate(body, include(header));
    }

    let handler = tree.literal(format!(
        "using Handler =\n\
         \x20   bindings::ObservableArrayExoticObjectHandler<{class_name}, {element_tag}>;\n"
    ));
    let anon = cxx::namespace(tree, "", vec![handler]);
    tree.append(body, anon);

    let wti = common::wrapper_type_info_def(
        tree,
        &common::WrapperTypeInfoSpec {
            class_name,
            idl_name,
            parent: None,
            kind: common::IdlDefinitionKind::ObservableArray,
            has_prototype: false,
            is_node: false,
            is_active_script_wrappable: false,
            has_context_dependent_properties: false,
            skipped_in_interface_object_prototype_chain: false,
        },
    );
    tree.append(body, wti);

    let defs = tree.literal(format!(
        "\n\
         {class_name}::{class_name}(ScriptWrappable* platform_object,\n\
         \x20                       SetAlgorithmCallback set_algorithm_callback,\n\
         \x20                       DeleteAlgorithmCallback delete_algorithm_callback)\n\
         \x20   : bindings::ObservableArrayBase(platform_object),\n\
         \x20     set_algorithm_callback_(set_algorithm_callback),\n\
         \x20     delete_algorithm_callback_(delete_algorithm_callback) {{}}\n\n\
         void {class_name}::PerformAttributeSet(ScriptState* script_state,\n\
         \x20                                   v8::Local<v8::Value> v8_value,\n\
         \x20                                   ExceptionState& exception_state) {{\n\
         \x20 v8::Isolate* isolate = script_state->GetIsolate();\n\
         \x20 auto&& new_list = NativeValueTraits<IDLSequence<{element_tag}>>::NativeValue(\n\
         \x20     isolate, v8_value, exception_state);\n\
         \x20 if (exception_state.HadException()) [[unlikely]] {{\n\
         \x20   return;\n\
         \x20 }}\n\
         \x20 backing_list_.clear();\n\
         \x20 for (auto&& element : new_list) {{\n\
         \x20   set_algorithm_callback_(GetPlatformObject(), *this, element,\n\
         \x20                           exception_state);\n\
         \x20   if (exception_state.HadException()) [[unlikely]] {{\n\
         \x20     return;\n\
         \x20   }}\n\
         \x20   backing_list_.push_back(std::move(element));\n\
         \x20 }}\n\
         }}\n\n"
    ));
    tree.append(body, defs);

    let mut traps = String::new();
    for (name, callback) in PROXY_TRAPS {
        traps.push_str(&format!(
            "  handler_template->Set(\n\
             \x20     V8AtomicString(isolate, \"{name}\"),\n\
             \x20     v8::FunctionTemplate::New(isolate, Handler::{callback}));\n"
        ));
    }
    let template = tree.literal(format!(
        "v8::Local<v8::ObjectTemplate> {class_name}::GetProxyHandlerTemplate(\n\
         \x20   v8::Isolate* isolate) {{\n\
         \x20 v8::Local<v8::ObjectTemplate> handler_template =\n\
         \x20     v8::ObjectTemplate::New(isolate);\n\
         {traps}\
         \x20 return handler_template;\n\
         }}\n"
    ));
    tree.append(body, template);
}
