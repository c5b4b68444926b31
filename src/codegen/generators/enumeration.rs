//! Enumeration bindings.
//!
//! An IDL enumeration becomes a value class over a constexpr string table:
//! the nested `enum class Enum` indexes the table, conversion from V8 looks
//! the string up and throws a TypeError on a miss, and the non-throwing
//! `Create(const String&)` overload serves native callers.

use web_idl::Enumeration;

use crate::codegen::accumulator::{include, AccumulatorOp};
use crate::codegen::code_node::CodeNodeTree;
use crate::codegen::cxx::{self, ClassSpec};
use crate::codegen::error::GenerationError;
use crate::codegen::generators::{common, render_pair, GeneratedFile};
use crate::codegen::name_style;
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::path_manager::TargetPaths;
use crate::codegen::source_file;

pub fn generate_enumeration(
    env: &RuntimeEnv,
    identifier: &str,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let enumeration = env.database.find_enumeration(identifier).ok_or_else(|| {
        GenerationError::invariant(format!("no enumeration `{identifier}`"), "<database>")
    })?;
    let class_name = format!("V8{}", enumeration.identifier);
    let target = TargetPaths::bindings(&enumeration.identifier, &enumeration.code_generator_info);

    let mut header_tree = CodeNodeTree::new();
    let header = source_file::header_file(&mut header_tree, &target.api_header(&env.paths));
    make_header_class(&mut header_tree, header.body, enumeration, &class_name, &target);

    let mut source_tree = CodeNodeTree::new();
    let source = source_file::source_file(&mut source_tree, &target.api_header(&env.paths));
    make_source_defs(&mut source_tree, source.body, enumeration, &class_name);

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
    body: crate::codegen::code_node::NodeId,
    enumeration: &Enumeration,
    class_name: &str,
    target: &TargetPaths,
) {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/enumeration_base.h"),
    );
    tree.accumulate(
        body,
        include("third_party/blink/renderer/platform/bindings/exception_state.h"),
    );
    tree.accumulate(body, AccumulatorOp::StdcppIncludeHeader("optional".to_string()));
    tree.accumulate(body, include("v8/include/v8.h"));

    let class = cxx::class_def(
        tree,
        &ClassSpec {
            name: class_name,
            base_names: &["bindings::EnumerationBase".to_string()],
            is_final: true,
            export: Some(common::component_export(target.api_component)),
            ..ClassSpec::default()
        },
    );

    let mut enum_decl = String::from("  enum class Enum : enum_int_t {\n");
    for value in &enumeration.values {
        enum_decl.push_str(&format!("    {},\n", name_style::constant(value)));
    }
    enum_decl.push_str("  };\n");
    enum_decl.push_str(&format!(
        "  static constexpr size_t kEnumSize = {};\n\n",
        enumeration.values.len()
    ));
    let enum_decl = tree.literal(enum_decl);
    tree.append(class.public_section, enum_decl);

    let decls = tree.literal(format!(
        "  static {class_name} Create(v8::Isolate* isolate,\n\
         \x20                         v8::Local<v8::Value> value,\n\
         \x20                         ExceptionState& exception_state);\n\
         \x20 static std::optional<{class_name}> Create(const String& value);\n\n\
         \x20 constexpr {class_name}() = default;\n\
         \x20 constexpr explicit {class_name}(Enum value)\n\
         \x20     : bindings::EnumerationBase(\n\
         \x20           static_cast<enum_int_t>(value),\n\
         \x20           string_table_[static_cast<enum_int_t>(value)]) {{}}\n\n\
         \x20 {class_name}& operator=(const String& value);\n\n\
         \x20 Enum AsEnum() const {{ return static_cast<Enum>(GetEnumValue()); }}\n"
    ));
    tree.append(class.public_section, decls);

    let mut table = String::from("  static constexpr const char* string_table_[] = {\n");
    for value in &enumeration.values {
        table.push_str(&format!("      \"{value}\",\n"));
    }
    table.push_str("  };\n");
    let table = tree.literal(table);
    tree.append(class.private_section, table);
    tree.append(body, class.node);

    let operators = tree.literal(format!(
        "\ninline bool operator==(const {class_name}& lhs, {class_name}::Enum rhs) {{\n\
         \x20 return lhs.AsEnum() == rhs;\n\
         }}\n\n\
         inline bool operator==(const {class_name}& lhs, const {class_name}& rhs) {{\n\
         \x20 return lhs.AsEnum() == rhs.AsEnum();\n\
         }}\n"
    ));
    tree.append(body, operators);
}

fn make_source_defs(
    tree: &mut CodeNodeTree,
    body: crate::codegen::code_node::NodeId,
    enumeration: &Enumeration,
    class_name: &str,
) {
    tree.accumulate(
        body,
        include("third_party/blink/renderer/bindings/core/v8/generated_code_helper.h"),
    );

    let idl_name = &enumeration.identifier;
    let defs = tree.literal(format!(
        "// static\n\
         {class_name} {class_name}::Create(v8::Isolate* isolate,\n\
         \x20                              v8::Local<v8::Value> value,\n\
         \x20                              ExceptionState& exception_state) {{\n\
         \x20 const auto index = bindings::FindIndexInEnumStringTable(\n\
         \x20     isolate, value, string_table_, \"{idl_name}\", exception_state);\n\
         \x20 return {class_name}(static_cast<Enum>(index.value_or(0)));\n\
         }}\n\n\
         // static\n\
         std::optional<{class_name}> {class_name}::Create(const String& value) {{\n\
         \x20 const auto index = bindings::FindIndexInEnumStringTable(value, string_table_);\n\
         \x20 if (!index.has_value()) {{\n\
         \x20   return std::nullopt;\n\
         \x20 }}\n\
         \x20 return {class_name}(static_cast<Enum>(index.value()));\n\
         }}\n\n\
         {class_name}& {class_name}::operator=(const String& value) {{\n\
         \x20 const auto index = bindings::FindIndexInEnumStringTable(value, string_table_);\n\
         \x20 CHECK(index.has_value());\n\
         \x20 *this = {class_name}(static_cast<Enum>(index.value()));\n\
         \x20 return *this;\n\
         }}\n"
    ));
    tree.append(body, defs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::package_initializer::{GenOptions, PackageInitializer};
    use crate::codegen::path_manager::PathConfig;
    use std::sync::Arc;
    use web_idl::Database;

    fn env_with_enum() -> std::sync::Arc<RuntimeEnv> {
        let mut db = Database::default();
        db.add_enumeration(Enumeration {
            identifier: "ShadowRootMode".to_string(),
            values: vec!["open".to_string(), "closed".to_string()],
            ext_attrs: Default::default(),
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
    fn enum_class_and_string_table() {
        let env = env_with_enum();
        let files = generate_enumeration(&env, "ShadowRootMode").unwrap();
        assert_eq!(files.len(), 2);
        let header = &files[0].content;
        assert!(header.contains("class CORE_EXPORT V8ShadowRootMode final : public bindings::EnumerationBase {"));
        assert!(header.contains("    kOpen,\n    kClosed,\n"));
        assert!(header.contains("static constexpr size_t kEnumSize = 2;"));
        assert!(header.contains("      \"open\",\n      \"closed\",\n"));
        assert!(header.contains("static std::optional<V8ShadowRootMode> Create(const String& value);"));
        let source = &files[1].content;
        assert!(source.contains("FindIndexInEnumStringTable(\n      isolate, value, string_table_, \"ShadowRootMode\", exception_state)"));
        assert!(source.contains("#include \"third_party/blink/renderer/bindings/core/v8/v8_shadow_root_mode.h\""));
    }

    #[test]
    fn header_comes_before_source_in_output_order() {
        let env = env_with_enum();
        let files = generate_enumeration(&env, "ShadowRootMode").unwrap();
        assert!(files[0].path.to_string_lossy().ends_with("v8_shadow_root_mode.h"));
        assert!(files[1].path.to_string_lossy().ends_with("v8_shadow_root_mode.cc"));
    }

    #[test]
    fn unknown_identifier_is_an_invariant_error() {
        let env = env_with_enum();
        assert!(generate_enumeration(&env, "NoSuchEnum").is_err());
    }
}
