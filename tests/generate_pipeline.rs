//! End-to-end run of the generation pipeline over a small database.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use widlgen::codegen::path_manager::PathConfig;
use widlgen::{generate_all, GenOptions, GeneratedFile, PackageInitializer, RuntimeEnv};

use web_idl::{
    Attribute, Database, Enumeration, Exposure, ExtendedAttributes, IdlType, Interface, StringKind,
    TypeKind, Typedef, Union,
};

fn interface(identifier: &str, inherited: Option<&str>) -> Interface {
    Interface {
        identifier: identifier.to_string(),
        inherited: inherited.map(str::to_string),
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
        exposure: Exposure::default(),
        code_generator_info: Default::default(),
        debug_info: Default::default(),
    }
}

fn attribute(identifier: &str, idl_type: IdlType) -> Attribute {
    Attribute {
        identifier: identifier.to_string(),
        idl_type,
        is_static: false,
        is_readonly: true,
        ext_attrs: ExtendedAttributes::new(),
        exposure: Exposure::default(),
        code_generator_info: Default::default(),
        debug_info: Default::default(),
    }
}

fn small_database() -> Database {
    let mut db = Database::default();

    let mut node = interface("Node", None);
    node.attributes.push(attribute(
        "nodeName",
        IdlType::new(TypeKind::String(StringKind::DomString)),
    ));
    db.add_interface(node);
    db.add_interface(interface("Element", Some("Node")));

    db.add_enumeration(Enumeration {
        identifier: "Mode".to_string(),
        values: vec!["open".to_string(), "closed".to_string()],
        ext_attrs: Default::default(),
        code_generator_info: Default::default(),
        debug_info: Default::default(),
    });

    db.add_union(Union {
        identifier: "NodeOrString".to_string(),
        flattened_member_types: vec![
            IdlType::reference("Node"),
            IdlType::new(TypeKind::String(StringKind::DomString)),
        ],
        does_include_nullable_type: false,
        typedef_members: vec!["NodeOrString".to_string()],
        union_members: vec![],
        code_generator_info: Default::default(),
        debug_info: Default::default(),
    });
    db.add_typedef(Typedef {
        identifier: "NodeOrString".to_string(),
        idl_type: IdlType::reference("NodeOrString"),
        code_generator_info: Default::default(),
        debug_info: Default::default(),
    });

    db
}

fn env() -> Arc<RuntimeEnv> {
    PackageInitializer::new(
        Arc::new(small_database()),
        PathConfig::chromium_default("/out/gen"),
        GenOptions::default(),
    )
    .init()
}

fn run(env: &RuntimeEnv, jobs: usize) -> Vec<GeneratedFile> {
    let jobs = NonZeroUsize::new(jobs).unwrap();
    let (files, failures) = generate_all(env, jobs);
    assert!(failures.is_empty(), "unexpected failures: {failures:?}");
    files
}

fn relative_paths(files: &[GeneratedFile]) -> Vec<String> {
    files
        .iter()
        .map(|f| {
            f.path
                .strip_prefix(Path::new("/out/gen"))
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect()
}

#[test]
fn every_definition_gets_its_output_files() {
    let env = env();
    let files = run(&env, 1);
    insta::assert_snapshot!(relative_paths(&files).join("\n"), @r"
    third_party/blink/renderer/bindings/core/v8/v8_element.cc
    third_party/blink/renderer/bindings/core/v8/v8_element.h
    third_party/blink/renderer/bindings/core/v8/v8_mode.cc
    third_party/blink/renderer/bindings/core/v8/v8_mode.h
    third_party/blink/renderer/bindings/core/v8/v8_node.cc
    third_party/blink/renderer/bindings/core/v8/v8_node.h
    third_party/blink/renderer/bindings/core/v8/v8_typedefs.h
    third_party/blink/renderer/bindings/core/v8/v8_union_node_or_string.cc
    third_party/blink/renderer/bindings/core/v8/v8_union_node_or_string.h
    ");
}

#[test]
fn outputs_come_back_sorted_by_path() {
    let env = env();
    let files = run(&env, 4);
    assert!(files.windows(2).all(|w| w[0].path < w[1].path));
}

#[test]
fn derived_interface_links_against_its_parent() {
    let env = env();
    let files = run(&env, 1);
    let by_suffix = |suffix: &str| {
        files
            .iter()
            .find(|f| f.path.to_string_lossy().ends_with(suffix))
            .unwrap()
    };

    let element_header = by_suffix("v8_element.h");
    assert!(element_header.content.contains("class CORE_EXPORT V8Element final {"));

    let element_source = by_suffix("v8_element.cc");
    assert!(element_source
        .content
        .contains("#include \"third_party/blink/renderer/bindings/core/v8/v8_node.h\""));
    assert!(element_source.content.contains("V8Node::GetWrapperTypeInfo()"));

    let typedefs = by_suffix("v8_typedefs.h");
    assert!(typedefs.content.contains("using V8NodeOrString = V8UnionNodeOrString;"));
}

#[test]
fn parallel_and_serial_runs_agree() {
    let shared = env();
    let serial = run(&shared, 1);
    let parallel = run(&shared, 4);
    assert_eq!(serial, parallel);

    // A fresh environment over the same database is equal too.
    let again = run(&env(), 2);
    assert_eq!(serial, again);
}
