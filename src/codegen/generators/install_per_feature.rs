//! Per-feature property installer.
//!
//! Origin-trial features flip per context, possibly after a context's
//! interface objects already exist. `InstallPropertiesPerFeature` is the
//! retroactive entry point: given the feature that just turned on, it runs
//! the context-dependent installer of every class with any member gated on
//! that feature, selecting only that feature's entries.

use std::collections::{BTreeMap, BTreeSet};

use web_idl::{Component, Database, Exposure, Interface, Namespace};

use crate::codegen::accumulator::include;
use crate::codegen::code_node::CodeNodeTree;
use crate::codegen::error::GenerationError;
use crate::codegen::generators::{common, render_pair, GeneratedFile};
use crate::codegen::name_style;
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::source_file;

const BASENAME: &str = "properties_per_feature_installer";

/// {feature -> sorted V8 class names} for one component.
type FeatureMap = BTreeMap<String, BTreeSet<String>>;

pub fn generate_install_properties_per_feature(
    env: &RuntimeEnv,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let per_component = collect_feature_map(&env.database);
    let mut files = Vec::new();
    for (component, features) in &per_component {
        files.extend(generate_for_component(env, *component, features)?);
    }
    Ok(files)
}

fn collect_feature_map(db: &Database) -> BTreeMap<Component, FeatureMap> {
    let mut per_component: BTreeMap<Component, FeatureMap> = BTreeMap::new();
    for interface in db.interfaces() {
        let features = interface_features(interface);
        record(&mut per_component, &interface.identifier, &interface.code_generator_info, features);
    }
    for namespace in db.namespaces() {
        let features = namespace_features(namespace);
        record(&mut per_component, &namespace.identifier, &namespace.code_generator_info, features);
    }
    per_component
}

fn record(
    per_component: &mut BTreeMap<Component, FeatureMap>,
    identifier: &str,
    info: &web_idl::CodeGeneratorInfo,
    features: BTreeSet<String>,
) {
    if features.is_empty() {
        return;
    }
    // The context-dependent installer lives with the impl side.
    let (_, impl_component) = info.components();
    let class_name = format!("V8{identifier}");
    let map = per_component.entry(impl_component).or_default();
    for feature in features {
        map.entry(feature).or_default().insert(class_name.clone());
    }
}

fn interface_features(interface: &Interface) -> BTreeSet<String> {
    let mut features = BTreeSet::new();
    add_features(&mut features, &interface.exposure);
    for attribute in &interface.attributes {
        add_features(&mut features, &attribute.exposure);
    }
    for constant in &interface.constants {
        add_features(&mut features, &constant.exposure);
    }
    for group in &interface.operation_groups {
        add_features(&mut features, &group.exposure);
        for operation in &group.operations {
            add_features(&mut features, &operation.exposure);
        }
    }
    for group in &interface.constructor_groups {
        add_features(&mut features, &group.exposure);
    }
    for construct in &interface.exposed_constructs {
        add_features(&mut features, &construct.exposure);
    }
    features
}

fn namespace_features(namespace: &Namespace) -> BTreeSet<String> {
    let mut features = BTreeSet::new();
    add_features(&mut features, &namespace.exposure);
    for attribute in &namespace.attributes {
        add_features(&mut features, &attribute.exposure);
    }
    for constant in &namespace.constants {
        add_features(&mut features, &constant.exposure);
    }
    for group in &namespace.operation_groups {
        add_features(&mut features, &group.exposure);
        for operation in &group.operations {
            add_features(&mut features, &operation.exposure);
        }
    }
    features
}

fn add_features(features: &mut BTreeSet<String>, exposure: &Exposure) {
    for feature in &exposure.origin_trial_features {
        features.insert(feature.clone());
    }
    for entry in &exposure.global_names_and_features {
        if let Some(feature) = &entry.feature {
            features.insert(feature.clone());
        }
    }
}

fn function_name(component: Component) -> &'static str {
    match component {
        Component::Core => "InstallPropertiesPerFeature",
        Component::Modules => "InstallPropertiesPerFeatureForModules",
    }
}

fn generate_for_component(
    env: &RuntimeEnv,
    component: Component,
    features: &FeatureMap,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let func_name = function_name(component);
    let export = common::component_export(component);
    let self_header = env.paths.include_path(component, BASENAME, "h");

    let mut header_tree = CodeNodeTree::new();
    let header = source_file::header_file(&mut header_tree, &self_header);
    header_tree.accumulate(
        header.body,
        include("third_party/blink/public/mojom/origin_trial_feature/origin_trial_feature.mojom-blink-forward.h"),
    );
    let decl = header_tree.literal(format!(
        "class ScriptState;\n\n\
         {export} void {func_name}(ScriptState* script_state,\n\
         \x20                      mojom::blink::OriginTrialFeature feature);\n"
    ));
    header_tree.append(header.body, decl);

    let mut source_tree = CodeNodeTree::new();
    let source = source_file::source_file(&mut source_tree, &self_header);
    source_tree.accumulate(
        source.body,
        include("third_party/blink/public/mojom/origin_trial_feature/origin_trial_feature.mojom-blink.h"),
    );
    source_tree.accumulate(
        source.body,
        include("third_party/blink/renderer/platform/bindings/script_state.h"),
    );
    source_tree.accumulate(
        source.body,
        include("third_party/blink/renderer/platform/bindings/v8_interface_bridge_base.h"),
    );
    for classes in features.values() {
        for class_name in classes {
            let basename = format!("v8_{}", name_style::file(&class_name[2..]));
            source_tree.accumulate(
                source.body,
                include(&env.paths.include_path(component, &basename, "h")),
            );
        }
    }

    let helper = source_tree.literal(
        "void InstallFeature(ScriptState* script_state,\n\
         \x20                   bindings::V8InterfaceBridgeBase::FeatureSelector feature_selector,\n\
         \x20                   base::span<const WrapperTypeInfo* const> wrapper_type_infos) {\n\
         \x20 for (const WrapperTypeInfo* wrapper_type_info : wrapper_type_infos) {\n\
         \x20   wrapper_type_info->install_context_dependent_props_func(script_state,\n\
         \x20                                                           feature_selector);\n\
         \x20 }\n\
         }\n"
            .to_string(),
    );
    let anon = crate::codegen::cxx::namespace(&mut source_tree, "", vec![helper]);
    source_tree.append(source.body, anon);

    let mut cases = String::new();
    for (feature, classes) in features {
        let mut rows = String::new();
        for class_name in classes {
            rows.push_str(&format!("          {class_name}::GetWrapperTypeInfo(),\n"));
        }
        cases.push_str(&format!(
            "    case mojom::blink::OriginTrialFeature::k{feature}: {{\n\
             \x20     static const WrapperTypeInfo* const kWrapperTypeInfos[] = {{\n\
             {rows}\
             \x20     }};\n\
             \x20     InstallFeature(script_state, FeatureSelector(feature),\n\
             \x20                    kWrapperTypeInfos);\n\
             \x20     break;\n\
             \x20   }}\n"
        ));
    }
    let dispatcher = source_tree.literal(format!(
        "\nvoid {func_name}(ScriptState* script_state,\n\
         \x20                mojom::blink::OriginTrialFeature feature) {{\n\
         \x20 using FeatureSelector = bindings::V8InterfaceBridgeBase::FeatureSelector;\n\
         \x20 switch (feature) {{\n\
         {cases}\
         \x20   default:\n\
         \x20     break;\n\
         \x20 }}\n\
         }}\n"
    ));
    source_tree.append(source.body, dispatcher);

    render_pair(
        env,
        component,
        BASENAME,
        &mut header_tree,
        header.root,
        &mut source_tree,
        source.root,
    )
}
