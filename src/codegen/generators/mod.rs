//! Per-definition generators.
//!
//! Each `generate_*` entry point takes the shared [`RuntimeEnv`] and one IDL
//! identifier and returns the output files for that definition. The driver
//! schedules one task per definition plus the cross-cutting aggregates (the
//! per-feature installer and the typedef alias header).

pub mod callback_function;
pub mod callback_interface;
pub mod common;
pub mod dictionary;
pub mod enumeration;
pub mod install_per_feature;
pub mod interface;
pub mod iterator;
pub mod namespace;
pub mod observable_array;
pub mod typedef_aggregate;
pub mod union;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::info_span;

use crate::codegen::error::GenerationError;
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::task_queue::{TaskFailure, TaskQueue};

/// One rendered output file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

/// Generate every definition in the database.
///
/// Tasks run largest first; results are sorted by path afterwards so the
/// aggregate output order does not depend on scheduling.
pub fn generate_all(
    env: &RuntimeEnv,
    jobs: NonZeroUsize,
) -> (Vec<GeneratedFile>, Vec<TaskFailure>) {
    let outputs: Mutex<Vec<GeneratedFile>> = Mutex::new(Vec::new());
    let mut queue = TaskQueue::new();

    let collect = |files: Vec<GeneratedFile>| {
        if let Ok(mut outputs) = outputs.lock() {
            outputs.extend(files);
        }
    };

    macro_rules! post {
        ($kind:literal, $identifier:expr, $workload:expr, $generate:expr) => {{
            let identifier = $identifier.clone();
            let generate = $generate;
            queue.post_task_with_workload(
                format!(concat!($kind, " {}"), identifier),
                $workload,
                move || {
                    let span = info_span!($kind, identifier = %identifier);
                    let _guard = span.enter();
                    collect(generate(env, &identifier)?);
                    Ok(())
                },
            );
        }};
    }

    for interface in env.database.interfaces() {
        let workload = (interface.attributes.len()
            + interface.constants.len()
            + interface.operation_groups.len()
            + interface.exposed_constructs.len()) as u64
            + 8;
        post!("generate_interface", interface.identifier, workload, interface::generate_interface);
    }
    for ns in env.database.namespaces() {
        let workload =
            (ns.attributes.len() + ns.constants.len() + ns.operation_groups.len()) as u64 + 4;
        post!("generate_namespace", ns.identifier, workload, namespace::generate_namespace);
    }
    for dict in env.database.dictionaries() {
        post!(
            "generate_dictionary",
            dict.identifier,
            dict.own_members.len() as u64 + 4,
            dictionary::generate_dictionary
        );
    }
    for enumeration in env.database.enumerations() {
        post!(
            "generate_enumeration",
            enumeration.identifier,
            enumeration.values.len() as u64 + 2,
            enumeration::generate_enumeration
        );
    }
    for callback in env.database.callback_functions() {
        post!(
            "generate_callback_function",
            callback.identifier,
            4,
            callback_function::generate_callback_function
        );
    }
    for callback in env.database.callback_interfaces() {
        post!(
            "generate_callback_interface",
            callback.identifier,
            4,
            callback_interface::generate_callback_interface
        );
    }
    for union in env.database.unions() {
        post!(
            "generate_union",
            union.identifier,
            union.flattened_member_types.len() as u64 + 4,
            union::generate_union
        );
    }
    for observable_array in env.database.observable_arrays() {
        post!(
            "generate_observable_array",
            observable_array.identifier,
            4,
            observable_array::generate_observable_array
        );
    }
    for iterator in env.database.sync_iterators() {
        post!("generate_sync_iterator", iterator.identifier, 4, iterator::generate_sync_iterator);
    }
    for iterator in env.database.async_iterators() {
        post!(
            "generate_async_iterator",
            iterator.identifier,
            4,
            iterator::generate_async_iterator
        );
    }

    // Cross-cutting aggregates scan the whole database; run them early.
    queue.post_task_with_workload("install_properties_per_feature", u64::MAX, || {
        collect(install_per_feature::generate_install_properties_per_feature(env)?);
        Ok(())
    });
    queue.post_task_with_workload("typedef_aggregate", u64::MAX - 1, || {
        collect(typedef_aggregate::generate_typedef_aggregate(env)?);
        Ok(())
    });

    let failures = queue.run_all(jobs);
    let mut outputs = outputs.into_inner().unwrap_or_default();
    outputs.sort_by(|a, b| a.path.cmp(&b.path));
    (outputs, failures)
}

/// Render one header/source pair into [`GeneratedFile`]s.
pub(crate) fn render_pair(
    env: &RuntimeEnv,
    component: web_idl::Component,
    basename: &str,
    header_tree: &mut crate::codegen::code_node::CodeNodeTree,
    header_root: crate::codegen::code_node::NodeId,
    source_tree: &mut crate::codegen::code_node::CodeNodeTree,
    source_root: crate::codegen::code_node::NodeId,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let header = crate::codegen::renderer::render(header_tree, header_root)?;
    let source = crate::codegen::renderer::render(source_tree, source_root)?;
    Ok(vec![
        GeneratedFile { path: env.paths.output_path(component, basename, "h"), content: header },
        GeneratedFile { path: env.paths.output_path(component, basename, "cc"), content: source },
    ])
}
