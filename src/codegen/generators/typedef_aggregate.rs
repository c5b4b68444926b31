//! Typedef alias header.
//!
//! Union classes are named after their flattened members
//! (`V8UnionNodeOrString`), but IDL authors refer to them through typedefs
//! (`NodeOrString`). One generated header per component carries a `using`
//! alias for every typedef that names a union, so handwritten code can spell
//! the typedef name. Unions are forward-declared; nothing is included.

use std::collections::BTreeMap;

use web_idl::{Component, Database, IdlType, TypeKind, Union};

use crate::codegen::accumulator::AccumulatorOp;
use crate::codegen::code_node::CodeNodeTree;
use crate::codegen::error::GenerationError;
use crate::codegen::generators::{union, GeneratedFile};
use crate::codegen::package_initializer::RuntimeEnv;
use crate::codegen::renderer;
use crate::codegen::source_file;

const BASENAME: &str = "v8_typedefs";

pub fn generate_typedef_aggregate(
    env: &RuntimeEnv,
) -> Result<Vec<GeneratedFile>, GenerationError> {
    let db = &env.database;

    // {component -> [(typedef name, union class name)]}; the typedef list is
    // already sorted, so each alias list is too.
    let mut per_component: BTreeMap<Component, Vec<(String, String)>> = BTreeMap::new();
    for typedef in db.typedefs() {
        let Some(target) = resolve_union(db, &typedef.idl_type) else { continue };
        let class_name = union::union_class_name(env, target);
        per_component
            .entry(typedef.code_generator_info.components().0)
            .or_default()
            .push((typedef.identifier.clone(), class_name));
    }

    let mut files = Vec::new();
    for (component, aliases) in &per_component {
        let mut tree = CodeNodeTree::new();
        let include_path = env.paths.include_path(*component, BASENAME, "h");
        let file = source_file::header_file(&mut tree, &include_path);
        let mut text = String::new();
        for (typedef_name, class_name) in aliases {
            text.push_str(&format!("using V8{typedef_name} = {class_name};\n"));
        }
        let body = tree.literal(text);
        for (_, class_name) in aliases {
            tree.accumulate(body, AccumulatorOp::ClassDecl(class_name.clone()));
        }
        tree.append(file.body, body);
        let content = renderer::render(&mut tree, file.root)?;
        files.push(GeneratedFile {
            path: env.paths.output_path(*component, BASENAME, "h"),
            content,
        });
    }
    Ok(files)
}

/// The union a typedef ultimately names, if any.
///
/// A typedef may share its identifier with the union it names, so the union
/// lookup comes first; typedef chains are followed with a step limit in case
/// the database carries a cycle.
fn resolve_union<'a>(db: &'a Database, idl_type: &'a IdlType) -> Option<&'a Union> {
    let mut current = idl_type;
    for _ in 0..16 {
        match &current.kind {
            TypeKind::Nullable(inner) => current = inner,
            TypeKind::Reference(identifier) => {
                if let Some(target) = db.find_union(identifier) {
                    return Some(target);
                }
                current = &db.find_typedef(identifier)?.idl_type;
            }
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::package_initializer::{GenOptions, PackageInitializer};
    use crate::codegen::path_manager::PathConfig;
    use std::sync::Arc;
    use web_idl::{Database, IdlType, StringKind, TypeKind, Typedef, Union};

    fn env(db: Database) -> Arc<RuntimeEnv> {
        PackageInitializer::new(
            Arc::new(db),
            PathConfig::chromium_default("/out/gen"),
            GenOptions::default(),
        )
        .init()
    }

    fn union_of_node_or_string() -> Union {
        Union {
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
        }
    }

    #[test]
    fn typedef_naming_a_union_gets_an_alias() {
        let mut db = Database::default();
        db.add_union(union_of_node_or_string());
        db.add_typedef(Typedef {
            identifier: "NodeOrString".to_string(),
            idl_type: IdlType::reference("NodeOrString"),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        let files = generate_typedef_aggregate(&env(db)).unwrap();
        assert_eq!(files.len(), 1);
        let header = &files[0].content;
        assert!(header.contains("class V8UnionNodeOrString;"));
        assert!(header.contains("using V8NodeOrString = V8UnionNodeOrString;"));
    }

    #[test]
    fn nullable_typedef_still_resolves_to_the_union() {
        let mut db = Database::default();
        db.add_union(union_of_node_or_string());
        db.add_typedef(Typedef {
            identifier: "MaybeNodeOrString".to_string(),
            idl_type: IdlType::nullable(IdlType::reference("NodeOrString")),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        let files = generate_typedef_aggregate(&env(db)).unwrap();
        assert!(files[0]
            .content
            .contains("using V8MaybeNodeOrString = V8UnionNodeOrString;"));
    }

    #[test]
    fn non_union_typedefs_are_skipped() {
        let mut db = Database::default();
        db.add_typedef(Typedef {
            identifier: "DOMTimeStamp".to_string(),
            idl_type: IdlType::new(TypeKind::Integer(web_idl::IntegerKind::UnsignedLongLong)),
            code_generator_info: Default::default(),
            debug_info: Default::default(),
        });
        let files = generate_typedef_aggregate(&env(db)).unwrap();
        assert!(files.is_empty());
    }
}
