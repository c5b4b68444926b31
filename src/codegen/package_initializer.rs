//! Process-wide generator state.
//!
//! The IDL database, path configuration and generator options are installed
//! once at startup and shared read-only by every task. The environment is an
//! immutable value threaded through the generators rather than a mutable
//! global, so tasks on other threads can hold it without synchronization.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use web_idl::Database;

use crate::codegen::path_manager::{PathConfig, PathManager};

/// Per-union naming overrides.
///
/// The canonical union class name concatenates member tokens with `Or`
/// (`V8UnionNodeOrString`). For unwieldy unions a project can override the
/// class and file names, and declare which union pairs are related closely
/// enough to deserve lossless transfer accessors.
#[derive(Clone, Debug, Default)]
pub struct UnionNameMap {
    class_names: BTreeMap<String, String>,
    /// Pairs `(larger, smaller)` of union identifiers where the larger
    /// union's flattened members include all of the smaller's.
    subunion_pairs: Vec<(String, String)>,
}

impl UnionNameMap {
    pub fn insert_class_name(&mut self, union_identifier: &str, class_name: &str) {
        self.class_names.insert(union_identifier.to_string(), class_name.to_string());
    }

    pub fn class_name_override(&self, union_identifier: &str) -> Option<&str> {
        self.class_names.get(union_identifier).map(String::as_str)
    }

    pub fn add_subunion_pair(&mut self, larger: &str, smaller: &str) {
        self.subunion_pairs.push((larger.to_string(), smaller.to_string()));
    }

    /// Smaller unions embedded in `larger`, in registration order.
    pub fn subunions_of<'a>(&'a self, larger: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.subunion_pairs
            .iter()
            .filter(move |(l, _)| l == larger)
            .map(|(_, smaller)| smaller.as_str())
    }
}

/// Generator options beyond path layout.
#[derive(Clone, Debug)]
pub struct GenOptions {
    /// Run the configured style formatter over each output file.
    pub format_output: bool,
    /// Guard `[EnforceRange]` fast-call tables out on x86, where the V8
    /// fast-call ABI cannot express the range check.
    pub enforce_range_x86_guard: bool,
    pub union_names: UnionNameMap,
}

impl Default for GenOptions {
    fn default() -> GenOptions {
        GenOptions {
            format_output: true,
            enforce_range_x86_guard: true,
            union_names: UnionNameMap::default(),
        }
    }
}

/// Everything a generator task reads.
#[derive(Debug)]
pub struct RuntimeEnv {
    pub database: Arc<Database>,
    pub paths: PathManager,
    pub options: GenOptions,
}

/// One-shot builder of the shared [`RuntimeEnv`].
///
/// Initialization may be requested from several call sites during startup;
/// every call after the first returns the environment built by the first,
/// so repeated initialization with the same arguments is a no-op.
pub struct PackageInitializer {
    database: Arc<Database>,
    path_config: PathConfig,
    options: GenOptions,
    env: OnceLock<Arc<RuntimeEnv>>,
}

impl PackageInitializer {
    pub fn new(
        database: Arc<Database>,
        path_config: PathConfig,
        options: GenOptions,
    ) -> PackageInitializer {
        PackageInitializer { database, path_config, options, env: OnceLock::new() }
    }

    pub fn init(&self) -> Arc<RuntimeEnv> {
        Arc::clone(self.env.get_or_init(|| {
            Arc::new(RuntimeEnv {
                database: Arc::clone(&self.database),
                paths: PathManager::new(self.path_config.clone()),
                options: self.options.clone(),
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let initializer = PackageInitializer::new(
            Arc::new(Database::default()),
            PathConfig::chromium_default("/out/gen"),
            GenOptions::default(),
        );
        let first = initializer.init();
        let second = initializer.init();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn union_name_map_overrides_and_subunions() {
        let mut names = UnionNameMap::default();
        names.insert_class_name("CSSColorValueOrDOMString", "V8UnionCSSColorValueOrString");
        names.add_subunion_pair("NodeOrStringOrTrustedScript", "NodeOrString");
        assert_eq!(
            names.class_name_override("CSSColorValueOrDOMString"),
            Some("V8UnionCSSColorValueOrString")
        );
        assert_eq!(
            names.subunions_of("NodeOrStringOrTrustedScript").collect::<Vec<_>>(),
            ["NodeOrString"]
        );
        assert_eq!(names.subunions_of("Other").count(), 0);
    }
}
