//! Output path computation.
//!
//! Each component ("core", "modules") owns an output subdirectory under the
//! generated-output root. A generated header is included by other generated
//! files through its project-relative path, so the manager exposes both the
//! filesystem path (for writing) and the include path (for `#include`
//! lines and header guards).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use web_idl::{CodeGeneratorInfo, Component};

use crate::codegen::name_style;

/// Immutable path configuration installed once per worker.
#[derive(Clone, Debug)]
pub struct PathConfig {
    /// Root the output tree is written under.
    pub output_root: PathBuf,
    /// Project-relative subdirectory per component
    /// (`core` => `third_party/blink/renderer/bindings/core/v8`).
    pub component_dirs: BTreeMap<Component, String>,
}

impl PathConfig {
    pub fn chromium_default(output_root: impl Into<PathBuf>) -> PathConfig {
        let mut component_dirs = BTreeMap::new();
        component_dirs.insert(
            Component::Core,
            "third_party/blink/renderer/bindings/core/v8".to_string(),
        );
        component_dirs.insert(
            Component::Modules,
            "third_party/blink/renderer/bindings/modules/v8".to_string(),
        );
        PathConfig { output_root: output_root.into(), component_dirs }
    }
}

#[derive(Clone, Debug)]
pub struct PathManager {
    config: PathConfig,
}

impl PathManager {
    pub fn new(config: PathConfig) -> PathManager {
        PathManager { config }
    }

    fn component_dir(&self, component: Component) -> &str {
        self.config
            .component_dirs
            .get(&component)
            .map(String::as_str)
            .unwrap_or_else(|| match component {
                Component::Core => "core",
                Component::Modules => "modules",
            })
    }

    /// Project-relative path of a generated file, used in `#include` lines
    /// and header guards.
    pub fn include_path(&self, component: Component, basename: &str, ext: &str) -> String {
        format!("{}/{basename}.{ext}", self.component_dir(component))
    }

    /// Filesystem path the generated file is written to.
    pub fn output_path(&self, component: Component, basename: &str, ext: &str) -> PathBuf {
        let mut path = self.config.output_root.clone();
        path.push(self.component_dir(component));
        path.push(format!("{basename}.{ext}"));
        path
    }

    pub fn output_root(&self) -> &Path {
        &self.config.output_root
    }
}

/// Where one class-like's four possible files go.
///
/// The API pair always exists. The impl pair exists only for definitions
/// split across components; otherwise impl content is merged into the API
/// pair and the impl accessors mirror the API ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetPaths {
    pub basename: String,
    pub api_component: Component,
    pub impl_component: Component,
}

impl TargetPaths {
    /// Paths for the `V8Foo` bindings pair of a definition.
    pub fn bindings(identifier: &str, info: &CodeGeneratorInfo) -> TargetPaths {
        let (api_component, impl_component) = info.components();
        TargetPaths {
            basename: format!("v8_{}", name_style::file(identifier)),
            api_component,
            impl_component,
        }
    }

    /// Paths for a union class, placed in the given component.
    pub fn union_class(class_basename: &str, component: Component) -> TargetPaths {
        TargetPaths {
            basename: name_style::file(class_basename),
            api_component: component,
            impl_component: component,
        }
    }

    pub fn is_cross_component(&self) -> bool {
        self.api_component != self.impl_component
    }

    pub fn api_header(&self, paths: &PathManager) -> String {
        paths.include_path(self.api_component, &self.basename, "h")
    }

    pub fn api_source(&self, paths: &PathManager) -> String {
        paths.include_path(self.api_component, &self.basename, "cc")
    }

    pub fn impl_header(&self, paths: &PathManager) -> String {
        paths.include_path(self.impl_component, &self.basename, "h")
    }

    pub fn impl_source(&self, paths: &PathManager) -> String {
        paths.include_path(self.impl_component, &self.basename, "cc")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PathManager {
        PathManager::new(PathConfig::chromium_default("/out/gen"))
    }

    #[test]
    fn include_and_output_paths() {
        let paths = manager();
        assert_eq!(
            paths.include_path(Component::Core, "v8_node", "h"),
            "third_party/blink/renderer/bindings/core/v8/v8_node.h"
        );
        assert_eq!(
            paths.output_path(Component::Modules, "v8_gamepad", "cc"),
            PathBuf::from("/out/gen/third_party/blink/renderer/bindings/modules/v8/v8_gamepad.cc")
        );
    }

    #[test]
    fn cross_component_target_splits_api_and_impl() {
        let info = CodeGeneratorInfo {
            component: Component::Core,
            component_of_partial: Some(Component::Modules),
            ..Default::default()
        };
        let target = TargetPaths::bindings("Navigator", &info);
        assert!(target.is_cross_component());
        let paths = manager();
        assert_eq!(
            target.api_header(&paths),
            "third_party/blink/renderer/bindings/core/v8/v8_navigator.h"
        );
        assert_eq!(
            target.impl_source(&paths),
            "third_party/blink/renderer/bindings/modules/v8/v8_navigator.cc"
        );
    }

    #[test]
    fn same_component_target_merges() {
        let info = CodeGeneratorInfo::default();
        let target = TargetPaths::bindings("Node", &info);
        assert!(!target.is_cross_component());
        let paths = manager();
        assert_eq!(target.api_header(&paths), target.impl_header(&paths));
    }
}
