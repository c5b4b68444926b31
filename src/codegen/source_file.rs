//! Skeleton of one generated C++ file.
//!
//! Every output file follows the same shape: copyright banner, include
//! guards (headers) or the sibling-header include (sources), the include
//! block collected by the accumulator, forward declarations, and the file
//! body inside a single `blink` namespace. The include and forward
//! declaration blocks are `Dynamic` nodes, so whatever the body demands
//! during rendering shows up at the top of the file.

use crate::codegen::accumulator::include;
use crate::codegen::code_node::{CodeNodeTree, DynamicContent, Likeliness, NodeId};
use crate::codegen::name_style;

const COPYRIGHT_BANNER: &str = "\
// Copyright 2024 The Chromium Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

";

/// The assembled skeleton. `body` is the root symbol scope inside
/// `namespace blink`; generators append their content there.
pub struct SourceFile {
    pub root: NodeId,
    pub body: NodeId,
}

/// A header file: guard, includes, forward declarations, `blink` namespace.
pub fn header_file(tree: &mut CodeNodeTree, include_path: &str) -> SourceFile {
    let guard = name_style::header_guard(include_path);
    let banner = tree.literal(COPYRIGHT_BANNER);
    let guard_open = tree.literal(format!("#ifndef {guard}\n#define {guard}\n\n"));
    let includes = tree.dynamic(DynamicContent::IncludeHeaders);
    let stdcpp_includes = tree.dynamic(DynamicContent::StdcppIncludeHeaders);
    let ns_open = tree.literal("\nnamespace blink {\n\n");
    let forward_decls = tree.dynamic(DynamicContent::ForwardDeclarations);
    let body = tree.symbol_scope(vec![], Likeliness::Always);
    let ns_close = tree.literal("\n}  // namespace blink\n");
    let guard_close = tree.literal(format!("\n#endif  // {guard}\n"));
    let root = tree.sequence(vec![
        banner,
        guard_open,
        includes,
        stdcpp_includes,
        ns_open,
        forward_decls,
        body,
        ns_close,
        guard_close,
    ]);
    SourceFile { root, body }
}

/// A source file: sibling-header include first, then the accumulated
/// includes, then the `blink` namespace.
pub fn source_file(tree: &mut CodeNodeTree, self_header_path: &str) -> SourceFile {
    let banner = tree.literal(COPYRIGHT_BANNER);
    let self_include = tree.literal(format!("#include \"{self_header_path}\"\n\n"));
    let includes = tree.dynamic(DynamicContent::IncludeHeaders);
    let stdcpp_includes = tree.dynamic(DynamicContent::StdcppIncludeHeaders);
    let ns_open = tree.literal("\nnamespace blink {\n\n");
    let forward_decls = tree.dynamic(DynamicContent::ForwardDeclarations);
    let body = tree.symbol_scope(vec![], Likeliness::Always);
    let ns_close = tree.literal("\n}  // namespace blink\n");
    let root = tree.sequence(vec![
        banner,
        self_include,
        includes,
        stdcpp_includes,
        ns_open,
        forward_decls,
        body,
        ns_close,
    ]);
    SourceFile { root, body }
}

/// Baseline includes every bindings file needs.
pub fn add_common_includes(tree: &mut CodeNodeTree, body: NodeId) {
    tree.accumulate(body, include("third_party/blink/renderer/platform/bindings/exception_state.h"));
    tree.accumulate(body, include("v8/include/v8.h"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::renderer::render;

    #[test]
    fn header_skeleton_in_order() {
        let mut tree = CodeNodeTree::new();
        let file = header_file(&mut tree, "gen/core/v8_node.h");
        let content = tree.literal("void F();\n");
        tree.append(file.body, content);
        tree.accumulate(content, include("base/check.h"));
        let text = render(&mut tree, file.root).unwrap();
        let banner_at = text.find("// Copyright").unwrap();
        let guard_at = text.find("#ifndef GEN_CORE_V8_NODE_H_").unwrap();
        let include_at = text.find("#include \"base/check.h\"").unwrap();
        let ns_at = text.find("namespace blink {").unwrap();
        let body_at = text.find("void F();").unwrap();
        assert!(banner_at < guard_at && guard_at < include_at);
        assert!(include_at < ns_at && ns_at < body_at);
        assert!(text.ends_with("#endif  // GEN_CORE_V8_NODE_H_\n"));
        assert!(text.contains("}  // namespace blink"));
    }

    #[test]
    fn source_includes_own_header_first() {
        let mut tree = CodeNodeTree::new();
        let file = source_file(&mut tree, "gen/core/v8_node.h");
        let content = tree.literal("void F() {}\n");
        tree.append(file.body, content);
        let text = render(&mut tree, file.root).unwrap();
        let self_at = text.find("#include \"gen/core/v8_node.h\"").unwrap();
        let ns_at = text.find("namespace blink {").unwrap();
        assert!(self_at < ns_at);
    }

    #[test]
    fn engine_includes_come_before_std_includes() {
        let mut tree = CodeNodeTree::new();
        let file = header_file(&mut tree, "gen/core/v8_node.h");
        let content = tree.literal("std::optional<int> F();\n");
        tree.append(file.body, content);
        tree.accumulate(content, include("base/check.h"));
        tree.accumulate(
            content,
            crate::codegen::accumulator::AccumulatorOp::StdcppIncludeHeader("optional".to_string()),
        );
        let text = render(&mut tree, file.root).unwrap();
        let engine_at = text.find("#include \"base/check.h\"").unwrap();
        let std_at = text.find("#include <optional>").unwrap();
        assert!(engine_at < std_at);
    }

    #[test]
    fn forward_declarations_render_inside_namespace() {
        let mut tree = CodeNodeTree::new();
        let file = header_file(&mut tree, "gen/core/v8_node.h");
        let content = tree.literal("void F(Document*);\n");
        tree.append(file.body, content);
        tree.accumulate(content, crate::codegen::accumulator::AccumulatorOp::ClassDecl("Document".to_string()));
        let text = render(&mut tree, file.root).unwrap();
        let ns_at = text.find("namespace blink {").unwrap();
        let decl_at = text.find("class Document;").unwrap();
        let body_at = text.find("void F(Document*);").unwrap();
        assert!(ns_at < decl_at && decl_at < body_at);
    }
}
