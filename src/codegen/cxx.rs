//! C++ syntax nodes.
//!
//! Thin composites over the code-node primitives: each builder assembles a
//! fixed textual shape (class, function, namespace, control flow) out of
//! literals, sequences and symbol scopes. Nothing here carries semantics
//! beyond formatting and scope creation.

use crate::codegen::code_node::{CodeNodeTree, Likeliness, NodeId};
use crate::codegen::exposure::Expr;

/// A branch condition: either a pre-folded exposure expression (whose
/// constant truth can elide or terminate branch chains) or plain text.
#[derive(Clone, Debug)]
pub enum Cond {
    Expr(Expr),
    Text(String),
}

impl Cond {
    pub fn text(text: impl Into<String>) -> Cond {
        Cond::Text(text.into())
    }

    pub fn is_always_true(&self) -> bool {
        matches!(self, Cond::Expr(e) if e.is_always_true())
    }

    pub fn is_always_false(&self) -> bool {
        matches!(self, Cond::Expr(e) if e.is_always_false())
    }

    pub fn to_text(&self) -> String {
        match self {
            Cond::Expr(e) => e.to_text(),
            Cond::Text(t) => t.clone(),
        }
    }
}

impl From<Expr> for Cond {
    fn from(expr: Expr) -> Self {
        Cond::Expr(expr)
    }
}

impl From<&str> for Cond {
    fn from(text: &str) -> Self {
        Cond::Text(text.to_string())
    }
}

impl From<String> for Cond {
    fn from(text: String) -> Self {
        Cond::Text(text)
    }
}

/// A class definition with its five section lists.
pub struct ClassDef {
    pub node: NodeId,
    pub top_section: NodeId,
    pub public_section: NodeId,
    pub protected_section: NodeId,
    pub private_section: NodeId,
    pub bottom_section: NodeId,
}

pub struct ClassSpec<'a> {
    pub name: &'a str,
    pub base_names: &'a [String],
    pub is_final: bool,
    pub export: Option<&'a str>,
    pub template_params: &'a [String],
}

impl Default for ClassSpec<'_> {
    fn default() -> Self {
        Self { name: "", base_names: &[], is_final: false, export: None, template_params: &[] }
    }
}

/// `class EXPORT Name final : public Base { ... };`
pub fn class_def(tree: &mut CodeNodeTree, spec: &ClassSpec<'_>) -> ClassDef {
    let mut header = String::new();
    if !spec.template_params.is_empty() {
        header.push_str(&format!("template <{}>\n", spec.template_params.join(", ")));
    }
    header.push_str("class ");
    if let Some(export) = spec.export {
        header.push_str(export);
        header.push(' ');
    }
    header.push_str(spec.name);
    if spec.is_final {
        header.push_str(" final");
    }
    if !spec.base_names.is_empty() {
        let bases: Vec<String> =
            spec.base_names.iter().map(|b| format!("public {b}")).collect();
        header.push_str(&format!(" : {}", bases.join(", ")));
    }
    header.push_str(" {\n");

    let open = tree.literal(header);
    let top_section = tree.sequence(vec![]);
    let public_label = tree.literal(" public:\n");
    let public_section = tree.sequence(vec![]);
    let protected_label = tree.literal("\n protected:\n");
    let protected_section = tree.sequence(vec![]);
    let private_label = tree.literal("\n private:\n");
    let private_section = tree.sequence(vec![]);
    let bottom_section = tree.sequence(vec![]);
    let close = tree.literal("};\n");
    let node = tree.sequence(vec![
        open,
        top_section,
        public_label,
        public_section,
        protected_label,
        protected_section,
        private_label,
        private_section,
        bottom_section,
        close,
    ]);
    ClassDef { node, top_section, public_section, protected_section, private_section, bottom_section }
}

/// Qualifiers of a function declaration or definition.
#[derive(Clone, Debug, Default)]
pub struct FuncQuals {
    pub is_static: bool,
    pub is_explicit: bool,
    pub is_constexpr: bool,
    pub is_const: bool,
    pub is_override: bool,
    pub is_default: bool,
    pub is_delete: bool,
    pub is_nodiscard: bool,
    pub template_params: Vec<String>,
}

fn func_header(
    name: &str,
    arg_decls: &[String],
    return_type: &str,
    quals: &FuncQuals,
) -> String {
    let mut header = String::new();
    if !quals.template_params.is_empty() {
        header.push_str(&format!("template <{}>\n", quals.template_params.join(", ")));
    }
    if quals.is_nodiscard {
        header.push_str("[[nodiscard]] ");
    }
    if quals.is_static {
        header.push_str("static ");
    }
    if quals.is_explicit {
        header.push_str("explicit ");
    }
    if quals.is_constexpr {
        header.push_str("constexpr ");
    }
    if !return_type.is_empty() {
        header.push_str(return_type);
        header.push(' ');
    }
    header.push_str(name);
    header.push('(');
    header.push_str(&arg_decls.join(", "));
    header.push(')');
    if quals.is_const {
        header.push_str(" const");
    }
    if quals.is_override {
        header.push_str(" override");
    }
    header
}

/// `ret Name(args);` possibly `= default;` / `= delete;`
pub fn func_decl(
    tree: &mut CodeNodeTree,
    name: &str,
    arg_decls: &[String],
    return_type: &str,
    quals: &FuncQuals,
) -> NodeId {
    let mut text = func_header(name, arg_decls, return_type, quals);
    if quals.is_default {
        text.push_str(" = default;\n");
    } else if quals.is_delete {
        text.push_str(" = delete;\n");
    } else {
        text.push_str(";\n");
    }
    tree.literal(text)
}

/// A function definition whose body is a symbol scope.
pub struct FuncDef {
    pub node: NodeId,
    pub body: NodeId,
}

pub fn func_def(
    tree: &mut CodeNodeTree,
    name: &str,
    arg_decls: &[String],
    return_type: &str,
    quals: &FuncQuals,
) -> FuncDef {
    let header = func_header(name, arg_decls, return_type, quals);
    let open = tree.literal(format!("{header} {{\n"));
    let body = tree.symbol_scope(vec![], Likeliness::Always);
    let close = tree.literal("}\n");
    let node = tree.sequence(vec![open, body, close]);
    FuncDef { node, body }
}

/// `namespace name { body }` (anonymous when `name` is empty).
pub fn namespace(tree: &mut CodeNodeTree, name: &str, body: Vec<NodeId>) -> NodeId {
    let open = if name.is_empty() {
        tree.literal("namespace {\n\n".to_string())
    } else {
        tree.literal(format!("namespace {name} {{\n\n"))
    };
    let body = tree.sequence(body);
    let close = if name.is_empty() {
        tree.literal("\n}  // namespace\n".to_string())
    } else {
        tree.literal(format!("\n}}  // namespace {name}\n"))
    };
    tree.sequence(vec![open, body, close])
}

/// A bare `{ ... }` block opening a new symbol scope.
pub fn block(tree: &mut CodeNodeTree, body: Vec<NodeId>) -> NodeId {
    let open = tree.literal("{\n");
    let scope = tree.symbol_scope(body, Likeliness::Always);
    let close = tree.literal("}\n");
    tree.sequence(vec![open, scope, close])
}

fn if_header(cond: &Cond, attr: Option<&str>) -> String {
    match attr {
        Some(attr) => format!("if {attr} ({}) {{\n", cond.to_text()),
        None => format!("if ({}) {{\n", cond.to_text()),
    }
}

/// `if (cond) { body }`; the body is a scope with the given likeliness.
pub fn if_(
    tree: &mut CodeNodeTree,
    cond: impl Into<Cond>,
    body: Vec<NodeId>,
    likeliness: Likeliness,
) -> NodeId {
    if_with_attr(tree, cond, None, body, likeliness)
}

pub fn if_with_attr(
    tree: &mut CodeNodeTree,
    cond: impl Into<Cond>,
    attr: Option<&str>,
    body: Vec<NodeId>,
    likeliness: Likeliness,
) -> NodeId {
    let cond = cond.into();
    if cond.is_always_false() {
        return tree.empty();
    }
    let open = tree.text(if_header(&cond, attr));
    let scope = tree.symbol_scope(body, likeliness);
    let close = tree.literal("}\n");
    tree.sequence(vec![open, scope, close])
}

pub fn likely_if(tree: &mut CodeNodeTree, cond: impl Into<Cond>, body: Vec<NodeId>) -> NodeId {
    if_with_attr(tree, cond, Some("[[likely]]"), body, Likeliness::Likely)
}

pub fn unlikely_if(tree: &mut CodeNodeTree, cond: impl Into<Cond>, body: Vec<NodeId>) -> NodeId {
    if_with_attr(tree, cond, Some("[[unlikely]]"), body, Likeliness::Unlikely)
}

#[allow(clippy::too_many_arguments)]
pub fn if_else(
    tree: &mut CodeNodeTree,
    cond: impl Into<Cond>,
    then_body: Vec<NodeId>,
    then_likeliness: Likeliness,
    else_body: Vec<NodeId>,
    else_likeliness: Likeliness,
) -> NodeId {
    let cond = cond.into();
    let open = tree.text(if_header(&cond, None));
    let then_scope = tree.symbol_scope(then_body, then_likeliness);
    let middle = tree.literal("} else {\n");
    let else_scope = tree.symbol_scope(else_body, else_likeliness);
    let close = tree.literal("}\n");
    tree.sequence(vec![open, then_scope, middle, else_scope, close])
}

/// `for (;cond;) { body }`; `weak_deps` order any already-demanded symbol
/// definitions above the loop without demanding them.
pub fn for_loop(
    tree: &mut CodeNodeTree,
    cond: impl Into<Cond>,
    body: Vec<NodeId>,
    weak_deps: Vec<String>,
) -> NodeId {
    let cond = cond.into();
    let weak = tree.weak_dep(weak_deps);
    let open = tree.text(format!("for (; {}; ) {{\n", cond.to_text()));
    let scope = tree.symbol_scope(body, Likeliness::Likely);
    let close = tree.literal("}\n");
    tree.sequence(vec![weak, open, scope, close])
}

/// A `switch` statement assembled case by case.
pub struct Switch {
    pub node: NodeId,
    cases: NodeId,
}

pub fn switch(tree: &mut CodeNodeTree, cond: impl Into<Cond>) -> Switch {
    let cond = cond.into();
    let open = tree.text(format!("switch ({}) {{\n", cond.to_text()));
    let cases = tree.sequence(vec![]);
    let close = tree.literal("}\n");
    let node = tree.sequence(vec![open, cases, close]);
    Switch { node, cases }
}

impl Switch {
    pub fn append_case(
        &self,
        tree: &mut CodeNodeTree,
        case: &str,
        body: Vec<NodeId>,
        should_add_break: bool,
    ) {
        let open = tree.literal(format!("case {case}: {{\n"));
        let scope = tree.symbol_scope(body, Likeliness::Unlikely);
        let close = if should_add_break {
            tree.literal("break;\n}\n")
        } else {
            tree.literal("}\n")
        };
        let node = tree.sequence(vec![open, scope, close]);
        tree.append(self.cases, node);
    }

    pub fn append_default(&self, tree: &mut CodeNodeTree, body: Vec<NodeId>) {
        let open = tree.literal("default: {\n".to_string());
        let scope = tree.symbol_scope(body, Likeliness::Unlikely);
        let close = tree.literal("}\n");
        let node = tree.sequence(vec![open, scope, close]);
        tree.append(self.cases, node);
    }
}

/// `do { ... } while (false);` so the body can `break` out early.
pub fn breakable_block(tree: &mut CodeNodeTree, body: Vec<NodeId>) -> NodeId {
    let open = tree.literal("do {  // Dummy loop for break.\n");
    let scope = tree.symbol_scope(body, Likeliness::Always);
    let close = tree.literal("} while (false);\n");
    tree.sequence(vec![open, scope, close])
}

/// Chained `if / else if` from an ordered branch list. Always-false branches
/// are elided; an always-true condition terminates the chain as a plain
/// block (or an `else` when branches precede it).
pub fn multi_branches(
    tree: &mut CodeNodeTree,
    branches: Vec<(Cond, Vec<NodeId>, Likeliness)>,
) -> NodeId {
    let mut parts: Vec<NodeId> = Vec::new();
    let mut emitted = 0usize;
    for (cond, body, likeliness) in branches {
        if cond.is_always_false() {
            continue;
        }
        if cond.is_always_true() {
            if emitted == 0 {
                let scope = tree.symbol_scope(body, likeliness);
                parts.push(scope);
            } else {
                let open = tree.literal(" else {\n");
                let scope = tree.symbol_scope(body, likeliness);
                let close = tree.literal("}\n");
                parts.extend([open, scope, close]);
            }
            emitted += 1;
            break;
        }
        let open = if emitted == 0 {
            tree.text(if_header(&cond, None))
        } else {
            tree.text(format!(" else {}", if_header(&cond, None)))
        };
        let scope = tree.symbol_scope(body, likeliness);
        let close = tree.literal("}");
        parts.extend([open, scope, close]);
        emitted += 1;
    }
    if emitted == 0 {
        return tree.empty();
    }
    let newline = tree.literal("\n");
    parts.push(newline);
    tree.sequence(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::renderer::render;

    #[test]
    fn class_def_sections_in_order() {
        let mut tree = CodeNodeTree::new();
        let class = class_def(
            &mut tree,
            &ClassSpec {
                name: "V8Node",
                base_names: &["V8EventTarget".to_string()],
                is_final: true,
                export: Some("CORE_EXPORT"),
                ..ClassSpec::default()
            },
        );
        let member = tree.literal("  static constexpr int kTag = 1;\n");
        tree.append(class.public_section, member);
        let text = render(&mut tree, class.node).unwrap();
        assert!(text.starts_with(
            "class CORE_EXPORT V8Node final : public V8EventTarget {\n"
        ));
        assert!(text.contains(" public:\n  static constexpr int kTag = 1;\n"));
        assert!(text.ends_with("};\n"));
    }

    #[test]
    fn func_decl_qualifiers() {
        let mut tree = CodeNodeTree::new();
        let decl = func_decl(
            &mut tree,
            "GetWrapperTypeInfo",
            &[],
            "constexpr const WrapperTypeInfo*",
            &FuncQuals { is_static: true, ..FuncQuals::default() },
        );
        let text = render(&mut tree, decl).unwrap();
        assert_eq!(text, "static constexpr const WrapperTypeInfo* GetWrapperTypeInfo();\n");
    }

    #[test]
    fn multi_branches_elides_false_and_stops_at_true() {
        let mut tree = CodeNodeTree::new();
        let b1 = tree.literal("  a();\n");
        let b2 = tree.literal("  b();\n");
        let b3 = tree.literal("  c();\n");
        let b4 = tree.literal("  d();\n");
        let node = multi_branches(
            &mut tree,
            vec![
                (Cond::Expr(Expr::False), vec![b1], Likeliness::Likely),
                (Cond::text("x == 1"), vec![b2], Likeliness::Likely),
                (Cond::Expr(Expr::True), vec![b3], Likeliness::Always),
                (Cond::text("x == 2"), vec![b4], Likeliness::Likely),
            ],
        );
        let text = render(&mut tree, node).unwrap();
        assert!(text.contains("if (x == 1) {"));
        assert!(text.contains(" else {\n  c();\n}"));
        assert!(!text.contains("a()"));
        assert!(!text.contains("x == 2"));
    }

    #[test]
    fn always_false_if_renders_nothing() {
        let mut tree = CodeNodeTree::new();
        let body = tree.literal("  never();\n");
        let node = if_(&mut tree, Cond::Expr(Expr::False), vec![body], Likeliness::Unlikely);
        assert_eq!(render(&mut tree, node).unwrap(), "");
    }

    #[test]
    fn switch_cases_and_default() {
        let mut tree = CodeNodeTree::new();
        let sw = switch(&mut tree, "tag");
        let case_body = tree.literal("  Handle();\n");
        sw.append_case(&mut tree, "kNode", vec![case_body], true);
        let default_body = tree.literal("  NOTREACHED();\n");
        sw.append_default(&mut tree, vec![default_body]);
        let text = render(&mut tree, sw.node).unwrap();
        assert!(text.starts_with("switch (tag) {\n"));
        assert!(text.contains("case kNode: {\n  Handle();\nbreak;\n}\n"));
        assert!(text.contains("default: {\n  NOTREACHED();\n}\n"));
    }
}
