//! Convergent rendering of code-node trees.
//!
//! Rendering is iterative. Each pass walks the tree and produces text while
//! recording, per symbol scope, which symbols were referenced, where, and
//! through which child scopes. After the pass, undefined symbols are
//! materialized as definition nodes at the earliest program point that
//! dominates all uses (see the scheduling policy below), and the pass
//! repeats. Passes also feed the accumulator; the loop ends when a pass
//! inserted nothing and left the accumulator unchanged. Text produced by
//! earlier passes is discarded.
//!
//! ## Definition scheduling policy
//!
//! For an undefined symbol in a scope, considering where it was seen:
//!
//! 1. referenced directly (not only through child scopes): insert the
//!    definition at the earliest use position whose likeliness is at least
//!    `Unlikely`, or at the end if none;
//! 2. referenced in exactly one child scope: defer to that scope;
//! 3. referenced in two or more `Likely`/`Always` child scopes: hoist the
//!    definition here, at the earliest such child;
//! 4. otherwise: leave it to the descendants.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::codegen::accumulator::Accumulator;
use crate::codegen::code_node::{
    BindingValue, CodeNodeTree, DynamicContent, Likeliness, NodeId, NodeKind,
};
use crate::codegen::template::TemplatePart;

/// The renderer gives up after this many passes; a tree that keeps demanding
/// new insertions or includes is recursively expanding.
const MAX_PASSES: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("unbound template variable `${{{name}}}`; caller chain: {caller_chain:?}")]
    UnboundVariable { name: String, caller_chain: Vec<String> },
    #[error("symbol `{0}` is referenced but no enclosing scope defines it")]
    UnknownSymbol(String),
    #[error("rendering did not converge after {0} passes")]
    NonConvergent(usize),
}

/// Use of a symbol through one immediate child scope.
#[derive(Clone, Debug)]
struct ChildUse {
    /// Index of the enclosing scope's child subtree the use was under.
    position: usize,
    scope: NodeId,
    likeliness: Likeliness,
}

#[derive(Clone, Debug, Default)]
struct UsageInfo {
    direct_positions: Vec<usize>,
    weak_positions: Vec<usize>,
    child_uses: Vec<ChildUse>,
}

#[derive(Clone, Debug, Default)]
struct ScopeState {
    depth: usize,
    defined: std::collections::BTreeSet<String>,
    usage: BTreeMap<String, UsageInfo>,
    /// Undefined symbols in first-appearance order.
    undefined_order: Vec<String>,
}

struct ScopeFrame {
    scope: NodeId,
    child_index: usize,
}

/// Renders one code-node tree to text, resolving symbols and feeding the
/// accumulator until both are stable.
pub struct Renderer<'t> {
    tree: &'t mut CodeNodeTree,
    accumulator: Accumulator,
    /// Accumulator as of the start of the current pass; `Dynamic` nodes
    /// render from this snapshot.
    snapshot: Accumulator,
    buffer: String,
    caller_stack: Vec<NodeId>,
    scope_stack: Vec<ScopeFrame>,
    scope_states: BTreeMap<NodeId, ScopeState>,
}

/// Render `root` to its final text.
pub fn render(tree: &mut CodeNodeTree, root: NodeId) -> Result<String, RenderError> {
    Renderer::new(tree).run(root)
}

impl<'t> Renderer<'t> {
    pub fn new(tree: &'t mut CodeNodeTree) -> Self {
        Self {
            tree,
            accumulator: Accumulator::new(),
            snapshot: Accumulator::new(),
            buffer: String::new(),
            caller_stack: Vec::new(),
            scope_stack: Vec::new(),
            scope_states: BTreeMap::new(),
        }
    }

    pub fn run(mut self, root: NodeId) -> Result<String, RenderError> {
        for pass in 1..=MAX_PASSES {
            self.buffer.clear();
            self.caller_stack.clear();
            self.scope_stack.clear();
            self.scope_states.clear();
            self.snapshot = self.accumulator.clone();

            self.render_node(root)?;

            let insertions = self.schedule_insertions()?;
            let grew = self.accumulator.total_size() != self.snapshot.total_size();
            trace!(pass, insertions, grew, "render pass finished");
            if insertions == 0 && !grew {
                debug!(passes = pass, nodes = self.tree.len(), "render converged");
                return Ok(std::mem::take(&mut self.buffer));
            }
        }
        Err(RenderError::NonConvergent(MAX_PASSES))
    }

    // ---- per-node rendering ----

    fn render_node(&mut self, id: NodeId) -> Result<(), RenderError> {
        self.tree.node_mut(id).render_started = true;
        let ops = self.tree.node(id).accumulate_ops.clone();
        for op in &ops {
            self.accumulator.apply(op);
        }
        match &self.tree.node(id).kind {
            NodeKind::Empty => Ok(()),
            NodeKind::Literal(text) => {
                let text = text.clone();
                self.buffer.push_str(&text);
                Ok(())
            }
            NodeKind::Text(_) => self.render_text(id),
            NodeKind::List { .. } | NodeKind::Sequence { .. } => self.render_list(id, false),
            NodeKind::SymbolScope { .. } => self.render_list(id, true),
            NodeKind::SymbolRef { name } => {
                let name = name.clone();
                self.render_symbol_ref(&name)
            }
            NodeKind::SymbolDef { name, body } => {
                let (name, body) = (name.clone(), *body);
                self.render_symbol_def(&name, body)
            }
            NodeKind::WeakDep { names } => {
                let names = names.clone();
                for name in &names {
                    self.record_usage(name, true, false);
                }
                Ok(())
            }
            NodeKind::Selection { alternatives } => {
                let alternatives = alternatives.clone();
                let chosen = alternatives
                    .iter()
                    .find(|(required, _)| required.iter().all(|s| self.is_defined(s)))
                    .or(alternatives.last())
                    .map(|(_, node)| *node);
                match chosen {
                    Some(node) => self.render_node(node),
                    None => Ok(()),
                }
            }
            NodeKind::Dynamic(content) => {
                let content = *content;
                self.render_dynamic(content);
                Ok(())
            }
        }
    }

    fn render_text(&mut self, id: NodeId) -> Result<(), RenderError> {
        self.caller_stack.push(id);
        let result = self.render_text_parts(id);
        self.caller_stack.pop();
        result
    }

    fn render_text_parts(&mut self, id: NodeId) -> Result<(), RenderError> {
        let NodeKind::Text(template) = &self.tree.node(id).kind else {
            unreachable!();
        };
        let parts: Vec<TemplatePart> = template.parts().to_vec();
        for part in parts {
            match part {
                TemplatePart::Text(text) => self.buffer.push_str(&text),
                TemplatePart::Var(name) => {
                    let value = match self.tree.resolve_binding(id, &name) {
                        Some(value) => value.clone(),
                        None => {
                            return Err(RenderError::UnboundVariable {
                                name,
                                caller_chain: self.caller_chain(),
                            });
                        }
                    };
                    match value {
                        BindingValue::Str(s) => self.buffer.push_str(&s),
                        BindingValue::Int(i) => self.buffer.push_str(&i.to_string()),
                        BindingValue::Node(node) => self.render_node(node)?,
                    }
                }
            }
        }
        Ok(())
    }

    fn render_list(&mut self, id: NodeId, is_scope: bool) -> Result<(), RenderError> {
        if is_scope {
            let depth = self.scope_stack.len();
            self.scope_stack.push(ScopeFrame { scope: id, child_index: 0 });
            self.scope_states.entry(id).or_default().depth = depth;
        }
        let children: Vec<NodeId> = self.tree.node(id).children().to_vec();
        let format = match &self.tree.node(id).kind {
            NodeKind::List { format, .. }
            | NodeKind::Sequence { format, .. }
            | NodeKind::SymbolScope { format, .. } => format.clone(),
            _ => unreachable!(),
        };

        let mut rendered: Vec<String> = Vec::new();
        let result = (|| {
            for (index, child) in children.iter().enumerate() {
                if is_scope {
                    if let Some(frame) = self.scope_stack.last_mut() {
                        frame.child_index = index;
                    }
                }
                let outer_buffer = std::mem::take(&mut self.buffer);
                let child_result = self.render_node(*child);
                let child_text = std::mem::replace(&mut self.buffer, outer_buffer);
                child_result?;
                if !child_text.is_empty() {
                    rendered.push(child_text);
                }
            }
            Ok(())
        })();
        if is_scope {
            self.scope_stack.pop();
        }
        result?;

        if !rendered.is_empty() {
            if let Some(head) = &format.head {
                self.buffer.push_str(head);
            }
            let separator = format.separator.as_deref().unwrap_or("");
            for (i, text) in rendered.iter().enumerate() {
                if i > 0 {
                    self.buffer.push_str(separator);
                }
                self.buffer.push_str(text);
            }
            if let Some(tail) = &format.tail {
                self.buffer.push_str(tail);
            }
        }
        Ok(())
    }

    fn render_symbol_ref(&mut self, name: &str) -> Result<(), RenderError> {
        if self.scope_stack.is_empty() {
            return Err(RenderError::UnknownSymbol(name.to_string()));
        }
        self.record_usage(name, false, !self.is_defined(name));
        self.buffer.push_str(name);
        Ok(())
    }

    fn render_symbol_def(&mut self, name: &str, body: NodeId) -> Result<(), RenderError> {
        // Only the earliest definition within the enclosing scope survives.
        if self.is_defined(name) {
            return Ok(());
        }
        self.render_node(body)?;
        if let Some(frame) = self.scope_stack.last() {
            let scope = frame.scope;
            self.scope_states.entry(scope).or_default().defined.insert(name.to_string());
        }
        Ok(())
    }

    fn render_dynamic(&mut self, content: DynamicContent) {
        match content {
            DynamicContent::IncludeHeaders => {
                let lines: Vec<String> = self
                    .snapshot
                    .include_headers()
                    .map(|(path, annotation)| match annotation {
                        Some(annotation) => format!("#include \"{path}\"  {annotation}\n"),
                        None => format!("#include \"{path}\"\n"),
                    })
                    .collect();
                for line in lines {
                    self.buffer.push_str(&line);
                }
            }
            DynamicContent::StdcppIncludeHeaders => {
                let lines: Vec<String> =
                    self.snapshot.stdcpp_include_headers().map(|p| format!("#include <{p}>\n")).collect();
                for line in lines {
                    self.buffer.push_str(&line);
                }
            }
            DynamicContent::ForwardDeclarations => {
                let mut lines: Vec<String> = Vec::new();
                for name in self.snapshot.class_decls() {
                    lines.push(format!("class {name};\n"));
                }
                for name in self.snapshot.struct_decls() {
                    lines.push(format!("struct {name};\n"));
                }
                for line in lines {
                    self.buffer.push_str(&line);
                }
            }
        }
    }

    // ---- symbol bookkeeping ----

    fn is_defined(&self, name: &str) -> bool {
        self.scope_stack.iter().any(|frame| {
            self.scope_states
                .get(&frame.scope)
                .is_some_and(|state| state.defined.contains(name))
        })
    }

    /// Record a use of `name` in every enclosing scope. `weak` uses order
    /// the definition without demanding it; `undefined` additionally puts
    /// the symbol on each scope's to-be-defined list.
    fn record_usage(&mut self, name: &str, weak: bool, undefined: bool) {
        for i in 0..self.scope_stack.len() {
            let scope = self.scope_stack[i].scope;
            let position = self.scope_stack[i].child_index;
            let via = self.scope_stack.get(i + 1).map(|frame| frame.scope);
            let via_likeliness = via.map(|s| self.tree.node(s).likeliness());
            let state = self.scope_states.entry(scope).or_default();
            let usage = state.usage.entry(name.to_string()).or_default();
            match via {
                None if weak => usage.weak_positions.push(position),
                None => usage.direct_positions.push(position),
                Some(scope) => {
                    if !usage.child_uses.iter().any(|u| u.scope == scope) {
                        usage.child_uses.push(ChildUse {
                            position,
                            scope,
                            likeliness: via_likeliness.unwrap_or_default(),
                        });
                    }
                }
            }
            if undefined && !weak && !state.undefined_order.iter().any(|n| n == name) {
                state.undefined_order.push(name.to_string());
            }
        }
    }

    // ---- post-pass definition insertion ----

    fn schedule_insertions(&mut self) -> Result<usize, RenderError> {
        // Outermost scopes decide first so that hoisted definitions shadow
        // the same symbol's demand in the scopes below.
        let mut scopes: Vec<NodeId> = self.scope_states.keys().copied().collect();
        scopes.sort_by_key(|id| (self.scope_states[id].depth, *id));

        let mut planned: Vec<(NodeId, usize, String)> = Vec::new();
        for scope in scopes {
            let state = &self.scope_states[&scope];
            let undefined = state.undefined_order.clone();
            for name in undefined {
                if self.is_handled(scope, &name) {
                    continue;
                }
                let Some(position) = self.insertion_position(&self.scope_states[&scope], &name)
                else {
                    continue; // deferred to a descendant scope
                };
                if self.tree.find_symbol_spec(scope, &name).is_none() {
                    // The spec may be registered only on inner scopes (per
                    // callback body locals); those scopes claim their own
                    // definition. Only a direct use with no spec in reach is
                    // an unknown symbol.
                    let direct = self.scope_states[&scope]
                        .usage
                        .get(&name)
                        .is_some_and(|u| !u.direct_positions.is_empty());
                    if direct {
                        return Err(RenderError::UnknownSymbol(name));
                    }
                    continue;
                }
                self.tree.inserted_symbols.insert((scope, name.clone()));
                planned.push((scope, position, name));
            }
        }

        let count = planned.len();
        // Earlier insertions into the same scope shift later positions.
        planned.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        let mut offsets: BTreeMap<NodeId, usize> = BTreeMap::new();
        for (scope, position, name) in planned {
            let spec = self
                .tree
                .find_symbol_spec(scope, &name)
                .expect("INVARIANT: spec checked during planning")
                .clone();
            let body = (spec.definition_ctor)(self.tree);
            let def = self.tree.symbol_def(name.clone(), body);
            let offset = offsets.entry(scope).or_insert(0);
            debug!(symbol = %name, ?scope, position, "inserting symbol definition");
            self.tree.insert_at(scope, position + *offset, def);
            *offset += 1;
        }
        Ok(count)
    }

    /// Apply the scheduling policy; `None` means defer to descendants.
    fn insertion_position(&self, state: &ScopeState, name: &str) -> Option<usize> {
        let usage = state.usage.get(name)?;
        if !usage.direct_positions.is_empty() {
            let mut candidates: Vec<usize> = usage
                .direct_positions
                .iter()
                .chain(usage.weak_positions.iter())
                .copied()
                .collect();
            candidates.extend(
                usage
                    .child_uses
                    .iter()
                    .filter(|u| u.likeliness >= Likeliness::Unlikely)
                    .map(|u| u.position),
            );
            return candidates.into_iter().min();
        }
        if usage.child_uses.len() == 1 {
            return None;
        }
        let likely: Vec<&ChildUse> = usage
            .child_uses
            .iter()
            .filter(|u| u.likeliness >= Likeliness::Likely)
            .collect();
        if likely.len() >= 2 {
            return likely.iter().map(|u| u.position).min();
        }
        None
    }

    /// Whether the symbol's definition was already inserted at `scope` or an
    /// enclosing scope (this pass or a previous one).
    fn is_handled(&self, scope: NodeId, name: &str) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if self.tree.inserted_symbols.contains(&(id, name.to_string())) {
                return true;
            }
            current = self.tree.node(id).outer;
        }
        false
    }

    fn caller_chain(&self) -> Vec<String> {
        self.caller_stack
            .iter()
            .map(|id| match &self.tree.node(*id).kind {
                NodeKind::Text(template) => template.source().to_string(),
                _ => "<node>".to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::accumulator::include;
    use crate::codegen::code_node::ListFormat;
    use std::rc::Rc;

    #[test]
    fn literal_roundtrip() {
        let mut tree = CodeNodeTree::new();
        let root = tree.literal("int x = 0;\n");
        assert_eq!(render(&mut tree, root).unwrap(), "int x = 0;\n");
    }

    #[test]
    fn text_substitution_through_bindings() {
        let mut tree = CodeNodeTree::new();
        let t = tree.text("${ty} ${name};");
        let root = tree.sequence(vec![t]);
        tree.bind_base(root, "ty", "int32_t");
        tree.bind(t, "name", "value");
        assert_eq!(render(&mut tree, root).unwrap(), "int32_t value;");
    }

    #[test]
    fn unbound_variable_reports_caller_chain() {
        let mut tree = CodeNodeTree::new();
        let t = tree.text("${missing}");
        let root = tree.sequence(vec![t]);
        let err = render(&mut tree, root).unwrap_err();
        match err {
            RenderError::UnboundVariable { name, caller_chain } => {
                assert_eq!(name, "missing");
                assert_eq!(caller_chain, ["${missing}"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn list_separator_and_head_tail_only_when_nonempty() {
        let mut tree = CodeNodeTree::new();
        let a = tree.literal("a");
        let e = tree.empty();
        let b = tree.literal("b");
        let list = tree.list(
            vec![a, e, b],
            ListFormat {
                head: Some("<".to_string()),
                separator: Some(", ".to_string()),
                tail: Some(">".to_string()),
            },
        );
        assert_eq!(render(&mut tree, list).unwrap(), "<a, b>");

        let mut tree = CodeNodeTree::new();
        let e = tree.empty();
        let list = tree.list(
            vec![e],
            ListFormat { head: Some("<".to_string()), separator: None, tail: Some(">".to_string()) },
        );
        assert_eq!(render(&mut tree, list).unwrap(), "");
    }

    #[test]
    fn symbol_definition_is_inserted_before_first_use() {
        let mut tree = CodeNodeTree::new();
        let use1 = tree.symbol_ref("isolate");
        let line = tree.composite("bar({});\n", vec![use1.into()]);
        let scope = tree.symbol_scope(vec![line], Likeliness::Always);
        tree.register_code_symbol(
            scope,
            "isolate",
            Rc::new(|t: &mut CodeNodeTree| t.literal("auto* isolate = GetIsolate();\n")),
        );
        let text = render(&mut tree, scope).unwrap();
        assert_eq!(text, "auto* isolate = GetIsolate();\nbar(isolate);\n");
    }

    #[test]
    fn definition_hoisted_above_two_likely_branches() {
        let mut tree = CodeNodeTree::new();
        let use1 = tree.symbol_ref("state");
        let line1 = tree.composite("a({});\n", vec![use1.into()]);
        let arm1 = tree.symbol_scope(vec![line1], Likeliness::Likely);
        let use2 = tree.symbol_ref("state");
        let line2 = tree.composite("b({});\n", vec![use2.into()]);
        let arm2 = tree.symbol_scope(vec![line2], Likeliness::Likely);
        let outer = tree.symbol_scope(vec![arm1, arm2], Likeliness::Always);
        tree.register_code_symbol(
            outer,
            "state",
            Rc::new(|t: &mut CodeNodeTree| t.literal("auto* state = GetState();\n")),
        );
        let text = render(&mut tree, outer).unwrap();
        assert_eq!(text, "auto* state = GetState();\na(state);\nb(state);\n");
    }

    #[test]
    fn single_child_scope_keeps_definition_local() {
        let mut tree = CodeNodeTree::new();
        let before = tree.literal("before;\n");
        let use1 = tree.symbol_ref("state");
        let line1 = tree.composite("a({});\n", vec![use1.into()]);
        let arm = tree.symbol_scope(vec![line1], Likeliness::Unlikely);
        let outer = tree.symbol_scope(vec![before, arm], Likeliness::Always);
        tree.register_code_symbol(
            outer,
            "state",
            Rc::new(|t: &mut CodeNodeTree| t.literal("auto* state = GetState();\n")),
        );
        let text = render(&mut tree, outer).unwrap();
        // The definition lands inside the unlikely arm, after `before;`.
        assert_eq!(text, "before;\nauto* state = GetState();\na(state);\n");
    }

    #[test]
    fn duplicate_definitions_render_once() {
        let mut tree = CodeNodeTree::new();
        let body1 = tree.literal("int v = 1;\n");
        let def1 = tree.symbol_def("v", body1);
        let body2 = tree.literal("int v = 2;\n");
        let def2 = tree.symbol_def("v", body2);
        let use_ = tree.symbol_ref("v");
        let line = tree.composite("f({});\n", vec![use_.into()]);
        let scope = tree.symbol_scope(vec![def1, def2, line], Likeliness::Always);
        let text = render(&mut tree, scope).unwrap();
        assert_eq!(text, "int v = 1;\nf(v);\n");
    }

    #[test]
    fn selection_prefers_defined_symbols() {
        let mut tree = CodeNodeTree::new();
        let body = tree.literal("auto* ctx = GetContext();\n");
        let def = tree.symbol_def("ctx", body);
        let cheap = tree.literal("use(ctx);\n");
        let costly = tree.literal("use(ComputeContext());\n");
        let sel = tree.selection(vec![(vec!["ctx".to_string()], cheap), (vec![], costly)]);
        let scope = tree.symbol_scope(vec![def, sel], Likeliness::Always);
        let text = render(&mut tree, scope).unwrap();
        assert_eq!(text, "auto* ctx = GetContext();\nuse(ctx);\n");

        let mut tree = CodeNodeTree::new();
        let cheap = tree.literal("use(ctx);\n");
        let costly = tree.literal("use(ComputeContext());\n");
        let sel = tree.selection(vec![(vec!["ctx".to_string()], cheap), (vec![], costly)]);
        let scope = tree.symbol_scope(vec![sel], Likeliness::Always);
        let text = render(&mut tree, scope).unwrap();
        assert_eq!(text, "use(ComputeContext());\n");
    }

    #[test]
    fn accumulator_converges_and_emits_includes() {
        let mut tree = CodeNodeTree::new();
        let includes = tree.dynamic(DynamicContent::IncludeHeaders);
        let body = tree.literal("void F() {}\n");
        tree.accumulate(body, include("v8/include/v8.h"));
        let root = tree.sequence(vec![includes, body]);
        let text = render(&mut tree, root).unwrap();
        assert_eq!(text, "#include \"v8/include/v8.h\"\nvoid F() {}\n");
    }

    #[test]
    fn render_is_deterministic() {
        let build = || {
            let mut tree = CodeNodeTree::new();
            let use1 = tree.symbol_ref("isolate");
            let line = tree.composite("bar({});\n", vec![use1.into()]);
            let scope = tree.symbol_scope(vec![line], Likeliness::Always);
            tree.register_code_symbol(
                scope,
                "isolate",
                Rc::new(|t: &mut CodeNodeTree| t.literal("auto* isolate = GetIsolate();\n")),
            );
            render(&mut tree, scope).unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn per_scope_symbols_stay_in_their_own_scopes() {
        // Two likely sibling scopes each register their own `isolate`; the
        // enclosing scope has no spec for it and must not claim the hoist.
        let mut tree = CodeNodeTree::new();
        let mut arm = |tree: &mut CodeNodeTree, call: &'static str| {
            let use_ = tree.symbol_ref("isolate");
            let line = tree.composite(call, vec![use_.into()]);
            let scope = tree.symbol_scope(vec![line], Likeliness::Likely);
            tree.register_code_symbol(
                scope,
                "isolate",
                Rc::new(|t: &mut CodeNodeTree| t.literal("auto* isolate = GetIsolate();\n")),
            );
            scope
        };
        let arm1 = arm(&mut tree, "a({});\n");
        let arm2 = arm(&mut tree, "b({});\n");
        let outer = tree.symbol_scope(vec![arm1, arm2], Likeliness::Always);
        let text = render(&mut tree, outer).unwrap();
        assert_eq!(
            text,
            "auto* isolate = GetIsolate();\na(isolate);\n\
             auto* isolate = GetIsolate();\nb(isolate);\n"
        );
    }

    #[test]
    fn unknown_symbol_is_an_error() {
        let mut tree = CodeNodeTree::new();
        let use1 = tree.symbol_ref("nowhere");
        let scope = tree.symbol_scope(vec![use1], Likeliness::Always);
        assert!(matches!(
            render(&mut tree, scope),
            Err(RenderError::UnknownSymbol(name)) if name == "nowhere"
        ));
    }
}
