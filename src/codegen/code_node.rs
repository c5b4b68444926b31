//! Code-node tree model.
//!
//! Generated C++ is built as a tree of code nodes before any text exists.
//! All nodes live in an arena owned by a [`CodeNodeTree`]; inter-node links
//! (`outer`, `prev`, children) are [`NodeId`] indices. A node belongs to at
//! most one list at a time.
//!
//! Variants:
//!
//! - `Empty` renders nothing.
//! - `Literal` renders a fixed string verbatim.
//! - `Text` renders through the `${name}` template engine.
//! - `List` renders ordered children with optional head/separator/tail.
//! - `Sequence` is a list into which symbol definitions may be inserted.
//! - `SymbolScope` is a sequence that tracks symbol references below it and
//!   materializes definitions at the earliest dominating point.
//! - `SymbolRef` renders a symbol's name and demands its definition.
//! - `SymbolDef` carries the body defining a symbol; duplicate definitions
//!   within one scope render only once.
//! - `WeakDep` forces definitions of named symbols to precede this node when
//!   they end up defined at all, without demanding them.
//! - `Selection` picks the first alternative whose required symbols are
//!   already defined at the render point.
//! - `Dynamic` renders accumulator-derived content (include directives,
//!   forward declarations) from the previous render pass.
//!
//! Tree-surgery misuse (reparenting a claimed node, rebinding a duplicate
//! template variable, mutating bindings after rendering started) is a
//! generator bug, not an input error, and panics with an `INVARIANT:`
//! message.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::codegen::accumulator::AccumulatorOp;
use crate::codegen::template::Template;

/// Index of a node in its tree's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// How likely a scope is to execute at runtime, relative to its parent.
/// Drives where symbol definitions are hoisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Likeliness {
    Never,
    Unlikely,
    Likely,
    #[default]
    Always,
}

/// Value bound to a template variable.
#[derive(Clone, Debug)]
pub enum BindingValue {
    Str(String),
    Int(i64),
    Node(NodeId),
}

impl From<String> for BindingValue {
    fn from(value: String) -> Self {
        BindingValue::Str(value)
    }
}

impl From<&str> for BindingValue {
    fn from(value: &str) -> Self {
        BindingValue::Str(value.to_string())
    }
}

impl From<i64> for BindingValue {
    fn from(value: i64) -> Self {
        BindingValue::Int(value)
    }
}

impl From<NodeId> for BindingValue {
    fn from(value: NodeId) -> Self {
        BindingValue::Node(value)
    }
}

/// Ordered children plus the strings emitted around and between them.
/// `head`/`tail` are emitted only when at least one child renders non-empty.
#[derive(Clone, Debug, Default)]
pub struct ListFormat {
    pub head: Option<String>,
    pub separator: Option<String>,
    pub tail: Option<String>,
}

/// Accumulator-derived content recomputed on every render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DynamicContent {
    IncludeHeaders,
    StdcppIncludeHeaders,
    ForwardDeclarations,
}

/// Constructs the definition body of a symbol on demand, when the renderer
/// decides to insert one.
pub type SymbolDefinitionCtor = Rc<dyn Fn(&mut CodeNodeTree) -> NodeId>;

/// A symbol registered at a scope: its C++ name plus the recipe for its
/// defining statement(s).
#[derive(Clone)]
pub struct SymbolSpec {
    pub name: String,
    pub definition_ctor: SymbolDefinitionCtor,
}

pub enum NodeKind {
    Empty,
    Literal(String),
    Text(Template),
    List { children: Vec<NodeId>, format: ListFormat },
    Sequence { children: Vec<NodeId>, format: ListFormat },
    SymbolScope { children: Vec<NodeId>, format: ListFormat, likeliness: Likeliness },
    SymbolRef { name: String },
    SymbolDef { name: String, body: NodeId },
    WeakDep { names: Vec<String> },
    Selection { alternatives: Vec<(Vec<String>, NodeId)> },
    Dynamic(DynamicContent),
}

pub struct Node {
    pub kind: NodeKind,
    pub outer: Option<NodeId>,
    pub prev: Option<NodeId>,
    pub(crate) own_vars: BTreeMap<String, BindingValue>,
    pub(crate) base_vars: BTreeMap<String, BindingValue>,
    pub(crate) accumulate_ops: Vec<AccumulatorOp>,
    /// Set once the renderer has visited this node; bindings freeze here.
    pub(crate) render_started: bool,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            outer: None,
            prev: None,
            own_vars: BTreeMap::new(),
            base_vars: BTreeMap::new(),
            accumulate_ops: Vec::new(),
            render_started: false,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::List { children, .. }
            | NodeKind::Sequence { children, .. }
            | NodeKind::SymbolScope { children, .. } => children,
            _ => &[],
        }
    }

    pub fn is_scope(&self) -> bool {
        matches!(self.kind, NodeKind::SymbolScope { .. })
    }

    pub fn likeliness(&self) -> Likeliness {
        match &self.kind {
            NodeKind::SymbolScope { likeliness, .. } => *likeliness,
            _ => Likeliness::Always,
        }
    }
}

/// Arena owning every code node of one output file, plus the symbol
/// registries of its scopes.
#[derive(Default)]
pub struct CodeNodeTree {
    nodes: Vec<Node>,
    /// Symbols registered per scope node, looked up from inner to outer.
    symbol_registry: BTreeMap<NodeId, BTreeMap<String, SymbolSpec>>,
    /// (scope, symbol) pairs whose definition has been spliced in, across
    /// passes; prevents double insertion.
    pub(crate) inserted_symbols: std::collections::BTreeSet<(NodeId, String)>,
    /// Counter for unique template-variable names minted by `composite`.
    format_var_counter: u32,
}

impl CodeNodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("INVARIANT: arena overflow"));
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    // ---- constructors ----

    pub fn empty(&mut self) -> NodeId {
        self.push(Node::new(NodeKind::Empty))
    }

    pub fn literal(&mut self, text: impl Into<String>) -> NodeId {
        self.push(Node::new(NodeKind::Literal(text.into())))
    }

    /// Templated text; `${name}` placeholders resolve through the binding
    /// chain at render time.
    pub fn text(&mut self, template: impl AsRef<str>) -> NodeId {
        let template = Template::compile(template.as_ref());
        self.push(Node::new(NodeKind::Text(template)))
    }

    pub fn list(&mut self, children: Vec<NodeId>, format: ListFormat) -> NodeId {
        let id = self.push(Node::new(NodeKind::List { children: Vec::new(), format }));
        self.adopt_all(id, children);
        id
    }

    pub fn sequence(&mut self, children: Vec<NodeId>) -> NodeId {
        let id = self.push(Node::new(NodeKind::Sequence {
            children: Vec::new(),
            format: ListFormat::default(),
        }));
        self.adopt_all(id, children);
        id
    }

    pub fn symbol_scope(&mut self, children: Vec<NodeId>, likeliness: Likeliness) -> NodeId {
        let id = self.push(Node::new(NodeKind::SymbolScope {
            children: Vec::new(),
            format: ListFormat::default(),
            likeliness,
        }));
        self.adopt_all(id, children);
        id
    }

    pub fn symbol_ref(&mut self, name: impl Into<String>) -> NodeId {
        self.push(Node::new(NodeKind::SymbolRef { name: name.into() }))
    }

    pub fn symbol_def(&mut self, name: impl Into<String>, body: NodeId) -> NodeId {
        let id = self.push(Node::new(NodeKind::SymbolDef { name: name.into(), body }));
        self.claim(id, body);
        id
    }

    pub fn weak_dep(&mut self, names: Vec<String>) -> NodeId {
        self.push(Node::new(NodeKind::WeakDep { names }))
    }

    /// Symbol-sensitive selection: the first alternative whose required
    /// symbols are all defined at the render point wins; the last alternative
    /// is the fallback and should require nothing.
    pub fn selection(&mut self, alternatives: Vec<(Vec<String>, NodeId)>) -> NodeId {
        for (_, child) in &alternatives {
            debug_assert!(self.node(*child).outer.is_none());
        }
        let id = self.push(Node::new(NodeKind::Selection { alternatives: alternatives.clone() }));
        for (_, child) in alternatives {
            self.claim(id, child);
        }
        id
    }

    pub fn dynamic(&mut self, content: DynamicContent) -> NodeId {
        self.push(Node::new(NodeKind::Dynamic(content)))
    }

    /// Composite node: format text with `{}` / `{name}` parameters rewritten
    /// to uniquely generated template-variable names so user-visible binding
    /// names never collide.
    pub fn composite(&mut self, format: &str, args: Vec<BindingValue>) -> NodeId {
        let mut template = String::with_capacity(format.len());
        let mut arg_iter = args.into_iter();
        let mut bindings: Vec<(String, BindingValue)> = Vec::new();
        let mut chars = format.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '{' && chars.peek() == Some(&'}') {
                chars.next();
                let value = arg_iter
                    .next()
                    .expect("INVARIANT: composite placeholder without an argument");
                self.format_var_counter += 1;
                let var = format!("_fmt_{}", self.format_var_counter);
                template.push_str(&format!("${{{var}}}"));
                bindings.push((var, value));
            } else {
                template.push(c);
            }
        }
        assert!(
            arg_iter.next().is_none(),
            "INVARIANT: composite argument without a placeholder"
        );
        let node = self.text(template);
        for (var, value) in bindings {
            self.bind(node, &var, value);
        }
        node
    }

    // ---- bindings ----

    /// Bind a template variable on `node`. Duplicate own bindings and
    /// bindings added after rendering started are generator bugs.
    pub fn bind(&mut self, node: NodeId, name: &str, value: impl Into<BindingValue>) {
        let n = self.node_mut(node);
        assert!(!n.render_started, "INVARIANT: binding `{name}` after rendering started");
        let previous = n.own_vars.insert(name.to_string(), value.into());
        assert!(previous.is_none(), "INVARIANT: duplicate template variable `{name}`");
    }

    /// Base-layer binding, overridden by own bindings of this node and every
    /// inner node.
    pub fn bind_base(&mut self, node: NodeId, name: &str, value: impl Into<BindingValue>) {
        let n = self.node_mut(node);
        assert!(!n.render_started, "INVARIANT: base binding `{name}` after rendering started");
        n.base_vars.insert(name.to_string(), value.into());
    }

    /// Resolve a template variable by searching from `node` outward.
    pub fn resolve_binding(&self, node: NodeId, name: &str) -> Option<&BindingValue> {
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.node(id);
            if let Some(value) = n.own_vars.get(name) {
                return Some(value);
            }
            if let Some(value) = n.base_vars.get(name) {
                return Some(value);
            }
            current = n.outer;
        }
        None
    }

    // ---- accumulator requests ----

    pub fn accumulate(&mut self, node: NodeId, op: AccumulatorOp) {
        self.node_mut(node).accumulate_ops.push(op);
    }

    // ---- symbol registry ----

    /// Register a symbol at a scope; references below the scope may then be
    /// resolved by inserting the constructed definition.
    pub fn register_code_symbol(
        &mut self,
        scope: NodeId,
        name: impl Into<String>,
        definition_ctor: SymbolDefinitionCtor,
    ) {
        debug_assert!(self.node(scope).is_scope());
        let name = name.into();
        self.symbol_registry
            .entry(scope)
            .or_default()
            .insert(name.clone(), SymbolSpec { name, definition_ctor });
    }

    /// Find the spec for `name` by walking from `from` outward through
    /// enclosing scopes' registries.
    pub fn find_symbol_spec(&self, from: NodeId, name: &str) -> Option<&SymbolSpec> {
        let mut current = Some(from);
        while let Some(id) = current {
            if let Some(spec) = self.symbol_registry.get(&id).and_then(|m| m.get(name)) {
                return Some(spec);
            }
            current = self.node(id).outer;
        }
        None
    }

    // ---- list surgery ----

    fn claim(&mut self, parent: NodeId, child: NodeId) {
        let c = self.node_mut(child);
        assert!(c.outer.is_none(), "INVARIANT: node already belongs to a list");
        c.outer = Some(parent);
    }

    fn adopt_all(&mut self, parent: NodeId, children: Vec<NodeId>) {
        for child in children {
            self.append(parent, child);
        }
    }

    /// Append `child` to a list-like node.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.claim(parent, child);
        let prev = self.node(parent).children().last().copied();
        self.node_mut(child).prev = prev;
        match &mut self.node_mut(parent).kind {
            NodeKind::List { children, .. }
            | NodeKind::Sequence { children, .. }
            | NodeKind::SymbolScope { children, .. } => children.push(child),
            _ => panic!("INVARIANT: append to a non-list node"),
        }
    }

    /// Insert `child` before index `at` of a sequence-like node, fixing up
    /// the `prev` links of the neighbors.
    pub fn insert_at(&mut self, parent: NodeId, at: usize, child: NodeId) {
        self.claim(parent, child);
        let (prev, next) = {
            let children = self.node(parent).children();
            let prev = if at > 0 { children.get(at - 1).copied() } else { None };
            (prev, children.get(at).copied())
        };
        self.node_mut(child).prev = prev;
        if let Some(next) = next {
            self.node_mut(next).prev = Some(child);
        }
        match &mut self.node_mut(parent).kind {
            NodeKind::Sequence { children, .. } | NodeKind::SymbolScope { children, .. } => {
                children.insert(at.min(children.len()), child);
            }
            _ => panic!("INVARIANT: symbol definitions can only be inserted into sequences"),
        }
    }

    /// Number of nodes in the arena (diagnostics only).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_links_prev_and_outer() {
        let mut tree = CodeNodeTree::new();
        let a = tree.literal("a");
        let b = tree.literal("b");
        let list = tree.list(vec![a, b], ListFormat::default());
        assert_eq!(tree.node(a).outer, Some(list));
        assert_eq!(tree.node(b).prev, Some(a));
        assert_eq!(tree.node(a).prev, None);
    }

    #[test]
    #[should_panic(expected = "INVARIANT: node already belongs to a list")]
    fn double_parenting_is_a_bug() {
        let mut tree = CodeNodeTree::new();
        let a = tree.literal("a");
        let _ = tree.list(vec![a], ListFormat::default());
        let _ = tree.list(vec![a], ListFormat::default());
    }

    #[test]
    #[should_panic(expected = "INVARIANT: duplicate template variable `x`")]
    fn duplicate_binding_is_a_bug() {
        let mut tree = CodeNodeTree::new();
        let t = tree.text("${x}");
        tree.bind(t, "x", "1");
        tree.bind(t, "x", "2");
    }

    #[test]
    #[should_panic(expected = "INVARIANT: binding `x` after rendering started")]
    fn binding_after_render_is_a_bug() {
        let mut tree = CodeNodeTree::new();
        let t = tree.text("${x}");
        tree.node_mut(t).render_started = true;
        tree.bind(t, "x", "1");
    }

    #[test]
    fn binding_resolution_searches_outward() {
        let mut tree = CodeNodeTree::new();
        let inner = tree.text("${x}");
        let outer = tree.sequence(vec![inner]);
        tree.bind_base(outer, "x", "outer");
        assert!(matches!(
            tree.resolve_binding(inner, "x"),
            Some(BindingValue::Str(s)) if s == "outer"
        ));
        tree.bind(inner, "x", "inner");
        assert!(matches!(
            tree.resolve_binding(inner, "x"),
            Some(BindingValue::Str(s)) if s == "inner"
        ));
    }

    #[test]
    fn insert_at_front_fixes_links() {
        let mut tree = CodeNodeTree::new();
        let a = tree.literal("a");
        let seq = tree.sequence(vec![a]);
        let d = tree.literal("d");
        tree.insert_at(seq, 0, d);
        assert_eq!(tree.node(seq).children(), &[d, a]);
        assert_eq!(tree.node(a).prev, Some(d));
        assert_eq!(tree.node(d).prev, None);
    }
}
