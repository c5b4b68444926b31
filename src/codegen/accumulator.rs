//! Side-effect accumulator threaded through rendering.
//!
//! Any node may enqueue requests that, when the node is rendered, add
//! include headers or forward declarations to the per-root accumulator. The
//! render loop repeats until the accumulator is stable across two passes, so
//! content derived from it (the include block at the top of a file) reflects
//! everything the body demanded.

use std::collections::BTreeSet;

/// A single accumulation request attached to a code node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccumulatorOp {
    /// Project include header, optionally with an end-of-line annotation
    /// (e.g. `// nogncheck`).
    IncludeHeader { path: String, annotation: Option<String> },
    StdcppIncludeHeader(String),
    ClassDecl(String),
    StructDecl(String),
}

/// Deduped include/forward-declaration sets for one output file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Accumulator {
    include_headers: BTreeSet<(String, Option<String>)>,
    stdcpp_include_headers: BTreeSet<String>,
    class_decls: BTreeSet<String>,
    struct_decls: BTreeSet<String>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, op: &AccumulatorOp) {
        match op {
            AccumulatorOp::IncludeHeader { path, annotation } => {
                self.include_headers.insert((path.clone(), annotation.clone()));
            }
            AccumulatorOp::StdcppIncludeHeader(path) => {
                self.stdcpp_include_headers.insert(path.clone());
            }
            AccumulatorOp::ClassDecl(name) => {
                self.class_decls.insert(name.clone());
            }
            AccumulatorOp::StructDecl(name) => {
                self.struct_decls.insert(name.clone());
            }
        }
    }

    /// Total cardinality; the render loop's stability check compares this
    /// across passes (the sets only grow).
    pub fn total_size(&self) -> usize {
        self.include_headers.len()
            + self.stdcpp_include_headers.len()
            + self.class_decls.len()
            + self.struct_decls.len()
    }

    pub fn include_headers(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.include_headers.iter().map(|(p, a)| (p.as_str(), a.as_deref()))
    }

    pub fn stdcpp_include_headers(&self) -> impl Iterator<Item = &str> {
        self.stdcpp_include_headers.iter().map(String::as_str)
    }

    pub fn class_decls(&self) -> impl Iterator<Item = &str> {
        self.class_decls.iter().map(String::as_str)
    }

    pub fn struct_decls(&self) -> impl Iterator<Item = &str> {
        self.struct_decls.iter().map(String::as_str)
    }
}

/// Shorthand constructor for the common annotation-free include request.
pub fn include(path: impl Into<String>) -> AccumulatorOp {
    AccumulatorOp::IncludeHeader { path: path.into(), annotation: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_and_sorted_iteration() {
        let mut acc = Accumulator::new();
        acc.apply(&include("b.h"));
        acc.apply(&include("a.h"));
        acc.apply(&include("b.h"));
        let paths: Vec<&str> = acc.include_headers().map(|(p, _)| p).collect();
        assert_eq!(paths, ["a.h", "b.h"]);
        assert_eq!(acc.total_size(), 2);
    }

    #[test]
    fn annotation_is_part_of_the_entry() {
        let mut acc = Accumulator::new();
        acc.apply(&AccumulatorOp::IncludeHeader {
            path: "x.h".to_string(),
            annotation: Some("// nogncheck".to_string()),
        });
        let entries: Vec<_> = acc.include_headers().collect();
        assert_eq!(entries, [("x.h", Some("// nogncheck"))]);
    }
}
