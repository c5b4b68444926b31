#![forbid(unsafe_code)]
//! Web IDL to C++/V8 binding code generator.
//!
//! The generator consumes a pre-parsed IDL database (the [`web_idl`] crate)
//! and emits the C++ glue between Blink implementation classes and V8:
//! `V8Foo` bindings classes, dictionary and enumeration helpers, union
//! classes, callback wrappers and the per-context property installers.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` /
//!   `map_err`. The `cli` module enforces `#![deny(clippy::unwrap_used)]`;
//!   invariant violations become [`GenerationError::Invariant`] values
//!   carrying the offending IDL location.
//!
//! - **True invariants**: If a panic represents a generator bug (a logic
//!   error, not bad input), use `.expect("INVARIANT: reason")` stating the
//!   invariant that was violated.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Generated code**: The generators emit C++ as *string literals*; what
//!   the generated C++ does on bad input (throw a TypeError, for example) is
//!   Web IDL semantics, not an error in this crate.

pub mod cli;
pub mod codegen;
pub mod version;

pub use codegen::generators::{generate_all, GeneratedFile};
pub use codegen::{GenOptions, GenerationError, PackageInitializer, RuntimeEnv};
