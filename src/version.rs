//! Generator version information.
//!
//! The version is stamped into `--version` output and available to anything
//! else that wants to report it (for example a `// Generated by` banner).
//! Taken from Cargo metadata at compile time; prefer this constant over
//! repeating `env!("CARGO_PKG_VERSION")`.

/// The generator version string (for example, `0.1.0-alpha.1`).
pub const WIDLGEN_VERSION: &str = env!("CARGO_PKG_VERSION");
