//! The binding generator core.
//!
//! Output files are built as code-node trees ([`code_node`]), rendered to
//! text by the convergent renderer ([`renderer`]), with includes and forward
//! declarations collected on the side ([`accumulator`]). The [`generators`]
//! module maps each kind of IDL definition to its output files.

pub mod accumulator;
pub mod code_node;
pub mod cxx;
pub mod error;
pub mod exposure;
pub mod generators;
pub mod name_style;
pub mod package_initializer;
pub mod path_manager;
pub mod renderer;
pub mod source_file;
pub mod task_queue;
pub mod template;
pub mod type_bridge;

pub use error::GenerationError;
pub use package_initializer::{GenOptions, PackageInitializer, RuntimeEnv};
