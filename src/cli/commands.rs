//! Command implementations.

use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use miette::Diagnostic;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::codegen::generators::{self, GeneratedFile};
use crate::codegen::package_initializer::{GenOptions, PackageInitializer};
use crate::codegen::path_manager::PathConfig;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("failed to read IDL database `{path}`", path = .path.display())]
    ReadDatabase {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse IDL database `{path}`", path = .path.display())]
    #[diagnostic(help("the database must be the JSON form produced by the IDL frontend"))]
    ParseDatabase {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write `{path}`", path = .path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{failed} generator task(s) failed")]
    #[diagnostic(help("rerun with --tracing debug for per-task details"))]
    TasksFailed { failed: usize },
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Pre-parsed IDL database (JSON)
    #[arg(value_name = "DATABASE")]
    pub database: PathBuf,

    /// Root directory generated files are written under
    #[arg(long, value_name = "DIR", default_value = "gen")]
    pub output_root: PathBuf,

    /// Run clang-format over each written file
    #[arg(long, value_name = "BOOL", default_value_t = true, action = clap::ArgAction::Set)]
    pub format: bool,

    /// Worker threads (defaults to the available parallelism)
    #[arg(long, value_name = "N")]
    pub jobs: Option<NonZeroUsize>,

    /// Run every task on the calling thread
    #[arg(long, conflicts_with = "jobs")]
    pub single_process: bool,
}

pub fn generate(args: &GenerateArgs) -> Result<(), CliError> {
    let bytes = fs::read(&args.database)
        .map_err(|source| CliError::ReadDatabase { path: args.database.clone(), source })?;
    let mut database: web_idl::Database = serde_json::from_slice(&bytes)
        .map_err(|source| CliError::ParseDatabase { path: args.database.clone(), source })?;
    database.normalize();

    let env = PackageInitializer::new(
        Arc::new(database),
        PathConfig::chromium_default(&args.output_root),
        GenOptions { format_output: args.format, ..GenOptions::default() },
    )
    .init();

    let jobs = job_count(args);
    info!(jobs = jobs.get(), output_root = %args.output_root.display(), "generating bindings");
    let (files, failures) = generators::generate_all(&env, jobs);
    for failure in &failures {
        error!(task = %failure.task_name, error = %failure.error, "generator task failed");
    }

    for file in &files {
        write_file(file)?;
    }
    if env.options.format_output {
        format_files(&files);
    }
    info!(files = files.len(), "generation complete");

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::TasksFailed { failed: failures.len() })
    }
}

fn job_count(args: &GenerateArgs) -> NonZeroUsize {
    let one = NonZeroUsize::MIN;
    if args.single_process {
        return one;
    }
    args.jobs
        .or_else(|| std::thread::available_parallelism().ok())
        .unwrap_or(one)
}

fn write_file(file: &GeneratedFile) -> Result<(), CliError> {
    if let Some(parent) = file.path.parent() {
        fs::create_dir_all(parent)
            .map_err(|source| CliError::WriteOutput { path: file.path.clone(), source })?;
    }
    fs::write(&file.path, &file.content)
        .map_err(|source| CliError::WriteOutput { path: file.path.clone(), source })?;
    debug!(path = %file.path.display(), bytes = file.content.len(), "wrote output file");
    Ok(())
}

/// Best-effort `clang-format -i` over the written files. A missing formatter
/// downgrades to a warning; the unformatted output is still valid C++.
fn format_files(files: &[GeneratedFile]) {
    if files.is_empty() {
        return;
    }
    let mut command = std::process::Command::new("clang-format");
    command.arg("-i");
    for file in files {
        command.arg(&file.path);
    }
    match command.status() {
        Ok(status) if status.success() => {
            debug!(files = files.len(), "formatted output files");
        }
        Ok(status) => warn!(%status, "clang-format exited with failure"),
        Err(error) => warn!(%error, "clang-format not run"),
    }
}
