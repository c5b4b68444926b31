//! Command-line interface.
//!
//! The CLI is a thin shell over the generator core: parse arguments with
//! clap, install the tracing subscriber, run the requested command, and
//! report errors through miette. Command implementations live in
//! [`commands`] and return `Result` instead of exiting; only the binary's
//! `main` decides the process exit status.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use clap::{Parser, Subcommand};

use crate::version::WIDLGEN_VERSION;

#[derive(Parser, Debug)]
#[command(name = "widlgen")]
#[command(version = WIDLGEN_VERSION)]
#[command(about = "Web IDL to C++/V8 binding code generator", long_about = None)]
pub struct Cli {
    /// Tracing filter, e.g. `debug` or `widlgen=trace` (overrides RUST_LOG)
    #[arg(long, global = true, value_name = "FILTER")]
    pub tracing: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate bindings from a pre-parsed IDL database
    Generate(commands::GenerateArgs),
}

/// Parse arguments and run the requested command.
pub fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.tracing.as_deref());
    match cli.command {
        Command::Generate(args) => commands::generate(&args)?,
    }
    Ok(())
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => tracing_subscriber::EnvFilter::new(directives),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_generate_with_defaults() {
        let cli = Cli::try_parse_from(["widlgen", "generate", "db.json"]).unwrap();
        let Command::Generate(args) = cli.command;
        assert_eq!(args.database.to_string_lossy(), "db.json");
        assert!(args.format);
        assert!(!args.single_process);
        assert!(args.jobs.is_none());
    }

    #[test]
    fn parses_generate_flags() {
        let cli = Cli::try_parse_from([
            "widlgen",
            "generate",
            "db.json",
            "--output-root",
            "/out/gen",
            "--format",
            "false",
            "--jobs",
            "4",
        ])
        .unwrap();
        let Command::Generate(args) = cli.command;
        assert_eq!(args.output_root.to_string_lossy(), "/out/gen");
        assert!(!args.format);
        assert_eq!(args.jobs.map(|j| j.get()), Some(4));
    }

    #[test]
    fn single_process_conflicts_with_jobs() {
        let parsed = Cli::try_parse_from([
            "widlgen",
            "generate",
            "db.json",
            "--single-process",
            "--jobs",
            "4",
        ]);
        assert!(parsed.is_err());
    }
}
