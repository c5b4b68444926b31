//! Binding generator CLI entry point

fn main() -> miette::Result<()> {
    widlgen::cli::run()
}
