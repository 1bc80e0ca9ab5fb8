//! Entry point: `acdb [PATHS...]`. A path that is a directory runs every
//! `test*` entry inside it as an independent case; a path that is a file
//! runs directly. With no paths, reads interactively from stdin
//! (spec.md §6, `[SUPPLEMENT]` in SPEC_FULL.md §6).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Available-copies concurrency-control simulator.
#[derive(Debug, Parser)]
#[command(name = "acdb", about = "Replicated concurrency-control simulator driver")]
struct Cli {
    /// Input files or directories of `test*` cases. Reads stdin if omitted.
    paths: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.paths.is_empty() {
        acdb_cli::driver::run_stdin();
        return ExitCode::SUCCESS;
    }

    for path in &cli.paths {
        if let Err(e) = acdb_cli::driver::run_path(path) {
            eprintln!("error running {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
