//! Codestrata CLI entry point.

use clap::Parser;
use codestrata::cli::{self, Cli, Commands, EXIT_ERROR};
use codestrata::logging;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);
    let show_progress = !cli.quiet;

    let outcome = match &cli.command {
        Commands::Analyze(args) => cli::run_analyze(args, show_progress),
        Commands::Scan(args) => cli::run_scan(args, show_progress),
    };

    let exit_code = match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
