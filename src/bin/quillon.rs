//! Quillon CLI binary.

use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::{Builder, Env};
use log::LevelFilter;

use quillon::cli::args::*;
use quillon::cli::commands::*;

fn main() {
    // Parse command line arguments using clap
    let args = QuillonArgs::parse();

    let mut builder = Builder::from_env(Env::default().default_filter_or("warn"));
    // Explicit flags win over RUST_LOG
    if args.quiet || args.verbose > 0 {
        let log_level = match args.verbosity() {
            0 => LevelFilter::Error, // Quiet mode
            1 => LevelFilter::Warn,  // Default
            2 => LevelFilter::Info,  // Verbose
            _ => LevelFilter::Debug, // Very verbose (3+)
        };
        builder.filter_level(log_level);
    }
    builder
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    // Execute the command
    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
