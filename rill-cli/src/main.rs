//! rill CLI - the rill language command line interface.

mod commands;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

/// Main CLI structure.
#[derive(Parser)]
#[command(name = "rill")]
#[command(author, version, about = "rill - a lazy configuration language for package builds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Decrease verbosity (-q warnings, -qq errors, -qqq nothing).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    quiet: u8,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression.
    Eval {
        /// The expression to evaluate.
        expr: String,

        /// Force the value deeply before printing.
        #[arg(long)]
        strict: bool,

        /// Compute store paths without copying sources into the store.
        #[arg(long)]
        read_only: bool,
    },

    /// Evaluate a rill file.
    Run {
        /// The file to evaluate.
        file: String,

        /// Force the value deeply before printing.
        #[arg(long)]
        strict: bool,

        /// Compute store paths without copying sources into the store.
        #[arg(long)]
        read_only: bool,
    },

    /// Start an interactive REPL.
    Repl,
}

/// Map -v/-q occurrences onto a log level, defaulting to `Info`.
fn init_logging(verbose: u8, quiet: u8) {
    // Off  Error  Warn  Info  Debug  Trace
    //  0     1     2     3      4      5
    let level = 3 + verbose.min(2) as i8 - quiet.min(3) as i8;
    let filter = match level {
        i8::MIN..=0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter(None, filter)
        .init();
}

/// Main entry point.
fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Eval {
            expr,
            strict,
            read_only,
        } => commands::eval::run(&expr, strict, read_only),
        Commands::Run {
            file,
            strict,
            read_only,
        } => commands::run::run(&file, strict, read_only),
        Commands::Repl => commands::repl::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
