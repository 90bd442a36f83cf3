//! spack CLI - asset bundler with live reload.
//!
//! Provides commands for:
//! - `build`: Bundle every entry once and write the artifacts
//! - `serve`: Bundle, serve the pages and optionally rebuild on change

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BuildArgs, ServeArgs};
use error::CliError;
use output::Output;

/// spack - bundle HTML, script and asset files into single documents.
#[derive(Parser)]
#[command(name = "spack", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle every entry once and write the artifacts.
    Build(BuildArgs),
    /// Start the development server.
    Serve(ServeArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Build(args) => args.verbose,
            Self::Serve(args) => args.verbose,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(cli.command) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    let rt = tokio::runtime::Runtime::new()?;
    match command {
        Commands::Build(args) => rt.block_on(args.execute()),
        Commands::Serve(args) => rt.block_on(args.execute()),
    }
}
