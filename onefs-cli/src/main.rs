// SPDX-License-Identifier: AGPL-3.0-or-later
//! OneFS CLI
//!
//! Browse local and remote filesystems through one path syntax.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onefs")]
#[command(author, version, about = "OneFS - one API over local and remote filesystems", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Settings file (defaults to the per-user config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List directory contents
    #[command(alias = "dir")]
    Ls {
        /// Path to list; an empty string lists the protocols
        #[arg(default_value = ".")]
        path: String,

        /// Long format with details
        #[arg(short, long)]
        long: bool,

        /// Show hidden entries
        #[arg(short, long)]
        all: bool,

        /// Human-readable sizes
        #[arg(short = 'H', long)]
        human: bool,
    },

    /// Display file contents
    Cat {
        /// File to display
        path: String,
    },

    /// Write stdin to a new file; an existing target is left untouched
    Put {
        /// Destination file
        path: String,
    },

    /// Remove files or empty directories
    Rm {
        /// Path(s) to remove
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Create directories
    Mkdir {
        /// Directory path(s) to create
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Show file or directory information
    Stat {
        /// Path to inspect
        path: String,
    },

    /// List registered protocols
    Protocols,

    /// Show the settings in effect (timeout, configured logins)
    Config,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = match commands::Context::load(cli.config.as_deref(), cli.json).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Ls { path, long, all, human } => ctx.ls(&path, long, all, human).await,
        Commands::Cat { path } => ctx.cat(&path).await,
        Commands::Put { path } => ctx.put(&path).await,
        Commands::Rm { paths } => ctx.rm(&paths).await,
        Commands::Mkdir { paths } => ctx.mkdir(&paths).await,
        Commands::Stat { path } => ctx.stat(&path).await,
        Commands::Protocols => ctx.protocols(),
        Commands::Config => ctx.config(),
    };

    ctx.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
