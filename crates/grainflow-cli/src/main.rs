//! grainflow CLI: run persisted pipelines, list stages, inspect container
//! files.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Preflight-checked processing pipelines over voxel microstructure data.
#[derive(Parser)]
#[command(name = "grainflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a pipeline settings file and run it
    Run {
        /// Path to the pipeline JSON file
        pipeline: PathBuf,

        /// Only run the preflight pass
        #[arg(long)]
        preflight_only: bool,

        /// Engine configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List every registered stage
    Stages,

    /// Print the group tree of a container file
    Inspect {
        /// Path to the container file
        file: PathBuf,
    },
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            pipeline,
            preflight_only,
            config,
        } => commands::run::run(&pipeline, preflight_only, config.as_deref()),
        Commands::Stages => commands::stages::run(),
        Commands::Inspect { file } => commands::inspect::run(&file),
    }
}
