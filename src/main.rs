// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "patchscan")]
#[command(about = "Camera capture and patch-based infection classification")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available capture devices
    List,

    /// Capture a cropped still photo
    Photo {
        /// Device path (default: from config, else first device)
        #[arg(short, long)]
        device: Option<String>,

        /// Output file path (default: ~/Pictures/patchscan/photo_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Lock white balance and exposure instead of auto
        #[arg(short, long)]
        locked: bool,
    },

    /// Capture a photo and classify it
    Scan {
        /// Device path (default: from config, else first device)
        #[arg(short, long)]
        device: Option<String>,

        /// Path to the ONNX classifier model (default: from config)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Lock white balance and exposure instead of auto
        #[arg(short, long)]
        locked: bool,

        /// Also save the captured photo to this path
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Classify an already captured photo file
    Classify {
        /// Photo file to classify
        input: PathBuf,

        /// Path to the ONNX classifier model (default: from config)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Show the active configuration
    Config {
        /// Write the current configuration to disk
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=patchscan=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_devices(),
        Commands::Photo {
            device,
            output,
            locked,
        } => cli::take_photo(device, output, locked),
        Commands::Scan {
            device,
            model,
            locked,
            save,
        } => cli::scan(device, model, locked, save),
        Commands::Classify { input, model } => cli::classify_file(input, model),
        Commands::Config { init } => cli::show_config(init),
    }
}
