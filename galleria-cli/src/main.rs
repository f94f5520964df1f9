//! Galleria CLI - Command-line interface
//!
//! Exercises the galleria library from the shell: inspect the delivery
//! policy a device would get, compute gallery windows, generate blur
//! placeholders, preload a manifest and manage `config.ini`.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::{DeviceArgs, FetchArgs};
use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "galleria", version, about = "Adaptive image delivery for virtualized galleries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the effective quality, width and concurrency for a device
    Policy {
        #[command(flatten)]
        device: DeviceArgs,

        /// Requested quality (default from config)
        #[arg(long)]
        quality: Option<u8>,

        /// Requested display width in CSS pixels (default from config)
        #[arg(long)]
        width: Option<u32>,

        /// Apply the performance-feedback quality reduction
        #[arg(long)]
        reduce_quality: bool,

        /// Also derive the request URL for this image source
        #[arg(long)]
        source: Option<String>,
    },

    /// Compute the rendered window of a gallery for a scroll position
    Window {
        #[command(flatten)]
        device: DeviceArgs,

        /// Number of items in the gallery
        #[arg(long, conflicts_with = "manifest")]
        items: Option<usize>,

        /// JSON manifest to take the item count from
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Scroll offset in pixels
        #[arg(long, default_value_t = 0.0)]
        scroll: f64,

        /// Viewport height in pixels
        #[arg(long, default_value_t = 800.0)]
        viewport: f64,
    },

    /// Generate a blur placeholder data URL for an image
    Placeholder {
        /// Image source URL
        source: String,

        #[command(flatten)]
        fetch: FetchArgs,

        /// Placeholder width in pixels (default from config)
        #[arg(long)]
        width: Option<u32>,

        /// Placeholder height in pixels (default from config)
        #[arg(long)]
        height: Option<u32>,

        /// JPEG quality (default from config)
        #[arg(long)]
        quality: Option<u8>,
    },

    /// Preload the critical images of a JSON manifest
    Preload {
        /// JSON manifest of image items
        manifest: PathBuf,

        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        fetch: FetchArgs,

        /// Also preload the items following this index
        #[arg(long)]
        ahead_of: Option<usize>,
    },

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Policy {
            device,
            quality,
            width,
            reduce_quality,
            source,
        } => commands::policy::run(commands::policy::PolicyArgs {
            device,
            quality,
            width,
            reduce_quality,
            source,
        }),
        Commands::Window {
            device,
            items,
            manifest,
            scroll,
            viewport,
        } => commands::window::run(commands::window::WindowArgs {
            device,
            items,
            manifest,
            scroll_top: scroll,
            viewport_height: viewport,
        }),
        Commands::Placeholder {
            source,
            fetch,
            width,
            height,
            quality,
        } => commands::placeholder::run(commands::placeholder::PlaceholderArgs {
            source,
            fetch,
            width,
            height,
            quality,
        }),
        Commands::Preload {
            manifest,
            device,
            fetch,
            ahead_of,
        } => commands::preload::run(commands::preload::PreloadArgs {
            manifest,
            device,
            fetch,
            ahead_of,
        }),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
