// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use depth_probe::backends::camera::SourceKind;
use depth_probe::{AppResult, Config, ViewMode};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser)]
#[command(name = "depth-probe")]
#[command(about = "Colorized depth viewer with distance readout")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    #[command(flatten)]
    capture: CaptureArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the distance at the clicked pixel (default)
    Click,

    /// Show the distance at the frame center
    Center,

    /// Print the distance at a pixel for every frame, without a display
    Probe {
        /// Column to measure (default: frame center)
        #[arg(short, long, requires = "y")]
        x: Option<u32>,

        /// Row to measure (default: frame center)
        #[arg(short, long, requires = "x")]
        y: Option<u32>,

        /// Stop after this many frames
        #[arg(short, long)]
        frames: Option<u64>,
    },

    /// List depth-capable V4L2 devices
    List,
}

/// Options shared by every capture command
#[derive(Args)]
struct CaptureArgs {
    /// Config file (default: ~/.config/depth-probe/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// V4L2 device node, e.g. /dev/video2
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Use the built-in synthetic depth scene instead of a camera
    #[arg(long, global = true)]
    synthetic: bool,

    /// Stream width in pixels
    #[arg(long, global = true)]
    width: Option<u32>,

    /// Stream height in pixels
    #[arg(long, global = true)]
    height: Option<u32>,

    /// Stream frame rate
    #[arg(long, global = true)]
    fps: Option<u32>,

    /// Meters per raw depth unit
    #[arg(long, global = true)]
    depth_scale: Option<f32>,
}

impl CaptureArgs {
    /// Load the config file and apply command line overrides on top
    fn resolve(&self) -> AppResult<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(device) = &self.device {
            config.device = Some(device.clone());
            config.source = SourceKind::V4l2;
        }
        if self.synthetic {
            config.source = SourceKind::Synthetic;
        }
        if let Some(width) = self.width {
            config.stream.width = width;
        }
        if let Some(height) = self.height {
            config.stream.height = height;
        }
        if let Some(fps) = self.fps {
            config.stream.fps = fps;
        }
        if let Some(scale) = self.depth_scale {
            config.depth_scale = scale;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depth_probe=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        None | Some(Commands::Click) => run_viewer(&cli.capture, ViewMode::Click),
        Some(Commands::Center) => run_viewer(&cli.capture, ViewMode::Center),
        Some(Commands::Probe { x, y, frames }) => cli
            .capture
            .resolve()
            .and_then(|config| cli::run_probe(&config, x.zip(y), frames)),
        Some(Commands::List) => cli::list_devices(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.hint() {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run_viewer(args: &CaptureArgs, mode: ViewMode) -> AppResult<()> {
    let config = args.resolve()?;
    let source = depth_probe::backends::camera::open_source(&config)?;
    depth_probe::terminal::run(source, mode, &config)
}
