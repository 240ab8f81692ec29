// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use pose_stream::media::formats::TargetPlatform;
use std::path::PathBuf;

mod cli;

use cli::SyntheticLayout;

#[derive(Parser)]
#[command(name = "pose-stream")]
#[command(about = "Camera frame normalization and live pose inference")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize and convert a synthetic frame, writing the result as PNG
    Convert {
        #[arg(long, default_value = "640")]
        width: u32,

        #[arg(long, default_value = "480")]
        height: u32,

        /// Plane layout of the synthetic input
        #[arg(short, long, value_enum, default_value = "android")]
        layout: SyntheticLayout,

        /// Platform preset (channel order and colour range)
        #[arg(short, long, value_enum)]
        target: Option<TargetArg>,

        /// Config file (default: ~/.config/pose-stream/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file path
        #[arg(short, long, default_value = "frame.png")]
        output: PathBuf,
    },

    /// Run synthetic frames through the full pipeline and report throughput
    Bench {
        /// Number of frames to submit
        #[arg(short, long, default_value = "300")]
        frames: u32,

        #[arg(long, default_value = "640")]
        width: u32,

        #[arg(long, default_value = "480")]
        height: u32,

        #[arg(short, long, value_enum, default_value = "android")]
        layout: SyntheticLayout,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Serve line-delimited JSON calls on stdin/stdout
    Bridge {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the preset config for a platform
    Config {
        #[arg(short, long, value_enum, default_value = "android")]
        target: TargetArg,

        /// Output file path (default: ~/.config/pose-stream/config.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TargetArg {
    Android,
    Ios,
}

impl From<TargetArg> for TargetPlatform {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Android => TargetPlatform::Android,
            TargetArg::Ios => TargetPlatform::Ios,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so the bridge's stdout stays clean
    // Set RUST_LOG to control the level, e.g. RUST_LOG=pose_stream=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            width,
            height,
            layout,
            target,
            config,
            output,
        } => cli::convert_frame(
            width,
            height,
            layout,
            target.map(Into::into),
            config.as_deref(),
            &output,
        ),
        Commands::Bench {
            frames,
            width,
            height,
            layout,
            config,
        } => cli::bench(frames, width, height, layout, config.as_deref()),
        Commands::Bridge { config } => cli::serve_bridge(config.as_deref()),
        Commands::Config { target, output } => cli::write_config(target.into(), output.as_deref()),
    }
}
