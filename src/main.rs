// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::fmt::MakeWriter;
use veinscope::config::{Config, env};
use veinscope::constants::hardware::{BEEP_DURATION, BEEP_FREQUENCY_HZ};
use veinscope::errors::AppResult;

mod cli;

const DEFAULT_BEEP_MS: u64 = BEEP_DURATION.as_millis() as u64;

#[derive(Parser)]
#[command(name = "veinscope")]
#[command(about = "Vein visualization camera preview and capture")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: ~/.config/veinscope/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Frame source: /dev/videoN, an image file, a directory, or kind:path
    #[arg(long, global = true)]
    source: Option<String>,

    /// Initial display mode (normal, inverted, vein)
    #[arg(long, global = true)]
    mode: Option<String>,

    /// Use simulated LED and buzzer
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Live preview in the terminal (default)
    Preview,

    /// Save processed frames without the preview
    Snapshot {
        /// Number of frames to save
        #[arg(short, long, default_value = "1")]
        frames: u32,

        /// Base directory (default: ~/Pictures/veinscope)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Set LED brightness in percent (0-100)
    Led { percent: u32 },

    /// Sound the buzzer
    Beep {
        #[arg(short, long, default_value_t = BEEP_FREQUENCY_HZ)]
        frequency: u32,

        #[arg(short, long, default_value_t = DEFAULT_BEEP_MS)]
        duration_ms: u64,
    },

    /// List display modes and enhancement settings
    Modes,
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();

    // The preview owns the terminal, so its logs are discarded
    // Set RUST_LOG to control the level in the other commands
    match cli.command {
        None | Some(Commands::Preview) => init_logging(std::io::sink),
        Some(_) => init_logging(std::io::stderr),
    }

    // Command-line flags win over the environment, which wins over the file
    let lookup = |key: &str| {
        let flag = match key {
            env::SOURCE => cli.source.clone(),
            env::MODE => cli.mode.clone(),
            env::HARDWARE if cli.simulate => Some("simulated".to_string()),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    };
    let config = Config::load(cli.config.as_deref(), lookup)?;

    match cli.command {
        None | Some(Commands::Preview) => veinscope::terminal::run(&config),
        Some(Commands::Snapshot { frames, output }) => cli::snapshot(&config, frames, output),
        Some(Commands::Led { percent }) => cli::led(&config, percent),
        Some(Commands::Beep {
            frequency,
            duration_ms,
        }) => cli::beep(&config, frequency, duration_ms),
        Some(Commands::Modes) => cli::list_modes(&config),
    }
}

fn init_logging<W>(writer: W)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(writer)
        .with_target(true)
        .with_level(true)
        .init();
}
