//! Command-line interface for mimic-battle
//!
//! Handles argument parsing and logging configuration.

use clap::Parser;
use log::LevelFilter;
use thiserror::Error;

use mimic_core::models::error::{BattleError, CaptureError, SessionError};

use crate::config::ConfigError;

/// mimic-battle - repeat the bird's call to win
#[derive(Parser, Debug)]
#[command(name = "mimic-battle")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Backend base URL (overrides MIMIC_API_URL)
    #[arg(long, env = "MIMIC_API_URL")]
    pub api_url: Option<String>,

    /// Input device name (overrides MIMIC_INPUT_DEVICE)
    #[arg(long)]
    pub input_device: Option<String>,

    /// Output device name (overrides MIMIC_OUTPUT_DEVICE)
    #[arg(long)]
    pub output_device: Option<String>,

    /// Capture window length in milliseconds
    #[arg(long)]
    pub capture_ms: Option<u64>,

    /// List audio devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Skip the backend health check
    #[arg(long)]
    pub skip_health_check: bool,

    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Keep dependencies quiet
    builder.filter_level(LevelFilter::Warn);
    builder.filter_module("mimic_core", args.log_level());
    builder.filter_module("mimic_native", args.log_level());
    builder.filter_module("mimic_battle", args.log_level());

    // Audio host internals only at -vvv
    if args.verbose >= 3 {
        builder.filter_module("cpal", args.log_level());
    }

    builder.format_timestamp_millis().init();
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("backend unavailable: {0}")]
    Backend(#[from] SessionError),
    #[error("audio setup failed: {0}")]
    Audio(#[from] CaptureError),
    #[error("{}", .0.user_message())]
    Battle(#[from] BattleError),
    #[error("could not print result: {0}")]
    Output(#[from] serde_json::Error),
}
