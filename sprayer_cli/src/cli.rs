//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// Keeps the non-blocking file writer alive; taken and dropped by [`flush_logs`].
pub static FILE_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> =
    Mutex::new(None);
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Drop the file writer guard so buffered log lines reach disk before exit.
pub fn flush_logs() {
    if let Ok(mut guard) = FILE_GUARD.lock() {
        guard.take();
    }
}

#[derive(Parser, Debug)]
#[command(name = "sprayer", version, about = "Leaf-disease spray controller")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/sprayer.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Seed for the simulated camera and detector
    #[arg(long, value_name = "N", default_value_t = 42)]
    pub seed: u32,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capture/decide/spray loop until Ctrl-C
    Run {
        /// Stop after this many inference cycles (completed or skipped)
        #[arg(long, value_name = "N")]
        max_cycles: Option<u64>,
        /// Decide and log, but never drive the output
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Run exactly one inference cycle and print its report
    Once {
        /// Decide and log, but never drive the output
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Validate the config and check the output and camera
    SelfCheck,
}
