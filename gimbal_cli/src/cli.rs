//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

/// Keeps the non-blocking file writer alive until the command finishes.
pub static FILE_GUARD: Mutex<Option<tracing_appender::non_blocking::WorkerGuard>> =
    Mutex::new(None);
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config file used when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG: &str = "etc/gimbal.toml";

#[derive(Parser, Debug)]
#[command(name = "gimbal", version, about = "Self-calibrating az/el gimbal controller")]
pub struct Cli {
    /// Path to config TOML (typed); defaults to etc/gimbal.toml when present
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Calibration record file; overrides [store] path
    #[arg(long, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Log and report as JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Point at a target, calibrating first if needed
    Track {
        /// Target azimuth in degrees, [0, 360)
        #[arg(long, allow_negative_numbers = true)]
        az: f32,
        /// Target elevation in degrees, [0, 90]
        #[arg(long, allow_negative_numbers = true)]
        el: f32,
        /// Stop once both pointing errors are below this many degrees
        #[arg(long, value_name = "DEG", default_value_t = 1.0)]
        tolerance: f32,
        /// Give up after this many control ticks
        #[arg(long, value_name = "N", default_value_t = 200)]
        max_ticks: u32,
    },
    /// Run a full calibration and move toward home (same as `set Save 1`)
    Calibrate,
    /// Forget the calibration and persist that
    Reset,
    /// Apply an operator override such as Mot1Min, G_Mot2Pos or SS_Save
    Set {
        /// Override name; controller names take an optional G_ prefix
        name: String,
        /// New value (pulse width in microseconds; ignored by Save and SS_Save)
        value: String,
    },
    /// Print controller and sensor status
    Status,
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
