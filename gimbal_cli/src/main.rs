#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod run;

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::Result;
use gimbal_config::{Logging, Rotation};
use tracing::{debug, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = run::load_config(cli.config.as_deref())?;
    init_tracing(&cli.log_level, cli.json, &cfg.logging);
    let result = dispatch(cli, &cfg);
    if let Err(e) = &result {
        debug!(error = ?e, "command failed");
    }
    // Flush the file sink before `process::exit` skips destructors.
    if let Some(guard) = FILE_GUARD.lock().ok().and_then(|mut g| g.take()) {
        drop(guard);
    }
    result
}

fn dispatch(cli: Cli, cfg: &gimbal_config::Config) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    let mut rig = run::build_rig(cfg, cli.store)?;
    match cli.cmd {
        Commands::Track {
            az,
            el,
            tolerance,
            max_ticks,
        } => run::track(&mut rig, az, el, tolerance, max_ticks, &shutdown),
        Commands::Calibrate => run::calibrate(&mut rig),
        Commands::Reset => run::reset(&mut rig),
        Commands::Set { name, value } => run::set(&mut rig, &name, &value),
        Commands::Status => run::status(&mut rig, cli.json),
        Commands::SelfCheck => run::self_check(&rig),
    }
}

/// Console logs go to stderr so stdout stays parseable; the optional file
/// sink always writes JSON lines.
fn init_tracing(level: &str, json: bool, logging: &Logging) {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file_layer = logging.file.as_deref().map(|path| {
        let p = Path::new(path);
        let dir = p
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = p.file_name().unwrap_or_else(|| OsStr::new("gimbal.log"));
        let appender = match logging.rotation {
            Rotation::Never => tracing_appender::rolling::never(dir, name),
            Rotation::Daily => tracing_appender::rolling::daily(dir, name),
            Rotation::Hourly => tracing_appender::rolling::hourly(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        if let Ok(mut slot) = FILE_GUARD.lock() {
            *slot = Some(guard);
        }
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_filter(EnvFilter::new(logging.level.as_deref().unwrap_or("info")))
    });

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(console.with_filter(console_filter))
        .with(file_layer)
        .try_init();
}
