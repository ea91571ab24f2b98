// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! shepd, the shep supervisor daemon.
//!
//! Runs in the foreground: loads the configuration, binds the command and
//! event endpoints, and serves until a QUIT command or a termination signal.
//! The `shep daemon` CLI command spawns this binary in the background.

use std::path::Path;

use tracing::info;

use shep_core::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let config_path = match args.next().as_deref() {
        Some("--version") | Some("-V") => {
            println!("shepd {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") | Some("-h") => {
            println!("shepd {}", env!("CARGO_PKG_VERSION"));
            println!("shep supervisor daemon - owns and monitors the configured jobs");
            println!();
            println!("USAGE:");
            println!("    shepd <CONFIG>");
            println!();
            println!("Runs in the foreground. Use `shep daemon <CONFIG>` to launch it");
            println!("in the background and wait for the endpoints to come up.");
            return Ok(());
        }
        None => {
            eprintln!("Usage: shepd <CONFIG>");
            std::process::exit(1);
        }
        Some(path) => path.to_string(),
    };
    if let Some(extra) = args.next() {
        eprintln!("error: unexpected argument '{extra}'");
        eprintln!("Usage: shepd <CONFIG>");
        std::process::exit(1);
    }

    let config = match Config::load(Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error reading configuration file: {e}");
            std::process::exit(1);
        }
    };

    // Relative job paths resolve against the configured working directory.
    std::env::set_current_dir(&config.supervisor.working_dir)?;

    let _log_guard = setup_logging(&config)?;
    info!(config = %config_path, "starting supervisor");

    let supervisor = shep_daemon::startup(&config).await?;

    // For humans running shepd directly; the CLI learns readiness by
    // polling the control port.
    println!(
        "{},{}",
        config.supervisor.control_port, config.supervisor.event_port
    );

    supervisor.run().await?;
    info!("supervisor stopped");
    Ok(())
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = &config.supervisor.log_file;
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let dir = log_path.parent().unwrap_or(Path::new("."));
    let file_name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log-file has no file name"))?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    // SHEP_LOG takes precedence over the configured level for ad-hoc
    // debugging without touching the config file.
    let filter = EnvFilter::try_from_env("SHEP_LOG")
        .unwrap_or_else(|_| EnvFilter::new(config.supervisor.log_level.clone()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}
