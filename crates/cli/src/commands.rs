// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Implementations of the CLI subcommands.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use shep_core::Config;
use shep_daemon::EventKind;

use crate::client::{CommandClient, EventStream, Ports};
use crate::client_error;
use crate::daemon_process::{spawn_daemon, wait_for_control_port};
use crate::exit_error::{exit_with, silent_exit};

/// How long `shep daemon` waits for the new daemon to start serving.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Validates the configuration, launches shepd in the background, waits for
/// the control port, and prints the port pair.
pub async fn daemon(config_path: &Path) -> Result<()> {
    // Surface configuration mistakes here, where the user can see them,
    // instead of in a background daemon's log.
    let config = Config::load(config_path)
        .with_context(|| format!("invalid configuration {}", config_path.display()))?;

    let control_port = config.supervisor.control_port;
    let event_port = config.supervisor.event_port;

    let mut child = spawn_daemon(config_path).context("failed to launch shepd")?;

    if !wait_for_control_port(control_port, STARTUP_TIMEOUT).await {
        // The daemon either crashed or cannot bind; reap it if it died.
        let _ = child.try_wait();
        return Err(exit_with(
            1,
            format!(
                "daemon did not start listening on port {control_port}; check {}",
                config.supervisor.log_file.display()
            ),
        ));
    }

    println!("{control_port},{event_port}");
    Ok(())
}

pub async fn start(ports: Ports, job: &str) -> Result<()> {
    CommandClient::new(ports)
        .start_job(job)
        .await
        .map_err(client_error)
}

pub async fn stop(ports: Ports, job: &str) -> Result<()> {
    CommandClient::new(ports)
        .stop_job(job)
        .await
        .map_err(client_error)
}

pub async fn status(ports: Ports, job: &str) -> Result<()> {
    let (is_running, _) = CommandClient::new(ports)
        .status(job)
        .await
        .map_err(client_error)?;
    if is_running {
        Ok(())
    } else {
        Err(silent_exit(1))
    }
}

pub async fn pid(ports: Ports, job: &str) -> Result<()> {
    let (_, pid) = CommandClient::new(ports)
        .status(job)
        .await
        .map_err(client_error)?;
    match pid {
        Some(pid) => {
            println!("{pid}");
            Ok(())
        }
        None => Err(silent_exit(1)),
    }
}

pub async fn list_jobs(ports: Ports) -> Result<()> {
    let jobs = CommandClient::new(ports)
        .list_jobs()
        .await
        .map_err(client_error)?;
    for (job, is_running) in jobs {
        if is_running {
            println!("RUNNING {job}");
        } else {
            println!("STOPPED {job}");
        }
    }
    Ok(())
}

pub async fn terminate(ports: Ports) -> Result<()> {
    CommandClient::new(ports)
        .terminate()
        .await
        .map_err(client_error)
}

pub async fn listen(ports: Ports, count: i64) -> Result<()> {
    let mut stream = EventStream::connect(ports).await.map_err(client_error)?;
    let mut remaining = if count <= 0 { None } else { Some(count) };

    loop {
        let (job, kind) = match stream.next_event().await {
            Ok(event) => event,
            // The supervisor went away; that ends the stream, not the CLI.
            Err(_) => break,
        };
        match kind {
            EventKind::Started => println!("RUNNING {job}"),
            EventKind::Stopped => println!("STOPPED {job}"),
            EventKind::Restarted => println!("RESTARTING {job}"),
            EventKind::Terminating => {
                println!("TERMINATE");
                break;
            }
        }
        if let Some(left) = remaining.as_mut() {
            *left -= 1;
            if *left <= 0 {
                break;
            }
        }
    }
    Ok(())
}

pub async fn wait(ports: Ports, job: &str) -> Result<()> {
    let mut stream = EventStream::connect(ports).await.map_err(client_error)?;
    loop {
        match stream.next_event().await {
            Ok((event_job, _)) if event_job == job => return Ok(()),
            // TERMINATING carries an empty job name, so it falls through
            // here unless the supervisor died first.
            Ok(_) => continue,
            Err(_) => return Ok(()),
        }
    }
}
