// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! shep - CLI for the shep supervisor.
//!
//! `shep daemon <config>` launches `shepd` in the background; every other
//! command is a thin client over the supervisor's two loopback endpoints.
//! Exit codes: 0 success (or job running), 1 not running / transport
//! failure, 2 no such job.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod daemon_process;
mod exit_error;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::client::{ClientError, Ports};
use crate::exit_error::{exit_with, ExitError};

#[derive(Parser)]
#[command(
    name = "shep",
    version,
    about = "Supervisor for long-running local jobs"
)]
struct Cli {
    /// Supervisor ports as CONTROL,EVENT (defaults to $SHEP_PORTS)
    #[arg(long, global = true, value_name = "CTRL,EVT")]
    ports: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a supervisor daemon for a configuration file and print its
    /// ports as CONTROL,EVENT (the format $SHEP_PORTS expects)
    Daemon {
        /// Path to the JSON configuration file
        config: PathBuf,
    },
    /// Start a job
    Start {
        /// Name of the job to start
        job: String,
    },
    /// Stop a job. The job will not be auto-restarted again until the next
    /// explicit start
    Stop {
        /// Name of the job to stop
        job: String,
    },
    /// Query a job (exit 0 if running, 1 if stopped, 2 if unknown)
    Status {
        /// Name of the job to query
        job: String,
    },
    /// Print the pid of a running job (exit codes as for status)
    Pid {
        /// Name of the job to query
        job: String,
    },
    /// List every job with its running state
    ListJobs,
    /// Shut the supervisor down, stopping every running job
    Terminate,
    /// Print events as they happen; COUNT of zero or less streams until the
    /// supervisor terminates
    Listen {
        /// How many events to print
        #[arg(allow_hyphen_values = true)]
        count: i64,
    },
    /// Block until the next event that concerns a job
    Wait {
        /// Name of the job to wait on
        job: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e.downcast_ref::<ExitError>().map_or(1, |exit| exit.code);
        let message = e.to_string();
        if !message.is_empty() {
            eprintln!("Error: {message}");
        }
        std::process::exit(code);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon { config } => commands::daemon(&config).await,
        Commands::Start { job } => commands::start(ports(cli.ports.as_deref())?, &job).await,
        Commands::Stop { job } => commands::stop(ports(cli.ports.as_deref())?, &job).await,
        Commands::Status { job } => commands::status(ports(cli.ports.as_deref())?, &job).await,
        Commands::Pid { job } => commands::pid(ports(cli.ports.as_deref())?, &job).await,
        Commands::ListJobs => commands::list_jobs(ports(cli.ports.as_deref())?).await,
        Commands::Terminate => commands::terminate(ports(cli.ports.as_deref())?).await,
        Commands::Listen { count } => commands::listen(ports(cli.ports.as_deref())?, count).await,
        Commands::Wait { job } => commands::wait(ports(cli.ports.as_deref())?, &job).await,
    }
}

/// Resolves the port pair from `--ports` or `$SHEP_PORTS`.
fn ports(flag: Option<&str>) -> Result<Ports> {
    let raw = match flag {
        Some(raw) => raw.to_string(),
        None => std::env::var("SHEP_PORTS").map_err(|_| {
            exit_with(
                1,
                "no supervisor ports given; pass --ports CONTROL,EVENT or set $SHEP_PORTS",
            )
        })?,
    };
    Ports::parse(&raw).map_err(|e| exit_with(1, e.to_string()))
}

/// Maps a client error onto the documented exit codes.
fn client_error(e: ClientError) -> anyhow::Error {
    let code = match e {
        ClientError::NoSuchJob(_) => 2,
        _ => 1,
    };
    exit_with(code, e.to_string())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
