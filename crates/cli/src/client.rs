// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client library for the two supervisor endpoints.
//!
//! [`CommandClient`] speaks the one-request-one-response command endpoint;
//! [`EventStream`] holds a long-lived subscription to the event endpoint.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

use shep_daemon::protocol::ProtocolError;
use shep_daemon::wire;
use shep_daemon::{CommandKind, EventKind, FailureReason, Message};

/// How long to wait for the supervisor's response to a command.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(15);

/// The two supervisor ports, as carried by `--ports` / `SHEP_PORTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    pub control: u16,
    pub event: u16,
}

impl Ports {
    /// Parses `"CONTROL,EVENT"`.
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let mut parts = raw.split(',');
        let control = parts.next().map(str::trim).unwrap_or("");
        let event = parts.next().map(str::trim).unwrap_or("");
        if parts.next().is_some() {
            return Err(ClientError::BadPorts(raw.to_string()));
        }
        let control = control
            .parse()
            .map_err(|_| ClientError::BadPorts(raw.to_string()))?;
        let event = event
            .parse()
            .map_err(|_| ClientError::BadPorts(raw.to_string()))?;
        Ok(Ports { control, event })
    }
}

/// Client-side failures, mapped onto CLI exit codes by the front-end.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not a valid port pair (expected CONTROL,EVENT): {0}")]
    BadPorts(String),

    #[error("could not connect to the supervisor on port {port}: {source}")]
    Connect {
        port: u16,
        source: std::io::Error,
    },

    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    #[error("no such job: {0}")]
    NoSuchJob(String),

    #[error("job already running: {0}")]
    AlreadyRunning(String),

    #[error("job not running: {0}")]
    NotRunning(String),

    #[error("unexpected response from the supervisor")]
    Unexpected,
}

impl ClientError {
    fn from_failure(job: String, reason: FailureReason) -> Self {
        match reason {
            FailureReason::NoSuchJob => ClientError::NoSuchJob(job),
            FailureReason::JobStarted => ClientError::AlreadyRunning(job),
            FailureReason::JobStopped => ClientError::NotRunning(job),
        }
    }
}

/// One-shot command exchanges with the supervisor.
pub struct CommandClient {
    control_port: u16,
}

impl CommandClient {
    pub fn new(ports: Ports) -> Self {
        Self {
            control_port: ports.control,
        }
    }

    async fn connect(&self) -> Result<TcpStream, ClientError> {
        TcpStream::connect((Ipv4Addr::LOCALHOST, self.control_port))
            .await
            .map_err(|source| ClientError::Connect {
                port: self.control_port,
                source,
            })
    }

    /// Sends one command and reads the single response.
    async fn exchange(
        &self,
        job: Option<String>,
        command: CommandKind,
    ) -> Result<Message, ClientError> {
        let mut stream = self.connect().await?;
        wire::write_message(&mut stream, &Message::Command { job, command }).await?;
        Ok(wire::read_message_timeout(&mut stream, RESPONSE_TIMEOUT).await?)
    }

    pub async fn start_job(&self, job: &str) -> Result<(), ClientError> {
        match self.exchange(Some(job.to_string()), CommandKind::Start).await? {
            Message::Success { .. } => Ok(()),
            Message::Failure { job, reason } => Err(ClientError::from_failure(job, reason)),
            _ => Err(ClientError::Unexpected),
        }
    }

    pub async fn stop_job(&self, job: &str) -> Result<(), ClientError> {
        match self.exchange(Some(job.to_string()), CommandKind::Stop).await? {
            Message::Success { .. } => Ok(()),
            Message::Failure { job, reason } => Err(ClientError::from_failure(job, reason)),
            _ => Err(ClientError::Unexpected),
        }
    }

    /// Returns `(is_running, pid)`.
    pub async fn status(&self, job: &str) -> Result<(bool, Option<u32>), ClientError> {
        match self.exchange(Some(job.to_string()), CommandKind::Status).await? {
            Message::Status {
                is_running, pid, ..
            } => Ok((is_running, pid)),
            Message::Failure { job, reason } => Err(ClientError::from_failure(job, reason)),
            _ => Err(ClientError::Unexpected),
        }
    }

    pub async fn list_jobs(&self) -> Result<BTreeMap<String, bool>, ClientError> {
        match self.exchange(None, CommandKind::JobList).await? {
            Message::JobList { all_jobs } => Ok(all_jobs),
            Message::Failure { job, reason } => Err(ClientError::from_failure(job, reason)),
            _ => Err(ClientError::Unexpected),
        }
    }

    /// Asks the supervisor to shut down. QUIT gets no response; the
    /// supervisor closes the connection once teardown is finished.
    pub async fn terminate(&self) -> Result<(), ClientError> {
        let mut stream = self.connect().await?;
        wire::write_message(
            &mut stream,
            &Message::Command {
                job: None,
                command: CommandKind::Quit,
            },
        )
        .await?;

        // Wait for the close so callers observe full shutdown. The
        // supervisor never replies here; anything but EOF is unexpected.
        match wire::read_message(&mut stream).await {
            Err(ProtocolError::ConnectionClosed) => Ok(()),
            Err(e) => Err(ClientError::Protocol(e)),
            Ok(_) => Err(ClientError::Unexpected),
        }
    }
}

/// A subscription to the event endpoint.
pub struct EventStream {
    stream: TcpStream,
}

impl EventStream {
    pub async fn connect(ports: Ports) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((Ipv4Addr::LOCALHOST, ports.event))
            .await
            .map_err(|source| ClientError::Connect {
                port: ports.event,
                source,
            })?;
        Ok(Self { stream })
    }

    /// Blocks for the next event. Subscriber reads have no deadline; a job
    /// can legitimately stay quiet for hours.
    pub async fn next_event(&mut self) -> Result<(String, EventKind), ClientError> {
        match wire::read_message(&mut self.stream).await? {
            Message::Event { job, kind } => Ok((job, kind)),
            _ => Err(ClientError::Unexpected),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
