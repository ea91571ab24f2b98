// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The command acceptor.
//!
//! Each connection is one exchange: read a single framed Command under a
//! read deadline, dispatch it to exactly one shim method, write the response
//! (best effort, the client may have given up), close. Connections are
//! handled sequentially; the service serialises everything anyway, so one
//! request in flight at a time loses nothing.
//!
//! QUIT is the odd one out: it runs the whole supervisor shutdown before the
//! accept loop breaks, and gets no response.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::{CommandKind, Message, ProtocolError};
use crate::shim::SupervisorHandle;
use crate::wire;

/// Handle to the acceptor task.
pub struct CommandAcceptor {
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl CommandAcceptor {
    /// Starts the accept loop on an already-bound listener.
    pub fn spawn(listener: TcpListener, shim: SupervisorHandle) -> Self {
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(run(listener, shim, Arc::clone(&shutdown)));
        Self {
            shutdown,
            task: Some(task),
        }
    }

    /// Asks the accept loop to stop. Idempotent, does not wait.
    pub fn terminate(&self) {
        self.shutdown.notify_one();
    }

    /// Blocks until the accept loop has exited and the listener is closed.
    /// Cancel-safe: an interrupted wait can simply be issued again.
    pub async fn wait_for_exit(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }
}

async fn run(listener: TcpListener, shim: SupervisorHandle, shutdown: Arc<Notify>) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!(%addr, "command connection");
                    match handle_connection(stream, &shim, wire::COMMAND_TIMEOUT).await {
                        Ok(quit) => {
                            if quit {
                                info!("quit received; closing command endpoint");
                                break;
                            }
                        }
                        Err(ProtocolError::Timeout) => warn!("command connection timed out"),
                        Err(ProtocolError::ConnectionClosed) => debug!("client disconnected"),
                        Err(e) => warn!(error = %e, "command connection failed"),
                    }
                }
                Err(e) => error!(error = %e, "accept failed on command endpoint"),
            },
            _ = shutdown.notified() => break,
        }
    }
    debug!("command acceptor stopped");
}

/// Serves one connection. Returns whether the command was QUIT.
async fn handle_connection(
    stream: TcpStream,
    shim: &SupervisorHandle,
    timeout: Duration,
) -> Result<bool, ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();

    let message = wire::read_message_timeout(&mut reader, timeout).await?;
    let Message::Command { job, command } = message else {
        return Err(ProtocolError::Malformed("command"));
    };
    let job = job.unwrap_or_default();

    let response = match command {
        CommandKind::Start => shim.start_job(&job).await,
        CommandKind::Stop => shim.stop_job(&job).await,
        CommandKind::Status => shim.get_status(&job).await,
        CommandKind::JobList => shim.list_jobs().await,
        CommandKind::Quit => {
            // Blocks until the whole supervisor has shut down.
            shim.terminate().await;
            None
        }
    };

    if let Some(response) = response {
        if let Err(e) = wire::write_message(&mut writer, &response).await {
            debug!(error = %e, "failed to write response");
        }
    }

    Ok(command == CommandKind::Quit)
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
