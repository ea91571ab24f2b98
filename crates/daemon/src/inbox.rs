// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The status inbox: a loopback UDP endpoint child monitors report into.
//!
//! Monitors run on waiter tasks and must never touch the job-control
//! service's state directly; instead each is handed a [`StatusPeer`] and
//! sends framed Event datagrams. The inbox decodes them and enqueues the
//! matching `job-started` / `job-stopped` requests through the shim, which
//! keeps the service the single writer.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::{EventKind, Message, ProtocolError};
use crate::shim::SupervisorHandle;
use crate::wire;

/// The receiving side. Owns the socket task; `peer()` mints senders.
pub struct StatusInbox {
    local_addr: SocketAddr,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl StatusInbox {
    /// Binds an ephemeral loopback port and starts the receive loop.
    pub async fn spawn(shim: SupervisorHandle) -> std::io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let local_addr = socket.local_addr()?;
        let shutdown = Arc::new(Notify::new());
        let task = tokio::spawn(run(socket, shim, Arc::clone(&shutdown)));
        debug!(%local_addr, "status inbox listening");
        Ok(Self {
            local_addr,
            shutdown,
            task: Some(task),
        })
    }

    /// A sending handle bound to this inbox, for handing to a child monitor.
    pub fn peer(&self) -> std::io::Result<StatusPeer> {
        StatusPeer::connect(self.local_addr)
    }

    /// Asks the receive loop to stop. Idempotent, does not wait.
    pub fn terminate(&self) {
        self.shutdown.notify_one();
    }

    /// Blocks until the receive loop has exited and closed its socket.
    /// Cancel-safe: an interrupted wait can simply be issued again.
    pub async fn wait_for_exit(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }
}

async fn run(socket: UdpSocket, shim: SupervisorHandle, shutdown: Arc<Notify>) {
    let mut buf = [0u8; wire::MAX_DATAGRAM_SIZE];
    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, _)) => dispatch(&buf[..len], &shim),
                Err(e) => warn!(error = %e, "status inbox receive failed"),
            },
            _ = shutdown.notified() => break,
        }
    }
    debug!("status inbox stopped");
}

fn dispatch(datagram: &[u8], shim: &SupervisorHandle) {
    match wire::decode_datagram(datagram) {
        Ok(Message::Event {
            job,
            kind: EventKind::Started,
        }) => shim.notify_started(&job),
        Ok(Message::Event {
            job,
            kind: EventKind::Stopped,
        }) => shim.notify_stopped(&job),
        Ok(other) => warn!(?other, "unexpected message on status inbox"),
        Err(e) => warn!(error = %e, "undecodable status datagram"),
    }
}

/// A cloneable sending handle aimed at one inbox.
///
/// Sends are plain fire-and-forget datagrams, so waiter tasks can report
/// without waiting on any lock the service holds.
#[derive(Clone)]
pub struct StatusPeer {
    socket: Arc<std::net::UdpSocket>,
    target: SocketAddr,
}

impl StatusPeer {
    /// Opens a fresh ephemeral socket aimed at `target`.
    pub fn connect(target: SocketAddr) -> std::io::Result<Self> {
        let socket = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))?;
        Ok(Self {
            socket: Arc::new(socket),
            target,
        })
    }

    /// Sends one framed message as a single datagram.
    pub fn send(&self, msg: &Message) -> Result<(), ProtocolError> {
        let datagram = wire::encode_datagram(msg)?;
        self.socket.send_to(&datagram, self.target)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "inbox_tests.rs"]
mod tests;
