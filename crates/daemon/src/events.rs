// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event fan-out server.
//!
//! Subscribers connect to a loopback TCP port and receive every lifecycle
//! event as a framed message. Producers never touch the subscriber set:
//! they push onto an internal channel whose receiving end is the fan-out
//! loop, which preserves producer order per subscriber. Subscribers do not
//! speak; reads from them exist only to notice disconnects.
//!
//! A TERMINATING event is special: it is broadcast like any other and then
//! latches an orderly shutdown, so every subscriber observes supervisor exit
//! before its connection closes.

use std::collections::HashMap;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::{EventKind, Message};
use crate::wire;

/// Handle to the fan-out task. Producers call [`EventServer::send`].
pub struct EventServer {
    tx: mpsc::UnboundedSender<Message>,
    task: Option<JoinHandle<()>>,
}

impl EventServer {
    /// Starts the fan-out loop on an already-bound listener.
    pub fn spawn(listener: TcpListener) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(listener, rx));
        Self {
            tx,
            task: Some(task),
        }
    }

    /// Queues one event for broadcast to every live subscriber.
    pub fn send(&self, job: &str, kind: EventKind) {
        let _ = self.tx.send(Message::Event {
            job: job.to_string(),
            kind,
        });
    }

    /// Broadcasts TERMINATING; the fan-out loop shuts down after delivering
    /// it. Idempotent, does not wait.
    pub fn terminate(&self) {
        self.send("", EventKind::Terminating);
    }

    /// Blocks until the fan-out loop has closed its listener and every
    /// remaining subscriber. Cancel-safe.
    pub async fn wait_for_exit(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }
}

async fn run(listener: TcpListener, mut events: mpsc::UnboundedReceiver<Message>) {
    // Disconnect notices from the per-subscriber watchers.
    let (gone_tx, mut gone_rx) = mpsc::unbounded_channel::<u64>();
    let mut subscribers: HashMap<u64, OwnedWriteHalf> = HashMap::new();
    let mut next_id: u64 = 0;

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!(%addr, "subscriber connected");
                    let (read_half, write_half) = stream.into_split();
                    let id = next_id;
                    next_id += 1;
                    subscribers.insert(id, write_half);
                    tokio::spawn(watch_subscriber(id, read_half, gone_tx.clone()));
                }
                Err(e) => warn!(error = %e, "accept failed on event endpoint"),
            },

            event = events.recv() => {
                let Some(event) = event else { break };
                let data = match wire::frame(&event) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(error = %e, "unencodable event dropped");
                        continue;
                    }
                };

                let mut dead = Vec::new();
                for (id, subscriber) in subscribers.iter_mut() {
                    if let Err(e) = subscriber.write_all(&data).await {
                        debug!(error = %e, "dropping subscriber mid-broadcast");
                        dead.push(*id);
                    }
                }
                for id in dead {
                    subscribers.remove(&id);
                }

                if matches!(event, Message::Event { kind: EventKind::Terminating, .. }) {
                    break;
                }
            },

            Some(id) = gone_rx.recv() => {
                if subscribers.remove(&id).is_some() {
                    debug!("subscriber disconnected");
                }
            },
        }
    }

    // Dropping the listener and every write half closes the connections.
    debug!("event server stopped");
}

/// Reads from a subscriber until it disconnects, then reports the id.
async fn watch_subscriber(id: u64, mut read_half: OwnedReadHalf, gone: mpsc::UnboundedSender<u64>) {
    let mut buf = [0u8; 64];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            // Subscribers have nothing to say; discard anything they send.
            Ok(_) => {}
        }
    }
    let _ = gone.send(id);
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
