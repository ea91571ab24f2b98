// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup wiring and the daemon main loop.
//!
//! `startup` binds every endpoint, builds the worker tasks, wires them
//! through the shim, and enqueues init (which autostarts jobs). `run` then
//! serves until a QUIT command or a termination signal, funnelling both into
//! the same shutdown sequence.

use std::net::Ipv4Addr;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::info;

use shep_core::Config;

use crate::events::EventServer;
use crate::inbox::StatusInbox;
use crate::listener::CommandAcceptor;
use crate::service::Service;
use crate::shim::SupervisorHandle;
use crate::ticker::Ticker;

/// Fatal startup errors; the daemon exits on any of these.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind command endpoint on port {port}: {source}")]
    BindControl {
        port: u16,
        source: std::io::Error,
    },

    #[error("failed to bind event endpoint on port {port}: {source}")]
    BindEvents {
        port: u16,
        source: std::io::Error,
    },

    #[error("failed to bind status inbox: {0}")]
    BindInbox(std::io::Error),

    #[error("failed to install signal handler: {0}")]
    Signals(std::io::Error),
}

/// A fully wired, serving supervisor.
pub struct Supervisor {
    shim: SupervisorHandle,
    acceptor: CommandAcceptor,
}

/// Binds the endpoints and starts every worker.
pub async fn startup(config: &Config) -> Result<Supervisor, LifecycleError> {
    let control_port = config.supervisor.control_port;
    let event_port = config.supervisor.event_port;

    let control = TcpListener::bind((Ipv4Addr::LOCALHOST, control_port))
        .await
        .map_err(|source| LifecycleError::BindControl {
            port: control_port,
            source,
        })?;
    let events_listener = TcpListener::bind((Ipv4Addr::LOCALHOST, event_port))
        .await
        .map_err(|source| LifecycleError::BindEvents {
            port: event_port,
            source,
        })?;

    let (tx, rx) = mpsc::unbounded_channel();
    let shim = SupervisorHandle::new(tx);

    let inbox = StatusInbox::spawn(shim.clone())
        .await
        .map_err(LifecycleError::BindInbox)?;
    let events = EventServer::spawn(events_listener);
    let ticker = {
        let handle = shim.clone();
        Ticker::spawn(move |job| handle.timer_expired(job))
    };

    let service = Service::new(config.jobs.clone(), events, inbox, ticker);
    shim.attach_worker(service.spawn(rx));
    shim.init();

    let acceptor = CommandAcceptor::spawn(control, shim.clone());

    info!(control_port, event_port, "supervisor serving");
    Ok(Supervisor { shim, acceptor })
}

impl Supervisor {
    /// Serves until a QUIT command or SIGTERM/SIGINT.
    pub async fn run(mut self) -> Result<(), LifecycleError> {
        let mut sigterm = signal(SignalKind::terminate()).map_err(LifecycleError::Signals)?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(LifecycleError::Signals)?;

        let signalled = tokio::select! {
            // QUIT path: the acceptor already ran the shutdown sequence.
            _ = self.acceptor.wait_for_exit() => false,
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                true
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                true
            }
        };

        if signalled {
            self.shim.terminate().await;
            self.acceptor.terminate();
            self.acceptor.wait_for_exit().await;
        }
        Ok(())
    }
}
