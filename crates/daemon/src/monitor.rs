// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process ownership.
//!
//! One [`ChildMonitor`] exists per catalog job. It launches the job's command
//! in a fresh process group, tracks the pid, and reports STARTED/STOPPED to
//! the status inbox as framed datagrams; it never calls into the job-control
//! service directly. Reaping happens on a detached waiter task per child, so
//! the service is never blocked on `waitpid`.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use nix::sys::signal::{kill, killpg};
use nix::unistd::Pid;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use shep_core::JobSpec;

use crate::inbox::StatusPeer;
use crate::protocol::{EventKind, Message};

/// Errors from starting or signalling a child.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("job is already running")]
    AlreadyRunning,

    #[error("job is not running")]
    NotRunning,

    #[error("failed to open {path}: {source}")]
    OpenStdio {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to spawn child: {0}")]
    Spawn(std::io::Error),
}

/// Owns the OS process for a single job.
///
/// Cloning shares the underlying state; the pid cell is written by the
/// service (through `start`) and the waiter, and read concurrently by status
/// queries.
#[derive(Clone)]
pub struct ChildMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    name: String,
    spec: JobSpec,
    pid: Mutex<Option<u32>>,
    peer: Mutex<Option<StatusPeer>>,
    waiter: Mutex<Option<JoinHandle<()>>>,
}

impl ChildMonitor {
    pub fn new(name: impl Into<String>, spec: JobSpec) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                name: name.into(),
                spec,
                pid: Mutex::new(None),
                peer: Mutex::new(None),
                waiter: Mutex::new(None),
            }),
        }
    }

    /// Attaches the status-inbox peer this monitor reports through.
    pub fn bind_peer(&self, peer: StatusPeer) {
        *self.inner.peer.lock() = Some(peer);
    }

    /// True while an un-reaped child exists for this job.
    pub fn is_running(&self) -> bool {
        self.inner.pid.lock().is_some()
    }

    /// The live child's pid, if any.
    pub fn pid(&self) -> Option<u32> {
        *self.inner.pid.lock()
    }

    /// Launches the job.
    ///
    /// The child runs `/bin/sh -c <command>` as the leader of a new process
    /// group, with the configured stdio files, environment overlay, and
    /// working directory. On success the pid is recorded, a STARTED
    /// notification is sent, and a waiter task is spawned to reap the child
    /// and send STOPPED.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), MonitorError> {
        let mut pid_slot = self.inner.pid.lock();
        if pid_slot.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }

        let spec = &self.inner.spec;
        let stdin = File::open(&spec.stdin).map_err(|source| MonitorError::OpenStdio {
            path: spec.stdin.clone(),
            source,
        })?;
        let stdout = open_append(&spec.stdout)?;
        let stderr = open_append(&spec.stderr)?;

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(&spec.command)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .envs(&spec.env)
            // Fresh process group, so a stop signal reaches the whole tree.
            .process_group(0);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(MonitorError::Spawn)?;
        let pid = child.id().ok_or_else(|| {
            MonitorError::Spawn(std::io::Error::other("child exited before pid was read"))
        })?;
        *pid_slot = Some(pid);
        drop(pid_slot);

        debug!(job = %self.inner.name, pid, "child started");
        self.notify(EventKind::Started);

        // Detached waiter: its whole job is to reap this child, clear the
        // pid, and report the stop.
        let monitor = self.clone();
        let waiter = tokio::spawn(async move {
            let status = child.wait().await;
            match status {
                Ok(status) => debug!(job = %monitor.inner.name, %status, "child exited"),
                Err(e) => error!(job = %monitor.inner.name, error = %e, "wait failed"),
            }
            *monitor.inner.pid.lock() = None;
            monitor.notify(EventKind::Stopped);
        });
        *self.inner.waiter.lock() = Some(waiter);

        Ok(())
    }

    /// Sends the configured exit signal to the job's process group.
    ///
    /// Falls back to signalling the pid directly if the group is gone, and
    /// if the pid is gone too, clears the record and treats the job as
    /// stopped; the waiter still reaps the child either way.
    pub fn kill(&self) -> Result<(), MonitorError> {
        let pid = self.pid().ok_or(MonitorError::NotRunning)?;
        let target = Pid::from_raw(pid as i32);
        let signal = self.inner.spec.exit_signal;

        if killpg(target, signal).is_ok() {
            return Ok(());
        }
        if kill(target, signal).is_ok() {
            return Ok(());
        }

        // The child raced us to the exit; nothing left to signal.
        warn!(job = %self.inner.name, pid, "process disappeared before it could be signalled");
        *self.inner.pid.lock() = None;
        Ok(())
    }

    /// Waits until the current child (if any) has been reaped by its waiter.
    pub async fn wait_stopped(&self) {
        let waiter = self.inner.waiter.lock().take();
        if let Some(waiter) = waiter {
            let _ = waiter.await;
        }
    }

    fn notify(&self, kind: EventKind) {
        let peer = self.inner.peer.lock().clone();
        let Some(peer) = peer else {
            warn!(job = %self.inner.name, "no status peer bound; dropping notification");
            return;
        };
        let message = Message::Event {
            job: self.inner.name.clone(),
            kind,
        };
        if let Err(e) = peer.send(&message) {
            debug!(job = %self.inner.name, error = %e, "failed to report lifecycle change");
        }
    }
}

fn open_append(path: &Path) -> Result<File, MonitorError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| MonitorError::OpenStdio {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
