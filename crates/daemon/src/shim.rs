// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The facade every collaborator talks to the job-control service through.
//!
//! Each call wraps its arguments in a [`Request`](crate::service) and
//! enqueues it with a one-shot reply channel; the caller blocks (if it cares)
//! until the service has applied the mutation. Once the service has stopped,
//! calls resolve immediately with no value instead of erroring; late
//! notifications during shutdown are expected and harmless.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::protocol::Message;
use crate::service::{Envelope, Request};

/// Cloneable handle to the job-control service.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SupervisorHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self {
            tx,
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Records the service worker so `terminate` can join it.
    pub(crate) fn attach_worker(&self, task: JoinHandle<()>) {
        *self.worker.lock() = Some(task);
    }

    fn submit(&self, request: Request) -> oneshot::Receiver<Option<Message>> {
        debug!(?request, "queueing request");
        let (reply_tx, reply_rx) = oneshot::channel();
        if let Err(returned) = self.tx.send(Envelope {
            request,
            reply: reply_tx,
        }) {
            // The service has exited; resolve the caller right away.
            let Envelope { reply, .. } = returned.0;
            let _ = reply.send(None);
        }
        reply_rx
    }

    async fn request(&self, request: Request) -> Option<Message> {
        self.submit(request).await.unwrap_or(None)
    }

    /// Wires monitors to the inbox and launches the autostart jobs.
    /// Issued once by the launcher; fire-and-forget.
    pub(crate) fn init(&self) {
        drop(self.submit(Request::Init));
    }

    /// Reports a monitor's process-start notification.
    pub fn notify_started(&self, job: &str) {
        drop(self.submit(Request::JobStarted {
            job: job.to_string(),
        }));
    }

    /// Reports a monitor's process-stop notification.
    pub fn notify_stopped(&self, job: &str) {
        drop(self.submit(Request::JobStopped {
            job: job.to_string(),
        }));
    }

    /// Reports an expired relaunch timer. Callback for the ticker.
    pub fn timer_expired(&self, job: String) {
        drop(self.submit(Request::TimerExpired { job }));
    }

    pub async fn start_job(&self, job: &str) -> Option<Message> {
        self.request(Request::StartJob {
            job: job.to_string(),
        })
        .await
    }

    pub async fn stop_job(&self, job: &str) -> Option<Message> {
        self.request(Request::StopJob {
            job: job.to_string(),
        })
        .await
    }

    pub async fn get_status(&self, job: &str) -> Option<Message> {
        self.request(Request::GetStatus {
            job: job.to_string(),
        })
        .await
    }

    pub async fn list_jobs(&self) -> Option<Message> {
        self.request(Request::ListJobs).await
    }

    /// Runs the full shutdown sequence and joins the service worker, so the
    /// caller can block on complete supervisor teardown.
    pub async fn terminate(&self) {
        self.request(Request::Terminate).await;
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}
