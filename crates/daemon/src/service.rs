// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job-control service: the single writer for all job state.
//!
//! Every mutation (manual starts and stops, monitor notifications, timer
//! expiries, shutdown) arrives as a queued request and is applied by one
//! worker task, one request at a time. Nothing here takes a lock on job
//! state because nothing else can touch it.
//!
//! Restart policy: a restart-type job that exits is relaunched immediately,
//! unless it already restarted within [`RESTART_TIMEOUT`]. That means it is
//! flapping, and the relaunch is deferred by [`RESTART_BACKOFF`] through the
//! ticker. Stopping a job blocks the policy until the next explicit start.

use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use shep_core::JobSpec;

use crate::events::EventServer;
use crate::inbox::StatusInbox;
use crate::monitor::{ChildMonitor, MonitorError};
use crate::protocol::{EventKind, FailureReason, Message};
use crate::ticker::Ticker;

/// Two restarts closer together than this mean the job is flapping.
pub const RESTART_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a flapping job's next launch is deferred.
pub const RESTART_BACKOFF: Duration = Duration::from_secs(10);

/// One unit of work for the service worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    Init,
    Terminate,
    JobStarted { job: String },
    JobStopped { job: String },
    StartJob { job: String },
    StopJob { job: String },
    GetStatus { job: String },
    ListJobs,
    TimerExpired { job: String },
}

/// A request paired with its reply slot. Requests that produce no response
/// resolve the reply with `None` once they have been applied.
pub(crate) struct Envelope {
    pub request: Request,
    pub reply: oneshot::Sender<Option<Message>>,
}

struct JobState {
    monitor: ChildMonitor,
    autostart: bool,
    restart: bool,
    /// When the job was last relaunched by the restart policy. Present means
    /// a relaunch happened recently or is pending on the ticker.
    last_restart_at: Option<Instant>,
    /// Suppresses the restart policy until the next explicit start.
    restart_blocked: bool,
}

/// The service itself; owns the catalog and every collaborator handle.
pub(crate) struct Service {
    jobs: IndexMap<String, JobState>,
    events: EventServer,
    inbox: StatusInbox,
    ticker: Ticker,
}

impl Service {
    pub fn new(
        catalog: IndexMap<String, JobSpec>,
        events: EventServer,
        inbox: StatusInbox,
        ticker: Ticker,
    ) -> Self {
        let jobs = catalog
            .into_iter()
            .map(|(name, spec)| {
                let autostart = spec.autostart;
                let restart = spec.restart;
                let state = JobState {
                    monitor: ChildMonitor::new(name.clone(), spec),
                    autostart,
                    restart,
                    last_restart_at: None,
                    restart_blocked: false,
                };
                (name, state)
            })
            .collect();
        Self {
            jobs,
            events,
            inbox,
            ticker,
        }
    }

    /// Spawns the worker loop.
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<Envelope>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        info!(jobs = self.jobs.len(), "job-control service started");

        while let Some(Envelope { request, reply }) = rx.recv().await {
            debug!(?request, "applying request");
            let mut done = false;
            let response = match request {
                Request::Init => {
                    self.init();
                    None
                }
                Request::Terminate => {
                    self.terminate().await;
                    done = true;
                    None
                }
                Request::JobStarted { job } => {
                    self.events.send(&job, EventKind::Started);
                    None
                }
                Request::JobStopped { job } => {
                    self.handle_stopped(&job);
                    None
                }
                Request::StartJob { job } => Some(self.start_job(&job)),
                Request::StopJob { job } => Some(self.stop_job(&job)),
                Request::GetStatus { job } => Some(self.get_status(&job)),
                Request::ListJobs => Some(self.list_jobs()),
                Request::TimerExpired { job } => {
                    self.handle_timer_expired(&job);
                    None
                }
            };
            let _ = reply.send(response);
            if done {
                break;
            }
        }

        info!("job-control service stopped");
    }

    /// Binds every monitor to the status inbox and launches autostart jobs.
    fn init(&mut self) {
        for (name, state) in &self.jobs {
            match self.inbox.peer() {
                Ok(peer) => state.monitor.bind_peer(peer),
                Err(e) => error!(job = %name, error = %e, "failed to create status peer"),
            }
        }
        for (name, state) in &self.jobs {
            if state.autostart {
                info!(job = %name, "autostarting");
                if let Err(e) = state.monitor.start() {
                    error!(job = %name, error = %e, "autostart failed");
                }
            }
        }
    }

    fn start_job(&mut self, job: &str) -> Message {
        let Some(state) = self.jobs.get_mut(job) else {
            return failure(job, FailureReason::NoSuchJob);
        };

        if state.restart_blocked && state.last_restart_at.is_some() {
            // A deferred relaunch is already pending; the timer owns it and
            // will emit the RESTARTED. Unregistering here would strand the
            // job with nobody left to start it.
            debug!(job, "start folded into pending relaunch");
            return success(job);
        }

        if state.restart_blocked {
            state.restart_blocked = false;
            // No relaunch pending, but clear any stale entry.
            self.ticker.unregister(job);
        }

        if state.last_restart_at.is_some() {
            // The restart policy relaunched this job recently; it is either
            // running or about to be.
            debug!(job, "start ignored, job was just relaunched");
            return success(job);
        }

        match state.monitor.start() {
            Ok(()) => success(job),
            Err(MonitorError::AlreadyRunning) => failure(job, FailureReason::JobStarted),
            Err(e) => {
                error!(job, error = %e, "start failed");
                failure(job, FailureReason::JobStarted)
            }
        }
    }

    fn stop_job(&mut self, job: &str) -> Message {
        let Some(state) = self.jobs.get_mut(job) else {
            return failure(job, FailureReason::NoSuchJob);
        };

        // A stopped job must stay stopped: block the restart policy and
        // forget any pending or recorded relaunch.
        state.restart_blocked = true;
        state.last_restart_at = None;
        self.ticker.unregister(job);

        match state.monitor.kill() {
            Ok(()) => success(job),
            Err(MonitorError::NotRunning) if state.restart => {
                // Already dead. Clients watching the event stream for this
                // job would otherwise wait forever, so synthesise the stop.
                self.events.send(job, EventKind::Stopped);
                success(job)
            }
            Err(_) => failure(job, FailureReason::JobStopped),
        }
    }

    /// A monitor reported its child gone; apply the restart policy.
    fn handle_stopped(&mut self, job: &str) {
        let Some(state) = self.jobs.get_mut(job) else {
            warn!(job, "stop notification for unknown job");
            return;
        };

        if state.restart && !state.restart_blocked {
            let now = Instant::now();
            let previous = state.last_restart_at.replace(now);

            if previous.is_some_and(|p| now.duration_since(p) <= RESTART_TIMEOUT) {
                info!(job, "flapping; deferring relaunch");
                state.restart_blocked = true;
                self.ticker.register(job, now + RESTART_BACKOFF);
            } else {
                info!(job, "relaunching after exit");
                if let Err(e) = state.monitor.start() {
                    error!(job, error = %e, "relaunch failed");
                }
                // The monitor's own notification produces the STARTED event.
            }
        } else {
            self.events.send(job, EventKind::Stopped);
        }
    }

    /// A deferred relaunch came due.
    fn handle_timer_expired(&mut self, job: &str) {
        let Some(state) = self.jobs.get_mut(job) else {
            warn!(job, "timer expired for unknown job");
            return;
        };

        info!(job, "backoff elapsed; relaunching");
        if let Err(e) = state.monitor.start() {
            error!(job, error = %e, "deferred relaunch failed");
        }
        state.restart_blocked = false;
        state.last_restart_at = Some(Instant::now());
        self.events.send(job, EventKind::Restarted);
    }

    fn get_status(&self, job: &str) -> Message {
        match self.jobs.get(job) {
            None => failure(job, FailureReason::NoSuchJob),
            Some(state) => Message::Status {
                job: job.to_string(),
                is_running: state.monitor.is_running(),
                pid: state.monitor.pid(),
            },
        }
    }

    fn list_jobs(&self) -> Message {
        let all_jobs = self
            .jobs
            .iter()
            .map(|(name, state)| (name.clone(), state.monitor.is_running()))
            .collect();
        Message::JobList { all_jobs }
    }

    /// The non-reorderable shutdown sequence.
    async fn terminate(&mut self) {
        info!("supervisor terminating");

        // Announce the coming kills while the event plumbing is still up;
        // once the inbox is down the waiters' notifications have nowhere
        // to land.
        for (name, state) in &self.jobs {
            if state.monitor.is_running() {
                self.events.send(name, EventKind::Stopped);
            }
        }

        self.inbox.terminate();
        self.inbox.wait_for_exit().await;

        self.events.terminate();
        self.events.wait_for_exit().await;

        self.ticker.terminate();
        self.ticker.wait_for_exit().await;

        for (name, state) in &self.jobs {
            if state.monitor.is_running() {
                info!(job = %name, "stopping");
                if let Err(e) = state.monitor.kill() {
                    warn!(job = %name, error = %e, "kill failed");
                }
            }
            state.monitor.wait_stopped().await;
        }
    }
}

fn success(job: &str) -> Message {
    Message::Success {
        job: job.to_string(),
    }
}

fn failure(job: &str, reason: FailureReason) -> Message {
    Message::Failure {
        job: job.to_string(),
        reason,
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
