// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The timer wheel that schedules deferred relaunches.
//!
//! A single task owns the `key → absolute deadline` map. Registrations and
//! removals arrive over a command channel, which also wakes the task out of
//! its sleep so a nearer deadline takes effect immediately. The scan is
//! O(N); N is bounded by the job count.

use std::collections::HashMap;
use std::future::pending;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

enum TickerMsg {
    Register { key: String, deadline: Instant },
    Unregister { key: String },
    Shutdown,
}

/// Handle to the timer task.
pub struct Ticker {
    tx: mpsc::UnboundedSender<TickerMsg>,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Starts the timer task. `callback` runs on the ticker's task for every
    /// expired key and must not block indefinitely.
    pub fn spawn<F>(callback: F) -> Self
    where
        F: Fn(String) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(rx, callback));
        Self {
            tx,
            task: Some(task),
        }
    }

    /// Schedules `key` to fire at `deadline`, replacing any prior entry.
    pub fn register(&self, key: &str, deadline: Instant) {
        let _ = self.tx.send(TickerMsg::Register {
            key: key.to_string(),
            deadline,
        });
    }

    /// Removes `key` if it is pending.
    pub fn unregister(&self, key: &str) {
        let _ = self.tx.send(TickerMsg::Unregister {
            key: key.to_string(),
        });
    }

    /// Asks the timer task to stop. Idempotent, does not wait.
    pub fn terminate(&self) {
        let _ = self.tx.send(TickerMsg::Shutdown);
    }

    /// Blocks until the timer task has exited. Cancel-safe.
    pub async fn wait_for_exit(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }
}

async fn run<F>(mut rx: mpsc::UnboundedReceiver<TickerMsg>, callback: F)
where
    F: Fn(String) + Send + 'static,
{
    let mut deadlines: HashMap<String, Instant> = HashMap::new();

    loop {
        let nearest = deadlines.values().min().copied();
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(TickerMsg::Register { key, deadline }) => {
                    debug!(key = %key, "registering timer");
                    deadlines.insert(key, deadline);
                }
                Some(TickerMsg::Unregister { key }) => {
                    deadlines.remove(&key);
                }
                Some(TickerMsg::Shutdown) | None => break,
            },
            _ = wait_until(nearest) => {
                let now = Instant::now();
                let expired: Vec<String> = deadlines
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in expired {
                    deadlines.remove(&key);
                    debug!(key = %key, "timer expired");
                    callback(key);
                }
            }
        }
    }
    debug!("ticker stopped");
}

/// Sleeps until `deadline`, or forever when there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "ticker_tests.rs"]
mod tests;
