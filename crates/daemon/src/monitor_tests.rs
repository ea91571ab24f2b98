// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Instant};

use shep_core::JobSpec;

use super::*;
use crate::wire;

async fn wait_until_stopped(monitor: &ChildMonitor, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if !monitor.is_running() {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    !monitor.is_running()
}

#[tokio::test(flavor = "multi_thread")]
async fn runs_command_and_appends_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("job.out");

    let mut spec = JobSpec::new("echo hello");
    spec.stdout = out.clone();
    let monitor = ChildMonitor::new("echoer", spec);

    monitor.start().unwrap();
    assert!(wait_until_stopped(&monitor, Duration::from_secs(5)).await);

    // Append mode: a second run adds a line instead of truncating.
    monitor.start().unwrap();
    assert!(wait_until_stopped(&monitor, Duration::from_secs(5)).await);

    let output = std::fs::read_to_string(&out).unwrap();
    assert_eq!(output, "hello\nhello\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn start_while_running_fails() {
    let monitor = ChildMonitor::new("sleeper", JobSpec::new("sleep 5"));

    monitor.start().unwrap();
    assert!(matches!(
        monitor.start(),
        Err(MonitorError::AlreadyRunning)
    ));

    monitor.kill().unwrap();
    assert!(wait_until_stopped(&monitor, Duration::from_secs(5)).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn kill_while_stopped_fails() {
    let monitor = ChildMonitor::new("idle", JobSpec::new("true"));
    assert!(matches!(monitor.kill(), Err(MonitorError::NotRunning)));
}

#[tokio::test(flavor = "multi_thread")]
async fn kill_stops_a_running_job() {
    let monitor = ChildMonitor::new("sleeper", JobSpec::new("sleep 30"));

    monitor.start().unwrap();
    assert!(monitor.is_running());
    assert!(monitor.pid().is_some());

    monitor.kill().unwrap();
    assert!(wait_until_stopped(&monitor, Duration::from_secs(5)).await);
    assert_eq!(monitor.pid(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn env_overlay_reaches_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("env.out");

    let mut spec = JobSpec::new("echo $SHEP_MONITOR_TEST");
    spec.stdout = out.clone();
    spec.env
        .insert("SHEP_MONITOR_TEST".to_string(), "overlay".to_string());
    let monitor = ChildMonitor::new("env-check", spec);

    monitor.start().unwrap();
    assert!(wait_until_stopped(&monitor, Duration::from_secs(5)).await);

    let output = std::fs::read_to_string(&out).unwrap();
    assert_eq!(output.trim(), "overlay");
}

#[tokio::test(flavor = "multi_thread")]
async fn working_dir_applies_before_exec() {
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path().canonicalize().unwrap();
    let out = dir.path().join("pwd.out");

    let mut spec = JobSpec::new("pwd");
    spec.stdout = out.clone();
    spec.working_dir = Some(workdir.clone());
    let monitor = ChildMonitor::new("pwd-check", spec);

    monitor.start().unwrap();
    assert!(wait_until_stopped(&monitor, Duration::from_secs(5)).await);

    let output = std::fs::read_to_string(&out).unwrap();
    assert_eq!(output.trim(), workdir.display().to_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn stdin_defaults_to_dev_null() {
    // cat with /dev/null on stdin sees immediate EOF and exits.
    let monitor = ChildMonitor::new("reader", JobSpec::new("cat"));
    monitor.start().unwrap();
    assert!(wait_until_stopped(&monitor, Duration::from_secs(5)).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn unopenable_stdout_fails_start() {
    let mut spec = JobSpec::new("true");
    spec.stdout = std::path::PathBuf::from("/nonexistent-dir/job.out");
    let monitor = ChildMonitor::new("doomed", spec);

    assert!(matches!(
        monitor.start(),
        Err(MonitorError::OpenStdio { .. })
    ));
    assert!(!monitor.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn reports_start_and_stop_to_the_peer() {
    let inbox = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let peer = StatusPeer::connect(inbox.local_addr().unwrap()).unwrap();

    let monitor = ChildMonitor::new("notifier", JobSpec::new("true"));
    monitor.bind_peer(peer);
    monitor.start().unwrap();

    let mut buf = [0u8; wire::MAX_DATAGRAM_SIZE];
    let (len, _) = timeout(Duration::from_secs(5), inbox.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        wire::decode_datagram(&buf[..len]).unwrap(),
        Message::Event {
            job: "notifier".to_string(),
            kind: EventKind::Started,
        }
    );

    let (len, _) = timeout(Duration::from_secs(5), inbox.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        wire::decode_datagram(&buf[..len]).unwrap(),
        Message::Event {
            job: "notifier".to_string(),
            kind: EventKind::Stopped,
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn wait_stopped_joins_the_waiter() {
    let monitor = ChildMonitor::new("sleeper", JobSpec::new("sleep 30"));
    monitor.start().unwrap();
    monitor.kill().unwrap();
    monitor.wait_stopped().await;
    assert!(!monitor.is_running());
}
