// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

use super::*;

fn fired_channel() -> (Ticker, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let ticker = Ticker::spawn(move |key| {
        let _ = tx.send(key);
    });
    (ticker, rx)
}

async fn recv_within(rx: &mut mpsc::UnboundedReceiver<String>, limit: Duration) -> Option<String> {
    timeout(limit, rx.recv()).await.ok().flatten()
}

#[tokio::test]
async fn fires_after_deadline() {
    let (ticker, mut fired) = fired_channel();

    let registered_at = Instant::now();
    ticker.register("web", registered_at + Duration::from_millis(50));

    let key = recv_within(&mut fired, Duration::from_secs(2)).await;
    assert_eq!(key.as_deref(), Some("web"));
    assert!(registered_at.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn fires_each_registered_key_once() {
    let (ticker, mut fired) = fired_channel();

    ticker.register("a", Instant::now() + Duration::from_millis(30));
    ticker.register("b", Instant::now() + Duration::from_millis(60));

    let mut seen = vec![
        recv_within(&mut fired, Duration::from_secs(2)).await,
        recv_within(&mut fired, Duration::from_secs(2)).await,
    ];
    seen.sort();
    assert_eq!(
        seen,
        vec![Some("a".to_string()), Some("b".to_string())]
    );
    assert!(recv_within(&mut fired, Duration::from_millis(150)).await.is_none());
}

#[tokio::test]
async fn register_replaces_prior_deadline() {
    let (ticker, mut fired) = fired_channel();

    ticker.register("web", Instant::now() + Duration::from_secs(30));
    ticker.register("web", Instant::now() + Duration::from_millis(40));

    let key = recv_within(&mut fired, Duration::from_secs(2)).await;
    assert_eq!(key.as_deref(), Some("web"));
}

#[tokio::test]
async fn unregister_cancels() {
    let (ticker, mut fired) = fired_channel();

    ticker.register("web", Instant::now() + Duration::from_millis(40));
    ticker.unregister("web");

    assert!(recv_within(&mut fired, Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn unregister_unknown_key_is_harmless() {
    let (ticker, mut fired) = fired_channel();

    ticker.unregister("ghost");
    ticker.register("web", Instant::now() + Duration::from_millis(40));

    let key = recv_within(&mut fired, Duration::from_secs(2)).await;
    assert_eq!(key.as_deref(), Some("web"));
}

#[tokio::test]
async fn terminate_stops_the_task() {
    let (mut ticker, mut fired) = fired_channel();

    ticker.register("web", Instant::now() + Duration::from_millis(50));
    ticker.terminate();
    ticker.wait_for_exit().await;

    assert!(recv_within(&mut fired, Duration::from_millis(200)).await.is_none());
}
