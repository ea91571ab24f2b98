// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::*;
use crate::protocol::FailureReason;
use crate::service::{Envelope, Request};

/// A canned stand-in for the job-control service.
fn spawn_stub_service() -> (SupervisorHandle, mpsc::UnboundedReceiver<Request>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let handle = SupervisorHandle::new(tx);

    let worker = tokio::spawn(async move {
        while let Some(Envelope { request, reply }) = rx.recv().await {
            let _ = seen_tx.send(request.clone());
            let response = match &request {
                Request::StartJob { job } => Some(Message::Success { job: job.clone() }),
                Request::StopJob { job } => Some(Message::Failure {
                    job: job.clone(),
                    reason: FailureReason::JobStopped,
                }),
                Request::GetStatus { job } => Some(Message::Status {
                    job: job.clone(),
                    is_running: true,
                    pid: Some(100),
                }),
                Request::ListJobs => Some(Message::JobList {
                    all_jobs: BTreeMap::new(),
                }),
                _ => None,
            };
            let done = request == Request::Terminate;
            let _ = reply.send(response);
            if done {
                break;
            }
        }
    });
    handle.attach_worker(worker);
    (handle, seen_rx)
}

async fn spawn_acceptor() -> (
    CommandAcceptor,
    std::net::SocketAddr,
    mpsc::UnboundedReceiver<Request>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shim, seen) = spawn_stub_service();
    (CommandAcceptor::spawn(listener, shim), addr, seen)
}

async fn exchange(addr: std::net::SocketAddr, request: Message) -> Result<Message, ProtocolError> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    wire::write_message(&mut stream, &request).await.unwrap();
    timeout(Duration::from_secs(2), wire::read_message(&mut stream))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[tokio::test]
async fn start_is_dispatched_and_answered() {
    let (_acceptor, addr, mut seen) = spawn_acceptor().await;

    let response = exchange(
        addr,
        Message::Command {
            job: Some("web".to_string()),
            command: CommandKind::Start,
        },
    )
    .await
    .unwrap();

    assert_eq!(
        response,
        Message::Success {
            job: "web".to_string()
        }
    );
    assert_eq!(
        seen.recv().await,
        Some(Request::StartJob {
            job: "web".to_string()
        })
    );
}

#[tokio::test]
async fn job_list_accepts_a_null_job() {
    let (_acceptor, addr, mut seen) = spawn_acceptor().await;

    let response = exchange(
        addr,
        Message::Command {
            job: None,
            command: CommandKind::JobList,
        },
    )
    .await
    .unwrap();

    assert!(matches!(response, Message::JobList { .. }));
    assert_eq!(seen.recv().await, Some(Request::ListJobs));
}

#[tokio::test]
async fn connection_closes_after_the_response() {
    let (_acceptor, addr, _seen) = spawn_acceptor().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    wire::write_message(
        &mut stream,
        &Message::Command {
            job: Some("web".to_string()),
            command: CommandKind::Status,
        },
    )
    .await
    .unwrap();

    let first = timeout(Duration::from_secs(2), wire::read_message(&mut stream))
        .await
        .unwrap();
    assert!(matches!(first, Ok(Message::Status { .. })));

    let second = timeout(Duration::from_secs(2), wire::read_message(&mut stream))
        .await
        .unwrap();
    assert!(matches!(second, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn quit_gets_no_response_and_stops_the_acceptor() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shim, mut seen) = spawn_stub_service();
    let mut acceptor = CommandAcceptor::spawn(listener, shim);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    wire::write_message(
        &mut stream,
        &Message::Command {
            job: None,
            command: CommandKind::Quit,
        },
    )
    .await
    .unwrap();

    let eof = timeout(Duration::from_secs(2), wire::read_message(&mut stream))
        .await
        .unwrap();
    assert!(matches!(eof, Err(ProtocolError::ConnectionClosed)));

    timeout(Duration::from_secs(2), acceptor.wait_for_exit())
        .await
        .unwrap();
    assert_eq!(seen.recv().await, Some(Request::Terminate));
}

#[tokio::test]
async fn slow_client_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shim, _seen) = spawn_stub_service();

    let client = TcpStream::connect(addr).await.unwrap();
    let (server, _) = listener.accept().await.unwrap();

    let result = handle_connection(server, &shim, Duration::from_millis(100)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
    drop(client);
}

#[tokio::test]
async fn non_command_message_is_a_protocol_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shim, _seen) = spawn_stub_service();

    let mut client = TcpStream::connect(addr).await.unwrap();
    let (server, _) = listener.accept().await.unwrap();

    wire::write_message(
        &mut client,
        &Message::Success {
            job: "web".to_string(),
        },
    )
    .await
    .unwrap();

    let result = handle_connection(server, &shim, Duration::from_secs(1)).await;
    assert!(matches!(result, Err(ProtocolError::Malformed(_))));
}

#[tokio::test]
async fn terminate_stops_the_accept_loop() {
    let (mut acceptor, addr, _seen) = spawn_acceptor().await;

    acceptor.terminate();
    timeout(Duration::from_secs(2), acceptor.wait_for_exit())
        .await
        .unwrap();

    // The listener is gone; new connections are refused.
    assert!(TcpStream::connect(addr).await.is_err());
}
