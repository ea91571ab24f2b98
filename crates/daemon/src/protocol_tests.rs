// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use yare::parameterized;

use super::*;

fn sample_messages() -> Vec<Message> {
    let mut all_jobs = BTreeMap::new();
    all_jobs.insert("web".to_string(), true);
    all_jobs.insert("batch".to_string(), false);

    vec![
        Message::Event {
            job: "web".to_string(),
            kind: EventKind::Started,
        },
        Message::Event {
            job: String::new(),
            kind: EventKind::Terminating,
        },
        Message::Command {
            job: Some("web".to_string()),
            command: CommandKind::Start,
        },
        Message::Command {
            job: None,
            command: CommandKind::JobList,
        },
        Message::Success {
            job: "web".to_string(),
        },
        Message::Failure {
            job: "nope".to_string(),
            reason: FailureReason::NoSuchJob,
        },
        Message::Status {
            job: "web".to_string(),
            is_running: true,
            pid: Some(4242),
        },
        Message::Status {
            job: "web".to_string(),
            is_running: false,
            pid: None,
        },
        Message::JobList { all_jobs },
    ]
}

#[test]
fn round_trips_every_variant() {
    for msg in sample_messages() {
        let bytes = encode(&msg).unwrap();
        let back = decode(&bytes).unwrap();
        assert_eq!(back, msg);
    }
}

#[test]
fn event_body_uses_numeric_codes() {
    let msg = Message::Event {
        job: "web".to_string(),
        kind: EventKind::Restarted,
    };
    let body: serde_json::Value = serde_json::from_slice(&encode(&msg).unwrap()).unwrap();
    assert_eq!(body["type"], 0);
    assert_eq!(body["job"], "web");
    assert_eq!(body["event"], 2);
}

#[test]
fn command_job_may_be_null() {
    let msg = Message::Command {
        job: None,
        command: CommandKind::Quit,
    };
    let body: serde_json::Value = serde_json::from_slice(&encode(&msg).unwrap()).unwrap();
    assert_eq!(body["type"], 1);
    assert!(body["job"].is_null());
    assert_eq!(body["command"], 7);
}

#[test]
fn status_omits_pid_when_stopped() {
    let msg = Message::Status {
        job: "web".to_string(),
        is_running: false,
        pid: None,
    };
    let body: serde_json::Value = serde_json::from_slice(&encode(&msg).unwrap()).unwrap();
    assert!(body.get("pid").is_none());
}

#[test]
fn status_without_pid_field_decodes() {
    // Older peers do not send the pid field at all.
    let body = br#"{"type": 4, "job": "web", "is_running": true}"#;
    let msg = decode(body).unwrap();
    assert_eq!(
        msg,
        Message::Status {
            job: "web".to_string(),
            is_running: true,
            pid: None,
        }
    );
}

#[test]
fn unknown_type_is_rejected() {
    let body = br#"{"type": 9, "job": "web"}"#;
    assert!(matches!(
        decode(body),
        Err(ProtocolError::UnknownType(9))
    ));
}

#[parameterized(
    event_code = { r#"{"type": 0, "job": "a", "event": 7}"# },
    command_code = { r#"{"type": 1, "job": "a", "command": 0}"# },
    reason_code = { r#"{"type": 3, "job": "a", "reason": 8}"# },
)]
fn unknown_codes_are_rejected(body: &str) {
    assert!(matches!(
        decode(body.as_bytes()),
        Err(ProtocolError::UnknownCode { .. })
    ));
}

#[parameterized(
    event_without_job = { r#"{"type": 0, "job": null, "event": 0}"# },
    event_without_code = { r#"{"type": 0, "job": "a"}"# },
    failure_without_reason = { r#"{"type": 3, "job": "a"}"# },
    status_without_flag = { r#"{"type": 4, "job": "a"}"# },
    list_without_jobs = { r#"{"type": 5, "job": null}"# },
)]
fn missing_fields_are_rejected(body: &str) {
    assert!(matches!(
        decode(body.as_bytes()),
        Err(ProtocolError::Malformed(_))
    ));
}

#[test]
fn garbage_is_a_json_error() {
    assert!(matches!(
        decode(b"not json"),
        Err(ProtocolError::Json(_))
    ));
}
