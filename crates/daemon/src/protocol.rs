// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message definitions for the supervisor protocol.
//!
//! Every framed body is a JSON object whose `type` field selects one of six
//! variants; the remaining fields are numeric codes and plain values. The
//! numeric tagging is part of the wire contract, so the public [`Message`]
//! enum converts through a flat serde representation instead of using serde's
//! own enum tagging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MSG_EVENT: u8 = 0;
const MSG_COMMAND: u8 = 1;
const MSG_SUCCESS: u8 = 2;
const MSG_FAILURE: u8 = 3;
const MSG_STATUS: u8 = 4;
const MSG_JOB_LIST: u8 = 5;

/// Lifecycle notifications pushed to event subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Started,
    Stopped,
    Restarted,
    Terminating,
}

impl EventKind {
    pub fn code(self) -> u8 {
        match self {
            EventKind::Started => 0,
            EventKind::Stopped => 1,
            EventKind::Restarted => 2,
            EventKind::Terminating => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(EventKind::Started),
            1 => Some(EventKind::Stopped),
            2 => Some(EventKind::Restarted),
            3 => Some(EventKind::Terminating),
            _ => None,
        }
    }
}

/// Actions a client can request from the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Stop,
    Status,
    JobList,
    Quit,
}

impl CommandKind {
    pub fn code(self) -> u8 {
        match self {
            CommandKind::Start => 3,
            CommandKind::Stop => 4,
            CommandKind::Status => 5,
            CommandKind::JobList => 6,
            CommandKind::Quit => 7,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            3 => Some(CommandKind::Start),
            4 => Some(CommandKind::Stop),
            5 => Some(CommandKind::Status),
            6 => Some(CommandKind::JobList),
            7 => Some(CommandKind::Quit),
            _ => None,
        }
    }
}

/// Why a command was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NoSuchJob,
    JobStarted,
    JobStopped,
}

impl FailureReason {
    pub fn code(self) -> u8 {
        match self {
            FailureReason::NoSuchJob => 0,
            FailureReason::JobStarted => 1,
            FailureReason::JobStopped => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FailureReason::NoSuchJob),
            1 => Some(FailureReason::JobStarted),
            2 => Some(FailureReason::JobStopped),
            _ => None,
        }
    }

    /// Human-readable form, used by clients when reporting errors.
    pub fn describe(self) -> &'static str {
        match self {
            FailureReason::NoSuchJob => "no such job",
            FailureReason::JobStarted => "tried to start an already running job",
            FailureReason::JobStopped => "tried to stop an already stopped job",
        }
    }
}

/// A protocol message, in any direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Lifecycle notification (supervisor → subscriber, monitor → inbox).
    Event { job: String, kind: EventKind },
    /// Client request. `job` is null for JOB_LIST and QUIT.
    Command {
        job: Option<String>,
        command: CommandKind,
    },
    /// The command was applied.
    Success { job: String },
    /// The command was refused.
    Failure { job: String, reason: FailureReason },
    /// Point-in-time state of one job. `pid` is present while running.
    Status {
        job: String,
        is_running: bool,
        pid: Option<u32>,
    },
    /// Snapshot of every job's running state.
    JobList { all_jobs: BTreeMap<String, bool> },
}

/// Errors from encoding, decoding, or transporting a message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,

    #[error("unknown message type {0}")]
    UnknownType(u8),

    #[error("unknown {field} code {value}")]
    UnknownCode { field: &'static str, value: u8 },

    #[error("malformed {0} message")]
    Malformed(&'static str),

    #[error("datagram truncated")]
    TruncatedDatagram,
}

/// The flat wire shape shared by all six variants.
#[derive(Serialize, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    msg_type: u8,
    job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    all_jobs: Option<BTreeMap<String, bool>>,
}

impl RawMessage {
    fn new(msg_type: u8, job: Option<String>) -> Self {
        RawMessage {
            msg_type,
            job,
            event: None,
            command: None,
            reason: None,
            is_running: None,
            pid: None,
            all_jobs: None,
        }
    }
}

impl Message {
    fn to_raw(&self) -> RawMessage {
        match self {
            Message::Event { job, kind } => {
                let mut raw = RawMessage::new(MSG_EVENT, Some(job.clone()));
                raw.event = Some(kind.code());
                raw
            }
            Message::Command { job, command } => {
                let mut raw = RawMessage::new(MSG_COMMAND, job.clone());
                raw.command = Some(command.code());
                raw
            }
            Message::Success { job } => RawMessage::new(MSG_SUCCESS, Some(job.clone())),
            Message::Failure { job, reason } => {
                let mut raw = RawMessage::new(MSG_FAILURE, Some(job.clone()));
                raw.reason = Some(reason.code());
                raw
            }
            Message::Status {
                job,
                is_running,
                pid,
            } => {
                let mut raw = RawMessage::new(MSG_STATUS, Some(job.clone()));
                raw.is_running = Some(*is_running);
                raw.pid = *pid;
                raw
            }
            Message::JobList { all_jobs } => {
                let mut raw = RawMessage::new(MSG_JOB_LIST, None);
                raw.all_jobs = Some(all_jobs.clone());
                raw
            }
        }
    }

    fn from_raw(raw: RawMessage) -> Result<Self, ProtocolError> {
        match raw.msg_type {
            MSG_EVENT => {
                let job = raw.job.ok_or(ProtocolError::Malformed("event"))?;
                let code = raw.event.ok_or(ProtocolError::Malformed("event"))?;
                let kind = EventKind::from_code(code).ok_or(ProtocolError::UnknownCode {
                    field: "event",
                    value: code,
                })?;
                Ok(Message::Event { job, kind })
            }
            MSG_COMMAND => {
                let code = raw.command.ok_or(ProtocolError::Malformed("command"))?;
                let command = CommandKind::from_code(code).ok_or(ProtocolError::UnknownCode {
                    field: "command",
                    value: code,
                })?;
                Ok(Message::Command {
                    job: raw.job,
                    command,
                })
            }
            MSG_SUCCESS => {
                let job = raw.job.ok_or(ProtocolError::Malformed("success"))?;
                Ok(Message::Success { job })
            }
            MSG_FAILURE => {
                let job = raw.job.ok_or(ProtocolError::Malformed("failure"))?;
                let code = raw.reason.ok_or(ProtocolError::Malformed("failure"))?;
                let reason = FailureReason::from_code(code).ok_or(ProtocolError::UnknownCode {
                    field: "reason",
                    value: code,
                })?;
                Ok(Message::Failure { job, reason })
            }
            MSG_STATUS => {
                let job = raw.job.ok_or(ProtocolError::Malformed("status"))?;
                let is_running = raw.is_running.ok_or(ProtocolError::Malformed("status"))?;
                Ok(Message::Status {
                    job,
                    is_running,
                    pid: raw.pid,
                })
            }
            MSG_JOB_LIST => {
                let all_jobs = raw.all_jobs.ok_or(ProtocolError::Malformed("job list"))?;
                Ok(Message::JobList { all_jobs })
            }
            other => Err(ProtocolError::UnknownType(other)),
        }
    }
}

/// Encodes a message body as JSON bytes (no length prefix).
pub fn encode(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(&msg.to_raw())?)
}

/// Decodes a JSON message body.
pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
    let raw: RawMessage = serde_json::from_slice(bytes)?;
    Message::from_raw(raw)
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
