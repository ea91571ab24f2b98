// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error wrapper carrying a process exit code.

use std::fmt;

/// An error that selects the process exit code.
///
/// An empty message means "exit with this code, print nothing", used by
/// `status` and `pid`, whose stopped-state answer is the exit code itself.
#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

/// Builds an anyhow error that exits with `code`.
pub fn exit_with(code: i32, message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(ExitError {
        code,
        message: message.into(),
    })
}

/// Exit silently with `code`.
pub fn silent_exit(code: i32) -> anyhow::Error {
    exit_with(code, "")
}
