// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-job record: everything the supervisor needs to launch, signal,
//! and relaunch one child program.

use std::collections::HashMap;
use std::path::PathBuf;

use nix::sys::signal::Signal;

use crate::signal::DEFAULT_EXIT_SIGNAL;

/// Configuration for a single supervised job.
///
/// The command line is handed to `/bin/sh -c`; the three stdio streams are
/// files (stdin read, stdout/stderr append) and default to `/dev/null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Shell command line to execute.
    pub command: String,
    /// File opened for reading as the child's stdin.
    pub stdin: PathBuf,
    /// File opened for appending as the child's stdout.
    pub stdout: PathBuf,
    /// File opened for appending as the child's stderr.
    pub stderr: PathBuf,
    /// Environment overlaid on the supervisor's own environment.
    pub env: HashMap<String, String>,
    /// Directory to change into before exec, if any.
    pub working_dir: Option<PathBuf>,
    /// Signal sent to the job's process group on stop.
    pub exit_signal: Signal,
    /// Launch this job when the supervisor starts serving.
    pub autostart: bool,
    /// Relaunch this job automatically after an unexpected exit.
    pub restart: bool,
}

impl JobSpec {
    /// A job running `command` with every other field at its default.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stdin: PathBuf::from("/dev/null"),
            stdout: PathBuf::from("/dev/null"),
            stderr: PathBuf::from("/dev/null"),
            env: HashMap::new(),
            working_dir: None,
            exit_signal: DEFAULT_EXIT_SIGNAL,
            autostart: false,
            restart: false,
        }
    }
}
