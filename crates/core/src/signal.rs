// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal-name handling for job configuration.

use std::str::FromStr;

use nix::sys::signal::Signal;
use thiserror::Error;

/// Signal sent to stop a job when the configuration names none.
pub const DEFAULT_EXIT_SIGNAL: Signal = Signal::SIGTERM;

/// Raised when a configured signal name is not recognised.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a valid signal name: {0}")]
pub struct SignalParseError(pub String);

/// Parses a signal by its conventional name, e.g. `"SIGUSR1"`.
///
/// Names are case-insensitive but must carry the `SIG` prefix, matching the
/// configuration file format.
pub fn parse_signal(name: &str) -> Result<Signal, SignalParseError> {
    let upper = name.to_ascii_uppercase();
    Signal::from_str(&upper).map_err(|_| SignalParseError(name.to_string()))
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
