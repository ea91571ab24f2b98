// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use nix::sys::signal::Signal;
use yare::parameterized;

use super::*;

#[parameterized(
    term = { "SIGTERM", Signal::SIGTERM },
    kill = { "SIGKILL", Signal::SIGKILL },
    usr1 = { "SIGUSR1", Signal::SIGUSR1 },
    hup = { "SIGHUP", Signal::SIGHUP },
    lowercase = { "sigint", Signal::SIGINT },
    mixed_case = { "SigQuit", Signal::SIGQUIT },
)]
fn parses_known_names(name: &str, expected: Signal) {
    assert_eq!(parse_signal(name), Ok(expected));
}

#[parameterized(
    bare_name = { "TERM" },
    empty = { "" },
    nonsense = { "SIGBOGUS" },
    numeric = { "15" },
)]
fn rejects_unknown_names(name: &str) {
    assert_eq!(parse_signal(name), Err(SignalParseError(name.to_string())));
}

#[test]
fn default_is_sigterm() {
    assert_eq!(DEFAULT_EXIT_SIGNAL, Signal::SIGTERM);
}
