// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::CommandFactory;

use super::*;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn ports_flag_is_parsed() {
    let parsed = ports(Some("4200,4201")).unwrap();
    assert_eq!(
        parsed,
        Ports {
            control: 4200,
            event: 4201
        }
    );
}

#[test]
fn missing_ports_is_a_plain_failure() {
    // The test environment never exports SHEP_PORTS.
    let err = ports(None).unwrap_err();
    let exit = err.downcast_ref::<ExitError>().unwrap();
    assert_eq!(exit.code, 1);
    assert!(exit.message.contains("SHEP_PORTS"));
}

#[test]
fn unknown_job_exits_with_two() {
    let err = client_error(ClientError::NoSuchJob("ghost".to_string()));
    let exit = err.downcast_ref::<ExitError>().unwrap();
    assert_eq!(exit.code, 2);
}

#[test]
fn other_client_errors_exit_with_one() {
    for error in [
        ClientError::AlreadyRunning("a".to_string()),
        ClientError::NotRunning("a".to_string()),
        ClientError::Unexpected,
        ClientError::BadPorts("x".to_string()),
    ] {
        let err = client_error(error);
        let exit = err.downcast_ref::<ExitError>().unwrap();
        assert_eq!(exit.code, 1);
    }
}
