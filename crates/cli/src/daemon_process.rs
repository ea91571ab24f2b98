// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process management: locating and launching `shepd`.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tokio::time::Instant;

/// Finds the shepd binary: `SHEP_DAEMON_BIN` override, then a sibling of the
/// current executable, then `$PATH`.
pub fn find_daemon_binary() -> PathBuf {
    if let Ok(path) = std::env::var("SHEP_DAEMON_BIN") {
        return PathBuf::from(path);
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("shepd");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    PathBuf::from("shepd")
}

/// Spawns shepd detached, with its stdio discarded.
///
/// The daemon re-reads the configuration itself; the path is canonicalised
/// first because shepd changes directory before serving.
pub fn spawn_daemon(config_path: &Path) -> std::io::Result<std::process::Child> {
    let config_path = config_path.canonicalize()?;
    Command::new(find_daemon_binary())
        .arg(config_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

/// Polls the control port until it accepts connections or `timeout` passes.
pub async fn wait_for_control_port(port: u16, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, port))
            .await
            .is_ok()
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
