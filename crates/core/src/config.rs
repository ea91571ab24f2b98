// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration file loading.
//!
//! The file is JSON with two top-level objects: `supervisor` (ports, working
//! directory, logging, include globs) and `jobs` (the catalog). Parsing is
//! deliberately lenient: wrong-typed optional values fall back to their
//! defaults with a logged warning, jobs without a command are skipped, and
//! duplicates keep the first definition. Only the ports and a non-empty
//! catalog are hard requirements.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::expand::expand_env;
use crate::job::JobSpec;
use crate::signal::parse_signal;

/// Errors that abort configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("configuration is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration root must be an object")]
    RootNotObject,

    #[error("missing required key \"{0}\"")]
    MissingKey(&'static str),

    #[error("\"{0}\" is not a valid port number")]
    InvalidPort(&'static str),

    #[error("no jobs are configured")]
    NoJobs,
}

/// Recognised `log-level` values, least to most verbose.
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// The `supervisor` block of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Directory the daemon changes into before serving. Default `.`.
    pub working_dir: PathBuf,
    /// Loopback port for the command endpoint.
    pub control_port: u16,
    /// Loopback port for the event endpoint.
    pub event_port: u16,
    /// Log verbosity, one of error/warn/info/debug/trace. Default `warn`.
    pub log_level: String,
    /// File the daemon log is appended to. Default `/dev/null`.
    pub log_file: PathBuf,
    /// Glob patterns naming additional job files to merge into the catalog.
    pub include_dirs: Vec<String>,
}

/// A fully loaded configuration: supervisor settings plus the job catalog,
/// in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub supervisor: SupervisorConfig,
    pub jobs: IndexMap<String, JobSpec>,
}

impl Config {
    /// Reads and parses the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses configuration from JSON text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(text)?;
        let root = root.as_object().ok_or(ConfigError::RootNotObject)?;

        let supervisor = parse_supervisor(root.get("supervisor"))?;

        let mut jobs = IndexMap::new();
        match root.get("jobs") {
            Some(Value::Object(map)) => parse_jobs(map, &mut jobs),
            Some(_) => warn!("\"jobs\" is not an object; ignoring it"),
            None => {}
        }

        for pattern in &supervisor.include_dirs {
            include_jobs(pattern, &mut jobs);
        }

        if jobs.is_empty() {
            return Err(ConfigError::NoJobs);
        }

        Ok(Config { supervisor, jobs })
    }
}

fn parse_supervisor(value: Option<&Value>) -> Result<SupervisorConfig, ConfigError> {
    let map = value
        .ok_or(ConfigError::MissingKey("supervisor"))?
        .as_object()
        .ok_or(ConfigError::MissingKey("supervisor"))?;

    let control_port = port_field(map, "control-port")?;
    let event_port = port_field(map, "event-port")?;

    let working_dir = str_field(map, "working-dir")
        .map(|raw| PathBuf::from(expand_env(&raw)))
        .unwrap_or_else(|| PathBuf::from("."));

    let log_file = str_field(map, "log-file")
        .map(|raw| PathBuf::from(expand_env(&raw)))
        .unwrap_or_else(|| PathBuf::from("/dev/null"));

    let log_level = match str_field(map, "log-level") {
        Some(level) => {
            let lower = level.to_ascii_lowercase();
            if LOG_LEVELS.contains(&lower.as_str()) {
                lower
            } else {
                warn!(level = %level, "not a valid log level; using \"warn\"");
                "warn".to_string()
            }
        }
        None => "warn".to_string(),
    };

    let include_dirs = match map.get("include-dirs") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item.as_str() {
                Some(s) => Some(s.to_string()),
                None => {
                    warn!("ignoring non-string include-dirs entry");
                    None
                }
            })
            .collect(),
        Some(_) => {
            warn!("\"include-dirs\" is not an array; ignoring it");
            Vec::new()
        }
        None => Vec::new(),
    };

    Ok(SupervisorConfig {
        working_dir,
        control_port,
        event_port,
        log_level,
        log_file,
        include_dirs,
    })
}

/// Parses a `jobs` object, merging entries into `jobs` in file order.
fn parse_jobs(map: &Map<String, Value>, jobs: &mut IndexMap<String, JobSpec>) {
    for (name, value) in map {
        if name.is_empty() {
            warn!("skipping job with an empty name");
            continue;
        }
        if jobs.contains_key(name) {
            warn!(job = %name, "skipping duplicate job definition");
            continue;
        }
        let Some(body) = value.as_object() else {
            warn!(job = %name, "job definition is not an object; skipping");
            continue;
        };
        let Some(command) = str_field(body, "command") else {
            warn!(job = %name, "job lacks a command; skipping");
            continue;
        };

        let mut spec = JobSpec::new(command);

        if let Some(raw) = str_field(body, "stdin") {
            spec.stdin = PathBuf::from(expand_env(&raw));
        }
        if let Some(raw) = str_field(body, "stdout") {
            spec.stdout = PathBuf::from(expand_env(&raw));
        }
        if let Some(raw) = str_field(body, "stderr") {
            spec.stderr = PathBuf::from(expand_env(&raw));
        }
        if let Some(raw) = str_field(body, "working-dir") {
            spec.working_dir = Some(PathBuf::from(expand_env(&raw)));
        }

        match body.get("env") {
            Some(Value::Object(env)) => {
                for (key, val) in env {
                    match val.as_str() {
                        Some(s) => {
                            spec.env.insert(key.clone(), s.to_string());
                        }
                        None => warn!(job = %name, var = %key, "non-string env value; skipping"),
                    }
                }
            }
            Some(_) => warn!(job = %name, "\"env\" is not an object; ignoring it"),
            None => {}
        }

        if let Some(sig_name) = str_field(body, "signal") {
            match parse_signal(&sig_name) {
                Ok(signal) => spec.exit_signal = signal,
                Err(e) => warn!(job = %name, error = %e, "keeping default exit signal"),
            }
        }

        spec.autostart = bool_field(body, "autostart").unwrap_or(false);
        spec.restart = bool_field(body, "restart").unwrap_or(false);

        jobs.insert(name.clone(), spec);
    }
}

/// Loads every file matching an `include-dirs` glob as a bare jobs object.
fn include_jobs(pattern: &str, jobs: &mut IndexMap<String, JobSpec>) {
    let expanded = expand_env(pattern);
    let paths = match glob::glob(&expanded) {
        Ok(paths) => paths,
        Err(e) => {
            warn!(pattern = %expanded, error = %e, "bad include pattern; skipping");
            return;
        }
    };

    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "unreadable include match; skipping");
                continue;
            }
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unable to open job file; skipping");
                continue;
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => parse_jobs(&map, jobs),
            Ok(_) => warn!(path = %path.display(), "job file is not an object; skipping"),
            Err(e) => warn!(path = %path.display(), error = %e, "job file is not valid JSON; skipping"),
        }
    }
}

fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            warn!(key = %key, "expected a string; using the default");
            None
        }
    }
}

fn bool_field(map: &Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key) {
        None => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => {
            warn!(key = %key, "expected a boolean; using the default");
            None
        }
    }
}

fn port_field(map: &Map<String, Value>, key: &'static str) -> Result<u16, ConfigError> {
    let value = map.get(key).ok_or(ConfigError::MissingKey(key))?;
    value
        .as_u64()
        .and_then(|raw| u16::try_from(raw).ok())
        .ok_or(ConfigError::InvalidPort(key))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
