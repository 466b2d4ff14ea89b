//! Core types shared across the rescheck harness
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Exit code reserved for "preconditions not met" (automake convention)
pub const SKIP_EXIT_CODE: i32 = 77;

/// Harness configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// OCI runtime executable (looked up in PATH when not absolute)
    pub runtime_path: PathBuf,
    /// Extra arguments placed before the runtime subcommand
    pub runtime_args: Vec<String>,
    /// Value passed to `--cgroup-manager`; `None` omits the flag
    pub cgroup_manager: Option<String>,
    /// Helper binary copied into each bundle as `/init`
    pub init_path: Option<PathBuf>,
    /// Directory under which bundles are created
    pub bundle_root: Option<PathBuf>,
    /// Upper bound for every runtime invocation
    pub timeout: Duration,
    /// Leave bundles on disk after the container is gone
    pub keep_bundles: bool,
    pub verbose: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            runtime_path: PathBuf::from("crun"),
            runtime_args: Vec::new(),
            cgroup_manager: Some("cgroupfs".to_string()),
            init_path: None,
            bundle_root: None,
            timeout: Duration::from_secs(30),
            keep_bundles: false,
            verbose: false,
        }
    }
}

/// Outcome of one test case
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    /// Host does not satisfy the test's preconditions
    Skip(String),
    Fail(String),
}

impl Verdict {
    pub fn skip(reason: impl Into<String>) -> Self {
        Verdict::Skip(reason.into())
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Verdict::Fail(reason.into())
    }

    /// Process exit code for this verdict: 0, 77 or 1
    pub fn code(&self) -> i32 {
        match self {
            Verdict::Pass => 0,
            Verdict::Skip(_) => SKIP_EXIT_CODE,
            Verdict::Fail(_) => 1,
        }
    }

    /// Inverse of [`Verdict::code`]; any other code is a failure.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Verdict::Pass,
            SKIP_EXIT_CODE => Verdict::Skip(String::new()),
            other => Verdict::Fail(format!("exit code {}", other)),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Verdict::Fail(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Skip(r) | Verdict::Fail(r) => Some(r.as_str()),
        }
    }
}

/// Custom error types for rescheck
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("invalid container identifier output: {0}")]
    ContainerId(String),

    #[error("`{command}` failed (status {status:?}): {diagnostic}")]
    UnexpectedFailure {
        command: String,
        status: Option<i32>,
        diagnostic: String,
    },

    #[error("`{command}` succeeded but was expected to fail")]
    UnexpectedSuccess { command: String },

    #[error("`{command}` did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("expected {expected:?}, got {actual:?}")]
    Mismatch { expected: String, actual: String },
}

/// Result type alias for rescheck operations
pub type Result<T> = std::result::Result<T, HarnessError>;
