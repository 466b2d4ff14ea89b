//! rescheck: black-box conformance checks for OCI runtime resource controls
//!
//! Builds runtime-spec configurations, drives an external runtime binary
//! through run/exec/delete, and judges whether cgroup limits were applied
//! or bad declarations rejected.

pub mod bundle;
pub mod cli;
pub mod config;
pub mod container;
pub mod harness;
pub mod probe;
pub mod runner;
pub mod runtime;
pub mod suites;
pub mod types;
pub mod verify;

pub use crate::types::{HarnessConfig, HarnessError, Result, Verdict};
