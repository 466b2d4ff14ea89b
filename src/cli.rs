/// Command line interface for rescheck
use crate::types::HarnessConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "rescheck")]
#[command(about = "Conformance checks for OCI runtime resource controls", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Tests to run (all when omitted)
    #[arg(value_name = "TEST")]
    pub tests: Vec<String>,

    /// OCI runtime executable
    #[arg(long, env = "OCI_RUNTIME", default_value = "crun")]
    pub runtime: PathBuf,

    /// Extra global argument for the runtime (repeatable)
    #[arg(long = "runtime-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub runtime_args: Vec<String>,

    /// Cgroup manager passed to the runtime
    #[arg(long, env = "CGROUP_MANAGER", default_value = "cgroupfs")]
    pub cgroup_manager: String,

    /// Do not pass --cgroup-manager at all
    #[arg(long)]
    pub no_cgroup_manager: bool,

    /// Helper binary installed as /init in every bundle
    #[arg(long = "init", env = "INIT_PATH")]
    pub init_path: Option<PathBuf>,

    /// Directory bundles are created under
    #[arg(long, env = "TESTS_ROOT")]
    pub tests_root: Option<PathBuf>,

    /// Timeout for each runtime invocation in seconds
    #[arg(long, env = "RESCHECK_TIMEOUT", default_value = "30")]
    pub timeout: u64,

    /// Leave bundles on disk for inspection
    #[arg(long)]
    pub keep_bundles: bool,

    /// List registered tests and exit
    #[arg(long)]
    pub list: bool,

    /// Write a JSON summary to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            runtime_path: self.runtime.clone(),
            runtime_args: self.runtime_args.clone(),
            cgroup_manager: if self.no_cgroup_manager {
                None
            } else {
                Some(self.cgroup_manager.clone())
            },
            init_path: self.init_path.clone(),
            bundle_root: self.tests_root.clone(),
            timeout: Duration::from_secs(self.timeout),
            keep_bundles: self.keep_bundles,
            verbose: self.verbose,
        }
    }
}
