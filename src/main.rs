/// rescheck: conformance checks for OCI runtime resource controls
///
/// Launches containers through an external OCI runtime and verifies that
/// cgroup limits declared in the runtime spec are applied, and that
/// malformed declarations are rejected with the expected diagnostics.
///
/// # Exit status
/// - 0: no test failed (skips included)
/// - 1: at least one test failed
///
/// # Usage
/// ```bash
/// sudo rescheck --runtime /usr/bin/crun --init ./init
/// sudo rescheck --runtime /usr/bin/crun --init ./init resources-unified
/// ```
use anyhow::{Context, Result};
use clap::Parser;
use rescheck::cli::Cli;
use rescheck::harness::Harness;
use rescheck::{runner, suites};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG still wins over --verbose
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if !cfg!(target_os = "linux") {
        eprintln!("Error: rescheck requires Linux cgroups");
        std::process::exit(1);
    }

    let registry = suites::default_registry()?;
    if cli.list {
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let selected = match registry.select(&cli.tests) {
        Ok(selected) => selected,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let config = cli.harness_config();
    if config.init_path.is_none() {
        log::warn!("no --init helper given; containers will lack /init");
    }

    let harness = Harness::from_host(config);
    log::info!(
        "host: privileged={} cgroup={}",
        harness.host.privileged,
        harness.host.cgroup_mode
    );

    let summary = runner::run_all(&harness, &selected);

    if let Some(path) = &cli.report {
        summary
            .write_report(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    std::process::exit(summary.exit_code());
}
