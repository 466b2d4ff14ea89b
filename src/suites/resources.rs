//! Resource-control conformance tests
//!
//! Positive tests set a limit, start a container and read the matching
//! cgroup file from inside it. Negative tests declare a bad unified key
//! and expect the launch to be rejected with a specific message.
use crate::config::RuntimeConfig;
use crate::harness::Harness;
use crate::runner::Registry;
use crate::runtime::RunOutput;
use crate::types::Verdict;
use crate::verify;
use anyhow::{Context, Result};

const PIDS_LIMIT: i64 = 1024;
const MEMORY_HIGH: &str = "1073741824";
const UNIFIED_PIDS_MAX: &str = "512";

pub fn register(registry: &mut Registry) -> Result<()> {
    registry
        .register("resources-pid-limit", pid_limit)?
        .register("resources-unified", unified_memory_high)?
        .register("resources-unified-pids-max", unified_pids_max)?
        .register(
            "resources-unified-invalid-controller",
            unified_invalid_controller,
        )?
        .register("resources-unified-invalid-key", unified_invalid_key)?;
    Ok(())
}

fn require_root(h: &Harness) -> Option<Verdict> {
    if !h.host.privileged {
        return Some(Verdict::skip("requires root"));
    }
    None
}

fn require_root_unified(h: &Harness) -> Option<Verdict> {
    if let Some(skip) = require_root(h) {
        return Some(skip);
    }
    if !h.host.is_privileged_unified() {
        return Some(Verdict::skip(format!(
            "requires cgroup v2, host is {}",
            h.host.cgroup_mode
        )));
    }
    None
}

/// Config for a long-running container with a cgroup namespace.
fn paused_config() -> RuntimeConfig {
    let mut conf = RuntimeConfig::base();
    conf.add_all_namespaces(true)
        .set_process_args(["/init", "pause"]);
    conf
}

/// `linux.resources.pids.limit` shows up in the container's `pids.max`.
fn pid_limit(h: &Harness) -> Result<Verdict> {
    if let Some(skip) = require_root(h) {
        return Ok(skip);
    }

    let mut conf = RuntimeConfig::base();
    conf.set_pids_limit(PIDS_LIMIT).add_all_namespaces(false);
    if !h.host.legacy_pids_hierarchy {
        // v2: the container must see its own cgroup at the root
        conf.add_namespace(crate::config::NamespaceKind::Cgroup);
    }
    let pids_max = h.host.container_pids_max_path();
    conf.set_process_args(["/init".to_string(), "cat".to_string(), pids_max.display().to_string()]);

    let output = h
        .invoker
        .run(&conf, false)?
        .invocation
        .into_success()
        .context("container run failed")?;
    verify::expect_output_contains(&output, &PIDS_LIMIT.to_string())
        .with_context(|| format!("reading {}", pids_max.display()))?;
    Ok(Verdict::Pass)
}

/// Start a detached container with `key = value` and read the file back.
fn unified_readback(h: &Harness, key: &str, value: &str) -> Result<Verdict> {
    if let Some(skip) = require_root_unified(h) {
        return Ok(skip);
    }

    let mut conf = paused_config();
    conf.set_unified_resource(key, value);

    let RunOutput {
        invocation,
        container,
    } = h.invoker.run(&conf, true)?;
    invocation
        .into_success()
        .context("detached run failed")?;
    let container = container.context("runtime reported no container")?;

    let path = format!("/sys/fs/cgroup/{}", key);
    let output = container
        .exec(&["/init", "cat", &path])?
        .into_success()
        .with_context(|| format!("exec in {} failed", container.handle()))?;
    verify::expect_output_contains(&output, value).with_context(|| format!("reading {}", path))?;

    container
        .delete(true)?
        .into_success()
        .context("delete failed")?;
    Ok(Verdict::Pass)
}

fn unified_memory_high(h: &Harness) -> Result<Verdict> {
    unified_readback(h, "memory.high", MEMORY_HIGH)
}

fn unified_pids_max(h: &Harness) -> Result<Verdict> {
    unified_readback(h, "pids.max", UNIFIED_PIDS_MAX)
}

/// Declare `key` and expect the launch to fail with `expected`.
fn unified_rejected(h: &Harness, key: &str, expected: &str) -> Result<Verdict> {
    if let Some(skip) = require_root_unified(h) {
        return Ok(skip);
    }

    let mut conf = paused_config();
    conf.set_unified_resource(key, "doesntmatter");

    // A container that started anyway is deleted when `_container` drops.
    let RunOutput {
        invocation,
        container: _container,
    } = h.invoker.run(&conf, true)?;
    verify::expect_error_contains(invocation, expected)
        .with_context(|| format!("unified key {:?}", key))?;
    Ok(Verdict::Pass)
}

fn unified_invalid_controller(h: &Harness) -> Result<Verdict> {
    unified_rejected(h, "foo.bar", &verify::controller_not_available("foo"))
}

fn unified_invalid_key(h: &Harness) -> Result<Verdict> {
    unified_rejected(
        h,
        "NOT-A-VALID-KEY",
        &verify::malformed_unified_key("NOT-A-VALID-KEY"),
    )
}
