use crate::FakeRuntime;
use rescheck::harness::Harness;
use rescheck::probe::{CgroupMode, HostEnvironment};
use rescheck::runner;
use rescheck::suites;
use rescheck::types::Verdict;
use std::io;

fn host(privileged: bool, cgroup_mode: CgroupMode, legacy_pids_hierarchy: bool) -> HostEnvironment {
    HostEnvironment {
        privileged,
        cgroup_mode,
        legacy_pids_hierarchy,
    }
}

#[test]
fn full_suite_passes_against_conforming_runtime() {
    let fake = FakeRuntime::new();
    let harness = Harness::new(fake.config(), host(true, CgroupMode::Unified, false));
    let registry = suites::default_registry().unwrap();

    let summary = runner::run_all_to(&harness, &registry, &mut io::sink());

    for result in &summary.results {
        assert_eq!(result.verdict, Verdict::Pass, "{}", result.name);
    }
    assert_eq!(summary.passed(), registry.len());
    assert_eq!(summary.exit_code(), 0);

    // no container or bundle outlives its test
    assert!(fake.live_containers().is_empty());
    assert!(fake.leftover_bundles().is_empty());
}

#[test]
fn pid_limit_runs_on_v1_hosts() {
    let fake = FakeRuntime::new();
    let harness = Harness::new(fake.config(), host(true, CgroupMode::Legacy, true));
    let registry = suites::default_registry()
        .unwrap()
        .select(&["resources-pid-limit".to_string()])
        .unwrap();

    let summary = runner::run_all_to(&harness, &registry, &mut io::sink());
    assert_eq!(summary.results[0].verdict, Verdict::Pass);
    assert_eq!(summary.exit_code(), 0);
}

#[test]
fn unified_tests_skip_on_legacy_hosts() {
    let fake = FakeRuntime::new();
    let harness = Harness::new(fake.config(), host(true, CgroupMode::Legacy, true));
    let registry = suites::default_registry().unwrap();

    let summary = runner::run_all_to(&harness, &registry, &mut io::sink());
    assert_eq!(summary.passed(), 1);
    assert_eq!(summary.skipped(), registry.len() - 1);
    assert_eq!(summary.exit_code(), 0);

    // only the pid-limit test touched the runtime
    assert!(fake.log().iter().all(|l| l.starts_with("run ")));
    assert_eq!(fake.log().len(), 1);
}

#[test]
fn unprivileged_host_never_invokes_runtime() {
    let fake = FakeRuntime::new();
    let harness = Harness::new(fake.config(), host(false, CgroupMode::Unified, false));
    let registry = suites::default_registry().unwrap();

    let summary = runner::run_all_to(&harness, &registry, &mut io::sink());
    assert_eq!(summary.skipped(), registry.len());
    assert!(fake.log().is_empty());
}

#[test]
fn missing_runtime_fails_instead_of_passing() {
    let harness = Harness::new(
        rescheck::types::HarnessConfig {
            runtime_path: "/nonexistent/rescheck-runtime".into(),
            ..Default::default()
        },
        host(true, CgroupMode::Unified, false),
    );
    let registry = suites::default_registry().unwrap();

    let summary = runner::run_all_to(&harness, &registry, &mut io::sink());
    assert_eq!(summary.failed(), registry.len());
    assert_eq!(summary.exit_code(), 1);
}
