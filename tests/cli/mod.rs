use crate::FakeRuntime;
use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;

fn rescheck() -> Command {
    let mut cmd = Command::cargo_bin("rescheck").expect("binary should build");
    for var in ["OCI_RUNTIME", "INIT_PATH", "CGROUP_MANAGER", "TESTS_ROOT", "RESCHECK_TIMEOUT"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn list_prints_registered_tests() {
    rescheck()
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("resources-pid-limit"))
        .stdout(predicate::str::contains("resources-unified-invalid-controller"))
        .stdout(predicate::str::contains("resources-unified-invalid-key"));
}

#[test]
fn unknown_test_is_usage_error() {
    rescheck()
        .arg("no-such-test")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown test no-such-test"));
}

/// Verdict depends on the host (pass as root on cgroup v2, skip otherwise),
/// but neither outcome fails the run.
#[test]
#[serial]
fn single_test_exit_code_and_report() {
    let fake = FakeRuntime::new();
    let report = fake.bundles().join("..").join("report.json");

    let assert = rescheck()
        .arg("--runtime")
        .arg("/bin/sh")
        .arg("--runtime-arg")
        .arg(fake.script())
        .arg("--tests-root")
        .arg(fake.bundles())
        .arg("--report")
        .arg(&report)
        .arg("resources-unified-invalid-key")
        .assert()
        .code(0)
        .stdout(predicate::str::starts_with("1..1\nok 1 - resources-unified-invalid-key"));

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).into_owned();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    let verdict = value["results"][0]["verdict"].as_str().unwrap().to_string();
    if stdout.contains("# SKIP") {
        assert_eq!(verdict, "skip");
        assert_eq!(value["skipped"], 1);
    } else {
        assert_eq!(verdict, "pass");
        assert_eq!(value["passed"], 1);
    }
    assert_eq!(value["failed"], 0);
    assert!(fake.live_containers().is_empty());
}
