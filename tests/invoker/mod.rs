use crate::FakeRuntime;
use rescheck::config::RuntimeConfig;
use rescheck::runtime::{Invocation, RuntimeInvoker};
use rescheck::types::{HarnessConfig, HarnessError};
use rescheck::verify;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

fn paused(key: &str, value: &str) -> RuntimeConfig {
    let mut conf = RuntimeConfig::base();
    conf.add_all_namespaces(true)
        .set_process_args(["/init", "pause"])
        .set_unified_resource(key, value);
    conf
}

#[test]
fn foreground_run_returns_entry_output() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(fake.config());

    let mut conf = RuntimeConfig::base();
    conf.set_pids_limit(1024)
        .set_process_args(["/init", "cat", "/sys/fs/cgroup/pids.max"]);
    let run = invoker.run(&conf, false).expect("run should spawn");

    assert!(run.container.is_none());
    let output = run.invocation.into_success().expect("run should succeed");
    assert!(verify::output_contains(&output, "1024"));

    let log = fake.log();
    assert_eq!(log.len(), 1);
    assert!(log[0].starts_with("run --bundle "));
    assert!(!log[0].contains("--detach"));
    assert!(fake.leftover_bundles().is_empty(), "bundle should be removed");
}

#[test]
fn detached_run_exec_and_delete() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(fake.config());

    let run = invoker
        .run(&paused("memory.high", "1073741824"), true)
        .expect("run should spawn");
    assert!(run.invocation.is_success());
    let container = run.container.expect("detached run yields a container");
    let id = container.handle().to_string();
    assert!(id.starts_with("rescheck-"));
    assert_eq!(fake.live_containers(), vec![id.clone()]);
    assert_eq!(fake.leftover_bundles().len(), 1);

    let output = container
        .exec(&["/init", "cat", "/sys/fs/cgroup/memory.high"])
        .unwrap()
        .into_success()
        .unwrap();
    assert!(verify::expect_output_contains(&output, "1073741824").is_ok());

    let deleted = container.delete(true).unwrap();
    assert!(deleted.is_success());
    assert!(fake.live_containers().is_empty());
    assert!(fake.leftover_bundles().is_empty());

    // explicit delete is not repeated by the guard
    let deletes = fake.log().iter().filter(|l| l.starts_with("delete")).count();
    assert_eq!(deletes, 1);
    assert!(fake.log().contains(&format!("delete -f {}", id)));
}

#[test]
fn dropped_container_is_force_deleted() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(fake.config());

    {
        let run = invoker.run(&paused("memory.high", "4096"), true).unwrap();
        assert!(run.container.is_some());
        assert_eq!(fake.live_containers().len(), 1);
    }

    assert!(fake.live_containers().is_empty());
    assert!(fake.log().iter().any(|l| l.starts_with("delete -f rescheck-")));
}

#[test]
fn container_is_deleted_when_test_panics() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(fake.config());

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let run = invoker.run(&paused("memory.high", "4096"), true).unwrap();
        let _container = run.container.unwrap();
        panic!("assertion failed mid-test");
    }));

    assert!(outcome.is_err());
    assert!(fake.live_containers().is_empty());
}

#[test]
fn rejected_launch_yields_diagnostic_and_no_container() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(fake.config());

    let run = invoker.run(&paused("foo.bar", "doesntmatter"), true).unwrap();
    assert!(run.container.is_none());
    assert!(matches!(run.invocation, Invocation::Failure(_)));

    let expected = verify::controller_not_available("foo");
    assert!(verify::error_contains(&run.invocation, &expected));
    assert_eq!(run.invocation.output().exit_code, Some(1));

    // best-effort cleanup of whatever the runtime may have left
    assert!(fake.log().iter().any(|l| l.starts_with("delete -f ")));
    assert!(fake.live_containers().is_empty());
    assert!(fake.leftover_bundles().is_empty());
}

#[test]
fn reported_identifier_is_used() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(fake.config());

    let mut conf = RuntimeConfig::base();
    conf.set_process_args(["/init", "print-id"]);
    let run = invoker.run(&conf, true).unwrap();
    let container = run.container.unwrap();
    assert!(container.handle().as_str().starts_with("reported-rescheck-"));
    assert_eq!(fake.live_containers(), vec![container.handle().to_string()]);

    drop(container);
    assert!(fake.live_containers().is_empty());
}

#[test]
fn hung_runtime_times_out() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(HarnessConfig {
        timeout: Duration::from_millis(300),
        ..fake.config()
    });

    let mut conf = RuntimeConfig::base();
    conf.set_process_args(["/init", "hang"]);
    let run = invoker.run(&conf, false).unwrap();

    match run.invocation {
        Invocation::TimedOut { timeout, output } => {
            assert_eq!(timeout, Duration::from_millis(300));
            assert!(output.elapsed < Duration::from_secs(10));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[test]
fn timed_out_foreground_run_is_force_deleted() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(HarnessConfig {
        timeout: Duration::from_millis(300),
        ..fake.config()
    });

    let mut conf = RuntimeConfig::base();
    conf.set_process_args(["/init", "hang"]);
    let run = invoker.run(&conf, false).unwrap();
    assert!(matches!(run.invocation, Invocation::TimedOut { .. }));

    let id = fake.last_requested_id().expect("run should be logged");
    assert!(fake.log().contains(&format!("delete -f {}", id)));
    assert!(fake.leftover_bundles().is_empty());
}

#[test]
fn timed_out_detached_run_is_force_deleted() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(HarnessConfig {
        timeout: Duration::from_millis(300),
        ..fake.config()
    });

    let mut conf = RuntimeConfig::base();
    conf.set_process_args(["/init", "hang"]);
    let run = invoker.run(&conf, true).unwrap();
    assert!(matches!(run.invocation, Invocation::TimedOut { .. }));
    assert!(run.container.is_none());

    let id = fake.last_requested_id().expect("run should be logged");
    assert!(fake.log().contains(&format!("delete -f {}", id)));
    assert!(fake.live_containers().is_empty());
}

#[test]
fn unparsable_identifier_is_error_and_container_removed() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(fake.config());

    let mut conf = RuntimeConfig::base();
    conf.set_process_args(["/init", "chatty"]);
    let err = invoker.run(&conf, true).unwrap_err();
    match err {
        HarnessError::ContainerId(line) => assert!(line.ends_with("started fine")),
        other => panic!("expected ContainerId, got {:?}", other),
    }

    let id = fake.last_requested_id().expect("run should be logged");
    assert!(fake.log().contains(&format!("delete -f {}", id)));
    assert!(fake.live_containers().is_empty());
    assert!(fake.leftover_bundles().is_empty());
}

#[test]
fn failed_plain_delete_falls_back_to_force_on_drop() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(fake.config());

    let container = invoker
        .run(&paused("memory.high", "4096"), true)
        .unwrap()
        .container
        .unwrap();
    let id = container.handle().to_string();

    // init is still running, so a plain delete is refused
    let inv = container.delete(false).unwrap();
    assert!(!inv.is_success());
    assert!(verify::error_contains(&inv, "still running"));

    let log = fake.log();
    assert!(log.contains(&format!("delete {}", id)));
    assert!(log.contains(&format!("delete -f {}", id)));
    assert!(fake.live_containers().is_empty());
}

#[test]
fn exec_into_missing_container_fails() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(fake.config());

    let handle = rescheck::container::ContainerHandle::new("rescheck-missing");
    let inv = invoker.exec(&handle, &["/init", "cat", "/etc/hostname"]).unwrap();
    assert!(verify::error_contains(&inv, "does not exist"));

    let inv = invoker.delete(&handle, false).unwrap();
    assert!(!inv.is_success());
    assert_eq!(fake.log().last().unwrap(), "delete rescheck-missing");
}

#[test]
fn global_arguments_precede_subcommand() {
    let fake = FakeRuntime::new();
    let invoker = RuntimeInvoker::new(fake.config());

    let handle = rescheck::container::ContainerHandle::new("x");
    let inv = invoker.delete(&handle, true).unwrap();
    let command = &inv.output().command;
    let script = fake.script().display().to_string();
    assert!(
        command.starts_with(&format!("/bin/sh {} --cgroup-manager cgroupfs delete -f x", script)),
        "{}",
        command
    );
}
