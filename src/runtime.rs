//! Typed wrapper around the OCI runtime command line
//!
//! Every call blocks until the runtime process exits or the configured
//! timeout elapses. Output is captured into anonymous temporary files
//! rather than pipes: a detached container inherits the runtime's stdio,
//! so waiting for pipe EOF could block for the container's lifetime.
use crate::bundle::Bundle;
use crate::config::RuntimeConfig;
use crate::container::{Container, ContainerHandle};
use crate::types::{HarnessConfig, HarnessError, Result};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Output captured from one runtime invocation
#[derive(Clone, Debug, Default)]
pub struct Captured {
    /// Rendered command line, for diagnostics
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub elapsed: Duration,
}

impl Captured {
    /// Everything the runtime printed, stderr first.
    ///
    /// Runtimes are inconsistent about which stream carries their error
    /// messages, so negative checks search both.
    pub fn diagnostic(&self) -> String {
        match (self.stderr.trim().is_empty(), self.stdout.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stderr.trim_end(), self.stdout.trim_end()),
            (false, true) => self.stderr.trim_end().to_string(),
            (true, _) => self.stdout.trim_end().to_string(),
        }
    }
}

/// How a runtime invocation ended
#[derive(Clone, Debug)]
pub enum Invocation {
    /// Exit status zero
    Success(Captured),
    /// Nonzero exit or killed by a signal
    Failure(Captured),
    /// Killed after exceeding the harness timeout
    TimedOut { output: Captured, timeout: Duration },
}

impl Invocation {
    pub fn output(&self) -> &Captured {
        match self {
            Invocation::Success(output)
            | Invocation::Failure(output)
            | Invocation::TimedOut { output, .. } => output,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Invocation::Success(_))
    }

    /// Unwrap a successful run, turning anything else into an error that
    /// carries the runtime's diagnostic.
    pub fn into_success(self) -> Result<Captured> {
        match self {
            Invocation::Success(output) => Ok(output),
            Invocation::Failure(output) => Err(HarnessError::UnexpectedFailure {
                diagnostic: output.diagnostic(),
                status: output.exit_code,
                command: output.command,
            }),
            Invocation::TimedOut { output, timeout } => Err(HarnessError::TimedOut {
                command: output.command,
                timeout,
            }),
        }
    }

    /// Counterpart of [`Invocation::into_success`] for negative tests.
    pub fn into_failure(self) -> Result<Captured> {
        match self {
            Invocation::Failure(output) => Ok(output),
            Invocation::Success(output) => Err(HarnessError::UnexpectedSuccess {
                command: output.command,
            }),
            Invocation::TimedOut { output, timeout } => Err(HarnessError::TimedOut {
                command: output.command,
                timeout,
            }),
        }
    }
}

/// Result of [`RuntimeInvoker::run`]
#[derive(Debug)]
pub struct RunOutput<'a> {
    pub invocation: Invocation,
    /// Present only for a successful detached run
    pub container: Option<Container<'a>>,
}

/// Drives the runtime binary through the container lifecycle
#[derive(Debug, Clone)]
pub struct RuntimeInvoker {
    config: HarnessConfig,
}

impl RuntimeInvoker {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Write `config` into a fresh bundle and start it with `run`.
    ///
    /// Without `detach` this blocks until the entry process exits and
    /// stdout holds its output. With `detach` it returns once the runtime
    /// reports the container started, and the returned guard deletes the
    /// container when dropped.
    pub fn run(&self, config: &RuntimeConfig, detach: bool) -> Result<RunOutput<'_>> {
        let mut bundle = Bundle::create(
            self.config.bundle_root.as_deref(),
            config,
            self.config.init_path.as_deref(),
        )?;
        if self.config.keep_bundles {
            bundle.keep();
        }

        let requested = ContainerHandle::generate();
        let mut args = vec![
            "run".to_string(),
            "--bundle".to_string(),
            bundle.path().display().to_string(),
        ];
        if detach {
            args.push("--detach".to_string());
        }
        args.push(requested.to_string());

        let invocation = self.invoke(&args)?;

        if !invocation.is_success() {
            // The runtime may have created state before failing or being killed.
            self.remove_leftover(&requested);
            return Ok(RunOutput {
                invocation,
                container: None,
            });
        }

        if !detach {
            return Ok(RunOutput {
                invocation,
                container: None,
            });
        }

        let handle = match detached_handle(&invocation.output().stdout, &requested) {
            Ok(handle) => handle,
            Err(e) => {
                self.remove_leftover(&requested);
                return Err(e);
            }
        };
        log::debug!("container {} started", handle);
        Ok(RunOutput {
            container: Some(Container::new(self, handle, bundle)),
            invocation,
        })
    }

    /// Best-effort `delete -f` of a container that never got a guard.
    fn remove_leftover(&self, requested: &ContainerHandle) {
        match self.delete(requested, true) {
            Ok(inv) if inv.is_success() => log::debug!("removed leftover container {}", requested),
            Ok(inv) => log::debug!(
                "no leftover container {}: {}",
                requested,
                inv.output().diagnostic()
            ),
            Err(e) => log::warn!("cleanup of {} failed: {}", requested, e),
        }
    }

    /// Run `args` inside the running container `handle`.
    pub fn exec(&self, handle: &ContainerHandle, args: &[&str]) -> Result<Invocation> {
        let mut argv = vec!["exec".to_string(), handle.to_string()];
        argv.extend(args.iter().map(|a| a.to_string()));
        self.invoke(&argv)
    }

    /// Tear down `handle`; `force` also kills a still-running init.
    pub fn delete(&self, handle: &ContainerHandle, force: bool) -> Result<Invocation> {
        let mut argv = vec!["delete".to_string()];
        if force {
            argv.push("-f".to_string());
        }
        argv.push(handle.to_string());
        self.invoke(&argv)
    }

    /// Invoke the runtime with `args` after the global options.
    pub fn invoke(&self, args: &[String]) -> Result<Invocation> {
        let mut cmd = Command::new(&self.config.runtime_path);
        cmd.args(&self.config.runtime_args);
        if let Some(manager) = &self.config.cgroup_manager {
            cmd.arg("--cgroup-manager").arg(manager);
        }
        cmd.args(args);

        let command = render_command(&cmd);
        let stdout = tempfile::tempfile()?;
        let stderr = tempfile::tempfile()?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout.try_clone()?))
            .stderr(Stdio::from(stderr.try_clone()?))
            // own group so a timeout can take down helpers too
            .process_group(0);

        log::debug!("running: {}", command);
        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| HarnessError::Spawn {
            program: self.config.runtime_path.display().to_string(),
            source,
        })?;
        // Drop our copies of the child's stdio.
        drop(cmd);

        let status = wait_with_timeout(&mut child, self.config.timeout)?;
        let elapsed = start.elapsed();

        let mut output = Captured {
            command,
            stdout: read_back(stdout)?,
            stderr: read_back(stderr)?,
            exit_code: None,
            signal: None,
            elapsed,
        };

        let invocation = match status {
            Some(status) => {
                output.exit_code = status.code();
                output.signal = status.signal();
                log::debug!(
                    "`{}` exited with {:?} after {:?}",
                    output.command,
                    status,
                    elapsed
                );
                if status.success() {
                    Invocation::Success(output)
                } else {
                    Invocation::Failure(output)
                }
            }
            None => {
                output.signal = Some(Signal::SIGKILL as i32);
                log::warn!(
                    "`{}` killed after exceeding {:?}",
                    output.command,
                    self.config.timeout
                );
                Invocation::TimedOut {
                    output,
                    timeout: self.config.timeout,
                }
            }
        };
        Ok(invocation)
    }
}

/// Poll `child` until it exits; `None` means it was killed on timeout.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= timeout {
            terminate_group(child);
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate_group(child: &mut Child) {
    match i32::try_from(child.id()) {
        Ok(raw) => {
            let pgid = Pid::from_raw(raw);
            if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                log::warn!("killpg({}) failed: {}, killing leader only", pgid, e);
                kill_leader(child);
            }
        }
        Err(_) => {
            log::warn!("pid {} out of range for killpg, killing leader only", child.id());
            kill_leader(child);
        }
    }
}

fn kill_leader(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::warn!("kill({}) failed: {}", child.id(), e);
    }
}

fn read_back(mut file: File) -> Result<String> {
    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn render_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Identifier of a freshly detached container.
///
/// The first stdout line names the container when the runtime prints one;
/// runtimes that print nothing keep the id the harness asked for.
pub fn detached_handle(stdout: &str, requested: &ContainerHandle) -> Result<ContainerHandle> {
    match stdout.lines().next().map(str::trim) {
        None | Some("") => Ok(requested.clone()),
        Some(line) if line.split_whitespace().count() == 1 => Ok(ContainerHandle::new(line)),
        Some(line) => Err(HarnessError::ContainerId(line.to_string())),
    }
}
