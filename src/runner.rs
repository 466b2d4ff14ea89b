//! Test registry and sequential runner
//!
//! The registry is an explicit name → function map built at startup.
//! Tests run one at a time in name order; no test may depend on another
//! having run. Each test cleans up its own containers; the runner only
//! turns errors and panics into failures.
use crate::harness::Harness;
use crate::types::Verdict;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

/// A test body. `Err` means the test failed.
pub type TestFn = fn(&Harness) -> Result<Verdict>;

#[derive(Clone, Default)]
pub struct Registry {
    tests: BTreeMap<String, TestFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, test: TestFn) -> Result<&mut Self> {
        if self.tests.contains_key(name) {
            bail!("test {} registered twice", name);
        }
        self.tests.insert(name.to_string(), test);
        Ok(self)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Restrict to `names`; an empty slice keeps everything.
    pub fn select(&self, names: &[String]) -> Result<Registry> {
        if names.is_empty() {
            return Ok(self.clone());
        }
        let mut selected = Registry::new();
        for name in names {
            match self.tests.get(name) {
                Some(test) => {
                    selected.tests.insert(name.clone(), *test);
                }
                None => bail!(
                    "unknown test {} (known: {})",
                    name,
                    self.names().collect::<Vec<_>>().join(", ")
                ),
            }
        }
        Ok(selected)
    }
}

/// Result of one test case
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: String,
    #[serde(flatten)]
    pub verdict: Verdict,
    pub duration_secs: f64,
}

/// Aggregate of a whole run
#[derive(Debug, Clone)]
pub struct Summary {
    pub started_at: DateTime<Utc>,
    pub results: Vec<TestResult>,
}

/// On-disk form of a [`Summary`], totals included
#[derive(Serialize)]
struct Report<'a> {
    started_at: DateTime<Utc>,
    passed: usize,
    failed: usize,
    skipped: usize,
    results: &'a [TestResult],
}

impl Summary {
    pub fn passed(&self) -> usize {
        self.count(|v| matches!(v, Verdict::Pass))
    }

    pub fn failed(&self) -> usize {
        self.count(Verdict::is_failure)
    }

    pub fn skipped(&self) -> usize {
        self.count(|v| matches!(v, Verdict::Skip(_)))
    }

    fn count(&self, pred: impl Fn(&Verdict) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.verdict)).count()
    }

    /// Process exit status: nonzero iff something failed. Skips never
    /// count as failures, even when nothing else ran.
    pub fn exit_code(&self) -> i32 {
        if self.failed() > 0 {
            1
        } else {
            0
        }
    }

    pub fn write_report(&self, path: &Path) -> Result<()> {
        let report = Report {
            started_at: self.started_at,
            passed: self.passed(),
            failed: self.failed(),
            skipped: self.skipped(),
            results: &self.results,
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Run every registered test, printing TAP to stdout.
pub fn run_all(harness: &Harness, registry: &Registry) -> Summary {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_all_to(harness, registry, &mut out)
}

/// Like [`run_all`] but writes TAP to `out`. Write errors are logged and
/// never stop the run.
pub fn run_all_to<W: Write>(harness: &Harness, registry: &Registry, out: &mut W) -> Summary {
    let started_at = Utc::now();
    let mut results = Vec::with_capacity(registry.len());

    report(writeln!(out, "1..{}", registry.len()));
    for (index, (name, test)) in registry.tests.iter().enumerate() {
        let result = run_one(harness, name, *test);
        report(write_tap_line(out, index + 1, &result));
        results.push(result);
    }

    let summary = Summary {
        started_at,
        results,
    };
    report(writeln!(
        out,
        "# pass {}, fail {}, skip {}",
        summary.passed(),
        summary.failed(),
        summary.skipped()
    ));
    summary
}

fn report(written: io::Result<()>) {
    if let Err(e) = written {
        log::warn!("failed to write test output: {}", e);
    }
}

/// Run a single test, converting errors and panics into `Fail`.
pub fn run_one(harness: &Harness, name: &str, test: TestFn) -> TestResult {
    log::info!("running {}", name);
    let start = Instant::now();
    let verdict = match panic::catch_unwind(AssertUnwindSafe(|| test(harness))) {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(e)) => Verdict::Fail(format!("{:#}", e)),
        Err(payload) => Verdict::Fail(format!("panicked: {}", panic_message(&payload))),
    };
    let duration = start.elapsed();
    log::debug!("{} finished in {:?}: {:?}", name, duration, verdict);

    TestResult {
        name: name.to_string(),
        verdict,
        duration_secs: duration.as_secs_f64(),
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn write_tap_line<W: Write>(out: &mut W, number: usize, result: &TestResult) -> io::Result<()> {
    match &result.verdict {
        Verdict::Pass => writeln!(out, "ok {} - {}", number, result.name),
        Verdict::Skip(reason) if reason.is_empty() => {
            writeln!(out, "ok {} - {} # SKIP", number, result.name)
        }
        Verdict::Skip(reason) => writeln!(out, "ok {} - {} # SKIP {}", number, result.name, reason),
        Verdict::Fail(reason) => {
            writeln!(out, "not ok {} - {}", number, result.name)?;
            for line in reason.lines() {
                writeln!(out, "# {}", line)?;
            }
            Ok(())
        }
    }
}
