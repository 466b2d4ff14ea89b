//! Output and diagnostic checks
//!
//! Matching is a plain case-sensitive substring search. The diagnostic
//! texts below are exact strings the runtime prints; they are part of
//! this harness's contract with the runtime and must match verbatim.
use crate::runtime::{Captured, Invocation};
use crate::types::{HarnessError, Result};

/// Rejection for a unified key whose controller is not enabled
pub fn controller_not_available(controller: &str) -> String {
    format!("the requested controller `{}` is not available", controller)
}

/// Rejection for a unified key without a `CONTROLLER.VALUE` shape
pub fn malformed_unified_key(key: &str) -> String {
    format!("the specified key has not the form CONTROLLER.VALUE `{}`", key)
}

pub fn output_contains(output: &Captured, expected: &str) -> bool {
    output.stdout.contains(expected)
}

/// True only for a failed invocation whose diagnostic contains `expected`.
pub fn error_contains(invocation: &Invocation, expected: &str) -> bool {
    match invocation {
        Invocation::Failure(output) => output.diagnostic().contains(expected),
        _ => false,
    }
}

pub fn expect_output_contains(output: &Captured, expected: &str) -> Result<()> {
    if !output_contains(output, expected) {
        return Err(HarnessError::Mismatch {
            expected: expected.to_string(),
            actual: output.stdout.trim_end().to_string(),
        });
    }
    Ok(())
}

/// Require `invocation` to have failed with `expected` in its diagnostic.
pub fn expect_error_contains(invocation: Invocation, expected: &str) -> Result<()> {
    let output = invocation.into_failure()?;
    let diagnostic = output.diagnostic();
    if !diagnostic.contains(expected) {
        return Err(HarnessError::Mismatch {
            expected: expected.to_string(),
            actual: diagnostic,
        });
    }
    Ok(())
}
