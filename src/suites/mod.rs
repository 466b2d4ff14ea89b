//! Built-in test suites
pub mod resources;

use crate::runner::Registry;
use anyhow::Result;

/// Registry holding every built-in test.
pub fn default_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    resources::register(&mut registry)?;
    Ok(registry)
}
