//! Container handles and scoped cleanup
use crate::bundle::Bundle;
use crate::runtime::{Invocation, RuntimeInvoker};
use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier the runtime knows a container by
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerHandle(String);

impl ContainerHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh, unique id so concurrent harness runs never collide.
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("rescheck-{}", &uuid[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A detached container owned by the current test.
///
/// Dropping the guard force-deletes the container, so it is removed on
/// every exit path: normal return, `?` propagation and panics alike.
#[derive(Debug)]
pub struct Container<'a> {
    invoker: &'a RuntimeInvoker,
    handle: ContainerHandle,
    // Dropped after the container is gone.
    _bundle: Bundle,
    deleted: bool,
}

impl<'a> Container<'a> {
    pub(crate) fn new(invoker: &'a RuntimeInvoker, handle: ContainerHandle, bundle: Bundle) -> Self {
        Self {
            invoker,
            handle,
            _bundle: bundle,
            deleted: false,
        }
    }

    pub fn handle(&self) -> &ContainerHandle {
        &self.handle
    }

    pub fn exec(&self, args: &[&str]) -> Result<Invocation> {
        self.invoker.exec(&self.handle, args)
    }

    /// Delete explicitly and hand back the runtime's answer.
    ///
    /// Only a successful delete spends the guard; otherwise the drop that
    /// follows still runs `delete -f`.
    pub fn delete(mut self, force: bool) -> Result<Invocation> {
        let invocation = self.invoker.delete(&self.handle, force)?;
        self.deleted = invocation.is_success();
        Ok(invocation)
    }
}

impl Drop for Container<'_> {
    fn drop(&mut self) {
        if self.deleted {
            return;
        }
        match self.invoker.delete(&self.handle, true) {
            Ok(Invocation::Success(_)) => log::debug!("deleted container {}", self.handle),
            Ok(inv) => log::warn!(
                "failed to delete container {}: {}",
                self.handle,
                inv.output().diagnostic()
            ),
            Err(e) => log::warn!("failed to delete container {}: {}", self.handle, e),
        }
    }
}
