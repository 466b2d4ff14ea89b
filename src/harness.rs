//! Shared context handed to every test case
use crate::probe::HostEnvironment;
use crate::runtime::RuntimeInvoker;
use crate::types::HarnessConfig;

pub struct Harness {
    pub invoker: RuntimeInvoker,
    pub host: HostEnvironment,
}

impl Harness {
    pub fn new(config: HarnessConfig, host: HostEnvironment) -> Self {
        Self {
            invoker: RuntimeInvoker::new(config),
            host,
        }
    }

    /// Probe the real host once and build the context around it.
    pub fn from_host(config: HarnessConfig) -> Self {
        Self::new(config, HostEnvironment::probe())
    }

    pub fn config(&self) -> &HarnessConfig {
        self.invoker.config()
    }
}
