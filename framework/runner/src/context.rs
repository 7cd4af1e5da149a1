use perf_harness_core::prelude::ShutdownHandle;

use crate::config::RunConfig;
use crate::launcher::ProcessGroup;

/// Everything a run shares: its configuration, the registry of spawned processes and the shutdown
/// signal.
///
/// Dropping the context kills every process that is still registered.
#[derive(Debug)]
pub struct RunContext {
    config: RunConfig,
    processes: ProcessGroup,
    shutdown: ShutdownHandle,
}

impl RunContext {
    pub fn new(config: RunConfig, shutdown: ShutdownHandle) -> Self {
        Self {
            config,
            processes: ProcessGroup::new(),
            shutdown,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn processes(&self) -> &ProcessGroup {
        &self.processes
    }

    pub fn shutdown(&self) -> &ShutdownHandle {
        &self.shutdown
    }
}
