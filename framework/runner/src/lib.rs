mod artifacts;
mod branch;
mod config;
mod context;
mod harness;
mod launcher;
mod orchestrator;
mod readiness;
mod runbook;
mod scanner;
mod shutdown;

pub mod prelude {
    pub use crate::artifacts::{collect_artifacts, CollectedArtifacts};
    pub use crate::branch::BranchCheckout;
    pub use crate::config::RunConfig;
    pub use crate::context::RunContext;
    pub use crate::harness::{
        ProcessHarness, Stage, StageHarness, CLIENT_LOG_TARGET, SERVER_LOG_TARGET,
    };
    pub use crate::launcher::{build_command, ProcessGroup, ProcessHandle};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::readiness::{
        wait_for_port, wait_until_ready, Probe, ReadinessConfig, TcpProbe,
    };
    pub use crate::runbook::{
        parse_runbook, read_runbook, read_runbooks, BranchSelector, TestCase, TestGroup,
    };
    pub use crate::scanner::{LineClass, OutputScanner, ScanOutcome, ScanState};
    pub use crate::shutdown::start_shutdown_listener;
}
