use std::future::Future;

use perf_harness_core::prelude::RunAbortedError;

use crate::artifacts::{collect_artifacts, CollectedArtifacts};
use crate::context::RunContext;
use crate::launcher::{build_command, ProcessHandle};
use crate::readiness::wait_for_port;
use crate::runbook::{TestCase, TestGroup};
use crate::scanner::{LineClass, OutputScanner, ScanOutcome};

/// Log target for server output.
pub const SERVER_LOG_TARGET: &str = "perf_harness::server";
/// Log target for client output.
pub const CLIENT_LOG_TARGET: &str = "perf_harness::client";

/// One measurement pass of one test.
#[derive(Debug, Clone, Copy)]
pub struct Stage<'a> {
    pub group: &'a TestGroup,
    pub test: &'a TestCase,
    pub stage: &'a str,
}

impl Stage<'_> {
    /// `<test>-<stage>`, used in logs and to tag collected artifacts.
    pub fn name(&self) -> String {
        format!("{}-{}", self.test.name, self.stage)
    }
}

/// The steps of a stage, in the order the orchestrator runs them.
///
/// The orchestrator guarantees that [StageHarness::stop_server] is called once the server was
/// started, whatever happens in between, and that [StageHarness::teardown] is called once at the
/// end of every run.
pub trait StageHarness {
    fn start_server(&mut self, stage: &Stage<'_>) -> impl Future<Output = anyhow::Result<()>>;

    fn await_ready(&mut self, stage: &Stage<'_>) -> impl Future<Output = anyhow::Result<()>>;

    fn run_client(
        &mut self,
        stage: &Stage<'_>,
    ) -> impl Future<Output = anyhow::Result<ScanOutcome>>;

    fn stop_server(&mut self, stage: &Stage<'_>) -> impl Future<Output = anyhow::Result<()>>;

    fn collect_artifacts(
        &mut self,
        stage: &Stage<'_>,
    ) -> impl Future<Output = anyhow::Result<CollectedArtifacts>>;

    /// Kill anything that is still running.
    fn teardown(&mut self);
}

/// Runs stages with real processes, started through the configured build tool.
#[derive(Debug)]
pub struct ProcessHarness {
    context: RunContext,
    server: Option<ProcessHandle>,
}

impl ProcessHarness {
    pub fn new(context: RunContext) -> Self {
        Self {
            context,
            server: None,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    fn launch(&self, task: &str, properties: &str) -> anyhow::Result<ProcessHandle> {
        let config = self.context.config();
        let (program, args) = build_command(&config.build_tool, task, properties)?;
        Ok(self
            .context
            .processes()
            .spawn(&program, &args, &config.working_dir)?)
    }
}

impl StageHarness for ProcessHarness {
    async fn start_server(&mut self, stage: &Stage<'_>) -> anyhow::Result<()> {
        log::info!("starting server...");
        let mut server = self.launch(
            &self.context.config().server_task,
            &stage.test.server_properties,
        )?;
        server.forward_output(SERVER_LOG_TARGET);
        self.server = Some(server);
        Ok(())
    }

    async fn await_ready(&mut self, _stage: &Stage<'_>) -> anyhow::Result<()> {
        let readiness = self.context.config().readiness;
        let mut shutdown = self.context.shutdown().new_listener();

        tokio::select! {
            attempts = wait_for_port(&readiness) => {
                log::info!("started server after {} attempt(s)...", attempts?);
                Ok(())
            }
            _ = shutdown.wait_for_shutdown() => Err(RunAbortedError::default().into()),
        }
    }

    async fn run_client(&mut self, stage: &Stage<'_>) -> anyhow::Result<ScanOutcome> {
        log::info!("starting client and running test...");
        let verbose = self.context.config().verbose;
        let mut client = self.launch(
            &self.context.config().client_task,
            &stage.test.client_properties,
        )?;
        client.forward_stderr(CLIENT_LOG_TARGET);

        let mut shutdown = self.context.shutdown().new_listener();
        let mut scanner = OutputScanner::default();
        loop {
            let line = tokio::select! {
                line = client.next_line() => line?,
                _ = shutdown.wait_for_shutdown() => return Err(RunAbortedError::default().into()),
            };
            let Some(line) = line else {
                break;
            };

            match scanner.feed(&line) {
                LineClass::ErrorOrWarning => log::warn!(target: CLIENT_LOG_TARGET, "{line}"),
                _ if verbose => log::info!(target: CLIENT_LOG_TARGET, "{line}"),
                _ => log::trace!(target: CLIENT_LOG_TARGET, "{line}"),
            }
        }

        let status = client.wait().await?;
        // Anything the client task left running is taken down with its group.
        client.kill().await?;
        if !status.success() {
            log::warn!("Client for {} exited with {status}", stage.name());
        }
        log::info!("stopped client...");

        Ok(scanner.finish())
    }

    async fn stop_server(&mut self, _stage: &Stage<'_>) -> anyhow::Result<()> {
        if let Some(mut server) = self.server.take() {
            let status = server.kill().await?;
            log::info!("stopped server ({status})...");
        }
        Ok(())
    }

    async fn collect_artifacts(&mut self, stage: &Stage<'_>) -> anyhow::Result<CollectedArtifacts> {
        log::info!("copying results and gc logs...");
        Ok(collect_artifacts(
            self.context.config(),
            &stage.group.name,
            &stage.name(),
        )?)
    }

    fn teardown(&mut self) {
        self.server = None;
        self.context.processes().kill_all();
    }
}
