use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context as _;
use perf_harness_model::{append_run_summary, RunSummary};

use crate::branch::BranchCheckout;
use crate::config::RunConfig;
use crate::harness::{Stage, StageHarness};
use crate::runbook::{BranchSelector, TestGroup};
use crate::scanner::ScanOutcome;

/// Runs every stage of every test of every group, one after the other.
pub struct Orchestrator<H: StageHarness> {
    config: RunConfig,
    harness: H,
    run_id: String,
}

impl<H: StageHarness> Orchestrator<H> {
    pub fn new(config: RunConfig, harness: H) -> Self {
        Self {
            config,
            harness,
            run_id: nanoid::nanoid!(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn harness(&self) -> &H {
        &self.harness
    }

    /// Run all groups. The first failure aborts the run.
    ///
    /// The harness is torn down before returning, whether the run succeeded or not, so no process
    /// started by the run survives it.
    pub async fn run(&mut self, groups: &[TestGroup]) -> anyhow::Result<Vec<RunSummary>> {
        let start = Instant::now();
        let result = self.run_groups(groups).await;
        self.harness.teardown();

        if result.is_ok() {
            log::info!(
                "Took {:.1} seconds to finish tests",
                start.elapsed().as_secs_f64()
            );
        }
        result
    }

    async fn run_groups(&mut self, groups: &[TestGroup]) -> anyhow::Result<Vec<RunSummary>> {
        std::fs::create_dir_all(&self.config.out_dir).with_context(|| {
            format!(
                "Failed to create output directory '{}'",
                self.config.out_dir.display()
            )
        })?;

        let mut summaries = Vec::with_capacity(groups.len());
        for group in groups {
            log::info!("processing test group: {}", group.name);

            let checkout =
                BranchCheckout::checkout_optional(&self.config.working_dir, shared_branch(group))?;
            let result = self.run_group(group).await;
            let restored = checkout.map_or(Ok(()), BranchCheckout::restore);

            let summary = match (result, restored) {
                (Ok(summary), Ok(())) => summary,
                (Ok(_), Err(e)) => return Err(e.into()),
                (Err(e), restored) => {
                    if let Err(restore_error) = restored {
                        log::error!("Failed to restore branch after failed group: {restore_error}");
                    }
                    return Err(e);
                }
            };

            append_run_summary(&summary, &self.config.run_summary_path())
                .context("Failed to append run summary")?;
            summaries.push(summary);
        }

        Ok(summaries)
    }

    async fn run_group(&mut self, group: &TestGroup) -> anyhow::Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::new(
            self.run_id.clone(),
            group.name.clone(),
            group.branch.as_ref().map(BranchSelector::describe),
            chrono::Utc::now().timestamp(),
            group.tests.iter().map(|test| test.name.clone()).collect(),
            self.config.stages.len(),
        );
        let group_log = GroupLog::start(self.config.group_log(&group.name), &group.name)?;

        let stages = self.config.stages.clone();
        for test in &group.tests {
            for stage in &stages {
                let stage = Stage { group, test, stage };
                log::info!("processing test: {}", stage.name());
                log::info!("client properties: {}", test.client_properties);
                log::info!("server properties: {}", test.server_properties);

                let outcome = self
                    .run_stage(&stage)
                    .await
                    .with_context(|| format!("Test {} failed", stage.name()))?;

                if outcome.had_error_or_warning {
                    log::warn!("Client output of {} contained warnings or errors", stage.name());
                    summary.record_stage_with_warnings();
                }
                if outcome.collected.is_empty() {
                    log::warn!("No results section in client output of {}", stage.name());
                } else {
                    group_log.append_stage(&stage.name(), &outcome.collected)?;
                }
            }
        }

        summary.set_duration_s(started.elapsed().as_secs());
        log::info!("finished processing of test group: {}", group.name);
        Ok(summary)
    }

    /// StartServer, AwaitReady, RunClient, StopServer, CollectArtifacts.
    ///
    /// Once the server started, it is stopped even if waiting for it or running the client fails.
    async fn run_stage(&mut self, stage: &Stage<'_>) -> anyhow::Result<ScanOutcome> {
        let (client_branch, server_branch) = split_branches(stage.group);
        let server_checkout =
            BranchCheckout::checkout_optional(&self.config.working_dir, server_branch)?;

        self.harness.start_server(stage).await?;
        let client_result = self
            .ready_then_client(stage, server_checkout, client_branch)
            .await;
        let stop_result = self.harness.stop_server(stage).await;

        let outcome = match (client_result, stop_result) {
            (Ok(outcome), stop_result) => {
                stop_result?;
                outcome
            }
            (Err(e), stop_result) => {
                if let Err(stop_error) = stop_result {
                    log::error!("Failed to stop server after failed stage: {stop_error:?}");
                }
                return Err(e);
            }
        };

        let artifacts = self.harness.collect_artifacts(stage).await?;
        log::debug!(
            "Collected {} result file(s) and {} gc log(s) for {}",
            artifacts.results.len(),
            artifacts.gc_logs.len(),
            stage.name()
        );

        Ok(outcome)
    }

    async fn ready_then_client(
        &mut self,
        stage: &Stage<'_>,
        server_checkout: Option<BranchCheckout>,
        client_branch: Option<&str>,
    ) -> anyhow::Result<ScanOutcome> {
        let ready = self.harness.await_ready(stage).await;
        // The server is built and running, the working tree can move on.
        let restored = server_checkout.map_or(Ok(()), BranchCheckout::restore);
        ready?;
        restored?;

        let client_checkout =
            BranchCheckout::checkout_optional(&self.config.working_dir, client_branch)?;
        let outcome = self.harness.run_client(stage).await;
        let restored = client_checkout.map_or(Ok(()), BranchCheckout::restore);

        let outcome = outcome?;
        restored?;
        Ok(outcome)
    }
}

fn shared_branch(group: &TestGroup) -> Option<&str> {
    match &group.branch {
        Some(BranchSelector::Shared(branch)) => Some(branch),
        _ => None,
    }
}

/// `(client, server)` branches of a split selector.
fn split_branches(group: &TestGroup) -> (Option<&str>, Option<&str>) {
    match &group.branch {
        Some(BranchSelector::Split { client, server }) => (client.as_deref(), server.as_deref()),
        _ => (None, None),
    }
}

/// The per-group result file, in the format read by the log splitter: a group header, then for
/// every completed stage with results a test header followed by the collected results section.
struct GroupLog {
    path: PathBuf,
}

impl GroupLog {
    fn start(path: PathBuf, group: &str) -> anyhow::Result<Self> {
        let log = Self { path };
        log.append(&[format!("processing test group: {group}")])?;
        Ok(log)
    }

    /// Only called once a stage fully completed, a failed stage leaves nothing behind.
    fn append_stage(&self, stage_name: &str, collected: &[String]) -> anyhow::Result<()> {
        let mut lines = Vec::with_capacity(collected.len() + 1);
        lines.push(format!("processing test: {stage_name}"));
        lines.extend(collected.iter().cloned());
        self.append(&lines)
    }

    fn append(&self, lines: &[String]) -> anyhow::Result<()> {
        let mut file = open_append(&self.path)?;
        for line in lines {
            writeln!(file, "{line}")
                .with_context(|| format!("Failed to write to '{}'", self.path.display()))?;
        }
        Ok(())
    }
}

fn open_append(path: &Path) -> anyhow::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open result file '{}'", path.display()))
}
