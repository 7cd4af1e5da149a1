use std::path::PathBuf;
use std::time::Duration;

use crate::readiness::ReadinessConfig;

/// Options for configuring a run of the [crate::orchestrator::Orchestrator].
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Where result files, GC logs, the run log and run summaries are written.
    pub out_dir: PathBuf,
    /// The build tool used to start the server and the client, e.g. `ligradle` or `./gradlew`.
    pub build_tool: String,
    /// Working directory of the launched processes.
    pub working_dir: PathBuf,
    /// The build output directory the test tasks write their artifacts into.
    pub build_dir: PathBuf,
    /// Sub-directory of [RunConfig::build_dir] holding `*.output` files and `logs/gc/*.log`.
    pub artifact_dir: String,
    /// Build tool task that starts the server.
    pub server_task: String,
    /// Build tool task that runs the client.
    pub client_task: String,
    pub readiness: ReadinessConfig,
    /// Names of the repeated measurement passes run for every test.
    pub stages: Vec<String>,
    /// Log every line of client output as it arrives.
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            out_dir: PathBuf::from("./out"),
            build_tool: "ligradle".to_string(),
            working_dir: PathBuf::from("."),
            build_dir: PathBuf::from("../build"),
            artifact_dir: "r2-perf-test".to_string(),
            server_task: "runHttpServer".to_string(),
            client_task: "runHttpRestClient".to_string(),
            readiness: ReadinessConfig::default(),
            stages: vec!["1".to_string(), "2".to_string()],
            verbose: false,
        }
    }
}

impl RunConfig {
    /// Set `out_dir` option
    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    /// Set `build_tool` option
    pub fn build_tool(mut self, tool: impl Into<String>) -> Self {
        self.build_tool = tool.into();
        self
    }

    /// Set `working_dir` option
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Set `build_dir` option
    pub fn build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = dir.into();
        self
    }

    /// Set `artifact_dir` option
    pub fn artifact_dir(mut self, dir: impl Into<String>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Set `server_task` and `client_task` options
    pub fn tasks(mut self, server_task: impl Into<String>, client_task: impl Into<String>) -> Self {
        self.server_task = server_task.into();
        self.client_task = client_task.into();
        self
    }

    /// Set the readiness port
    pub fn port(mut self, port: u16) -> Self {
        self.readiness.port = port;
        self
    }

    /// Set the readiness retry budget
    pub fn readiness_budget(mut self, max_attempts: usize, interval: Duration) -> Self {
        self.readiness.max_attempts = max_attempts;
        self.readiness.interval = interval;
        self
    }

    /// Run every test for `count` stages, named `1..=count`
    pub fn stage_count(mut self, count: usize) -> Self {
        self.stages = (1..=count).map(|stage| stage.to_string()).collect();
        self
    }

    /// Set `verbose` option
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// `<out>/<group>-result`, where the `.output` files of a group are collected.
    pub fn result_dir(&self, group: &str) -> PathBuf {
        self.out_dir.join(format!("{group}-result"))
    }

    /// `<out>/<group>-gc`, where the GC logs of a group are collected.
    pub fn gc_dir(&self, group: &str) -> PathBuf {
        self.out_dir.join(format!("{group}-gc"))
    }

    /// `<out>/<group>.log`, the results section of every stage's client output.
    pub fn group_log(&self, group: &str) -> PathBuf {
        self.out_dir.join(format!("{group}.log"))
    }

    pub fn run_summary_path(&self) -> PathBuf {
        self.out_dir.join("run_summary.jsonl")
    }

    /// The directory the test tasks write their artifacts into.
    pub fn artifact_source(&self) -> PathBuf {
        self.build_dir.join(&self.artifact_dir)
    }

    pub fn gc_source(&self) -> PathBuf {
        self.artifact_source().join("logs").join("gc")
    }
}
