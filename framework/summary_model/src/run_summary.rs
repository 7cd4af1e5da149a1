use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::Path;

/// Summary of one test group's run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the orchestrator and shared by every group of a single invocation.
    pub run_id: String,
    /// The name of the test group that was run
    pub group_name: String,
    /// The branch the group was run against, if the run-book requested one
    pub branch: Option<String>,
    /// The time the group started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// How long the group took to run, in seconds
    pub duration_s: u64,
    /// Test names in run-book order
    pub tests: Vec<String>,
    /// The number of stages each test was run for
    pub stages: usize,
    /// The number of stages whose client output contained warnings or errors
    pub stages_with_warnings: usize,
}

impl RunSummary {
    pub fn new(
        run_id: String,
        group_name: String,
        branch: Option<String>,
        started_at: i64,
        tests: Vec<String>,
        stages: usize,
    ) -> Self {
        Self {
            run_id,
            group_name,
            branch,
            started_at,
            duration_s: 0,
            tests,
            stages,
            stages_with_warnings: 0,
        }
    }

    pub fn set_duration_s(&mut self, duration_s: u64) {
        self.duration_s = duration_s;
    }

    pub fn record_stage_with_warnings(&mut self) {
        self.stages_with_warnings += 1;
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    serde_json::to_writer(&mut file, run_summary)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Load run summaries from a file written by [append_run_summary]
pub fn load_run_summaries(path: &Path) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        runs.push(serde_json::from_str(&line)?);
    }
    Ok(runs)
}
