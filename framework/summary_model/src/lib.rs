use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

mod run_summary;

pub use run_summary::{append_run_summary, load_run_summaries, RunSummary};

/// The metrics that are extracted from a client's `.output` file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Mean,
    Median,
    P90,
    P95,
    Throughput,
}

impl MetricKind {
    /// All metric kinds, in the order markers are checked against a line.
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Mean,
        MetricKind::Median,
        MetricKind::P90,
        MetricKind::P95,
        MetricKind::Throughput,
    ];

    /// The fixed text that identifies a line carrying this metric.
    pub fn marker(self) -> &'static str {
        match self {
            MetricKind::Mean => "Mean",
            MetricKind::Median => "50%",
            MetricKind::P90 => "90%",
            MetricKind::P95 => "95%",
            MetricKind::Throughput => "Reqs",
        }
    }

    /// Name used for report files and headers.
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Mean => "mean",
            MetricKind::Median => "median",
            MetricKind::P90 => "p90",
            MetricKind::P95 => "p95",
            MetricKind::Throughput => "throughput",
        }
    }

    /// The first metric whose marker appears in `line`, if any.
    pub fn classify(line: &str) -> Option<MetricKind> {
        Self::ALL
            .into_iter()
            .find(|kind| line.contains(kind.marker()))
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One value read from one output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub test_name: String,
    pub kind: MetricKind,
    pub value: f64,
}

/// The averaged metrics of every output file that shares a test name within one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub group_name: String,
    pub test_name: String,
    pub metrics: BTreeMap<MetricKind, f64>,
}

impl AggregatedResult {
    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        self.metrics.get(&kind).copied()
    }
}

/// Aggregated results of one group, keyed by test name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupResults {
    pub group_name: String,
    pub results: HashMap<String, AggregatedResult>,
}

impl GroupResults {
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            group_name: group_name.into(),
            results: HashMap::new(),
        }
    }

    pub fn get(&self, test_name: &str) -> Option<&AggregatedResult> {
        self.results.get(test_name)
    }

    pub fn insert(&mut self, result: AggregatedResult) {
        self.results.insert(result.test_name.clone(), result);
    }

    /// Test names in a stable order, for rendering.
    pub fn test_names(&self) -> Vec<&str> {
        let mut names = self.results.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
