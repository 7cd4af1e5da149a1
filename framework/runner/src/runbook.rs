use std::path::{Path, PathBuf};

use perf_harness_core::prelude::{PerfError, PerfResult};
use serde::Deserialize;

/// A single test to run against a freshly started server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    /// Passed verbatim to the client task.
    pub client_properties: String,
    /// Passed verbatim to the server task.
    pub server_properties: String,
}

/// Which branch(es) of the working tree a group should be run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSelector {
    /// Client and server are both built from this branch.
    Shared(String),
    /// The server and the client are built from different branches. Either side may be left on
    /// the current branch.
    Split {
        client: Option<String>,
        server: Option<String>,
    },
}

impl BranchSelector {
    fn from_document(
        branch: Option<String>,
        client: Option<String>,
        server: Option<String>,
    ) -> Option<Self> {
        match (branch, client, server) {
            (Some(branch), _, _) => Some(BranchSelector::Shared(branch)),
            (None, None, None) => None,
            (None, client, server) => Some(BranchSelector::Split { client, server }),
        }
    }

    /// Short description for logs and run summaries.
    pub fn describe(&self) -> String {
        match self {
            BranchSelector::Shared(branch) => branch.clone(),
            BranchSelector::Split { client, server } => format!(
                "client={}, server={}",
                client.as_deref().unwrap_or("<current>"),
                server.as_deref().unwrap_or("<current>")
            ),
        }
    }
}

/// A named group of tests, loaded from one run-book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestGroup {
    pub name: String,
    pub tests: Vec<TestCase>,
    pub branch: Option<BranchSelector>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunBookDocument {
    test_group: String,
    #[serde(default)]
    common_client_properties: String,
    #[serde(default)]
    common_server_properties: String,
    branch: Option<String>,
    client_branch: Option<String>,
    server_branch: Option<String>,
    tests: Vec<TestDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestDocument {
    name: String,
    #[serde(default)]
    client_properties: String,
    #[serde(default)]
    server_properties: String,
}

/// Load every run-book, in the order given. The first malformed document fails the load.
pub fn read_runbooks<P: AsRef<Path>>(paths: &[P]) -> PerfResult<Vec<TestGroup>> {
    paths.iter().map(|path| read_runbook(path.as_ref())).collect()
}

pub fn read_runbook(path: &Path) -> PerfResult<TestGroup> {
    let content = std::fs::read_to_string(path).map_err(PerfError::io(path))?;
    let group = parse_runbook(&content, path)?;
    log::debug!(
        "Loaded test group '{}' with {} tests from '{}'",
        group.name,
        group.tests.len(),
        path.display()
    );
    Ok(group)
}

/// Parse a run-book document. `source` is only used for error messages.
pub fn parse_runbook(content: &str, source: impl Into<PathBuf>) -> PerfResult<TestGroup> {
    let document: RunBookDocument = serde_json::from_str(content)
        .map_err(|e| PerfError::parse(source, format!("Invalid run-book: {e}")))?;

    let tests = document
        .tests
        .into_iter()
        .map(|test| TestCase {
            name: test.name,
            client_properties: merge_properties(
                &test.client_properties,
                &document.common_client_properties,
            ),
            server_properties: merge_properties(
                &test.server_properties,
                &document.common_server_properties,
            ),
        })
        .collect();

    Ok(TestGroup {
        name: document.test_group,
        tests,
        branch: BranchSelector::from_document(
            document.branch,
            document.client_branch,
            document.server_branch,
        ),
    })
}

/// Test specific properties come first, followed by the common ones.
fn merge_properties(specific: &str, common: &str) -> String {
    [specific.trim(), common.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
