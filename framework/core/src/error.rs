use std::path::{Path, PathBuf};

/// Result type used across the perf harness crates.
pub type PerfResult<T> = Result<T, PerfError>;

/// Every failure the harness can report.
///
/// None of these are retried. The only bounded retry in the harness is the readiness poll, which
/// gives up with [PerfError::Timeout].
#[derive(Debug, thiserror::Error)]
pub enum PerfError {
    /// A subprocess could not be started. Fatal for the whole run.
    #[error("Failed to launch `{command}`: {reason}")]
    Launch { command: String, reason: String },

    /// The server did not accept TCP connections within the startup budget.
    #[error("Port {port} did not accept connections after {attempts} attempts")]
    Timeout { port: u16, attempts: usize },

    /// A run-book was malformed or an output file lacked an expected metric.
    #[error("Failed to parse '{}': {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    /// A comparison result set lacks a test that is present in the baseline.
    #[error("Result set '{group}' has no result for test '{test}'")]
    Lookup { group: String, test: String },

    /// Switching the working tree to the branch requested by a run-book failed.
    #[error("`git {args}` failed: {reason}")]
    Git { args: String, reason: String },

    #[error("IO error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PerfError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PerfError::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Adapter for `map_err`, attaching the path that the IO operation was acting on.
    pub fn io(path: &Path) -> impl FnOnce(std::io::Error) -> PerfError + '_ {
        move |source| PerfError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
