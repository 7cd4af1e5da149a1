//! Splitting a combined test log into one result file per test.
//!
//! The log holds `processing test group: <group>` headers, each followed by
//! `processing test: <test>` headers. A test's results start at the line matching `DONE` and end
//! before the line matching `BUILD SUCCESSFUL`.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use perf_harness_core::prelude::{PerfError, PerfResult};
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitState {
    /// Waiting for a group or test header.
    Idle { group: Option<String> },
    /// A test header was seen, waiting for its results.
    InTest { group: Option<String>, test: String },
    /// Collecting result lines until the end marker.
    Collecting {
        group: Option<String>,
        test: String,
        lines: Vec<String>,
    },
}

impl Default for SplitState {
    fn default() -> Self {
        SplitState::Idle { group: None }
    }
}

/// A test whose results section was seen completely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitTest {
    pub group: Option<String>,
    pub test: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    GroupStarted(String),
    TestFinished(SplitTest),
    /// A test header was followed by another one before any results.
    TestSkipped(String),
}

/// The markers of the combined log.
#[derive(Debug, Clone)]
pub struct LogSplitter {
    group_header: Regex,
    test_header: Regex,
    results_begin: Regex,
    results_end: Regex,
    log_prefix: Regex,
}

impl Default for LogSplitter {
    fn default() -> Self {
        Self {
            group_header: Regex::new(r"processing test group: (.*$)").expect("valid group header"),
            test_header: Regex::new(r"processing test: (.*$)").expect("valid test header"),
            results_begin: Regex::new("DONE").expect("valid results marker"),
            results_end: Regex::new("BUILD SUCCESSFUL").expect("valid end marker"),
            log_prefix: Regex::new(r"^\d+.* INFO\s*").expect("valid log prefix"),
        }
    }
}

impl LogSplitter {
    /// Advance `state` by one line. Group headers are only recognised between tests, test headers
    /// also while waiting for results.
    pub fn transition(&self, state: SplitState, line: &str) -> (SplitState, Effect) {
        let line = line.trim();
        match state {
            SplitState::Idle { group } => {
                if let Some(name) = capture(&self.group_header, line) {
                    return (
                        SplitState::Idle {
                            group: Some(name.clone()),
                        },
                        Effect::GroupStarted(name),
                    );
                }
                match capture(&self.test_header, line) {
                    Some(test) => (SplitState::InTest { group, test }, Effect::None),
                    None => (SplitState::Idle { group }, Effect::None),
                }
            }
            SplitState::InTest { group, test } => {
                if let Some(next) = capture(&self.test_header, line) {
                    return (
                        SplitState::InTest { group, test: next },
                        Effect::TestSkipped(test),
                    );
                }
                if self.results_begin.is_match(line) {
                    let lines = vec![self.strip_prefix(line)];
                    (SplitState::Collecting { group, test, lines }, Effect::None)
                } else {
                    (SplitState::InTest { group, test }, Effect::None)
                }
            }
            SplitState::Collecting {
                group,
                test,
                mut lines,
            } => {
                if self.results_end.is_match(line) {
                    let finished = SplitTest {
                        group: group.clone(),
                        test,
                        lines,
                    };
                    (SplitState::Idle { group }, Effect::TestFinished(finished))
                } else {
                    lines.push(self.strip_prefix(line));
                    (SplitState::Collecting { group, test, lines }, Effect::None)
                }
            }
        }
    }

    fn strip_prefix(&self, line: &str) -> String {
        self.log_prefix.replace(line, "").into_owned()
    }
}

fn capture(regex: &Regex, line: &str) -> Option<String> {
    regex
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
}

/// Split `log_file` into `<out_dir>/<group>/<test>-result.output` files.
///
/// A file is only written once its end marker was seen. A test still open at the end of the log
/// is dropped with a warning.
pub fn split_log(log_file: &Path, out_dir: &Path) -> PerfResult<Vec<PathBuf>> {
    let file = std::fs::File::open(log_file).map_err(PerfError::io(log_file))?;
    std::fs::create_dir_all(out_dir).map_err(PerfError::io(out_dir))?;

    let splitter = LogSplitter::default();
    let mut state = SplitState::default();
    let mut written = Vec::new();

    for line in BufReader::new(file).lines() {
        let line = line.map_err(PerfError::io(log_file))?;
        let (next, effect) = splitter.transition(state, &line);
        state = next;

        match effect {
            Effect::None => {}
            Effect::GroupStarted(group) => {
                let dir = out_dir.join(&group);
                std::fs::create_dir_all(&dir).map_err(PerfError::io(&dir))?;
                log::debug!("Found test group '{group}'");
            }
            Effect::TestFinished(test) => written.push(write_test(out_dir, test)?),
            Effect::TestSkipped(test) => {
                log::warn!("Test '{test}' has no results, skipping it");
            }
        }
    }

    match state {
        SplitState::InTest { test, .. } | SplitState::Collecting { test, .. } => {
            log::warn!("Log ended before the results of test '{test}' were complete, skipping it");
        }
        SplitState::Idle { .. } => {}
    }

    log::info!(
        "Split {} test result(s) from '{}'",
        written.len(),
        log_file.display()
    );
    Ok(written)
}

fn write_test(out_dir: &Path, test: SplitTest) -> PerfResult<PathBuf> {
    let dir = match &test.group {
        Some(group) => out_dir.join(group),
        None => out_dir.to_path_buf(),
    };
    let path = dir.join(format!("{}-result.output", test.test));

    let mut content = test.lines.join("\n");
    content.push('\n');
    std::fs::write(&path, content).map_err(PerfError::io(&path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lines: &[&str]) -> (SplitState, Vec<Effect>) {
        let splitter = LogSplitter::default();
        let mut state = SplitState::default();
        let mut effects = Vec::new();
        for line in lines {
            let (next, effect) = splitter.transition(state, line);
            state = next;
            if effect != Effect::None {
                effects.push(effect);
            }
        }
        (state, effects)
    }

    #[test]
    fn splits_results_between_markers() {
        let (state, effects) = run(&[
            "processing test group: smoke",
            "processing test: t1-1",
            "compiling...",
            "1700000000000 [main] INFO === Results === DONE",
            "1700000000001 [main] INFO   Mean: 1.5",
            "Reqs/sec: 100",
            "BUILD SUCCESSFUL",
            "trailing noise",
        ]);

        assert_eq!(
            state,
            SplitState::Idle {
                group: Some("smoke".to_string())
            }
        );
        pretty_assertions::assert_eq!(
            effects,
            vec![
                Effect::GroupStarted("smoke".to_string()),
                Effect::TestFinished(SplitTest {
                    group: Some("smoke".to_string()),
                    test: "t1-1".to_string(),
                    lines: vec![
                        "=== Results === DONE".to_string(),
                        "Mean: 1.5".to_string(),
                        "Reqs/sec: 100".to_string(),
                    ],
                }),
            ]
        );
    }

    #[test]
    fn group_header_inside_a_test_is_content() {
        let (state, effects) = run(&[
            "processing test: t1-1",
            "DONE",
            "processing test group: other",
        ]);

        assert!(effects.is_empty());
        assert_eq!(
            state,
            SplitState::Collecting {
                group: None,
                test: "t1-1".to_string(),
                lines: vec!["DONE".to_string(), "processing test group: other".to_string()],
            }
        );
    }

    #[test]
    fn test_header_without_results_waits() {
        let (state, _) = run(&["processing test: t1-1", "BUILD SUCCESSFUL"]);
        assert_eq!(
            state,
            SplitState::InTest {
                group: None,
                test: "t1-1".to_string()
            }
        );
    }

    #[test]
    fn writes_terminated_tests_only() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("smoke.log");
        std::fs::write(
            &log,
            "processing test group: smoke\n\
             processing test: t1-1\n\
             DONE\n\
             Mean: 1.5\n\
             BUILD SUCCESSFUL\n\
             processing test: t1-2\n\
             DONE\n\
             Mean: 2.5\n",
        )
        .unwrap();
        let out = dir.path().join("out");

        let written = split_log(&log, &out).unwrap();

        let expected = out.join("smoke").join("t1-1-result.output");
        assert_eq!(written, vec![expected.clone()]);
        assert_eq!(
            std::fs::read_to_string(expected).unwrap(),
            "DONE\nMean: 1.5\n"
        );
        assert!(!out.join("smoke").join("t1-2-result.output").exists());
    }

    #[test]
    fn test_header_without_results_is_skipped() {
        let (state, effects) = run(&[
            "processing test group: g",
            "processing test: t1-1",
            "processing test: t2-1",
            "DONE",
            "Mean: 9.0",
            "BUILD SUCCESSFUL",
        ]);

        pretty_assertions::assert_eq!(
            effects,
            vec![
                Effect::GroupStarted("g".to_string()),
                Effect::TestSkipped("t1-1".to_string()),
                Effect::TestFinished(SplitTest {
                    group: Some("g".to_string()),
                    test: "t2-1".to_string(),
                    lines: vec!["DONE".to_string(), "Mean: 9.0".to_string()],
                }),
            ]
        );
        assert_eq!(
            state,
            SplitState::Idle {
                group: Some("g".to_string())
            }
        );
    }

    #[test]
    fn results_keep_the_name_of_their_own_test() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("g.log");
        std::fs::write(
            &log,
            "processing test group: g\n\
             processing test: t1-1\n\
             processing test: t2-1\n\
             DONE\n\
             Mean: 9.0\n\
             BUILD SUCCESSFUL\n",
        )
        .unwrap();
        let out = dir.path().join("out");

        let written = split_log(&log, &out).unwrap();

        assert_eq!(written, vec![out.join("g").join("t2-1-result.output")]);
        assert!(!out.join("g").join("t1-1-result.output").exists());
    }
}
