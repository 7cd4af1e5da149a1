use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use perf_harness_core::prelude::{PerfError, PerfResult};
use perf_harness_model::{AggregatedResult, GroupResults, MetricKind, MetricSample};
use regex::Regex;
use walkdir::WalkDir;

const RESULT_DIR_SUFFIX: &str = "-result";

static STAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d+-result$").expect("valid stage suffix"));

/// Read every `*.output` file in `dir` and average the metrics of files that share a test name.
pub fn parse_results(dir: &Path) -> PerfResult<GroupResults> {
    if !dir.is_dir() {
        return Err(PerfError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a result directory"),
        });
    }

    let group_name = group_name(dir);
    let files = output_files(dir);
    if files.is_empty() {
        log::warn!("No output files found in '{}'", dir.display());
    }

    let mut by_test: BTreeMap<String, BTreeMap<MetricKind, Vec<f64>>> = BTreeMap::new();
    for file in &files {
        for sample in parse_output_file(file)? {
            by_test
                .entry(sample.test_name)
                .or_default()
                .entry(sample.kind)
                .or_default()
                .push(sample.value);
        }
    }

    let mut results = GroupResults::new(group_name.clone());
    for (test_name, samples) in by_test {
        let metrics = samples
            .into_iter()
            .map(|(kind, values)| (kind, mean(&values)))
            .collect();
        results.insert(AggregatedResult {
            group_name: group_name.clone(),
            test_name,
            metrics,
        });
    }

    log::debug!(
        "Parsed {} file(s) into {} test(s) for group '{}'",
        files.len(),
        results.len(),
        group_name
    );
    Ok(results)
}

/// The samples of one output file, one per metric kind.
pub fn parse_output_file(path: &Path) -> PerfResult<Vec<MetricSample>> {
    let content = std::fs::read_to_string(path).map_err(PerfError::io(path))?;
    let test_name = test_name(path);
    let metrics = parse_metrics(&content, path)?;

    Ok(metrics
        .into_iter()
        .map(|(kind, value)| MetricSample {
            test_name: test_name.clone(),
            kind,
            value,
        })
        .collect())
}

/// Find every metric in `content`. Each line counts for the first marker it contains and a later
/// line overrides an earlier one of the same kind. Every kind must be present.
pub fn parse_metrics(content: &str, path: &Path) -> PerfResult<BTreeMap<MetricKind, f64>> {
    let mut found = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if let Some(kind) = MetricKind::classify(line) {
            found.insert(kind, metric_value(line, kind, path)?);
        }
    }

    MetricKind::ALL
        .into_iter()
        .map(|kind| {
            found.get(&kind).map(|value| (kind, *value)).ok_or_else(|| {
                PerfError::parse(path, format!("Missing metric marker '{}'", kind.marker()))
            })
        })
        .collect()
}

fn metric_value(line: &str, kind: MetricKind, path: &Path) -> PerfResult<f64> {
    let raw = line.split_once(':').map(|(_, value)| value.trim());
    raw.and_then(|value| value.parse::<f64>().ok())
        .ok_or_else(|| {
            PerfError::parse(
                path,
                format!("No numeric value for metric marker '{}' in line '{line}'", kind.marker()),
            )
        })
}

/// Unweighted arithmetic mean, computed over the sorted values as an offset from the minimum so
/// that the result does not depend on the order of the inputs and identical values come back
/// unchanged.
pub fn mean(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let Some(&min) = sorted.first() else {
        return f64::NAN;
    };

    let offsets = sorted.iter().map(|value| value - min).sum::<f64>();
    min + offsets / sorted.len() as f64
}

/// Directory basename without the `-result` suffix.
pub fn group_name(dir: &Path) -> String {
    let base = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.replacen(RESULT_DIR_SUFFIX, "", 1)
}

/// File stem without the `-<stage>-result` suffix, so every stage of a test shares one name.
pub fn test_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    STAGE_SUFFIX.replace(&stem, "").into_owned()
}

fn output_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "output"))
        .collect::<Vec<_>>();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(mean: f64, median: f64, p90: f64, p95: f64, reqs: f64) -> String {
        format!(
            "=== Results === DONE\n\
             Mean: {mean}\n\
             50% requests under: {median}\n\
             90% requests under: {p90}\n\
             95% requests under: {p95}\n\
             Reqs/sec: {reqs}\n"
        )
    }

    #[test]
    fn names_come_from_directory_and_file() {
        assert_eq!(group_name(Path::new("out/baseline-result")), "baseline");
        assert_eq!(group_name(Path::new("out/baseline-result/")), "baseline");
        assert_eq!(group_name(Path::new("plain")), "plain");

        assert_eq!(test_name(Path::new("d/t1-1-result.output")), "t1");
        assert_eq!(test_name(Path::new("d/t1-12-result.output")), "t1");
        assert_eq!(test_name(Path::new("d/get-small-2-result.output")), "get-small");
        assert_eq!(test_name(Path::new("d/other.output")), "other");
    }

    #[test]
    fn first_marker_wins_and_later_lines_override() {
        let content = "Mean: 1.0\nMean: 2.0\n50%: 3\n90%: 4\n95% of Reqs: 5\nReqs/sec: 6\n";
        let metrics = parse_metrics(content, Path::new("x.output")).unwrap();

        assert_eq!(metrics[&MetricKind::Mean], 2.0);
        assert_eq!(metrics[&MetricKind::Median], 3.0);
        assert_eq!(metrics[&MetricKind::P90], 4.0);
        assert_eq!(metrics[&MetricKind::P95], 5.0);
        assert_eq!(metrics[&MetricKind::Throughput], 6.0);
    }

    #[test]
    fn missing_marker_is_parse_error() {
        let content = "Mean: 1.0\n50%: 3\n95%: 5\nReqs/sec: 6\n";
        let err = parse_metrics(content, Path::new("t1-1-result.output")).unwrap_err();

        match err {
            PerfError::Parse { path, reason } => {
                assert_eq!(path, PathBuf::from("t1-1-result.output"));
                assert!(reason.contains("'90%'"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unparsable_value_is_parse_error() {
        let content = "Mean: fast\n";
        let err = parse_metrics(content, Path::new("x.output")).unwrap_err();
        assert!(matches!(err, PerfError::Parse { .. }));
    }

    #[test]
    fn mean_of_identical_values_is_exact() {
        assert_eq!(mean(&[0.1, 0.1, 0.1]), 0.1);
        assert_eq!(mean(&[1234.5678; 7]), 1234.5678);
    }

    #[test]
    fn mean_ignores_input_order() {
        let values = [0.1, 7.25, 3.3, 1e-3, 42.0];
        let mut reversed = values;
        reversed.reverse();

        assert_eq!(mean(&values), mean(&reversed));
        assert!((mean(&values) - 10.5302).abs() < 1e-9);
    }

    #[test]
    fn single_file_keeps_its_values() {
        let dir = tempfile::tempdir().unwrap();
        let result_dir = dir.path().join("smoke-result");
        std::fs::create_dir(&result_dir).unwrap();
        std::fs::write(
            result_dir.join("t1-1-result.output"),
            output(1.5, 1.0, 2.0, 3.0, 100.0),
        )
        .unwrap();

        let results = parse_results(&result_dir).unwrap();

        assert_eq!(results.group_name, "smoke");
        let t1 = results.get("t1").unwrap();
        assert_eq!(t1.group_name, "smoke");
        assert_eq!(t1.get(MetricKind::Mean), Some(1.5));
        assert_eq!(t1.get(MetricKind::Median), Some(1.0));
        assert_eq!(t1.get(MetricKind::P90), Some(2.0));
        assert_eq!(t1.get(MetricKind::P95), Some(3.0));
        assert_eq!(t1.get(MetricKind::Throughput), Some(100.0));
    }

    #[test]
    fn stages_of_one_test_are_averaged() {
        let dir = tempfile::tempdir().unwrap();
        let result_dir = dir.path().join("smoke-result");
        std::fs::create_dir(&result_dir).unwrap();
        std::fs::write(
            result_dir.join("t1-1-result.output"),
            output(1.0, 1.0, 2.0, 3.0, 100.0),
        )
        .unwrap();
        std::fs::write(
            result_dir.join("t1-2-result.output"),
            output(2.0, 1.0, 4.0, 3.0, 300.0),
        )
        .unwrap();
        std::fs::write(
            result_dir.join("t2-1-result.output"),
            output(9.0, 9.0, 9.0, 9.0, 9.0),
        )
        .unwrap();
        std::fs::write(result_dir.join("notes.txt"), "Mean: 1000").unwrap();

        let results = parse_results(&result_dir).unwrap();

        assert_eq!(results.test_names(), vec!["t1", "t2"]);
        let t1 = results.get("t1").unwrap();
        assert_eq!(t1.get(MetricKind::Mean), Some(1.5));
        assert_eq!(t1.get(MetricKind::Median), Some(1.0));
        assert_eq!(t1.get(MetricKind::P90), Some(3.0));
        assert_eq!(t1.get(MetricKind::Throughput), Some(200.0));
        assert_eq!(results.get("t2").unwrap().get(MetricKind::Mean), Some(9.0));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_results(&dir.path().join("nope-result")).unwrap_err();
        assert!(matches!(err, PerfError::Io { .. }));
    }
}
