use std::path::{Path, PathBuf};

use perf_harness_core::prelude::{PerfError, PerfResult};
use walkdir::WalkDir;

use crate::config::RunConfig;

/// Files collected after one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedArtifacts {
    pub results: Vec<PathBuf>,
    pub gc_logs: Vec<PathBuf>,
}

/// Move the stage's `*.output` files and copy its GC logs from the build directory into the
/// group's output directories, prefixing each file name with `stage_name` (`<test>-<stage>`).
///
/// Result files are moved so the next stage starts from an empty directory. GC logs are copied,
/// the build keeps appending to them.
pub fn collect_artifacts(
    config: &RunConfig,
    group: &str,
    stage_name: &str,
) -> PerfResult<CollectedArtifacts> {
    let result_dir = config.result_dir(group);
    let gc_dir = config.gc_dir(group);
    for dir in [&result_dir, &gc_dir] {
        std::fs::create_dir_all(dir).map_err(PerfError::io(dir))?;
    }

    let mut collected = CollectedArtifacts::default();

    for source in files_with_extension(&config.artifact_source(), "output") {
        let target = tagged_target(&result_dir, stage_name, &source);
        move_file(&source, &target)?;
        log::debug!("Moved '{}' to '{}'", source.display(), target.display());
        collected.results.push(target);
    }

    for source in files_with_extension(&config.gc_source(), "log") {
        let target = tagged_target(&gc_dir, stage_name, &source);
        std::fs::copy(&source, &target).map_err(PerfError::io(&source))?;
        log::debug!("Copied '{}' to '{}'", source.display(), target.display());
        collected.gc_logs.push(target);
    }

    if collected.results.is_empty() {
        log::warn!(
            "No result files found in '{}' for {stage_name}",
            config.artifact_source().display()
        );
    }

    Ok(collected)
}

/// Regular files directly inside `dir` with the given extension, sorted by name. A missing
/// directory yields nothing.
fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .collect::<Vec<_>>();
    files.sort();
    files
}

fn tagged_target(dir: &Path, stage_name: &str, source: &Path) -> PathBuf {
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{stage_name}-{file_name}"))
}

/// Rename, falling back to copy and remove when source and target are on different file systems.
fn move_file(source: &Path, target: &Path) -> PerfResult<()> {
    if std::fs::rename(source, target).is_ok() {
        return Ok(());
    }
    std::fs::copy(source, target).map_err(PerfError::io(source))?;
    std::fs::remove_file(source).map_err(PerfError::io(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, RunConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::default()
            .out_dir(dir.path().join("out"))
            .build_dir(dir.path().join("build"));
        std::fs::create_dir_all(config.gc_source()).unwrap();
        (dir, config)
    }

    #[test]
    fn moves_results_and_copies_gc_logs() {
        let (_dir, config) = setup();
        std::fs::write(config.artifact_source().join("result.output"), "Mean: 1.0\n").unwrap();
        std::fs::write(config.artifact_source().join("notes.txt"), "ignored").unwrap();
        std::fs::write(config.gc_source().join("gc.log"), "gc pause").unwrap();

        let collected = collect_artifacts(&config, "smoke", "t1-1").unwrap();

        let result = config.result_dir("smoke").join("t1-1-result.output");
        let gc = config.gc_dir("smoke").join("t1-1-gc.log");
        assert_eq!(collected.results, vec![result.clone()]);
        assert_eq!(collected.gc_logs, vec![gc.clone()]);
        assert_eq!(std::fs::read_to_string(result).unwrap(), "Mean: 1.0\n");
        assert_eq!(std::fs::read_to_string(gc).unwrap(), "gc pause");

        assert!(!config.artifact_source().join("result.output").exists());
        assert!(config.artifact_source().join("notes.txt").exists());
        assert!(config.gc_source().join("gc.log").exists());
    }

    #[test]
    fn missing_build_output_collects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::default()
            .out_dir(dir.path().join("out"))
            .build_dir(dir.path().join("no-build-yet"));

        let collected = collect_artifacts(&config, "smoke", "t1-2").unwrap();

        assert_eq!(collected, CollectedArtifacts::default());
        assert!(config.result_dir("smoke").is_dir());
        assert!(config.gc_dir("smoke").is_dir());
    }
}
