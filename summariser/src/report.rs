use std::path::{Path, PathBuf};

use perf_harness_core::prelude::{PerfError, PerfResult};
use perf_harness_model::{GroupResults, MetricKind};
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::Table;

/// One comparison group's value for a test, relative to the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonCell {
    pub group_name: String,
    pub value: f64,
    /// `None` when the baseline value is zero.
    pub percent_delta: Option<f64>,
}

/// One report row: a baseline test and how every comparison group did on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub kind: MetricKind,
    pub test_name: String,
    pub baseline_value: f64,
    pub comparisons: Vec<ComparisonCell>,
}

impl ComparisonRow {
    fn cells(&self) -> Vec<String> {
        std::iter::once(self.test_name.clone())
            .chain(std::iter::once(format_value(self.kind, self.baseline_value)))
            .chain(self.comparisons.iter().map(|cell| {
                format!(
                    "{} ({})",
                    format_value(self.kind, cell.value),
                    format_delta(cell.percent_delta)
                )
            }))
            .collect()
    }
}

pub fn percent_delta(baseline: f64, value: f64) -> Option<f64> {
    if baseline == 0.0 {
        return None;
    }
    Some((value - baseline) / baseline * 100.0)
}

/// Throughput is reported as a whole number of requests, everything else with three decimals.
pub fn format_value(kind: MetricKind, value: f64) -> String {
    match kind {
        MetricKind::Throughput => format!("{}", value.trunc() as i64),
        _ => format!("{value:.3}"),
    }
}

pub fn format_delta(delta: Option<f64>) -> String {
    match delta {
        None => "n/a".to_string(),
        Some(delta) if delta > 0.0 => format!("+{delta:.1}%"),
        Some(delta) => format!("{delta:.1}%"),
    }
}

/// Rows for `kind`, one per baseline test in name order.
///
/// Fails with [PerfError::Lookup] if any comparison group lacks a baseline test.
pub fn comparison_rows(
    kind: MetricKind,
    baseline: &GroupResults,
    comparisons: &[GroupResults],
) -> PerfResult<Vec<ComparisonRow>> {
    baseline
        .test_names()
        .into_iter()
        .map(|test_name| {
            let baseline_value = lookup(baseline, test_name, kind)?;
            let comparisons = comparisons
                .iter()
                .map(|group| {
                    let value = lookup(group, test_name, kind)?;
                    Ok(ComparisonCell {
                        group_name: group.group_name.clone(),
                        value,
                        percent_delta: percent_delta(baseline_value, value),
                    })
                })
                .collect::<PerfResult<Vec<_>>>()?;

            Ok(ComparisonRow {
                kind,
                test_name: test_name.to_string(),
                baseline_value,
                comparisons,
            })
        })
        .collect()
}

fn lookup(group: &GroupResults, test_name: &str, kind: MetricKind) -> PerfResult<f64> {
    group
        .get(test_name)
        .and_then(|result| result.get(kind))
        .ok_or_else(|| PerfError::Lookup {
            group: group.group_name.clone(),
            test: test_name.to_string(),
        })
}

fn header(baseline: &GroupResults, comparisons: &[GroupResults]) -> Vec<String> {
    ["Test Name".to_string(), baseline.group_name.clone()]
        .into_iter()
        .chain(comparisons.iter().map(|group| group.group_name.clone()))
        .collect()
}

/// The comma separated report for one metric.
pub fn render_csv(
    kind: MetricKind,
    baseline: &GroupResults,
    comparisons: &[GroupResults],
) -> PerfResult<String> {
    let rows = comparison_rows(kind, baseline, comparisons)?;

    let mut csv = header(baseline, comparisons).join(",");
    csv.push('\n');
    for row in rows {
        csv.push_str(&row.cells().join(","));
        csv.push('\n');
    }
    Ok(csv)
}

/// The same rows as [render_csv], as a table for the terminal.
pub fn render_table(
    kind: MetricKind,
    baseline: &GroupResults,
    comparisons: &[GroupResults],
) -> PerfResult<Table> {
    let rows = comparison_rows(kind, baseline, comparisons)?;

    let mut builder = Builder::default();
    builder.push_record(header(baseline, comparisons));
    for row in rows {
        builder.push_record(row.cells());
    }

    let mut table = builder.build();
    table.with(Style::modern());
    Ok(table)
}

/// Write `<out_dir>/<label>.csv` for every metric kind.
///
/// All reports are rendered before anything is written, so a lookup failure leaves no files.
pub fn generate_report(
    baseline: &GroupResults,
    comparisons: &[GroupResults],
    out_dir: &Path,
) -> PerfResult<Vec<PathBuf>> {
    let reports = MetricKind::ALL
        .into_iter()
        .map(|kind| Ok((kind, render_csv(kind, baseline, comparisons)?)))
        .collect::<PerfResult<Vec<_>>>()?;

    std::fs::create_dir_all(out_dir).map_err(PerfError::io(out_dir))?;

    let mut written = Vec::with_capacity(reports.len());
    for (kind, csv) in reports {
        let path = out_dir.join(format!("{}.csv", kind.label()));
        std::fs::write(&path, csv).map_err(PerfError::io(&path))?;
        log::info!("Wrote {kind} report to '{}'", path.display());
        written.push(path);
    }
    Ok(written)
}
