use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use perf_harness_core::prelude::ShutdownHandle;
use perf_harness_model::MetricKind;
use perf_harness_runner::prelude::*;
use perf_harness_summariser::{generate_report, parse_results, render_table, split_log};

mod cli;
mod logging;

use cli::{Command, GenerateCsvArgs, ParseArgs, PerfHarnessCli, RunArgs};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = PerfHarnessCli::parse();

    let run_log_dir = match &cli.command {
        Command::Run(args) => Some(args.out.as_path()),
        _ => None,
    };
    match logging::init_logging(run_log_dir) {
        Ok(Some(run_log)) => log::info!("Writing run log to '{}'", run_log.display()),
        Ok(None) => {}
        Err(e) => {
            eprintln!("{e:?}");
            return ExitCode::FAILURE;
        }
    }

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Parse(args) => parse(args),
        Command::GenerateCsv(args) => generate_csv(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let groups = read_runbooks(&args.runbooks).context("Failed to load run-books")?;
    let config = args.config();

    let shutdown = ShutdownHandle::new();
    start_shutdown_listener(&shutdown);

    let harness = ProcessHarness::new(RunContext::new(config.clone(), shutdown));
    let mut orchestrator = Orchestrator::new(config, harness);
    log::info!(
        "Starting run {} with {} test group(s)",
        orchestrator.run_id(),
        groups.len()
    );

    let summaries = orchestrator.run(&groups).await?;
    for summary in &summaries {
        log::info!(
            "Test group {} finished {} test(s) in {}s, {} stage(s) reported warnings",
            summary.group_name,
            summary.tests.len(),
            summary.duration_s,
            summary.stages_with_warnings
        );
    }
    Ok(())
}

fn parse(args: ParseArgs) -> anyhow::Result<()> {
    let written = split_log(&args.logfile, &args.out)
        .with_context(|| format!("Failed to split '{}'", args.logfile.display()))?;
    for path in written {
        log::debug!("Wrote '{}'", path.display());
    }
    Ok(())
}

fn generate_csv(args: GenerateCsvArgs) -> anyhow::Result<()> {
    let baseline = parse_results(&args.baseline).context("Failed to read baseline results")?;
    let comparisons = args
        .tests
        .iter()
        .map(|dir| {
            parse_results(dir).with_context(|| format!("Failed to read results in '{}'", dir.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    generate_report(&baseline, &comparisons, &args.out).context("Failed to generate report")?;

    if args.print {
        for kind in MetricKind::ALL {
            println!("\n{kind}");
            println!("{}", render_table(kind, &baseline, &comparisons)?);
        }
    }
    Ok(())
}
