use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use perf_harness_runner::prelude::RunConfig;

#[derive(Debug, Parser)]
#[command(about, long_about = None)]
pub struct PerfHarnessCli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run every test of the given run-books against a freshly started server
    Run(RunArgs),

    /// Split a combined test log into one result file per test
    Parse(ParseArgs),

    /// Compare result directories against a baseline and write one CSV file per metric
    #[command(name = "generate-csv")]
    GenerateCsv(GenerateCsvArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Run-book JSON files, run in the order given
    #[arg(required = true)]
    pub runbooks: Vec<PathBuf>,

    /// Output directory for results, GC logs and the run log
    #[arg(long, default_value = "./out")]
    pub out: PathBuf,

    /// The build tool used to start the server and the client
    #[arg(long, env = "PERF_HARNESS_GRADLE", default_value = "ligradle")]
    pub gradle: String,

    /// Working directory for the build tool
    #[arg(long, default_value = ".")]
    pub cwd: PathBuf,

    /// The build output directory the test tasks write into
    #[arg(long, default_value = "../build")]
    pub build_dir: PathBuf,

    /// Log every line of client output
    #[arg(long, short, default_value = "false")]
    pub verbose: bool,

    /// The port the server accepts connections on once it is ready
    #[arg(long, default_value = "8082")]
    pub port: u16,

    /// How many times to try connecting to the server before giving up
    #[arg(long, default_value = "300")]
    pub max_attempts: usize,

    /// Seconds to wait between two connection attempts
    #[arg(long, default_value = "1")]
    pub interval_secs: u64,

    /// How many times every test is run
    #[arg(long, default_value = "2")]
    pub stages: usize,

    #[arg(long, default_value = "runHttpServer")]
    pub server_task: String,

    #[arg(long, default_value = "runHttpRestClient")]
    pub client_task: String,

    /// Sub-directory of the build directory holding the result files and GC logs
    #[arg(long, default_value = "r2-perf-test")]
    pub artifact_dir: String,
}

impl RunArgs {
    pub fn config(&self) -> RunConfig {
        RunConfig::default()
            .out_dir(&self.out)
            .build_tool(&self.gradle)
            .working_dir(&self.cwd)
            .build_dir(&self.build_dir)
            .artifact_dir(&self.artifact_dir)
            .tasks(&self.server_task, &self.client_task)
            .port(self.port)
            .readiness_budget(self.max_attempts, Duration::from_secs(self.interval_secs))
            .stage_count(self.stages)
            .verbose(self.verbose)
    }
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    /// The combined test log
    pub logfile: PathBuf,

    /// Output directory, one sub-directory per test group is created
    #[arg(long, default_value = "./out")]
    pub out: PathBuf,
}

#[derive(Debug, Args)]
pub struct GenerateCsvArgs {
    /// The baseline result directory
    #[arg(short, long)]
    pub baseline: PathBuf,

    /// Result directories to compare against the baseline
    #[arg(required = true)]
    pub tests: Vec<PathBuf>,

    /// Output directory for the CSV files
    #[arg(long, default_value = "./out")]
    pub out: PathBuf,

    /// Also print every report as a table
    #[arg(long, default_value = "false")]
    pub print: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = PerfHarnessCli::try_parse_from(["perf-harness", "run", "smoke.json"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let config = args.config();
        assert_eq!(args.runbooks, vec![PathBuf::from("smoke.json")]);
        assert_eq!(config.out_dir, PathBuf::from("./out"));
        assert_eq!(config.build_dir, PathBuf::from("../build"));
        assert_eq!(config.readiness.port, 8082);
        assert_eq!(config.readiness.max_attempts, 300);
        assert_eq!(config.readiness.interval, Duration::from_secs(1));
        assert_eq!(config.stages, vec!["1", "2"]);
        assert!(!config.verbose);
    }

    #[test]
    fn run_overrides() {
        let cli = PerfHarnessCli::try_parse_from([
            "perf-harness",
            "run",
            "a.json",
            "b.json",
            "--gradle",
            "./gradlew",
            "--port",
            "9090",
            "--stages",
            "3",
            "--verbose",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let config = args.config();
        assert_eq!(args.runbooks.len(), 2);
        assert_eq!(config.build_tool, "./gradlew");
        assert_eq!(config.readiness.port, 9090);
        assert_eq!(config.stages, vec!["1", "2", "3"]);
        assert!(config.verbose);
    }

    #[test]
    fn run_requires_a_runbook() {
        assert!(PerfHarnessCli::try_parse_from(["perf-harness", "run"]).is_err());
    }

    #[test]
    fn generate_csv_takes_baseline_and_tests() {
        let cli = PerfHarnessCli::try_parse_from([
            "perf-harness",
            "generate-csv",
            "-b",
            "out/base-result",
            "out/a-result",
            "out/b-result",
            "--print",
        ])
        .unwrap();
        let Command::GenerateCsv(args) = cli.command else {
            panic!("expected generate-csv command");
        };

        assert_eq!(args.baseline, PathBuf::from("out/base-result"));
        assert_eq!(args.tests.len(), 2);
        assert!(args.print);
    }
}
