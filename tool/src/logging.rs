use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use env_logger::{Env, Target};

/// Log to stderr with the `info` level unless `RUST_LOG` says otherwise.
///
/// With a `run_log_dir`, everything is also written to `run-<timestamp>.log` in that directory.
/// Returns the path of that file.
pub fn init_logging(run_log_dir: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));

    let run_log = match run_log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?;
            let path = dir.join(run_log_file_name(chrono::Local::now()));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create run log '{}'", path.display()))?;
            builder.target(Target::Pipe(Box::new(Tee::new(file))));
            Some(path)
        }
        None => None,
    };

    builder.try_init().context("Failed to initialise logging")?;
    Ok(run_log)
}

fn run_log_file_name<Tz>(now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("run-{}.log", now.format("%Y-%m-%d_%H_%M_%S"))
}

/// Writes to stderr and to a file.
struct Tee<W> {
    file: W,
}

impl<W: Write> Tee<W> {
    fn new(file: W) -> Self {
        Self { file }
    }
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;
        self.file.flush()
    }
}
