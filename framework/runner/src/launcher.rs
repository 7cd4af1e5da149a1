//! Spawning the server and client processes and making sure none of them outlive the run.

use std::collections::HashSet;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use parking_lot::Mutex;
use perf_harness_core::prelude::{PerfError, PerfResult};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

type Registry = Arc<Mutex<HashSet<u32>>>;

/// Split `"<tool> <task> <properties>"` into a program and its arguments using shell word rules.
pub fn build_command(tool: &str, task: &str, properties: &str) -> PerfResult<(String, Vec<String>)> {
    let raw = format!("{tool} {task} {properties}");
    let mut words = shell_words::split(&raw).map_err(|e| PerfError::Launch {
        command: raw.clone(),
        reason: format!("Invalid command line: {e}"),
    })?;
    if words.is_empty() {
        return Err(PerfError::Launch {
            command: raw,
            reason: "Empty command line".to_string(),
        });
    }
    let program = words.remove(0);
    Ok((program, words))
}

/// Every process group spawned during a run.
///
/// On unix each child leads its own OS process group, so tearing it down also takes out whatever
/// it forked (the build tool starts a JVM for the actual server). A group stays registered until
/// it was killed, even after its leader exited, since its descendants may still be running.
/// [ProcessGroup::kill_all] runs on drop so that an aborted run leaves nothing behind.
#[derive(Debug, Default)]
pub struct ProcessGroup {
    live: Registry,
}

impl ProcessGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `command` with `args` in `working_dir`, with stdout and stderr piped.
    ///
    /// The command is resolved against `PATH` (or `working_dir` for relative paths) first so that
    /// a missing program is reported as [PerfError::Launch].
    pub fn spawn(
        &self,
        command: &str,
        args: &[String],
        working_dir: &Path,
    ) -> PerfResult<ProcessHandle> {
        let display = std::iter::once(command)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let launch_error = |reason: String| PerfError::Launch {
            command: display.clone(),
            reason,
        };

        let program = which::which_in(command, std::env::var_os("PATH"), working_dir)
            .map_err(|e| launch_error(format!("Command not found: {e}")))?;

        log::info!("Launching: {display}");
        let mut cmd = Command::new(&program);
        cmd.args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| launch_error(format!("Failed to spawn: {e}")))?;

        let pid = child.id();
        if let Some(pid) = pid {
            self.live.lock().insert(pid);
        }
        let stdout = child.stdout.take().map(|out| BufReader::new(out).lines());

        Ok(ProcessHandle {
            command: display,
            child,
            pid,
            stdout,
            registry: self.live.clone(),
        })
    }

    /// Number of spawned process groups that have not been killed yet.
    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Kill every process group that is still registered, whether or not its leader is alive.
    pub fn kill_all(&self) {
        let pids = std::mem::take(&mut *self.live.lock());
        for pid in pids {
            log::debug!("Killing process group {pid}");
            kill_process_group(pid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill_all();
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::error!("Failed to kill process group {pid}: {e}"),
    }
}

// Without process groups the children are only killed when their handle is dropped.
#[cfg(not(unix))]
fn kill_process_group(pid: u32) {
    log::debug!("Process {pid} will be killed when its handle is dropped");
}

/// A live process started by a [ProcessGroup].
#[derive(Debug)]
pub struct ProcessHandle {
    command: String,
    child: Child,
    pid: Option<u32>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    registry: Registry,
}

impl ProcessHandle {
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Next line of standard output, `None` once the stream is closed.
    pub async fn next_line(&mut self) -> PerfResult<Option<String>> {
        match self.stdout.as_mut() {
            Some(lines) => lines.next_line().await.map_err(|e| PerfError::Io {
                path: self.command.clone().into(),
                source: e,
            }),
            None => Ok(None),
        }
    }

    /// Forward stdout (unless already consumed) and stderr to the log at debug level under
    /// `target`, so the pipes never fill up and block the process.
    pub fn forward_output(&mut self, target: &str) {
        if let Some(stdout) = self.stdout.take() {
            spawn_forwarder(stdout, target.to_string());
        }
        self.forward_stderr(target);
    }

    pub fn forward_stderr(&mut self, target: &str) {
        if let Some(stderr) = self.child.stderr.take() {
            spawn_forwarder(BufReader::new(stderr).lines(), format!("{target}::stderr"));
        }
    }

    /// Non-blocking check for the exit status of the group leader.
    pub fn poll_exit_status(&mut self) -> PerfResult<Option<ExitStatus>> {
        self.child.try_wait().map_err(|e| self.io_error(e))
    }

    /// Wait for the group leader to exit. The group stays registered for teardown.
    pub async fn wait(&mut self) -> PerfResult<ExitStatus> {
        self.child.wait().await.map_err(|e| self.io_error(e))
    }

    /// Kill the process and anything it started, then wait for it to exit.
    ///
    /// The whole group is signalled even if the leader already exited.
    pub async fn kill(&mut self) -> PerfResult<ExitStatus> {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            kill_process_group(pid);
        }
        #[cfg(not(unix))]
        if self.poll_exit_status()?.is_none() {
            self.child.start_kill().map_err(|e| self.io_error(e))?;
        }

        let status = self.wait().await?;
        self.deregister();
        Ok(status)
    }

    fn deregister(&mut self) {
        if let Some(pid) = self.pid.take() {
            self.registry.lock().remove(&pid);
        }
    }

    fn io_error(&self, source: std::io::Error) -> PerfError {
        PerfError::Io {
            path: self.command.clone().into(),
            source,
        }
    }
}

fn spawn_forwarder<R>(mut lines: Lines<BufReader<R>>, target: String)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            log::debug!(target: &target, "{line}");
        }
    });
}
