use std::path::{Path, PathBuf};
use std::process::Command;

use perf_harness_core::prelude::{PerfError, PerfResult};

/// A `git checkout` of the working tree that is undone with `git checkout @{-1}`.
///
/// Call [BranchCheckout::restore] to see restore failures, otherwise the checkout is restored on
/// drop and a failure is only logged.
#[derive(Debug)]
pub struct BranchCheckout {
    working_dir: PathBuf,
    branch: String,
    restored: bool,
}

impl BranchCheckout {
    pub fn checkout(working_dir: &Path, branch: &str) -> PerfResult<Self> {
        git(working_dir, &["checkout", branch])?;
        log::info!("Checked out branch {branch}");
        Ok(Self {
            working_dir: working_dir.to_path_buf(),
            branch: branch.to_string(),
            restored: false,
        })
    }

    /// Check out `branch` if there is one.
    pub fn checkout_optional(working_dir: &Path, branch: Option<&str>) -> PerfResult<Option<Self>> {
        branch
            .map(|branch| Self::checkout(working_dir, branch))
            .transpose()
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn restore(mut self) -> PerfResult<()> {
        self.restore_in_place()
    }

    fn restore_in_place(&mut self) -> PerfResult<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        git(&self.working_dir, &["checkout", "@{-1}"])?;
        log::info!("Resumed git repo to the branch before {}", self.branch);
        Ok(())
    }
}

impl Drop for BranchCheckout {
    fn drop(&mut self) {
        if let Err(e) = self.restore_in_place() {
            log::error!("Failed to restore the previous branch: {e}");
        }
    }
}

fn git(working_dir: &Path, args: &[&str]) -> PerfResult<()> {
    let git_error = |reason: String| PerfError::Git {
        args: args.join(" "),
        reason,
    };

    let output = Command::new("git")
        .args(args)
        .current_dir(working_dir)
        .output()
        .map_err(|e| git_error(format!("Failed to run git: {e}")))?;

    if !output.status.success() {
        return Err(git_error(format!(
            "exit status {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}
