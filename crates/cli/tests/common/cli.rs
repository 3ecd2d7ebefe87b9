//! Helpers for running the `autosync` binary
//!
//! [`AutosyncCommand`] runs to completion (startup errors, `--once`);
//! [`AutosyncProcess`] keeps a watcher running in the background.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_autosync")
}

/// Command builder for one-shot invocations
pub struct AutosyncCommand {
    working_dir: PathBuf,
    args: Vec<String>,
}

impl AutosyncCommand {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();
        let output = Command::new(binary())
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env("RUST_LOG", "info")
            .stdin(Stdio::null())
            .output()
            .context("Failed to execute autosync")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}

/// A watcher running in the background
///
/// Logs go to a file so readiness can be detected without draining pipes.
/// The child is killed on drop if a test bails out early.
pub struct AutosyncProcess {
    child: Option<Child>,
    log_file: PathBuf,
}

impl AutosyncProcess {
    /// Start watching `dir` and wait until the watcher is armed
    pub fn start(dir: &Path, log_file: &Path, extra_args: &[&str]) -> Result<Self> {
        let child = Command::new(binary())
            .arg("--path")
            .arg(dir)
            .arg("--log-file")
            .arg(log_file)
            .args(extra_args)
            .env("RUST_LOG", "debug")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn autosync")?;

        let process = Self {
            child: Some(child),
            log_file: log_file.to_path_buf(),
        };
        process.wait_for_log("Watching", Duration::from_secs(15))?;
        Ok(process)
    }

    pub fn log(&self) -> String {
        std::fs::read_to_string(&self.log_file).unwrap_or_default()
    }

    /// Poll the log file until it contains `needle`
    pub fn wait_for_log(&self, needle: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.log().contains(needle) {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        anyhow::bail!("Timed out waiting for {:?} in log:\n{}", needle, self.log())
    }

    /// Send SIGINT and wait for the exit code
    pub fn interrupt(mut self, timeout: Duration) -> Result<i32> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let mut child = self.child.take().context("Process already stopped")?;
        kill(Pid::from_raw(child.id() as i32), Signal::SIGINT)?;

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status.code().unwrap_or(-1));
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                anyhow::bail!("autosync did not exit after SIGINT:\n{}", self.log());
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for AutosyncProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Macro for convenient command construction
///
/// Usage:
/// ```ignore
/// autosync!(dir, "--once").execute()?;
/// ```
#[macro_export]
macro_rules! autosync {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::AutosyncCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
