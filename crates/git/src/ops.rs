//! Git operations via the git CLI
//!
//! Every interaction with the repository goes through [`CommandRunner`], so
//! the sync sequence can be exercised against a scripted runner in tests.

use crate::GitError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;

/// Captured result of one external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Best human-readable explanation of a failed command
    ///
    /// git writes some refusals (e.g. "nothing to commit") to stdout.
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.status {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs git subcommands in a working directory
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `git <args>` in `cwd` and capture its output
    ///
    /// A non-zero exit is not an error here; only failing to launch is.
    async fn run(&self, cwd: &Path, args: &[&str]) -> Result<CommandOutput, GitError>;
}

#[async_trait]
impl<T: CommandRunner + ?Sized> CommandRunner for std::sync::Arc<T> {
    async fn run(&self, cwd: &Path, args: &[&str]) -> Result<CommandOutput, GitError> {
        (**self).run(cwd, args).await
    }
}

/// Runner backed by the real git binary
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Use a different executable (e.g. an absolute path to git)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for GitCli {
    async fn run(&self, cwd: &Path, args: &[&str]) -> Result<CommandOutput, GitError> {
        let mut command = std::process::Command::new(&self.program);
        command
            .args(args)
            .current_dir(cwd)
            // Never block on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GCM_INTERACTIVE", "never")
            .stdin(Stdio::null());

        // Own process group: a terminal Ctrl-C must not kill an in-flight push
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let output = tokio::process::Command::from(command)
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Run a git command and return stdout, mapping non-zero exits to an error
pub async fn run_checked<R: CommandRunner + ?Sized>(
    runner: &R,
    cwd: &Path,
    args: &[&str],
) -> Result<String, GitError> {
    let output = runner.run(cwd, args).await?;
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(GitError::Command {
            args: args.join(" "),
            status: output.status,
            message: output.failure_message(),
        })
    }
}

/// Check that the git executable can be launched
pub async fn version<R: CommandRunner + ?Sized>(runner: &R, cwd: &Path) -> Result<String, GitError> {
    run_checked(runner, cwd, &["--version"])
        .await
        .map(|s| s.trim().to_string())
}

/// Verify that `path` lies inside a git working tree
pub async fn ensure_work_tree<R: CommandRunner + ?Sized>(
    runner: &R,
    path: &Path,
) -> Result<(), GitError> {
    let output = runner
        .run(path, &["rev-parse", "--is-inside-work-tree"])
        .await?;
    if output.success() && output.stdout.trim() == "true" {
        Ok(())
    } else {
        Err(GitError::NotARepository(path.to_path_buf()))
    }
}

/// Name of the checked-out branch, `None` when HEAD is detached
///
/// Works on an unborn branch (fresh `git init`) as well.
pub async fn current_branch<R: CommandRunner + ?Sized>(
    runner: &R,
    cwd: &Path,
) -> Result<Option<String>, GitError> {
    let output = runner
        .run(cwd, &["symbolic-ref", "--short", "-q", "HEAD"])
        .await?;
    let branch = output.stdout.trim();
    if output.success() && !branch.is_empty() {
        Ok(Some(branch.to_string()))
    } else {
        Ok(None)
    }
}

/// Location of the repository's git directory (`.git` or a worktree gitdir)
pub async fn git_dir<R: CommandRunner + ?Sized>(
    runner: &R,
    cwd: &Path,
) -> Result<std::path::PathBuf, GitError> {
    let out = run_checked(runner, cwd, &["rev-parse", "--absolute-git-dir"]).await?;
    Ok(std::path::PathBuf::from(out.trim()))
}
