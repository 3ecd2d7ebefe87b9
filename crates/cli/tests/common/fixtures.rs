//! Throwaway repositories: a work tree plus a bare remote

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` and return trimmed stdout
pub fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;
    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Work repository on `main` tracking a bare `origin`
pub struct TestRepo {
    _temp: TempDir,
    pub work: PathBuf,
    pub remote: PathBuf,
    /// Outside the work tree so log writes never trigger a sync
    pub log_file: PathBuf,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let work = temp.path().join("work");
        let remote = temp.path().join("remote.git");
        std::fs::create_dir_all(&work)?;
        std::fs::create_dir_all(&remote)?;

        git(&remote, &["init", "-q", "--bare"])?;
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"])?;

        git(&work, &["init", "-q"])?;
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        git(&work, &["config", "user.name", "Autosync Test"])?;
        git(&work, &["config", "user.email", "autosync@example.com"])?;
        git(&work, &["config", "commit.gpgsign", "false"])?;
        git(&work, &["remote", "add", "origin", &remote.to_string_lossy()])?;

        std::fs::write(work.join("README.md"), "# notes\n")?;
        git(&work, &["add", "README.md"])?;
        git(&work, &["commit", "-q", "-m", "initial"])?;
        git(&work, &["push", "-q", "origin", "main"])?;

        let log_file = temp.path().join("autosync.log");
        Ok(Self {
            _temp: temp,
            work,
            remote,
            log_file,
        })
    }

    pub fn write(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.work.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Commit subjects on the remote's `main`, newest first
    pub fn remote_subjects(&self) -> Result<Vec<String>> {
        let log = git(&self.remote, &["log", "--format=%s", "main"])?;
        Ok(log.lines().map(str::to_string).collect())
    }

    pub fn remote_file(&self, rel: &str) -> Result<String> {
        git(&self.remote, &["show", &format!("main:{}", rel)])
    }

    pub fn local_subjects(&self) -> Result<Vec<String>> {
        let log = git(&self.work, &["log", "--format=%s", "main"])?;
        Ok(log.lines().map(str::to_string).collect())
    }

    /// Wait until the remote holds `count` commits
    pub fn wait_for_remote_commits(&self, count: usize, timeout: Duration) -> Result<Vec<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            let subjects = self.remote_subjects()?;
            if subjects.len() >= count {
                return Ok(subjects);
            }
            if Instant::now() >= deadline {
                anyhow::bail!("Remote has {} commits, expected {}", subjects.len(), count);
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}
