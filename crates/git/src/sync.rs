//! The stage → commit → push sequence
//!
//! One [`SyncExecutor::run`] call is one attempt. Steps run strictly in
//! order and the first failing step ends the attempt; nothing is retried.

use crate::ops::{CommandOutput, CommandRunner, GitCli};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// Placeholder replaced by the attempt timestamp in commit templates
pub const TIMESTAMP_PLACEHOLDER: &str = "{ts}";

/// Default commit message template
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "autosync: {ts}";

/// Repository-facing settings for sync attempts
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Directory whose changes are staged
    pub root: PathBuf,
    pub remote: String,
    pub branch: String,
    /// Push after committing (false = commit locally only)
    pub push: bool,
    /// Commit message template containing `{ts}`
    pub message_template: String,
}

/// A step of the sync sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Stage,
    Inspect,
    Commit,
    Push,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::Stage => "stage",
            SyncStep::Inspect => "diff",
            SyncStep::Commit => "commit",
            SyncStep::Push => "push",
        };
        f.write_str(name)
    }
}

/// Why an attempt stopped early
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub step: SyncStep,
    /// Tool exit status; `None` if git could not be launched or was killed
    pub status: Option<i32>,
    pub message: String,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "git {} failed (exit {}): {}", self.step, code, self.message),
            None => write!(f, "git {} failed: {}", self.step, self.message),
        }
    }
}

/// Result of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Working tree was clean after staging; no commit, no push
    NothingToCommit,
    /// Committed locally, push disabled
    Committed { message: String },
    /// Committed and pushed
    Pushed {
        message: String,
        remote: String,
        branch: String,
    },
    Failed(SyncFailure),
}

/// Outcome of one stage → commit → push sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAttempt {
    pub started_at: DateTime<Utc>,
    pub outcome: SyncOutcome,
}

impl SyncAttempt {
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, SyncOutcome::Failed(_))
    }

    /// Emit the outcome as a log line
    pub fn log(&self) {
        match &self.outcome {
            SyncOutcome::NothingToCommit => tracing::info!("No changes to commit"),
            SyncOutcome::Committed { message } => {
                tracing::info!("Committed \"{}\" (push disabled)", message)
            }
            SyncOutcome::Pushed {
                message,
                remote,
                branch,
            } => tracing::info!("Synced \"{}\" to {}/{}", message, remote, branch),
            SyncOutcome::Failed(failure) => {
                tracing::warn!(
                    step = %failure.step,
                    status = ?failure.status,
                    "Sync attempt abandoned: {}",
                    failure
                )
            }
        }
    }
}

/// Render a commit message for an attempt started at `ts`
pub fn render_commit_message(template: &str, ts: DateTime<Utc>) -> String {
    let stamp = ts.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    template.replace(TIMESTAMP_PLACEHOLDER, &stamp)
}

/// Runs sync attempts against one repository
pub struct SyncExecutor<R = GitCli> {
    runner: R,
    settings: SyncSettings,
}

impl<R: CommandRunner> SyncExecutor<R> {
    pub fn new(runner: R, settings: SyncSettings) -> Self {
        Self { runner, settings }
    }

    /// Run one attempt now
    pub async fn run(&self) -> SyncAttempt {
        self.run_at(Utc::now()).await
    }

    /// Run one attempt stamped with `started_at`
    pub async fn run_at(&self, started_at: DateTime<Utc>) -> SyncAttempt {
        let outcome = match self.attempt(started_at).await {
            Ok(outcome) => outcome,
            Err(failure) => SyncOutcome::Failed(failure),
        };
        SyncAttempt {
            started_at,
            outcome,
        }
    }

    async fn attempt(&self, started_at: DateTime<Utc>) -> Result<SyncOutcome, SyncFailure> {
        // 1. Stage everything under the root, deletions included
        self.step(SyncStep::Stage, &["add", "--all", "--", "."]).await?;

        // 2. Anything staged under the root? Exit 1 means yes
        if !self.has_staged_changes().await? {
            return Ok(SyncOutcome::NothingToCommit);
        }

        // 3. Commit only the root, leaving anything staged elsewhere alone
        let message = render_commit_message(&self.settings.message_template, started_at);
        self.step(SyncStep::Commit, &["commit", "-m", &message, "--", "."])
            .await?;

        if !self.settings.push {
            return Ok(SyncOutcome::Committed { message });
        }

        // 4. Push
        let remote = self.settings.remote.as_str();
        let branch = self.settings.branch.as_str();
        self.step(SyncStep::Push, &["push", remote, branch]).await?;

        Ok(SyncOutcome::Pushed {
            message,
            remote: remote.to_string(),
            branch: branch.to_string(),
        })
    }

    async fn has_staged_changes(&self) -> Result<bool, SyncFailure> {
        let args = ["diff", "--cached", "--quiet", "--", "."];
        tracing::debug!("Running: git {}", args.join(" "));
        match self.runner.run(&self.settings.root, &args).await {
            Ok(output) => match output.status {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                status => Err(SyncFailure {
                    step: SyncStep::Inspect,
                    status,
                    message: output.failure_message(),
                }),
            },
            Err(err) => Err(SyncFailure {
                step: SyncStep::Inspect,
                status: None,
                message: err.to_string(),
            }),
        }
    }

    async fn step(&self, step: SyncStep, args: &[&str]) -> Result<CommandOutput, SyncFailure> {
        tracing::debug!("Running: git {}", args.join(" "));
        match self.runner.run(&self.settings.root, args).await {
            Ok(output) if output.success() => Ok(output),
            Ok(output) => Err(SyncFailure {
                step,
                status: output.status,
                message: output.failure_message(),
            }),
            Err(err) => Err(SyncFailure {
                step,
                status: None,
                message: err.to_string(),
            }),
        }
    }
}
