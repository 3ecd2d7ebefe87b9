//! Git command-line integration for autosync
//!
//! This crate provides:
//! - A `CommandRunner` seam over the external `git` binary
//! - Working-tree validation and branch detection
//! - The stage → commit → push sync sequence

pub mod ops;
pub mod sync;

pub use ops::{CommandOutput, CommandRunner, GitCli};
pub use sync::{SyncAttempt, SyncExecutor, SyncFailure, SyncOutcome, SyncSettings, SyncStep};

use std::path::PathBuf;
use thiserror::Error;

/// Errors from invoking git outside of a sync attempt
#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to run `{program}` (is it installed and on PATH?): {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{} is not inside a git working tree", .0.display())]
    NotARepository(PathBuf),

    #[error("`git {args}` failed (exit {status:?}): {message}")]
    Command {
        args: String,
        status: Option<i32>,
        message: String,
    },
}
