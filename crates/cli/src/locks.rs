//! Lock file management for one-watcher-per-repository

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Lock file name inside the repository's git directory
pub const LOCK_FILE: &str = "autosync.lock";

/// Exclusive lock held for the lifetime of a watcher process
pub struct InstanceLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    started_at: i64,
}

impl InstanceLock {
    /// Acquire exclusive watcher lock in `git_dir`
    ///
    /// The kernel drops the `flock` when its holder exits, so a file left
    /// behind by a dead process never blocks. The file itself is never
    /// removed: unlinking it would let two processes lock different inodes.
    ///
    /// Returns error if:
    /// - Lock is already held by a running process
    /// - Permission denied
    pub fn acquire(git_dir: &Path) -> Result<Self> {
        let lock_path = git_dir.join(LOCK_FILE);

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

        // Try to acquire exclusive lock (non-blocking)
        if !try_flock_exclusive(&file)? {
            let holder = Self::read_lock_content(&mut file)
                .map(|c| format!(" (pid {})", c.pid))
                .unwrap_or_default();
            anyhow::bail!("Another autosync is already watching this repository{}", holder);
        }

        Self::write_lock_content(&mut file)?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write lock content (PID + timestamp)
    fn write_lock_content(file: &mut File) -> Result<()> {
        let content = LockContent {
            pid: std::process::id(),
            started_at: chrono::Utc::now().timestamp_millis(),
        };

        let serialized =
            serde_json::to_string(&content).context("Failed to serialize lock content")?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Read lock content from file
    fn read_lock_content(file: &mut File) -> Result<LockContent> {
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let content: LockContent =
            serde_json::from_str(&contents).context("Failed to deserialize lock content")?;
        Ok(content)
    }
}

/// Try to acquire exclusive file lock (non-blocking)
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}
