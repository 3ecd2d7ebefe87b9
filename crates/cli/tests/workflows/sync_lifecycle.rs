//! Watch → debounce → commit → push against a real repository

use crate::autosync;
use crate::common::{git_available, AutosyncProcess, TestRepo};
use anyhow::Result;
use std::thread::sleep;
use std::time::Duration;

const SETTLE: Duration = Duration::from_secs(20);

#[test]
fn test_burst_becomes_one_pushed_commit() -> Result<()> {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return Ok(());
    }
    let repo = TestRepo::new()?;
    let watcher = AutosyncProcess::start(
        &repo.work,
        &repo.log_file,
        &["--debounce", "1", "--message", "sync {ts}"],
    )?;

    // Create then modify inside one quiet interval
    repo.write("a.txt", "first\n")?;
    sleep(Duration::from_millis(200));
    repo.write("a.txt", "second\n")?;

    let subjects = repo.wait_for_remote_commits(2, SETTLE)?;
    assert!(subjects[0].starts_with("sync "), "subject {:?}", subjects[0]);
    assert!(subjects[0].ends_with('Z'));
    assert_eq!(repo.remote_file("a.txt")?, "second");

    // Nothing else changes, so nothing else is committed
    sleep(Duration::from_secs(3));
    assert_eq!(repo.remote_subjects()?.len(), 2);

    assert_eq!(watcher.interrupt(Duration::from_secs(10))?, 0);
    Ok(())
}

#[test]
fn test_deletions_and_nested_dirs_are_synced() -> Result<()> {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return Ok(());
    }
    let repo = TestRepo::new()?;
    let watcher = AutosyncProcess::start(&repo.work, &repo.log_file, &["--debounce", "0.5"])?;

    repo.write("notes/day1/todo.md", "- write tests\n")?;
    repo.wait_for_remote_commits(2, SETTLE)?;
    assert_eq!(repo.remote_file("notes/day1/todo.md")?, "- write tests");

    std::fs::remove_file(repo.work.join("README.md"))?;
    repo.wait_for_remote_commits(3, SETTLE)?;
    assert!(repo.remote_file("README.md").is_err());

    assert_eq!(watcher.interrupt(Duration::from_secs(10))?, 0);
    Ok(())
}

#[test]
fn test_ignored_paths_do_not_trigger_sync() -> Result<()> {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return Ok(());
    }
    let repo = TestRepo::new()?;
    let watcher = AutosyncProcess::start(
        &repo.work,
        &repo.log_file,
        &["--debounce", "0.5", "--ignore", "*.log"],
    )?;

    repo.write("build.log", "noise\n")?;
    sleep(Duration::from_secs(3));
    assert_eq!(repo.remote_subjects()?.len(), 1);
    assert!(!watcher.log().contains("Detected changes"));

    assert_eq!(watcher.interrupt(Duration::from_secs(10))?, 0);
    Ok(())
}

#[test]
fn test_log_file_inside_root_does_not_trigger_sync() -> Result<()> {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return Ok(());
    }
    let repo = TestRepo::new()?;
    let log_file = repo.work.join("autosync.log");
    // Debug logging writes to the file on every event it sees
    let watcher = AutosyncProcess::start(&repo.work, &log_file, &["--debounce", "0.5"])?;

    sleep(Duration::from_secs(3));
    assert_eq!(repo.remote_subjects()?.len(), 1);
    assert!(!watcher.log().contains("Detected changes"));

    assert_eq!(watcher.interrupt(Duration::from_secs(10))?, 0);
    Ok(())
}

#[test]
fn test_push_failure_keeps_commit_and_keeps_watching() -> Result<()> {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return Ok(());
    }
    let repo = TestRepo::new()?;
    let watcher = AutosyncProcess::start(
        &repo.work,
        &repo.log_file,
        &["--debounce", "0.5", "--remote", "nowhere"],
    )?;

    repo.write("a.txt", "offline edit\n")?;
    watcher.wait_for_log("Sync attempt abandoned", SETTLE)?;

    // Committed locally, never reached origin
    assert_eq!(repo.local_subjects()?.len(), 2);
    assert_eq!(repo.remote_subjects()?.len(), 1);

    assert_eq!(watcher.interrupt(Duration::from_secs(10))?, 0);
    Ok(())
}

#[test]
fn test_second_watcher_is_refused() -> Result<()> {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return Ok(());
    }
    let repo = TestRepo::new()?;
    let watcher = AutosyncProcess::start(&repo.work, &repo.log_file, &[])?;

    let result = autosync!(&repo.work, "--once").execute()?;
    assert_eq!(result.exit_code, 2, "stderr: {}", result.stderr);
    assert!(result.contains_stderr("already watching"));

    assert_eq!(watcher.interrupt(Duration::from_secs(10))?, 0);
    Ok(())
}

#[test]
fn test_once_pushes_pending_changes() -> Result<()> {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return Ok(());
    }
    let repo = TestRepo::new()?;
    repo.write("a.txt", "offline\n")?;

    let result = autosync!(&repo.work, "--once").execute()?;
    assert_eq!(result.exit_code, 0, "stderr: {}", result.stderr);
    assert_eq!(repo.remote_subjects()?.len(), 2);
    assert_eq!(repo.remote_file("a.txt")?, "offline");

    // Clean tree: success, no new commit
    let result = autosync!(&repo.work, "--once").execute()?;
    assert_eq!(result.exit_code, 0);
    assert!(result.contains_stderr("No changes to commit"));
    assert_eq!(repo.remote_subjects()?.len(), 2);
    Ok(())
}
