//! File system watching for autosync
//!
//! This crate provides:
//! - Recursive change detection under a root (notify backend)
//! - Ignore rules (.git/, .gitignore, user patterns)
//! - Quiet-interval debouncing
//! - Sync signal coalescing (at most one attempt in flight, one pending)

pub mod coalesce;
pub mod debounce;
pub mod ignore;

pub use coalesce::{GateDecision, SyncGate};
pub use debounce::{Debouncer, DEFAULT_QUIET_INTERVAL};
pub use self::ignore::{IgnoreConfig, IgnoreRules};

use async_trait::async_trait;
use notify::event::ModifyKind;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors produced while setting up or running the watcher
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("cannot read watch root {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("watch root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to watch {path}: {source}")]
    WatchPath {
        path: PathBuf,
        source: notify::Error,
    },

    #[error("file watcher error: {0}")]
    Backend(#[from] notify::Error),

    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] ::ignore::Error),

    #[error("file watcher stopped unexpectedly")]
    Closed,
}

impl WatchError {
    /// Whether the watcher can no longer be trusted to see every change
    pub fn is_fatal(&self) -> bool {
        match self {
            WatchError::Backend(err) => matches!(err.kind, notify::ErrorKind::MaxFilesWatch),
            WatchError::Pattern(_) => false,
            _ => true,
        }
    }
}

/// A single filesystem change under the watched root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: ChangeKind,
}

/// Type of file system change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    /// Map a notify event kind; access-only events are not changes
    fn from_notify(kind: &notify::EventKind) -> Option<Self> {
        match kind {
            notify::EventKind::Access(_) => None,
            notify::EventKind::Create(_) => Some(ChangeKind::Created),
            notify::EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Renamed),
            notify::EventKind::Modify(_) => Some(ChangeKind::Modified),
            notify::EventKind::Remove(_) => Some(ChangeKind::Deleted),
            notify::EventKind::Any | notify::EventKind::Other => Some(ChangeKind::Modified),
        }
    }
}

/// Anything that yields accepted change events to the runner loop
#[async_trait]
pub trait EventSource: Send {
    /// Next change, or `None` when the source has shut down
    ///
    /// Must be cancel-safe: it is polled inside `select!`.
    async fn next_event(&mut self) -> Option<Result<ChangeEvent, WatchError>>;
}

/// Recursive watcher over a root directory
///
/// The notify backend thread only forwards raw events into a channel;
/// filtering and `.gitignore` reloads happen on the consumer side in
/// [`ChangeDetector::next_event`], so the rules need no locking.
pub struct ChangeDetector {
    _watcher: RecommendedWatcher,
    raw_rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    rules: IgnoreRules,
    buffered: VecDeque<ChangeEvent>,
}

impl ChangeDetector {
    /// Start watching the root of `rules` recursively
    pub fn start(rules: IgnoreRules) -> Result<Self, WatchError> {
        let root = rules.root().to_path_buf();
        validate_root(&root)?;

        let (tx, raw_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // Receiver gone means the runner is shutting down
            let _ = tx.send(res);
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath {
                path: root.clone(),
                source,
            })?;

        tracing::debug!(
            "Watching {} ({} ignore sources)",
            root.display(),
            rules.active_sources()
        );

        Ok(Self {
            _watcher: watcher,
            raw_rx,
            rules,
            buffered: VecDeque::new(),
        })
    }
}

#[async_trait]
impl EventSource for ChangeDetector {
    /// Next accepted change, or `None` once the backend is gone
    ///
    /// Cancel-safe: nothing is lost if the future is dropped mid-await.
    async fn next_event(&mut self) -> Option<Result<ChangeEvent, WatchError>> {
        loop {
            if let Some(event) = self.buffered.pop_front() {
                return Some(Ok(event));
            }

            match self.raw_rx.recv().await? {
                Ok(event) => {
                    let accepted = filter_event(&mut self.rules, event);
                    self.buffered.extend(accepted);
                }
                Err(err) => return Some(Err(WatchError::Backend(err))),
            }
        }
    }
}

/// Check that the root exists, is a directory and can be listed
fn validate_root(root: &Path) -> Result<(), WatchError> {
    let metadata = std::fs::metadata(root).map_err(|source| WatchError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(WatchError::NotADirectory(root.to_path_buf()));
    }
    std::fs::read_dir(root).map_err(|source| WatchError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Turn one raw notify event into the accepted change events
fn filter_event(rules: &mut IgnoreRules, event: notify::Event) -> Vec<ChangeEvent> {
    let kind = match ChangeKind::from_notify(&event.kind) {
        Some(kind) => kind,
        None => return Vec::new(),
    };

    // Overflow or a backend without paths: something changed, we don't know what
    if event.need_rescan() || event.paths.is_empty() {
        tracing::debug!("Watcher asked for a rescan; treating the root as changed");
        if let Err(err) = rules.reload_gitignore() {
            tracing::warn!("Failed to reload .gitignore: {}", err);
        }
        return vec![ChangeEvent {
            path: rules.root().to_path_buf(),
            kind: ChangeKind::Modified,
        }];
    }

    if event.paths.iter().any(|p| rules.is_gitignore_file(p)) {
        if let Err(err) = rules.reload_gitignore() {
            tracing::warn!("Failed to reload .gitignore: {}", err);
        }
    }

    event
        .paths
        .into_iter()
        .filter(|path| {
            let ignored = rules.should_ignore(path);
            if ignored {
                tracing::trace!("Ignoring change to {}", path.display());
            }
            !ignored
        })
        .map(|path| ChangeEvent { path, kind })
        .collect()
}
