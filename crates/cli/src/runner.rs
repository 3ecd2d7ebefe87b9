//! Watch loop: detector → debouncer → gate → executor
//!
//! Everything runs on one cooperative runtime thread. The loop owns the
//! debouncer and the gate; sync attempts run as tasks on the same runtime
//! so change events keep flowing while git is busy.

use crate::config::{WatchConfig, DEFAULT_BRANCH};
use crate::locks::InstanceLock;
use anyhow::Context;
use git::{ops, CommandRunner, GitCli, SyncAttempt, SyncExecutor, SyncFailure, SyncOutcome, SyncSettings};
use owo_colors::OwoColorize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use watcher::{ChangeDetector, Debouncer, EventSource, GateDecision, IgnoreRules, SyncGate, WatchError};

/// Why the watcher stopped with an error
#[derive(Error, Debug)]
pub enum RunError {
    /// Bad path, not a repository, git missing, lock held
    #[error("{0:#}")]
    Startup(anyhow::Error),

    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Only produced by single-shot mode
    #[error("{0}")]
    SyncFailed(SyncFailure),
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Startup(_) => 2,
            RunError::Watch(_) | RunError::SyncFailed(_) => 1,
        }
    }
}

/// Counters for one process lifetime
#[derive(Debug, Default)]
pub struct RunReport {
    /// Accepted change events
    pub events: usize,
    pub attempts: usize,
    pub failures: usize,
    pub last_attempt: Option<SyncAttempt>,
}

impl RunReport {
    fn record(&mut self, attempt: Option<SyncAttempt>) {
        self.attempts += 1;
        match attempt {
            Some(attempt) => {
                attempt.log();
                if !attempt.is_success() {
                    self.failures += 1;
                }
                self.last_attempt = Some(attempt);
            }
            None => self.failures += 1,
        }
    }
}

/// Resolve everything that needs git before watching starts
async fn prepare(config: &WatchConfig, runner: &GitCli) -> anyhow::Result<SyncSettings> {
    let root = config
        .root
        .canonicalize()
        .with_context(|| format!("Watch path {} does not exist", config.root.display()))?;
    if !root.is_dir() {
        anyhow::bail!("Watch path {} is not a directory", root.display());
    }

    let version = ops::version(runner, &root).await?;
    tracing::debug!("Using {}", version);

    ops::ensure_work_tree(runner, &root).await?;

    let branch = match config.branch {
        Some(ref branch) => branch.clone(),
        None => match ops::current_branch(runner, &root).await? {
            Some(branch) => branch,
            None => {
                tracing::warn!("HEAD is detached; pushing to {}", DEFAULT_BRANCH);
                DEFAULT_BRANCH.to_string()
            }
        },
    };

    Ok(SyncSettings {
        root,
        remote: config.remote.clone(),
        branch,
        push: config.push,
        message_template: config.message_template.clone(),
    })
}

/// Validate, lock, and watch until `shutdown` resolves
///
/// With `once`, a single attempt runs immediately and no watcher is started.
pub async fn run<F>(config: WatchConfig, once: bool, shutdown: F) -> Result<RunReport, RunError>
where
    F: Future<Output = ()>,
{
    let runner = GitCli::new();
    let settings = prepare(&config, &runner)
        .await
        .map_err(RunError::Startup)?;

    let git_dir = ops::git_dir(&runner, &settings.root)
        .await
        .map_err(|e| RunError::Startup(e.into()))?;
    let _lock = InstanceLock::acquire(&git_dir).map_err(RunError::Startup)?;

    let executor = Arc::new(SyncExecutor::new(runner, settings.clone()));

    if once {
        let attempt = executor.run().await;
        let mut report = RunReport::default();
        report.record(Some(attempt.clone()));
        return match attempt.outcome {
            SyncOutcome::Failed(failure) => Err(RunError::SyncFailed(failure)),
            _ => Ok(report),
        };
    }

    let rules = IgnoreRules::load(&settings.root, config.ignore_config())
        .map_err(|e| RunError::Startup(e.into()))?;
    let detector = ChangeDetector::start(rules).map_err(|e| RunError::Startup(e.into()))?;

    print_banner(&settings, config.debounce);
    tracing::info!("Watching {}", settings.root.display());

    let report = run_loop(detector, executor, config.debounce, shutdown).await?;
    tracing::info!(
        "Stopped after {} sync attempts ({} failed)",
        report.attempts,
        report.failures
    );
    Ok(report)
}

/// The event loop proper
///
/// Returns when `shutdown` resolves (after any in-flight attempt finishes)
/// or when the event source fails fatally.
pub async fn run_loop<S, R, F>(
    mut source: S,
    executor: Arc<SyncExecutor<R>>,
    quiet: Duration,
    shutdown: F,
) -> Result<RunReport, WatchError>
where
    S: EventSource,
    R: CommandRunner + 'static,
    F: Future<Output = ()>,
{
    let mut debouncer = Debouncer::new(quiet);
    let mut gate = SyncGate::new();
    let mut in_flight: Option<JoinHandle<SyncAttempt>> = None;
    let mut report = RunReport::default();
    tokio::pin!(shutdown);

    let result = loop {
        let deadline = debouncer.deadline();

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Interrupt received, shutting down");
                break Ok(());
            }

            event = source.next_event() => match event {
                Some(Ok(change)) => {
                    tracing::debug!("{:?} {}", change.kind, change.path.display());
                    report.events += 1;
                    debouncer.record(Instant::now());
                }
                Some(Err(err)) if err.is_fatal() => break Err(err),
                Some(Err(err)) => tracing::warn!("Watcher error: {}", err),
                None => break Err(WatchError::Closed),
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(coalesced) = debouncer.poll_due(Instant::now()) {
                    match gate.signal() {
                        GateDecision::Start => {
                            tracing::info!("Detected changes ({} events), syncing", coalesced);
                            in_flight = Some(spawn_attempt(&executor));
                        }
                        GateDecision::Queued => {
                            tracing::debug!("Sync in progress; queued another attempt")
                        }
                        GateDecision::Coalesced => {
                            tracing::debug!("Sync in progress; already queued")
                        }
                    }
                }
            }

            attempt = join_attempt(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                report.record(attempt);
                if gate.finish() {
                    tracing::info!("Running queued sync");
                    in_flight = Some(spawn_attempt(&executor));
                }
            }
        }
    };

    if gate.drop_pending() {
        tracing::debug!("Discarding queued sync");
    }
    if let Some(handle) = in_flight.take() {
        tracing::info!("Waiting for in-flight sync to finish");
        let attempt = join_attempt(&mut Some(handle)).await;
        report.record(attempt);
        gate.finish();
    }

    result.map(|()| report)
}

fn spawn_attempt<R: CommandRunner + 'static>(
    executor: &Arc<SyncExecutor<R>>,
) -> JoinHandle<SyncAttempt> {
    let executor = Arc::clone(executor);
    tokio::spawn(async move { executor.run().await })
}

/// Await the in-flight attempt; pending forever if there is none
async fn join_attempt(slot: &mut Option<JoinHandle<SyncAttempt>>) -> Option<SyncAttempt> {
    match slot.as_mut() {
        Some(handle) => match handle.await {
            Ok(attempt) => Some(attempt),
            Err(err) => {
                tracing::error!("Sync task failed: {}", err);
                None
            }
        },
        None => std::future::pending().await,
    }
}

/// Resolves on SIGINT or SIGTERM
///
/// Handlers are installed before this returns, so a signal arriving during
/// startup is not lost.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        Ok(async move {
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
            }
        })
    }

    #[cfg(not(unix))]
    {
        Ok(async {
            let _ = tokio::signal::ctrl_c().await;
        })
    }
}

fn print_banner(settings: &SyncSettings, quiet: Duration) {
    println!("{} {}", "autosync".bold(), settings.root.display().to_string().cyan());
    if settings.push {
        println!("  Remote:   {}/{}", settings.remote, settings.branch);
    } else {
        println!("  Remote:   {}", "push disabled".yellow());
    }
    println!("  Debounce: {:.2}s", quiet.as_secs_f64());
    println!("{}", "Press Ctrl-C to stop".dimmed());
}
