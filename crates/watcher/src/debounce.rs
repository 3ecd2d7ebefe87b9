//! Quiet-interval debouncing
//!
//! Collapses a burst of change events into a single "sync due" signal that
//! fires once the tree has been quiet for the configured interval.

use std::time::Duration;
use tokio::time::Instant;

/// Default quiet interval before a sync is considered due
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_secs(2);

/// Single-slot debounce timer
///
/// Every recorded event pushes the deadline out to `event + quiet`. The
/// debouncer never owns a task or a timer handle: the runner sleeps until
/// [`Debouncer::deadline`] and then calls [`Debouncer::poll_due`].
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
    /// Events absorbed since the last signal (for logging)
    absorbed: usize,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
            absorbed: 0,
        }
    }

    /// Record an event observed at `at`, (re)arming the timer
    pub fn record(&mut self, at: Instant) {
        self.deadline = Some(at + self.quiet);
        self.absorbed += 1;
    }

    /// When the pending signal fires, if one is armed
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the pending signal if its deadline has passed
    ///
    /// Returns the number of events coalesced into the signal.
    pub fn poll_due(&mut self, now: Instant) -> Option<usize> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                Some(std::mem::take(&mut self.absorbed))
            }
            _ => None,
        }
    }

    /// Drop any armed signal
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.absorbed = 0;
    }

    pub fn quiet_interval(&self) -> Duration {
        self.quiet
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_INTERVAL)
    }
}
