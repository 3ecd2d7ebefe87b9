//! Sync-due signal coalescing
//!
//! Sync attempts are mutually exclusive. A signal that arrives while an
//! attempt is running is parked in a single pending slot; any further
//! signals before the attempt finishes fold into that same slot.

/// What the caller should do after offering a signal to the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Nothing was running: start an attempt now
    Start,
    /// An attempt is running: the signal is parked
    Queued,
    /// An attempt is running and a signal was already parked
    Coalesced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    Running,
    RunningWithPending,
}

/// At-most-one-in-flight gate with a single pending slot
#[derive(Debug)]
pub struct SyncGate {
    state: GateState,
}

impl SyncGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
        }
    }

    /// Offer a sync-due signal
    pub fn signal(&mut self) -> GateDecision {
        match self.state {
            GateState::Idle => {
                self.state = GateState::Running;
                GateDecision::Start
            }
            GateState::Running => {
                self.state = GateState::RunningWithPending;
                GateDecision::Queued
            }
            GateState::RunningWithPending => GateDecision::Coalesced,
        }
    }

    /// Report that the running attempt finished
    ///
    /// Returns true if a parked signal should be started immediately; the
    /// gate stays in the running state in that case.
    pub fn finish(&mut self) -> bool {
        match self.state {
            GateState::RunningWithPending => {
                self.state = GateState::Running;
                true
            }
            GateState::Running | GateState::Idle => {
                self.state = GateState::Idle;
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.state != GateState::Idle
    }

    pub fn has_pending(&self) -> bool {
        self.state == GateState::RunningWithPending
    }

    /// Discard a parked signal (used on shutdown)
    pub fn drop_pending(&mut self) -> bool {
        if self.state == GateState::RunningWithPending {
            self.state = GateState::Running;
            true
        } else {
            false
        }
    }
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new()
    }
}
