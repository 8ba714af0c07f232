use crate::types::PoseSnapshot;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Why the producer woke up from [`PoseStore::wait_for_consumption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The render path fetched the latest snapshot.
    Consumed,
    /// Nobody fetched within the timeout.
    TimedOut,
    /// The store is shutting down.
    Shutdown,
}

struct Slot {
    snapshot: PoseSnapshot,
    consumed: bool,
    shutdown: bool,
}

/// Single-slot handoff between the pose sampler and the render thread.
///
/// Only the newest snapshot is kept. The condition variable is used for
/// producer pacing only; the consumer never waits on it.
pub struct PoseStore {
    slot: Mutex<Slot>,
    fetched: Condvar,
}

impl PoseStore {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                snapshot: PoseSnapshot::IDENTITY,
                consumed: false,
                shutdown: false,
            }),
            fetched: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored snapshot. Returns the generation it was given.
    pub fn publish(&self, snapshot: PoseSnapshot) -> u64 {
        let mut slot = self.lock();
        let generation = slot.snapshot.generation + 1;
        slot.snapshot = PoseSnapshot {
            generation,
            ..snapshot
        };
        slot.consumed = false;
        generation
    }

    /// Copy out the most recent snapshot and signal the producer.
    pub fn fetch_latest(&self) -> PoseSnapshot {
        let snapshot = {
            let mut slot = self.lock();
            slot.consumed = true;
            slot.snapshot
        };
        self.fetched.notify_all();
        snapshot
    }

    /// Block the producer until the current snapshot was fetched, the
    /// timeout elapsed or the store was shut down.
    ///
    /// A consumption is reported once: returning `Consumed` clears it, so
    /// the next wait blocks again even if nothing was published between.
    pub fn wait_for_consumption(&self, timeout: Duration) -> WaitOutcome {
        let slot = self.lock();
        let (mut slot, _) = self
            .fetched
            .wait_timeout_while(slot, timeout, |s| !s.consumed && !s.shutdown)
            .unwrap_or_else(PoisonError::into_inner);

        if slot.shutdown {
            WaitOutcome::Shutdown
        } else if slot.consumed {
            slot.consumed = false;
            WaitOutcome::Consumed
        } else {
            WaitOutcome::TimedOut
        }
    }

    /// Ask the producer to stop and wake it if it is waiting.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.fetched.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }
}

impl Default for PoseStore {
    fn default() -> Self {
        Self::new()
    }
}
