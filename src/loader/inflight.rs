//! In-flight execution registry.
//!
//! At most one production runs per (root, target) key within the process.
//! Concurrent callers for the same key block until the first execution
//! settles and then observe its outcome. Entries are removed when the
//! production settles, whatever the outcome, so a later call starts fresh.

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::LoadError;

type Outcome = Result<PathBuf, LoadError>;

#[derive(Debug, Default)]
pub(crate) struct InflightRegistry {
    slots: Mutex<FxHashMap<PathBuf, Arc<Slot>>>,
}

#[derive(Debug, Default)]
pub(crate) struct Slot {
    outcome: Mutex<Option<Outcome>>,
    settled: Condvar,
}

/// Result of joining a production.
pub(crate) enum Entry {
    /// This caller owns the production and must settle it.
    Owner(Arc<Slot>),
    /// Another caller owns the production; wait on the slot.
    Waiter(Arc<Slot>),
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the production for `key`, creating it when absent.
    pub fn begin(&self, key: &Path) -> Entry {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(key) {
            Entry::Waiter(Arc::clone(slot))
        } else {
            let slot = Arc::new(Slot::default());
            slots.insert(key.to_path_buf(), Arc::clone(&slot));
            Entry::Owner(slot)
        }
    }

    /// Publish the owner's outcome and drop the registry entry.
    pub fn settle(&self, key: &Path, slot: &Slot, outcome: &Outcome) {
        self.slots.lock().remove(key);
        let mut guard = slot.outcome.lock();
        *guard = Some(outcome.clone());
        slot.settled.notify_all();
    }
}

impl Slot {
    /// Block until the owning production settles.
    pub fn wait(&self) -> Outcome {
        let mut guard = self.outcome.lock();
        loop {
            if let Some(outcome) = guard.as_ref() {
                return outcome.clone();
            }
            self.settled.wait(&mut guard);
        }
    }
}
