use divwatch_core::PersistedState;
use parking_lot::Mutex;

use crate::{LedgerResult, StateStore};

/// In-process store, handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshot: Mutex<Option<PersistedState>>,
    saves: Mutex<usize>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            snapshot: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    pub fn snapshot(&self) -> Option<PersistedState> {
        self.snapshot.lock().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> LedgerResult<PersistedState> {
        Ok(self.snapshot.lock().clone().unwrap_or_default())
    }

    fn save(&self, state: &PersistedState) -> LedgerResult<()> {
        *self.snapshot.lock() = Some(state.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
