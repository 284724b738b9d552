use divwatch_core::PersistedState;

use crate::LedgerResult;

/// Abstraction over durable snapshot storage engines.
pub trait StateStore: Send + Sync {
    /// Load the last persisted snapshot. A store that has never been written
    /// returns an empty state.
    fn load(&self) -> LedgerResult<PersistedState>;

    /// Replace the persisted snapshot. Either the previous or the new snapshot
    /// is observable afterwards, never a partial write.
    fn save(&self, state: &PersistedState) -> LedgerResult<()>;
}
