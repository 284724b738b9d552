//! Snapshot storage backends for dividend histories.

mod error;
mod json;
mod memory;
mod repository;

pub use error::{LedgerError, LedgerResult};
pub use json::JsonStateStore;
pub use memory::MemoryStateStore;
pub use repository::StateStore;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use divwatch_core::{EventRecord, PersistedState, Ticker};
    use rust_decimal_macros::dec;

    fn sample_state() -> PersistedState {
        let mut state = PersistedState::new();
        state.append(
            &Ticker::from("AAPL"),
            &[
                EventRecord::new(NaiveDate::from_ymd_opt(2023, 5, 12).unwrap(), dec!(0.24)),
                EventRecord::new(NaiveDate::from_ymd_opt(2023, 8, 11).unwrap(), dec!(0.24)),
            ],
        );
        state
    }

    #[test]
    fn missing_snapshot_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("data").join("dividends.json"));
        let state = store.load().unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("dividends.json");
        let store = JsonStateStore::new(&path);
        let state = sample_state();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("dividends.json")]);
    }

    #[test]
    fn corrupt_snapshot_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dividends.json");
        std::fs::write(&path, b"{\"AAPL\": [ {\"date\": ").unwrap();
        let store = JsonStateStore::new(&path);
        match store.load() {
            Err(LedgerError::Corrupt { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected corrupt snapshot error, got {other:?}"),
        }
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("dividends.json"));
        store.save(&PersistedState::new()).unwrap();
        let state = sample_state();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap().total_events(), 2);
    }

    #[test]
    fn memory_store_counts_saves() {
        let store = MemoryStateStore::new();
        assert!(store.load().unwrap().is_empty());
        store.save(&sample_state()).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().unwrap(), sample_state());
    }
}
