use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{EntityHistory, EventRecord, Ticker};

type SnapshotRepr = BTreeMap<Ticker, Vec<EventRecord>>;

/// Durable snapshot mapping every tracked ticker to its dividend history.
///
/// Serialized as a JSON object keyed by ticker code whose values are arrays of
/// `{ "date", "amount" }` records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SnapshotRepr", into = "SnapshotRepr")]
pub struct PersistedState {
    histories: BTreeMap<Ticker, EntityHistory>,
}

impl PersistedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read view of a ticker's history. Unknown tickers yield an empty history.
    pub fn history(&self, ticker: &Ticker) -> EntityHistory {
        self.histories
            .get(ticker)
            .cloned()
            .unwrap_or_else(|| EntityHistory::new(ticker.clone()))
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&EntityHistory> {
        self.histories.get(ticker)
    }

    /// Append events to a ticker's history, returning how many were stored.
    pub fn append(&mut self, ticker: &Ticker, events: &[EventRecord]) -> usize {
        if events.is_empty() {
            return 0;
        }
        self.histories
            .entry(ticker.clone())
            .or_insert_with(|| EntityHistory::new(ticker.clone()))
            .append_sorted(events)
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Total number of stored events across all tickers.
    pub fn total_events(&self) -> usize {
        self.histories.values().map(EntityHistory::len).sum()
    }
}

impl From<SnapshotRepr> for PersistedState {
    fn from(value: SnapshotRepr) -> Self {
        let histories = value
            .into_iter()
            .map(|(ticker, events)| {
                let history = EntityHistory::from_events(ticker.clone(), events);
                (ticker, history)
            })
            .collect();
        Self { histories }
    }
}

impl From<PersistedState> for SnapshotRepr {
    fn from(value: PersistedState) -> Self {
        value
            .histories
            .into_iter()
            .map(|(ticker, history)| (ticker, history.events().to_vec()))
            .collect()
    }
}
