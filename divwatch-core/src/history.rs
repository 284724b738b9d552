use serde::{Deserialize, Serialize};

use crate::{EventRecord, Ticker};

/// Ordered dividend history of a single ticker.
///
/// Events are kept sorted ascending by date and no two events share a date.
/// The only mutation path is [`EntityHistory::append_sorted`], which never
/// rewrites or removes a stored record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHistory {
    pub entity_id: Ticker,
    events: Vec<EventRecord>,
}

impl EntityHistory {
    pub fn new(entity_id: Ticker) -> Self {
        Self {
            entity_id,
            events: Vec::new(),
        }
    }

    /// Build a history from arbitrary records, restoring the ordering invariant.
    ///
    /// When several records share a date the first one wins, matching the
    /// collision rule of [`EntityHistory::append_sorted`].
    pub fn from_events(entity_id: Ticker, events: impl IntoIterator<Item = EventRecord>) -> Self {
        let mut history = Self::new(entity_id);
        let incoming: Vec<EventRecord> = events.into_iter().collect();
        history.append_sorted(&incoming);
        history
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Most recent stored event, if any.
    pub fn latest(&self) -> Option<&EventRecord> {
        self.events.last()
    }

    pub fn contains_date(&self, date: chrono::NaiveDate) -> bool {
        self.events
            .binary_search_by(|event| event.date.cmp(&date))
            .is_ok()
    }

    /// Insert `new_events` while keeping the ascending, date-unique order.
    ///
    /// A record whose date is already present is dropped and the stored
    /// amount is kept. Returns the number of records actually inserted.
    pub fn append_sorted(&mut self, new_events: &[EventRecord]) -> usize {
        let mut inserted = 0;
        for event in new_events {
            match self
                .events
                .binary_search_by(|stored| stored.date.cmp(&event.date))
            {
                Ok(_) => continue,
                Err(index) => {
                    self.events.insert(index, *event);
                    inserted += 1;
                }
            }
        }
        inserted
    }
}
