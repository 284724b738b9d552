//! Test doubles for the divwatch runtime.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use divwatch_core::{EventRecord, PersistedState, Ticker};
use divwatch_data::DividendSource;
use divwatch_ledger::{LedgerError, LedgerResult, MemoryStateStore, StateStore};
use divwatch_notify::{AlertDispatcher, AlertMessage};
use parking_lot::Mutex;
use rust_decimal::Decimal;

/// Build an [`EventRecord`] from an ISO date and a decimal literal.
///
/// Panics on malformed input; intended for fixtures only.
pub fn event(date: &str, amount: &str) -> EventRecord {
    let date = date
        .parse::<NaiveDate>()
        .unwrap_or_else(|err| panic!("invalid fixture date {date}: {err}"));
    let amount = amount
        .parse::<Decimal>()
        .unwrap_or_else(|err| panic!("invalid fixture amount {amount}: {err}"));
    EventRecord::new(date, amount)
}

#[derive(Clone, Debug)]
enum Script {
    Events(Vec<EventRecord>),
    Fail(String),
    Delay(Duration, Vec<EventRecord>),
}

/// Dividend source returning canned responses per ticker.
///
/// Tickers without a script fail like an unknown symbol would.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<Ticker, Script>>,
    calls: Mutex<Vec<Ticker>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_events(self, ticker: &str, events: Vec<EventRecord>) -> Self {
        self.set_events(ticker, events);
        self
    }

    #[must_use]
    pub fn with_failure(self, ticker: &str, reason: &str) -> Self {
        self.scripts
            .lock()
            .insert(Ticker::from(ticker), Script::Fail(reason.to_string()));
        self
    }

    /// Respond after `delay`, used to exercise fetch timeouts.
    #[must_use]
    pub fn with_delay(self, ticker: &str, delay: Duration, events: Vec<EventRecord>) -> Self {
        self.scripts
            .lock()
            .insert(Ticker::from(ticker), Script::Delay(delay, events));
        self
    }

    /// Replace the script of a ticker between runs.
    pub fn set_events(&self, ticker: &str, events: Vec<EventRecord>) {
        self.scripts
            .lock()
            .insert(Ticker::from(ticker), Script::Events(events));
    }

    pub fn calls(&self) -> Vec<Ticker> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl DividendSource for ScriptedSource {
    async fn fetch_events(&self, ticker: &Ticker) -> Result<Vec<EventRecord>> {
        self.calls.lock().push(ticker.clone());
        let script = self.scripts.lock().get(ticker).cloned();
        match script {
            Some(Script::Events(events)) => Ok(events),
            Some(Script::Fail(reason)) => Err(anyhow!(reason)),
            Some(Script::Delay(delay, events)) => {
                tokio::time::sleep(delay).await;
                Ok(events)
            }
            None => Err(anyhow!("no data scripted for {ticker}")),
        }
    }
}

/// Dispatcher capturing every alert it is asked to deliver.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<AlertMessage>>,
    failing: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher whose deliveries always fail. Attempts are still recorded.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn messages(&self) -> Vec<AlertMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    async fn send_alert(&self, subject: &str, body: &str) -> Result<()> {
        self.sent.lock().push(AlertMessage::new(subject, body));
        if self.failing {
            return Err(anyhow!("delivery refused"));
        }
        Ok(())
    }
}

/// Store that loads normally but refuses every save.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStateStore,
}

impl FailingStore {
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            inner: MemoryStateStore::with_state(state),
        }
    }
}

impl StateStore for FailingStore {
    fn load(&self) -> LedgerResult<PersistedState> {
        self.inner.load()
    }

    fn save(&self, _state: &PersistedState) -> LedgerResult<()> {
        Err(LedgerError::Storage("disk full".to_string()))
    }
}

/// Store whose snapshot is unreadable.
#[derive(Debug, Default)]
pub struct CorruptStore;

impl StateStore for CorruptStore {
    fn load(&self) -> LedgerResult<PersistedState> {
        Err(LedgerError::Corrupt {
            path: "dividends_data.json".into(),
            reason: "expected value at line 1 column 1".to_string(),
        })
    }

    fn save(&self, _state: &PersistedState) -> LedgerResult<()> {
        Err(LedgerError::Storage("corrupt store is read-only".to_string()))
    }
}
