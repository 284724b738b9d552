use anyhow::Result;
use async_trait::async_trait;
use divwatch_core::{EventRecord, Ticker};
use rust_decimal::Decimal;
use tracing::warn;

/// Capability returning the dividend history published for a ticker.
///
/// Implementations return events sorted ascending by date with at most one
/// event per date. An instrument that never paid a dividend yields an empty
/// list; transport or decoding problems are errors.
#[async_trait]
pub trait DividendSource: Send + Sync {
    async fn fetch_events(&self, ticker: &Ticker) -> Result<Vec<EventRecord>>;
}

/// Sort events by date, keep the first record of each date and drop negative amounts.
pub fn normalize_events(ticker: &Ticker, mut events: Vec<EventRecord>) -> Vec<EventRecord> {
    events.retain(|event| {
        let keep = event.amount >= Decimal::ZERO;
        if !keep {
            warn!(ticker = %ticker, date = %event.date, amount = %event.amount, "dropping negative dividend amount");
        }
        keep
    });
    events.sort_by_key(|event| event.date);
    events.dedup_by_key(|event| event.date);
    events
}
