use divwatch_core::{EntityHistory, EventRecord, Ticker};
use rust_decimal::Decimal;

/// Outcome of comparing one ticker's stored history with a fresh fetch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reconciliation {
    /// Events absent from the stored history, in fetched order.
    pub new_events: Vec<EventRecord>,
    /// One decision per new event; empty when the ticker had no history.
    pub decisions: Vec<AlertDecision>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.new_events.is_empty()
    }

    /// Decisions that crossed the alert threshold.
    pub fn alerts(&self) -> impl Iterator<Item = &AlertDecision> {
        self.decisions.iter().filter(|decision| decision.should_alert)
    }
}

/// Verdict for a single newly observed dividend.
#[derive(Clone, Debug, PartialEq)]
pub struct AlertDecision {
    pub entity_id: Ticker,
    pub new_event: EventRecord,
    pub baseline_event: Option<EventRecord>,
    pub change_ratio: Option<Decimal>,
    pub should_alert: bool,
}

/// Stateless engine detecting new dividends and significant changes.
#[derive(Clone, Copy, Debug)]
pub struct ReconciliationEngine {
    threshold: Decimal,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl ReconciliationEngine {
    /// 20% relative change.
    pub const DEFAULT_THRESHOLD: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

    pub fn new(threshold: Decimal) -> Self {
        Self {
            threshold: threshold.abs(),
        }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// Compare `fetched` against `history` without mutating it.
    ///
    /// An event is new when no stored event shares its date. Each new event
    /// is compared with the latest earlier event among the stored history and
    /// the new events already folded in by this call, so consecutive new
    /// dividends are compared with each other.
    pub fn reconcile(&self, history: &EntityHistory, fetched: &[EventRecord]) -> Reconciliation {
        let baseline_stock = history.is_empty();
        let mut known: Vec<EventRecord> = history.events().to_vec();
        let mut outcome = Reconciliation::default();

        for event in fetched {
            let index = match known.binary_search_by(|stored| stored.date.cmp(&event.date)) {
                Ok(_) => continue,
                Err(index) => index,
            };
            if !baseline_stock {
                let baseline = index.checked_sub(1).map(|prev| known[prev]);
                outcome
                    .decisions
                    .push(self.decide(&history.entity_id, *event, baseline));
            }
            known.insert(index, *event);
            outcome.new_events.push(*event);
        }
        outcome
    }

    fn decide(
        &self,
        entity_id: &Ticker,
        new_event: EventRecord,
        baseline_event: Option<EventRecord>,
    ) -> AlertDecision {
        let change_ratio =
            baseline_event.and_then(|baseline| change_ratio(baseline.amount, new_event.amount));
        let should_alert = change_ratio
            .map(|ratio| ratio.abs() >= self.threshold)
            .unwrap_or(false);
        AlertDecision {
            entity_id: entity_id.clone(),
            new_event,
            baseline_event,
            change_ratio,
            should_alert,
        }
    }
}

/// Relative change from `baseline` to `current`; undefined for a zero baseline.
pub fn change_ratio(baseline: Decimal, current: Decimal) -> Option<Decimal> {
    if baseline.is_zero() {
        return None;
    }
    (current - baseline).checked_div(baseline)
}
