use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use divwatch_config::AppConfig;
use divwatch_core::{EntityHistory, EventRecord, Ticker};
use divwatch_data::DividendSource;
use divwatch_ledger::{LedgerError, StateStore};
use divwatch_notify::AlertDispatcher;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::reconcile::{alert_message, AlertDecision, ReconciliationEngine};

/// Exit status when the run finished but the snapshot could not be written.
pub const EXIT_PERSIST_FAILURE: u8 = 1;
/// Exit status when the run could not start (configuration or snapshot unusable).
pub const EXIT_STARTUP_FAILURE: u8 = 2;

/// Settings and collaborators for a [`RunCoordinator`].
#[derive(Clone)]
pub struct RunCoordinatorConfig {
    pub threshold: Decimal,
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub subject_prefix: String,
    pub source: Arc<dyn DividendSource>,
    pub dispatcher: Arc<dyn AlertDispatcher>,
    pub store: Arc<dyn StateStore>,
}

impl RunCoordinatorConfig {
    pub fn from_app(
        config: &AppConfig,
        source: Arc<dyn DividendSource>,
        dispatcher: Arc<dyn AlertDispatcher>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            threshold: config.threshold,
            concurrency: config.concurrency(),
            fetch_timeout: config.fetch_timeout(),
            subject_prefix: config.alerts.subject_prefix.clone(),
            source,
            dispatcher,
            store,
        }
    }
}

/// Per-ticker result shown to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityStatus {
    /// First time the ticker was seen; history stored without alerting.
    Baseline,
    /// New dividends recorded, none significant.
    New,
    /// At least one significant change was found.
    Alerted,
    Unchanged,
    /// Fetch failed or timed out.
    Skipped,
}

impl EntityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityStatus::Baseline => "baseline",
            EntityStatus::New => "new",
            EntityStatus::Alerted => "alerted",
            EntityStatus::Unchanged => "unchanged",
            EntityStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct EntityOutcome {
    pub ticker: Ticker,
    pub status: EntityStatus,
    pub fetched: usize,
    pub new_events: Vec<EventRecord>,
    pub decisions: Vec<AlertDecision>,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    pub error: Option<String>,
}

impl EntityOutcome {
    fn skipped(ticker: Ticker, reason: String) -> Self {
        Self {
            ticker,
            status: EntityStatus::Skipped,
            fetched: 0,
            new_events: Vec::new(),
            decisions: Vec::new(),
            alerts_sent: 0,
            alerts_failed: 0,
            error: Some(reason),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub entities_checked: usize,
    pub entities_skipped: usize,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    pub new_records: usize,
    pub persisted: bool,
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub summary: RunSummary,
    /// Outcomes in configured ticker order.
    pub outcomes: Vec<EntityOutcome>,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to load dividend history: {0}")]
    Startup(#[source] LedgerError),
    /// Alerts of this run were already dispatched when the save failed.
    #[error("failed to persist dividend history: {source}")]
    Persist {
        #[source]
        source: LedgerError,
        report: Box<RunReport>,
    },
}

impl RunError {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Startup(_) => EXIT_STARTUP_FAILURE,
            RunError::Persist { .. } => EXIT_PERSIST_FAILURE,
        }
    }
}

/// Drives one monitoring pass over the configured tickers.
pub struct RunCoordinator {
    engine: ReconciliationEngine,
    concurrency: usize,
    fetch_timeout: Duration,
    subject_prefix: String,
    source: Arc<dyn DividendSource>,
    dispatcher: Arc<dyn AlertDispatcher>,
    store: Arc<dyn StateStore>,
}

impl RunCoordinator {
    pub fn new(config: RunCoordinatorConfig) -> Self {
        Self {
            engine: ReconciliationEngine::new(config.threshold),
            concurrency: config.concurrency.max(1),
            fetch_timeout: config.fetch_timeout,
            subject_prefix: config.subject_prefix,
            source: config.source,
            dispatcher: config.dispatcher,
            store: config.store,
        }
    }

    /// Load the snapshot, process every ticker and save once if anything grew.
    ///
    /// Per-ticker fetch and dispatch failures never abort the run.
    pub async fn run(&self, tickers: &[Ticker]) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id, tickers)
            .instrument(info_span!("run", %run_id))
            .await
    }

    async fn run_inner(&self, run_id: Uuid, tickers: &[Ticker]) -> Result<RunReport, RunError> {
        let mut state = self.store.load().map_err(|err| {
            error!(error = %err, "refusing to run with an unreadable snapshot");
            RunError::Startup(err)
        })?;

        let mut seen = HashSet::new();
        let tickers: Vec<Ticker> = tickers
            .iter()
            .filter(|ticker| seen.insert((*ticker).clone()))
            .cloned()
            .collect();
        info!(
            tickers = tickers.len(),
            stored_tickers = state.len(),
            threshold = %self.engine.threshold(),
            "starting dividend check"
        );

        let outcomes: Vec<EntityOutcome> = {
            let snapshot = &state;
            stream::iter(tickers)
                .map(|ticker| {
                    let history = snapshot.history(&ticker);
                    self.process(ticker, history)
                })
                .buffered(self.concurrency)
                .collect()
                .await
        };

        let mut summary = RunSummary::default();
        for outcome in &outcomes {
            if outcome.status == EntityStatus::Skipped {
                summary.entities_skipped += 1;
                continue;
            }
            summary.entities_checked += 1;
            summary.alerts_sent += outcome.alerts_sent;
            summary.alerts_failed += outcome.alerts_failed;
            summary.new_records += state.append(&outcome.ticker, &outcome.new_events);
        }
        let mut report = RunReport {
            run_id,
            summary,
            outcomes,
        };

        if report.summary.new_records > 0 {
            if let Err(source) = self.store.save(&state) {
                error!(error = %source, "failed to persist dividend history");
                return Err(RunError::Persist {
                    source,
                    report: Box::new(report),
                });
            }
            report.summary.persisted = true;
        } else {
            info!("no new dividends; snapshot left untouched");
        }

        let summary = &report.summary;
        info!(
            checked = summary.entities_checked,
            skipped = summary.entities_skipped,
            alerts_sent = summary.alerts_sent,
            alerts_failed = summary.alerts_failed,
            new_records = summary.new_records,
            "dividend check complete"
        );
        Ok(report)
    }

    async fn process(&self, ticker: Ticker, history: EntityHistory) -> EntityOutcome {
        let fetched = match timeout(self.fetch_timeout, self.source.fetch_events(&ticker)).await {
            Ok(Ok(events)) => events,
            Ok(Err(err)) => {
                warn!(ticker = %ticker, error = %err, "fetch failed; skipping ticker");
                return EntityOutcome::skipped(ticker, format!("{err:#}"));
            }
            Err(_) => {
                warn!(
                    ticker = %ticker,
                    timeout_secs = self.fetch_timeout.as_secs_f64(),
                    "fetch timed out; skipping ticker"
                );
                return EntityOutcome::skipped(
                    ticker,
                    format!("fetch timed out after {:?}", self.fetch_timeout),
                );
            }
        };

        let reconciliation = self.engine.reconcile(&history, &fetched);
        let mut alerts_sent = 0;
        let mut alerts_failed = 0;
        for decision in reconciliation.alerts() {
            let Some(message) =
                alert_message(decision, self.engine.threshold(), &self.subject_prefix)
            else {
                continue;
            };
            match self.dispatcher.send(&message).await {
                Ok(()) => {
                    alerts_sent += 1;
                    info!(
                        ticker = %ticker,
                        date = %decision.new_event.date,
                        amount = %decision.new_event.amount,
                        "alert dispatched"
                    );
                }
                Err(err) => {
                    alerts_failed += 1;
                    error!(
                        ticker = %ticker,
                        date = %decision.new_event.date,
                        error = %err,
                        "alert delivery failed"
                    );
                }
            }
        }

        let status = if reconciliation.is_empty() {
            EntityStatus::Unchanged
        } else if history.is_empty() {
            EntityStatus::Baseline
        } else if reconciliation.alerts().next().is_some() {
            EntityStatus::Alerted
        } else {
            EntityStatus::New
        };
        info!(
            ticker = %ticker,
            status = %status,
            fetched = fetched.len(),
            new = reconciliation.new_events.len(),
            alerts_sent,
            "ticker checked"
        );

        EntityOutcome {
            ticker,
            status,
            fetched: fetched.len(),
            new_events: reconciliation.new_events,
            decisions: reconciliation.decisions,
            alerts_sent,
            alerts_failed,
            error: None,
        }
    }
}
