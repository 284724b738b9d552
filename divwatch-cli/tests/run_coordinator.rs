use std::sync::Arc;
use std::time::Duration;

use divwatch_cli::coordinator::{
    EntityStatus, RunCoordinator, RunCoordinatorConfig, RunError, EXIT_PERSIST_FAILURE,
    EXIT_STARTUP_FAILURE,
};
use divwatch_core::{PersistedState, Ticker};
use divwatch_ledger::{MemoryStateStore, StateStore};
use divwatch_test_utils::{event, CorruptStore, FailingStore, RecordingDispatcher, ScriptedSource};
use rust_decimal_macros::dec;

fn coordinator(
    source: Arc<ScriptedSource>,
    dispatcher: Arc<RecordingDispatcher>,
    store: Arc<dyn StateStore>,
) -> RunCoordinator {
    RunCoordinator::new(RunCoordinatorConfig {
        threshold: dec!(0.20),
        concurrency: 4,
        fetch_timeout: Duration::from_millis(200),
        subject_prefix: String::new(),
        source,
        dispatcher,
        store,
    })
}

fn tickers(codes: &[&str]) -> Vec<Ticker> {
    codes.iter().map(|code| Ticker::from(*code)).collect()
}

#[tokio::test]
async fn first_run_stores_baseline_without_alerts() {
    let source = Arc::new(ScriptedSource::new().with_events(
        "KO",
        vec![event("2023-01-01", "0.46"), event("2023-04-01", "1.00")],
    ));
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let store = Arc::new(MemoryStateStore::new());
    let report = coordinator(source, dispatcher.clone(), store.clone())
        .run(&tickers(&["KO"]))
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].status, EntityStatus::Baseline);
    assert_eq!(report.summary.new_records, 2);
    assert_eq!(report.summary.alerts_sent, 0);
    assert!(report.summary.persisted);
    assert!(dispatcher.messages().is_empty());
    assert_eq!(store.save_count(), 1);
    let saved = store.snapshot().unwrap();
    assert_eq!(saved.history(&Ticker::from("KO")).len(), 2);
}

#[tokio::test]
async fn later_run_alerts_on_significant_change() {
    let source = Arc::new(
        ScriptedSource::new().with_events("KO", vec![event("2023-01-01", "1.00")]),
    );
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let store = Arc::new(MemoryStateStore::new());
    let coordinator = coordinator(source.clone(), dispatcher.clone(), store.clone());
    coordinator.run(&tickers(&["KO"])).await.unwrap();

    source.set_events(
        "KO",
        vec![
            event("2023-01-01", "1.00"),
            event("2023-04-01", "1.05"),
            event("2023-07-01", "1.50"),
        ],
    );
    let report = coordinator.run(&tickers(&["KO"])).await.unwrap();

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, EntityStatus::Alerted);
    assert_eq!(outcome.new_events.len(), 2);
    assert_eq!(outcome.decisions.len(), 2);
    assert!(!outcome.decisions[0].should_alert);
    assert!(outcome.decisions[1].should_alert);
    assert_eq!(report.summary.alerts_sent, 1);

    let messages = dispatcher.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].subject.contains("KO"));
    assert!(messages[0].body.contains("Previous dividend: $1.0500"));
    assert_eq!(store.save_count(), 2);
}

#[tokio::test]
async fn rerun_without_new_data_does_not_save() {
    let events = vec![event("2023-01-01", "1.00"), event("2023-04-01", "2.00")];
    let source = Arc::new(ScriptedSource::new().with_events("KO", events));
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let store = Arc::new(MemoryStateStore::new());
    let coordinator = coordinator(source, dispatcher.clone(), store.clone());

    coordinator.run(&tickers(&["KO"])).await.unwrap();
    let report = coordinator.run(&tickers(&["KO"])).await.unwrap();

    assert_eq!(report.outcomes[0].status, EntityStatus::Unchanged);
    assert_eq!(report.summary.new_records, 0);
    assert!(!report.summary.persisted);
    assert_eq!(store.save_count(), 1);
    assert!(dispatcher.messages().is_empty());
}

#[tokio::test]
async fn failed_fetch_skips_ticker_but_others_persist() {
    let mut state = PersistedState::new();
    state.append(&Ticker::from("T"), &[event("2023-01-01", "0.50")]);
    let source = Arc::new(
        ScriptedSource::new()
            .with_failure("T", "upstream returned 503")
            .with_events("KO", vec![event("2023-01-01", "0.46")]),
    );
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let store = Arc::new(MemoryStateStore::with_state(state));
    let report = coordinator(source, dispatcher, store.clone())
        .run(&tickers(&["T", "KO"]))
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].ticker, Ticker::from("T"));
    assert_eq!(report.outcomes[0].status, EntityStatus::Skipped);
    assert!(report.outcomes[0]
        .error
        .as_deref()
        .unwrap()
        .contains("503"));
    assert_eq!(report.outcomes[1].status, EntityStatus::Baseline);
    assert_eq!(report.summary.entities_checked, 1);
    assert_eq!(report.summary.entities_skipped, 1);

    let saved = store.snapshot().unwrap();
    assert_eq!(saved.history(&Ticker::from("T")).len(), 1);
    assert_eq!(saved.history(&Ticker::from("KO")).len(), 1);
}

#[tokio::test]
async fn failed_fetch_does_not_block_alerts_for_other_tickers() {
    let mut state = PersistedState::new();
    state.append(&Ticker::from("KO"), &[event("2023-01-01", "0.40")]);
    state.append(&Ticker::from("T"), &[event("2023-01-01", "0.50")]);
    let source = Arc::new(
        ScriptedSource::new()
            .with_failure("T", "connection reset")
            .with_events(
                "KO",
                vec![event("2023-01-01", "0.40"), event("2023-04-01", "0.50")],
            ),
    );
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let store = Arc::new(MemoryStateStore::with_state(state));
    let report = coordinator(source, dispatcher.clone(), store.clone())
        .run(&tickers(&["T", "KO"]))
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].status, EntityStatus::Skipped);
    assert_eq!(report.outcomes[1].status, EntityStatus::Alerted);
    assert_eq!(report.summary.alerts_sent, 1);
    assert_eq!(report.summary.new_records, 1);

    let messages = dispatcher.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].subject.contains("KO"));
    assert!(messages[0].body.contains("Change: +25.00%"));

    let saved = store.snapshot().unwrap();
    assert_eq!(saved.history(&Ticker::from("KO")).len(), 2);
    assert_eq!(saved.history(&Ticker::from("T")).len(), 1);
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn slow_fetch_times_out_and_is_skipped() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_delay("SLOW", Duration::from_secs(5), vec![event("2023-01-01", "1")])
            .with_events("KO", vec![event("2023-01-01", "0.46")]),
    );
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let store = Arc::new(MemoryStateStore::new());
    let report = coordinator(source, dispatcher, store.clone())
        .run(&tickers(&["SLOW", "KO"]))
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].status, EntityStatus::Skipped);
    assert!(report.outcomes[0]
        .error
        .as_deref()
        .unwrap()
        .contains("timed out"));
    assert_eq!(report.outcomes[1].status, EntityStatus::Baseline);
    assert!(store
        .snapshot()
        .unwrap()
        .get(&Ticker::from("SLOW"))
        .is_none());
}

#[tokio::test]
async fn delivery_failure_is_counted_and_history_still_grows() {
    let mut state = PersistedState::new();
    state.append(&Ticker::from("KO"), &[event("2023-01-01", "1.00")]);
    let source = Arc::new(ScriptedSource::new().with_events(
        "KO",
        vec![event("2023-01-01", "1.00"), event("2023-04-01", "0.50")],
    ));
    let dispatcher = Arc::new(RecordingDispatcher::failing());
    let store = Arc::new(MemoryStateStore::with_state(state));
    let report = coordinator(source, dispatcher.clone(), store.clone())
        .run(&tickers(&["KO"]))
        .await
        .unwrap();

    assert_eq!(report.summary.alerts_sent, 0);
    assert_eq!(report.summary.alerts_failed, 1);
    assert_eq!(dispatcher.messages().len(), 1);
    assert_eq!(
        store
            .snapshot()
            .unwrap()
            .history(&Ticker::from("KO"))
            .latest()
            .map(|event| event.amount),
        Some(dec!(0.50))
    );
}

#[tokio::test]
async fn duplicate_tickers_are_fetched_once() {
    let source = Arc::new(
        ScriptedSource::new().with_events("KO", vec![event("2023-01-01", "0.46")]),
    );
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let store = Arc::new(MemoryStateStore::new());
    let report = coordinator(source.clone(), dispatcher, store)
        .run(&tickers(&["KO", "ko", "KO"]))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(source.calls(), tickers(&["KO"]));
}

#[tokio::test]
async fn save_failure_reports_persist_error() {
    let source = Arc::new(
        ScriptedSource::new().with_events("KO", vec![event("2023-01-01", "0.46")]),
    );
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let store = Arc::new(FailingStore::with_state(PersistedState::new()));
    let err = coordinator(source, dispatcher, store)
        .run(&tickers(&["KO"]))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), EXIT_PERSIST_FAILURE);
    match err {
        RunError::Persist { report, .. } => {
            assert_eq!(report.summary.new_records, 1);
            assert!(!report.summary.persisted);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreadable_snapshot_aborts_before_fetching() {
    let source = Arc::new(
        ScriptedSource::new().with_events("KO", vec![event("2023-01-01", "0.46")]),
    );
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let err = coordinator(source.clone(), dispatcher, Arc::new(CorruptStore))
        .run(&tickers(&["KO"]))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Startup(_)));
    assert_eq!(err.exit_code(), EXIT_STARTUP_FAILURE);
    assert!(source.calls().is_empty());
}
