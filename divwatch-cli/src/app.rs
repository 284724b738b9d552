use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use divwatch_config::{load_tickers, AppConfig};
use divwatch_core::Ticker;
use divwatch_data::{YahooConfig, YahooDividendSource};
use divwatch_ledger::{JsonStateStore, StateStore};
use divwatch_notify::build_dispatcher;
use rust_decimal::Decimal;

use crate::coordinator::{
    EntityStatus, RunCoordinator, RunCoordinatorConfig, RunError, RunReport, EXIT_STARTUP_FAILURE,
};
use crate::reconcile::change_ratio;
use crate::telemetry;

#[derive(Parser)]
#[command(name = "divwatch", version, about = "Dividend change monitor")]
pub struct Cli {
    /// Configuration file (defaults to config/divwatch.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every tracked ticker once and alert on significant changes.
    Run(RunArgs),
    /// Print the stored dividend history of a ticker.
    History(HistoryArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Minimum absolute relative change that triggers an alert (e.g. 0.2).
    #[arg(long)]
    threshold: Option<Decimal>,
    #[arg(long)]
    state: Option<PathBuf>,
    #[arg(long)]
    tickers: Option<PathBuf>,
}

#[derive(Args)]
struct HistoryArgs {
    ticker: String,
    #[arg(long)]
    state: Option<PathBuf>,
}

/// Parse the command line, run the selected command and map the outcome to an exit status.
pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_STARTUP_FAILURE)
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    match &cli.command {
        Commands::Run(args) => {
            if let Some(threshold) = args.threshold {
                config.threshold = threshold;
            }
            if let Some(state) = &args.state {
                config.state_path = state.clone();
            }
            if let Some(tickers) = &args.tickers {
                config.tickers_path = tickers.clone();
            }
        }
        Commands::History(args) => {
            if let Some(state) = &args.state {
                config.state_path = state.clone();
            }
        }
    }
    config.validate()?;
    let _guard = telemetry::init_tracing(&config.log, cli.verbose, cli.json_logs)?;

    match cli.command {
        Commands::Run(_) => run_monitor(&config).await,
        Commands::History(args) => show_history(&config, &args.ticker),
    }
}

async fn run_monitor(config: &AppConfig) -> Result<ExitCode> {
    let tickers = load_tickers(&config.tickers_path, &config.default_ticker)?;
    let mut yahoo = YahooConfig {
        base_url: config.source.base_url.clone(),
        requests_per_second: config.source.requests_per_second,
        ..YahooConfig::default()
    };
    if let Some(agent) = &config.source.user_agent {
        yahoo.user_agent = agent.clone();
    }
    let source = Arc::new(YahooDividendSource::new(yahoo)?);
    let dispatcher = build_dispatcher(&config.alerts)?;
    let store = Arc::new(JsonStateStore::new(&config.state_path));
    let coordinator = RunCoordinator::new(RunCoordinatorConfig::from_app(
        config, source, dispatcher, store,
    ));

    println!(
        "Monitoring {} tickers: {}",
        tickers.len(),
        tickers
            .iter()
            .map(Ticker::code)
            .collect::<Vec<_>>()
            .join(", ")
    );
    match coordinator.run(&tickers).await {
        Ok(report) => {
            print_report(&report);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            if let RunError::Persist { report, .. } = &err {
                print_report(report);
            }
            eprintln!("error: {err}");
            Ok(ExitCode::from(err.exit_code()))
        }
    }
}

fn print_report(report: &RunReport) {
    for outcome in &report.outcomes {
        let detail = match outcome.status {
            EntityStatus::Skipped => outcome.error.clone().unwrap_or_default(),
            EntityStatus::Unchanged => format!("{} records fetched", outcome.fetched),
            EntityStatus::Baseline => format!("{} records stored", outcome.new_events.len()),
            EntityStatus::New | EntityStatus::Alerted => format!(
                "{} new, {} alerts sent, {} failed",
                outcome.new_events.len(),
                outcome.alerts_sent,
                outcome.alerts_failed
            ),
        };
        println!("{:<8} {:<10} {}", outcome.ticker, outcome.status, detail);
    }
    let summary = &report.summary;
    println!();
    println!("Tickers checked:  {}", summary.entities_checked);
    println!("Tickers skipped:  {}", summary.entities_skipped);
    println!("Alerts sent:      {}", summary.alerts_sent);
    if summary.alerts_failed > 0 {
        println!("Alerts failed:    {}", summary.alerts_failed);
    }
    println!("New records:      {}", summary.new_records);
}

fn show_history(config: &AppConfig, ticker: &str) -> Result<ExitCode> {
    let store = JsonStateStore::new(&config.state_path);
    let state = store
        .load()
        .with_context(|| format!("failed to read {}", store.path().display()))?;
    let ticker = Ticker::new(ticker);
    let history = state.history(&ticker);
    if history.is_empty() {
        println!("No dividends stored for {ticker}");
        return Ok(ExitCode::SUCCESS);
    }
    println!("{ticker}: {} dividends", history.len());
    let mut previous: Option<Decimal> = None;
    for event in history.events() {
        let change = previous
            .and_then(|prev| change_ratio(prev, event.amount))
            .map(|ratio| format!("{:+}%", (ratio * Decimal::ONE_HUNDRED).round_dp(2)))
            .unwrap_or_default();
        println!("{}  {:>10.4}  {}", event.date, event.amount, change);
        previous = Some(event.amount);
    }
    Ok(ExitCode::SUCCESS)
}
