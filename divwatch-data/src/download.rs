use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use divwatch_core::{EventRecord, Ticker};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::limiter::RateLimiter;
use crate::source::{normalize_events, DividendSource};

pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Settings for [`YahooDividendSource`].
#[derive(Clone, Debug)]
pub struct YahooConfig {
    pub base_url: String,
    pub user_agent: String,
    pub requests_per_second: u32,
    pub request_timeout: Duration,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: YAHOO_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            requests_per_second: 2,
            request_timeout: Duration::from_secs(20),
        }
    }
}

/// Dividend source backed by the Yahoo Finance chart endpoint.
pub struct YahooDividendSource {
    client: Client,
    base_url: String,
    limiter: RateLimiter,
}

impl YahooDividendSource {
    pub fn new(config: YahooConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url,
            limiter: RateLimiter::per_second(config.requests_per_second),
        })
    }

    fn endpoint(&self, ticker: &Ticker) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/v8/finance/chart/{}", ticker.code())
    }
}

#[async_trait]
impl DividendSource for YahooDividendSource {
    async fn fetch_events(&self, ticker: &Ticker) -> Result<Vec<EventRecord>> {
        self.limiter.until_ready().await;
        let response = self
            .client
            .get(self.endpoint(ticker))
            .query(&[("range", "max"), ("interval", "1mo"), ("events", "div")])
            .send()
            .await
            .with_context(|| format!("request for {ticker} dividends failed"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read chart response body")?;
        debug!(
            ticker = %ticker,
            status = %status,
            "chart response: {}",
            truncate(&body, 512)
        );
        if !status.is_success() {
            return Err(anyhow!(
                "chart endpoint responded with status {} for {}: {}",
                status,
                ticker,
                truncate(&body, 256)
            ));
        }
        parse_chart(ticker, &body)
    }
}

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    events: Option<ChartEvents>,
}

/// Exchange metadata; `gmtoffset` is the listing's UTC offset in seconds.
#[derive(Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEntry>,
}

#[derive(Deserialize)]
struct DividendEntry {
    amount: f64,
    date: i64,
}

/// Decode a chart payload into normalized dividend events.
pub fn parse_chart(ticker: &Ticker, body: &str) -> Result<Vec<EventRecord>> {
    let envelope: ChartEnvelope = serde_json::from_str(body).map_err(|err| {
        anyhow!(
            "failed to parse chart response for {}: {} (body snippet: {})",
            ticker,
            err,
            truncate(body, 256)
        )
    })?;
    if let Some(error) = envelope.chart.error {
        return Err(anyhow!(
            "chart endpoint returned error {} for {}: {}",
            error.code,
            ticker,
            error.description
        ));
    }
    let Some(result) = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
    else {
        return Ok(Vec::new());
    };
    // Dividend dates are exchange-local calendar days.
    let gmtoffset = result.meta.map(|meta| meta.gmtoffset).unwrap_or_default();
    let dividends = result
        .events
        .map(|events| events.dividends)
        .unwrap_or_default();

    let mut events = Vec::with_capacity(dividends.len());
    for entry in dividends.into_values() {
        match to_record(&entry, gmtoffset) {
            Some(record) => events.push(record),
            None => warn!(
                ticker = %ticker,
                date = entry.date,
                amount = entry.amount,
                "skipping malformed dividend entry"
            ),
        }
    }
    Ok(normalize_events(ticker, events))
}

fn to_record(entry: &DividendEntry, gmtoffset: i64) -> Option<EventRecord> {
    if !entry.amount.is_finite() {
        return None;
    }
    let local = entry.date.checked_add(gmtoffset)?;
    let date = DateTime::from_timestamp(local, 0)?.date_naive();
    let amount = Decimal::from_str(&entry.amount.to_string()).ok()?;
    Some(EventRecord::new(date, amount))
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
