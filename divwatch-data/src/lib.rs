//! Dividend data retrieval.

pub mod download;
pub mod limiter;
pub mod source;

pub use download::{parse_chart, YahooConfig, YahooDividendSource, YAHOO_BASE_URL};
pub use limiter::RateLimiter;
pub use source::{normalize_events, DividendSource};
