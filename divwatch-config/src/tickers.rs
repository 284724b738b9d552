use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use divwatch_core::Ticker;
use tracing::warn;

/// Parse a ticker list: one code per line, `#` starts a comment, blank lines
/// are ignored and repeated codes keep their first position.
pub fn parse_tickers(contents: &str) -> Vec<Ticker> {
    let mut tickers: Vec<Ticker> = Vec::new();
    for line in contents.lines() {
        let code = line.split('#').next().unwrap_or_default().trim();
        if code.is_empty() {
            continue;
        }
        let ticker = Ticker::new(code);
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    tickers
}

/// Read the ticker list at `path`.
///
/// A missing file is created with `default` as its only entry and that single
/// ticker is returned.
pub fn load_tickers(path: &Path, default: &str) -> Result<Vec<Ticker>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(parse_tickers(&contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let ticker = Ticker::new(default);
            warn!(
                path = %path.display(),
                ticker = %ticker,
                "ticker list not found; creating it with the default ticker"
            );
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create directory {}", parent.display())
                    })?;
                }
            }
            fs::write(path, format!("{ticker}\n"))
                .with_context(|| format!("failed to create ticker list {}", path.display()))?;
            Ok(vec![ticker])
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to read ticker list {}", path.display()))
        }
    }
}
