use anyhow::{anyhow, Result};
use divwatch_config::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the file writer flushing until dropped at process exit.
pub struct TelemetryGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured filter; `verbose` raises the configured
/// filter to `debug`.
pub fn init_tracing(config: &LogConfig, verbose: bool, json: bool) -> Result<TelemetryGuard> {
    let default_filter = if verbose {
        "debug"
    } else {
        config.filter.as_str()
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|err| anyhow!("invalid log filter {default_filter:?}: {err}"))?;

    let json = json || config.json;
    let json_layer = json.then(|| fmt::layer().json().with_target(false));
    let text_layer = (!json).then(|| fmt::layer().with_target(false).compact());

    let (file_layer, file_guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "divwatch.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize tracing subscriber: {err}"))?;

    Ok(TelemetryGuard {
        _file_guard: file_guard,
    })
}
