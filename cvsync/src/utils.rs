use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::{debug, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// The console and the report both follow the Japanese calendar day.
const TOKYO_UTC_OFFSET_HOURS: i64 = 9;

fn log_level() -> Level {
    env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO)
}

/// Log to stderr, and additionally to a daily rolling file under `log_dir` when given.
///
/// The returned guard flushes the file writer on drop and must live until exit.
pub fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = log_level();
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_filter(EnvFilter::from_default_env().add_directive(level.into()));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "cvsync.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(EnvFilter::from_default_env().add_directive(level.into()));
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
                .context("Failed to install tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .try_init()
                .context("Failed to install tracing subscriber")?;
            Ok(None)
        }
    }
}

/// Today's calendar date in Japan.
pub fn today_in_tokyo() -> NaiveDate {
    (Utc::now() + chrono::Duration::hours(TOKYO_UTC_OFFSET_HOURS)).date_naive()
}

/// Blocking pause for the remote UI to catch up. Zero durations return immediately.
pub async fn settle(what: &str, pause: Duration) {
    if pause.is_zero() {
        return;
    }
    debug!(pause_ms = pause.as_millis() as u64, "Settling after {}", what);
    tokio::time::sleep(pause).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokyo_date_is_today_or_tomorrow_in_utc() {
        let utc_today = Utc::now().date_naive();
        let tokyo = today_in_tokyo();
        assert!(tokyo == utc_today || tokyo == utc_today.succ_opt().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn settle_waits_exactly_the_pause() {
        let start = tokio::time::Instant::now();
        settle("test", Duration::from_secs(15)).await;
        assert_eq!(start.elapsed(), Duration::from_secs(15));
        settle("nothing", Duration::ZERO).await;
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }
}
