use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use cvsync::drivers::WebDriverEngine;
use cvsync::google_sheets::GoogleSheetsClient;
use cvsync::utils::{init_logging, today_in_tokyo};
use cvsync::{run_once, Config, RunOutcome};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // .env may set LOG_LEVEL, and log_dir comes from the settings file.
    let config = Config::from_env();
    let log_dir = config
        .as_ref()
        .ok()
        .and_then(|c| c.settings.log_dir.clone());
    let _guard = match init_logging(log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:?}");
            None
        }
    };

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Cannot start: {}", e);
            return;
        }
    };
    config.sources.log();

    if let Err(e) = run(config).await {
        error!("Sync run failed: {:?}", e);
    }
}

async fn run(mut config: Config) -> Result<()> {
    let download_dir = config
        .settings
        .prepare_download_dir()
        .context("Failed to prepare download directory")?;
    let sheets = GoogleSheetsClient::from_json(&config.service_account_json)
        .context("Failed to load spreadsheet credentials")?;
    let engine = WebDriverEngine::connect(&config.settings.driver, &download_dir)
        .await
        .context("Failed to start browser session")?;

    let outcome = run_once(
        &config.settings,
        &config.credential,
        Arc::new(engine),
        &sheets,
        today_in_tokyo(),
    )
    .await?;

    match outcome {
        RunOutcome::Published { rows, report, .. } => {
            if report.is_complete() {
                info!(rows, updated_cells = ?report.updated_cells, "Sheet updated");
            } else {
                if let Some(e) = &report.clear_error {
                    warn!("Clear failed: {}", e);
                }
                if let Some(e) = &report.write_error {
                    error!("Write failed: {}", e);
                }
            }
        }
        RunOutcome::NothingToReport { .. } => info!("No conversions to report today"),
    }
    Ok(())
}
