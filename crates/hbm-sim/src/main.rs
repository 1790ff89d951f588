//! Load driver for the HBM space engine.
//!
//! Runs a burst of concurrent random actions against an in-memory engine
//! and then replays every account's ledger. Exits non-zero if any account
//! fails its audit.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load engine and workload configuration from `hbm-config.yaml`
//! 3. Seed accounts, spaces and treasures
//! 4. Run the workers
//! 5. Audit every account and log the summary

mod error;
mod load;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use hbm_core::{EngineConfig, GameEngine, HbmConfig, MemoryStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::SimError;
use crate::load::LoadConfig;

const CONFIG_PATH: &str = "hbm-config.yaml";

/// Application entry point for the load driver.
///
/// # Errors
///
/// Returns an error if configuration, seeding or a worker fails, or if any
/// account fails its ledger audit.
#[tokio::main]
async fn main() -> Result<(), SimError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("hbm-sim starting");

    let engine_config = load_engine_config(Path::new(CONFIG_PATH))?;
    let load_config = load_workload_config()?;
    info!(
        users = load_config.users,
        spaces = load_config.spaces,
        workers = load_config.workers,
        actions_per_worker = load_config.actions_per_worker,
        seed = load_config.seed,
        lock_timeout_ms = engine_config.lock_timeout_ms,
        "Configuration loaded"
    );

    let engine = Arc::new(GameEngine::new(MemoryStore::new(), engine_config));
    let started = Instant::now();
    let report = load::run(&engine, &load_config).await?;

    info!(
        accepted = report.accepted,
        rejected = report.rejected_total(),
        audited = report.audited,
        ledger_records = engine.store().ledger_len().await,
        spaces = engine.store().space_count().await,
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "load run complete"
    );
    for (kind, count) in &report.rejected {
        info!(kind = ?kind, count, "rejections");
    }

    if !report.mismatched.is_empty() {
        for user in &report.mismatched {
            error!(user = %user, "ledger audit mismatch");
        }
        return Err(SimError::AuditFailed {
            count: report.mismatched.len(),
        });
    }
    Ok(())
}

/// Load engine tuning. Without a file the defaults still pass through
/// env overrides and validation.
fn load_engine_config(path: &Path) -> Result<EngineConfig, SimError> {
    if path.exists() {
        Ok(HbmConfig::from_file(path)?.engine)
    } else {
        info!("Config file not found, using defaults");
        Ok(HbmConfig::parse("{}")?.engine)
    }
}

/// Load the `load` section of the config file. Missing file or section
/// yields defaults.
fn load_workload_config() -> Result<LoadConfig, SimError> {
    let path = Path::new(CONFIG_PATH);
    if !path.exists() {
        return Ok(LoadConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| SimError::LoadConfig {
        message: format!("failed to read config file: {e}"),
    })?;
    let raw: serde_yml::Value = serde_yml::from_str(&contents).map_err(|e| SimError::LoadConfig {
        message: format!("failed to parse config YAML: {e}"),
    })?;
    raw.get("load").map_or_else(
        || Ok(LoadConfig::default()),
        |section| {
            serde_yml::from_value(section.clone()).map_err(|e| SimError::LoadConfig {
                message: format!("failed to parse load config: {e}"),
            })
        },
    )
}
