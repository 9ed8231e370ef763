use anyhow::{anyhow, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taxdesk_core::config::DEFAULT_LOG_LEVEL;
use taxdesk_core::Config;

/// Where the log file lives: `<data_local_dir>/taxdesk/taxdesk.log`.
pub fn log_path() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("taxdesk").join("taxdesk.log"))
}

/// Initialize tracing to a file. The terminal is in raw mode while the UI
/// runs, so nothing may be written to stdout or stderr.
pub fn init(config: &Config) -> Result<PathBuf> {
    let path = log_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let env_filter = EnvFilter::try_new(config.log_level())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!("Tracing initialized");
    Ok(path)
}
