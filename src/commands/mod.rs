pub mod chains;
pub mod check;
pub mod config_init;
pub mod init;
pub mod quote;
pub mod run;
pub mod status;
pub mod sweep;

use crate::config::Config;
use crate::store::SqliteStore;
use crate::types::parse_address;
use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

pub(crate) async fn open_store(config: &Config) -> Result<SqliteStore> {
    let path = &config.files.database;
    SqliteStore::open(path)
        .await
        .with_context(|| format!("failed to open wallet store {}", path.display()))
}

/// Read one deposit address per non-empty line.
pub(crate) fn load_deposits(path: &Path) -> Result<Vec<Address>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read deposit addresses {}", path.display()))?;
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| parse_address(line).map_err(|err| anyhow!("line {}: {err}", index + 1)))
        .collect()
}

/// Redact credentials from a URL string for display.
pub(crate) fn redact_url(value: &str) -> String {
    match url::Url::parse(value) {
        Ok(mut parsed) => {
            if !parsed.username().is_empty() {
                let _ = parsed.set_username("REDACTED");
            }
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => value.to_string(),
    }
}
