use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared blocking client. Snapshot files are small; the timeout mostly
/// guards against a cold backend dyno, and can be stretched with
/// `NRL_HTTP_TIMEOUT_SECS` when that happens a lot.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        let timeout = env::var("NRL_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, 120);
        Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to build http client")
    })
}
