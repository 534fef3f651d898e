use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const CONNECT_TIMEOUT_SECS: u64 = 10;

static STREAM_CLIENT: OnceCell<Client> = OnceCell::new();

/// Shared client for long-lived event streams: bounded connect, unbounded body.
pub fn stream_client() -> Result<&'static Client> {
    STREAM_CLIENT.get_or_try_init(|| {
        Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(None::<Duration>)
            .build()
            .context("failed to build http client")
    })
}
