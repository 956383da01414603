use std::time::Duration;

use anyhow::{Context, Result};

pub fn build_http_client() -> Result<reqwest::Client> {
    build_http_client_with_timeout(None)
}

/// Build the client every backend shares. System proxy discovery is opt-in via
/// `CHARFORGE_ENABLE_SYSTEM_PROXY`; if it fails the client falls back to `no_proxy`.
pub fn build_http_client_with_timeout(timeout: Option<Duration>) -> Result<reqwest::Client> {
    if system_proxy_enabled() {
        match attempt_build(timeout, false) {
            Ok(client) => return Ok(client),
            Err(error) => tracing::warn!(
                "HTTP client initialization with system proxy discovery failed ({}); retrying with no_proxy",
                error
            ),
        }
    }

    attempt_build(timeout, true).context("Failed to initialize HTTP client")
}

fn system_proxy_enabled() -> bool {
    std::env::var("CHARFORGE_ENABLE_SYSTEM_PROXY")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn attempt_build(
    timeout: Option<Duration>,
    no_proxy: bool,
) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    if no_proxy {
        builder = builder.no_proxy();
    }
    builder.build()
}
