pub mod elevenlabs;
pub mod openai;

use std::time::Duration;

/// Shared HTTP client for every generation service.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

/// First `max` chars of a response body, for logs and errors.
pub(crate) fn snippet(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}
