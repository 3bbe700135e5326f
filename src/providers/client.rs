use crate::config::Settings;
use reqwest::Client;
use std::time::Duration;

/// Build the shared HTTP client for provider calls.
///
/// Every provider attempt is bounded by the full-request timeout plus a
/// separate connect timeout; a timeout surfaces as an ordinary transient
/// failure and moves the fallback chain forward.
pub fn build_provider_client(settings: &Settings) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}
