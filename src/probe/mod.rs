//! Probe module for checking endpoint availability over HTTP.

mod http;

pub use http::*;

use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Outcome of a completed probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    pub latency_ms: u64,
    pub status_code: u16,
}

/// Run a probe against the given URL.
pub async fn run_probe(url: &str, timeout: Duration) -> Result<ProbeOutcome, ProbeError> {
    // Add jitter to avoid thundering herd
    let jitter = rand::random::<u64>() % 100;
    tokio::time::sleep(Duration::from_millis(jitter)).await;

    run_http_probe(url, timeout).await
}
