//! HTTP probe implementation.

use std::time::{Duration, Instant};

use super::{ProbeError, ProbeOutcome};

/// Run an HTTP probe against the given URL.
///
/// Measures the elapsed time for the full response (headers and body)
/// and captures the status code. A response slower than `timeout` is a
/// timeout, which the caller translates into a down observation.
pub async fn run_http_probe(url: &str, timeout: Duration) -> Result<ProbeOutcome, ProbeError> {
    let url = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProbeError::Config(e.to_string()))?;

    let start = Instant::now();

    let response = client.get(&url).send().await.map_err(|e| {
        if e.is_timeout() {
            ProbeError::Timeout(timeout)
        } else {
            ProbeError::Network(e.to_string())
        }
    })?;

    let status_code = response.status().as_u16();

    // Read the full body to measure complete transfer time
    let _body = response.bytes().await.map_err(|e| {
        if e.is_timeout() {
            ProbeError::Timeout(timeout)
        } else {
            ProbeError::Network(e.to_string())
        }
    })?;

    Ok(ProbeOutcome {
        latency_ms: start.elapsed().as_millis() as u64,
        status_code,
    })
}
