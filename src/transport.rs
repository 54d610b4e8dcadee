//! Delivery capabilities for flushed batches
//!
//! Delivery is modeled as two optional injected capabilities rather than
//! feature-detected globals, so the tracker stays testable without a
//! browser-like environment:
//!
//! - [`Beacon`]: an unload-safe, best-effort send (the
//!   `navigator.sendBeacon` analogue). Preferred when present.
//! - [`Transport`]: a fire-and-forget keep-alive POST carrying the JSON
//!   payload. Used when no beacon is connected.
//!
//! Both are at-most-once: failures are logged by the implementation and
//! never observed by the tracker.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::config::TrackerConfig;
use crate::error::{Error, Result};

/// Unload-safe best-effort send.
///
/// Returns `false` when the environment rejected or could not queue the
/// payload; the batch is dropped either way.
pub trait Beacon {
    fn send(&self, endpoint: &str, payload: &[u8]) -> bool;
}

/// Fire-and-forget keep-alive POST of a JSON body.
///
/// Implementations must not block the caller: `flush()` returns before
/// delivery completes, and delivery failure is observed only here.
pub trait Transport {
    fn post(&self, endpoint: &str, body: Vec<u8>);
}

/// Production [`Transport`] backed by `reqwest`.
///
/// Requests are spawned on the ambient tokio runtime and never awaited by
/// the caller. With no runtime available the batch is dropped with a
/// warning, keeping the send non-blocking.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport from tracker configuration.
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(&self, endpoint: &str, body: Vec<u8>) {
        let client = self.client.clone();
        let url = endpoint.to_string();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(endpoint = %url, "no async runtime available, batch dropped");
                return;
            }
        };

        handle.spawn(async move {
            match client.post(&url).body(body).send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(
                        endpoint = %url,
                        status = %response.status(),
                        "telemetry delivery rejected"
                    );
                }
                Ok(_) => {
                    tracing::debug!(endpoint = %url, "telemetry batch delivered");
                }
                Err(e) => {
                    tracing::warn!(endpoint = %url, error = %e, "telemetry delivery failed");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_from_config() {
        let config = TrackerConfig::new("https://telemetry.example.com/t");
        assert!(HttpTransport::new(&config).is_ok());
    }

    #[test]
    fn test_post_without_runtime_is_silent() {
        let config = TrackerConfig::new("/t");
        let transport = HttpTransport::new(&config).unwrap();
        // No tokio runtime here; the send must be swallowed, not panic
        transport.post("https://telemetry.example.com/t", b"[]".to_vec());
    }
}
