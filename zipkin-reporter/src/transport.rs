//! Delivering a batch of finished spans to a Zipkin collector.

use std::time::Duration;

use async_trait::async_trait;
use zipkin_core::Span;

use crate::error::{Error, Result};

/// The default path a Zipkin v1 collector listens on.
pub const DEFAULT_COLLECTOR_ENDPOINT: &str = "/api/v1/spans";

/// Ships a batch of finished spans somewhere. Implementations are expected
/// to be fire-and-forget: a failed send is logged and the batch is
/// dropped, never retried (see the writer task in [`crate::reporter`]).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `spans` onward. Errors are the implementation's own concern
    /// to log; the writer task does not inspect the outcome.
    async fn transport_spans(&self, spans: &[Span]);
}

/// Posts spans as a Zipkin v1 JSON array to `http://{host}:{port}/api/v1/spans`.
///
/// Owns a single [`reqwest::Client`] exclusively; nothing else touches it,
/// so there is no locking on the hot path beyond what `reqwest` does
/// internally for connection pooling.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    /// Builds a transport posting to `http://{collector_host}:{collector_port}/api/v1/spans`.
    ///
    /// `timeout` of `None` means unlimited, matching the original's
    /// `collector_timeout = 0` default.
    pub fn new(collector_host: &str, collector_port: u16, timeout: Option<Duration>) -> Result<Self> {
        let url = format!("http://{collector_host}:{collector_port}{DEFAULT_COLLECTOR_ENDPOINT}");
        Self::with_url(url, timeout)
    }

    /// Builds a transport posting directly to `url` (already including the
    /// collector path). `timeout` of `None` means unlimited.
    ///
    /// Fails with [`Error::InvalidCollectorUrl`] if `url` does not parse as
    /// an absolute URL, before any client/socket state is built.
    pub fn with_url(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let url = url.into();
        reqwest::Url::parse(&url)
            .map_err(|err| Error::InvalidCollectorUrl(format!("{url}: {err}")))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn transport_spans(&self, spans: &[Span]) {
        if spans.is_empty() {
            return;
        }
        let body = zipkin_core::batch_to_json(spans);
        let result = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await;
        match result {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(
                    status = %response.status(),
                    url = %self.url,
                    "zipkin collector rejected span batch"
                );
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, url = %self.url, "failed to reach zipkin collector");
            }
        }
    }
}
