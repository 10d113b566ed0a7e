//! JSON configuration for building a [`crate::tracer::ZipkinTracer`], and
//! the `TracerBuilder` that turns it into a running tracer with a live
//! reporter.
//!
//! Mirrors the original dynamic-load factory's config schema (spec §6)
//! without the `dlopen`-based plugin ABI itself, which is out of scope.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use zipkin_core::{Endpoint, IpAddress, ProbabilisticSampler, Sample};
use zipkin_reporter::{BufferedReporter, HttpTransport, ReporterConfig, Transport};

use crate::error::{Error, Result};
use crate::tracer::{TracerCore, ZipkinTracer};

/// Raw JSON shape accepted by [`Config::from_json`]. Field names match the
/// original factory's schema verbatim; the collector is either a host/port
/// pair or a base URL, checked by hand in [`Config::from_raw`] rather than
/// via an untagged enum (which does not mix well with `#[serde(flatten)]`).
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    service_name: String,
    #[serde(default)]
    service_address: Option<String>,
    #[serde(default)]
    collector_host: Option<String>,
    #[serde(default)]
    collector_port: Option<u16>,
    #[serde(default)]
    collector_base_url: Option<String>,
    #[serde(default)]
    collector_timeout: Option<u64>,
    #[serde(default)]
    reporting_period: Option<u64>,
    #[serde(default)]
    max_buffered_spans: Option<usize>,
    #[serde(default)]
    sample_rate: Option<f64>,
}

/// Validated configuration for a [`TracerBuilder`].
#[derive(Debug, Clone)]
pub struct Config {
    /// The local service's name, recorded on every span's `lc` annotation
    /// and endpoint.
    pub service_name: String,
    /// The local service's address, recorded on the same endpoint.
    pub service_address: IpAddress,
    /// Where the collector's `/api/v1/spans` endpoint lives.
    pub collector_url: String,
    /// Per-HTTP-request timeout. `None` means unlimited, matching the
    /// original's `collector_timeout = 0` default.
    pub collector_timeout: Option<Duration>,
    /// How often the reporter's writer task flushes on a timer.
    pub reporting_period: Duration,
    /// How many finished spans the reporter buffers before dropping.
    pub max_buffered_spans: usize,
    /// Root-span sampling probability, already clamped to `[0.0, 1.0]`.
    pub sample_rate: f64,
}

impl Config {
    /// Parses and validates a JSON configuration document.
    ///
    /// Invalid JSON yields [`Error::ConfigurationParse`]; valid JSON that
    /// fails schema validation (missing collector address, port out of
    /// range, etc.) yields [`Error::InvalidConfiguration`].
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        if raw.service_name.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "service_name must not be empty".to_string(),
            ));
        }

        let collector_url = match (raw.collector_base_url, raw.collector_host, raw.collector_port) {
            (Some(base_url), _, _) => {
                if base_url.trim().is_empty() {
                    return Err(Error::InvalidConfiguration(
                        "collector_base_url must not be empty".to_string(),
                    ));
                }
                format!(
                    "{}{}",
                    base_url.trim_end_matches('/'),
                    zipkin_reporter::DEFAULT_COLLECTOR_ENDPOINT
                )
            }
            (None, Some(collector_host), Some(collector_port)) => {
                if collector_port == 0 {
                    return Err(Error::InvalidConfiguration(
                        "collector_port must be in 1..=65535".to_string(),
                    ));
                }
                format!(
                    "http://{collector_host}:{collector_port}{}",
                    zipkin_reporter::DEFAULT_COLLECTOR_ENDPOINT
                )
            }
            _ => {
                return Err(Error::InvalidConfiguration(
                    "must set either collector_base_url or collector_host/collector_port"
                        .to_string(),
                ))
            }
        };

        let sample_rate = raw.sample_rate.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&sample_rate) {
            return Err(Error::InvalidConfiguration(
                "sample_rate must be within 0.0..=1.0".to_string(),
            ));
        }

        let max_buffered_spans = raw.max_buffered_spans.unwrap_or(1000);
        if max_buffered_spans == 0 {
            return Err(Error::InvalidConfiguration(
                "max_buffered_spans must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            service_name: raw.service_name,
            service_address: raw
                .service_address
                .map(|addr| IpAddress::parse(&addr, 0))
                .unwrap_or_default(),
            collector_url,
            collector_timeout: raw.collector_timeout.map(Duration::from_millis),
            reporting_period: Duration::from_micros(raw.reporting_period.unwrap_or(500_000)),
            max_buffered_spans,
            sample_rate,
        })
    }
}

/// Builds a running [`ZipkinTracer`] from a [`Config`] (or a hand-built
/// transport, for tests).
///
/// Mirrors the original's `makeZipkinOtTracer`: returns `None` rather than
/// erroring when the transport itself cannot be constructed (e.g. the
/// collector URL is malformed), so callers can degrade to a no-op tracer
/// instead of failing application startup.
pub struct TracerBuilder;

impl TracerBuilder {
    /// Builds a tracer posting to an HTTP collector, per `config`.
    ///
    /// Returns `Ok(None)` if the HTTP transport could not be constructed.
    pub fn build(config: &Config) -> Result<Option<ZipkinTracer>> {
        let transport = match HttpTransport::with_url(&config.collector_url, config.collector_timeout) {
            Ok(t) => Arc::new(t) as Arc<dyn Transport>,
            Err(_) => return Ok(None),
        };
        Ok(Some(Self::build_with_transport(config, transport)))
    }

    /// Builds a tracer over a caller-supplied transport (e.g.
    /// [`zipkin_reporter::InMemoryTransport`] in tests).
    pub fn build_with_transport(config: &Config, transport: Arc<dyn Transport>) -> ZipkinTracer {
        let reporter = BufferedReporter::new(
            transport,
            ReporterConfig {
                max_buffered_spans: config.max_buffered_spans,
                reporting_period: config.reporting_period,
            },
        );
        let sampler: Box<dyn Sample> = Box::new(ProbabilisticSampler::new(config.sample_rate));
        let endpoint = Endpoint::new(config.service_name.clone(), config.service_address.clone());
        let core = Arc::new(TracerCore::new(
            config.service_name.clone(),
            endpoint,
            sampler,
            reporter,
        ));
        ZipkinTracer::new(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_host_port_config() {
        let config = Config::from_json(
            r#"{"service_name": "svc", "collector_host": "localhost", "collector_port": 9411}"#,
        )
        .unwrap();
        assert_eq!(config.collector_url, "http://localhost:9411/api/v1/spans");
        assert_eq!(config.sample_rate, 1.0);
        assert_eq!(config.max_buffered_spans, 1000);
    }

    #[test]
    fn parses_base_url_config_and_trims_trailing_slash() {
        let config = Config::from_json(
            r#"{"service_name": "svc", "collector_base_url": "http://collector.internal/"}"#,
        )
        .unwrap();
        assert_eq!(
            config.collector_url,
            "http://collector.internal/api/v1/spans"
        );
    }

    #[test]
    fn missing_service_name_is_a_parse_error() {
        let err = Config::from_json(r#"{"collector_host": "h", "collector_port": 1}"#).unwrap_err();
        assert!(matches!(err, Error::ConfigurationParse(_)));
    }

    #[test]
    fn empty_service_name_is_invalid_configuration() {
        let err = Config::from_json(
            r#"{"service_name": "", "collector_host": "h", "collector_port": 1}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn missing_collector_address_is_invalid_configuration() {
        let err = Config::from_json(r#"{"service_name": "svc"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn out_of_range_sample_rate_is_invalid_configuration() {
        let err = Config::from_json(
            r#"{"service_name": "svc", "collector_host": "h", "collector_port": 1, "sample_rate": 2.0}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::ConfigurationParse(_)));
    }

    #[tokio::test]
    async fn build_with_transport_produces_a_usable_tracer() {
        use crate::span::StartSpanOptions;
        use crate::tracer::Tracer;
        use zipkin_reporter::InMemoryTransport;

        let config = Config::from_json(
            r#"{"service_name": "svc", "collector_host": "h", "collector_port": 1, "sample_rate": 1.0, "reporting_period": 50000}"#,
        )
        .unwrap();
        let transport = Arc::new(InMemoryTransport::new());
        let tracer = TracerBuilder::build_with_transport(&config, transport.clone());
        let span = tracer.start_span_with_options("op", StartSpanOptions::default());
        span.finish();
        tracer.close();
        assert_eq!(transport.spans().len(), 1);
    }
}
