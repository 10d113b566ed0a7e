use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the OpenTracing façade.
#[derive(Debug, Error)]
pub enum Error {
    /// `Inject` was handed a [`crate::context::SpanContext`] implementation
    /// that did not originate from this tracer.
    #[error("span context did not originate from this tracer")]
    InvalidSpanContext,
    /// A B3 header carried a value that failed to parse.
    #[error("span context corrupted: {0}")]
    SpanContextCorrupted(#[from] zipkin_propagation::Error),
    /// The configuration JSON was not valid JSON.
    #[error("configuration parse error: {0}")]
    ConfigurationParse(#[from] serde_json::Error),
    /// The configuration JSON was well-formed but failed schema
    /// validation (missing required field, value out of range, etc).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Building the reporter's transport failed (e.g. malformed collector
    /// URL).
    #[error("failed to build reporter: {0}")]
    Reporter(#[from] zipkin_reporter::Error),
}
