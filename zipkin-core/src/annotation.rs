//! Timestamped events (`Annotation`) and typed tags (`BinaryAnnotation`)
//! attached to a [`crate::Span`].

use crate::Endpoint;

/// A timestamped event on a span.
///
/// `value` is conventionally one of the well-known Zipkin event strings —
/// `"cs"`, `"cr"`, `"ss"`, `"sr"` — but arbitrary values are allowed.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Microseconds since the Unix epoch.
    pub timestamp: u64,
    /// The event value, e.g. `"cs"`.
    pub value: String,
    /// The host that recorded the event, if known.
    pub endpoint: Option<Endpoint>,
}

impl Annotation {
    /// Builds an annotation without an endpoint.
    pub fn new(timestamp: u64, value: impl Into<String>) -> Self {
        Self {
            timestamp,
            value: value.into(),
            endpoint: None,
        }
    }

    /// Builds an annotation carrying the given endpoint.
    pub fn with_endpoint(timestamp: u64, value: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            timestamp,
            value: value.into(),
            endpoint: Some(endpoint),
        }
    }
}

/// The well-known Zipkin v1 annotation values marking the four corners of an
/// RPC.
pub mod well_known {
    /// Client send.
    pub const CLIENT_SEND: &str = "cs";
    /// Client receive.
    pub const CLIENT_RECV: &str = "cr";
    /// Server receive.
    pub const SERVER_RECV: &str = "sr";
    /// Server send.
    pub const SERVER_SEND: &str = "ss";
}

/// The typed value carried by a [`BinaryAnnotation`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    /// A boolean tag.
    Bool(bool),
    /// A signed 64-bit integer tag.
    I64(i64),
    /// A double-precision tag.
    Double(f64),
    /// A string tag. The wire format has no other string-shaped kind, so
    /// the façade's tag coercion (uint64, null, arrays/objects) collapses
    /// into this variant before reaching here; see
    /// `zipkin_opentracing::span::TagValue`'s `From` impl.
    Str(String),
}

impl From<bool> for AnnotationValue {
    fn from(v: bool) -> Self {
        AnnotationValue::Bool(v)
    }
}

impl From<i64> for AnnotationValue {
    fn from(v: i64) -> Self {
        AnnotationValue::I64(v)
    }
}

impl From<f64> for AnnotationValue {
    fn from(v: f64) -> Self {
        AnnotationValue::Double(v)
    }
}

impl From<String> for AnnotationValue {
    fn from(v: String) -> Self {
        AnnotationValue::Str(v)
    }
}

impl From<&str> for AnnotationValue {
    fn from(v: &str) -> Self {
        AnnotationValue::Str(v.to_string())
    }
}

/// A typed key/value tag on a span, e.g. `http.status_code=200`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryAnnotation {
    /// The tag key.
    pub key: String,
    /// The tag value.
    pub value: AnnotationValue,
    /// The host that recorded the tag, if known.
    pub endpoint: Option<Endpoint>,
}

impl BinaryAnnotation {
    /// Builds a binary annotation without an endpoint.
    pub fn new(key: impl Into<String>, value: impl Into<AnnotationValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            endpoint: None,
        }
    }

    /// Builds a binary annotation carrying the given endpoint.
    pub fn with_endpoint(
        key: impl Into<String>,
        value: impl Into<AnnotationValue>,
        endpoint: Endpoint,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            endpoint: Some(endpoint),
        }
    }
}
