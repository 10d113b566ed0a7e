//! An in-process [`Transport`] test double that just accumulates batches.

use async_trait::async_trait;
use parking_lot::Mutex;
use zipkin_core::{AnnotationValue, Span};

use crate::transport::Transport;

/// Records every batch handed to it instead of sending it anywhere.
///
/// Used by `zipkin-opentracing`'s end-to-end tests and by the `demos`
/// binary, in place of an actual collector.
#[derive(Default)]
pub struct InMemoryTransport {
    batches: Mutex<Vec<Vec<ExportedSpan>>>,
}

/// A plain-data snapshot of a span, cheap to assert against in tests
/// without fighting the original [`zipkin_core::Span`]'s move-only
/// `finish`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedSpan {
    /// The span's name.
    pub name: String,
    /// The hex-encoded trace id.
    pub trace_id: String,
    /// The hex-encoded span id.
    pub id: String,
    /// The hex-encoded parent span id, if any.
    pub parent_id: Option<String>,
    /// Microseconds since the Unix epoch the span started at, if set.
    pub timestamp: Option<u64>,
    /// Annotation values recorded on the span, in order.
    pub annotation_values: Vec<String>,
    /// Binary annotation key/value pairs recorded on the span, in order.
    pub binary_annotations: Vec<(String, AnnotationValue)>,
}

impl From<&Span> for ExportedSpan {
    fn from(span: &Span) -> Self {
        Self {
            name: span.name().to_string(),
            trace_id: span.trace_id().to_hex(),
            id: zipkin_core::span_id_to_hex(span.id()),
            parent_id: span.parent_id().map(zipkin_core::span_id_to_hex),
            timestamp: span.timestamp(),
            annotation_values: span.annotations().iter().map(|a| a.value.clone()).collect(),
            binary_annotations: span
                .binary_annotations()
                .iter()
                .map(|a| (a.key.clone(), a.value.clone()))
                .collect(),
        }
    }
}

impl InMemoryTransport {
    /// Builds an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All batches received so far, flattened into one list, oldest first.
    pub fn spans(&self) -> Vec<ExportedSpan> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// How many separate `transport_spans` calls have been made.
    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn transport_spans(&self, spans: &[Span]) {
        let snapshot = spans.iter().map(ExportedSpan::from).collect();
        self.batches.lock().push(snapshot);
    }
}
