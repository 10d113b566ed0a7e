//! The in-flight OpenTracing span: tag/name mutation, baggage, and the
//! Finish transition that turns it into a [`zipkin_core::Span`] handed to
//! the tracer's reporter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use zipkin_core::{well_known, Annotation, AnnotationValue, BinaryAnnotation, Endpoint};

use crate::context::{SpanContext, ZipkinSpanContext};

/// A tag or log-field value. Mirrors the full set of concrete types
/// OpenTracing's `Value` variant carries (`bool, double, int64_t, uint64_t,
/// string, nullptr_t, const char*, Values, Dictionary` in the original's
/// `ValueVisitor`), so every shape a caller hands to `SetTag` has somewhere
/// to go.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// A boolean tag.
    Bool(bool),
    /// A signed 64-bit integer tag.
    I64(i64),
    /// An unsigned 64-bit integer tag; cast to `i64` on conversion since
    /// the wire format has no unsigned integer kind.
    Uint64(u64),
    /// A double-precision tag.
    Double(f64),
    /// A string tag.
    Str(String),
    /// A null tag; coerced to the string `"0"` on conversion.
    Null,
    /// An array- or object-shaped tag; coerced to its JSON text on
    /// conversion.
    Json(serde_json::Value),
}

impl From<TagValue> for AnnotationValue {
    fn from(value: TagValue) -> Self {
        match value {
            TagValue::Bool(b) => AnnotationValue::Bool(b),
            TagValue::I64(i) => AnnotationValue::I64(i),
            TagValue::Uint64(u) => AnnotationValue::I64(u as i64),
            TagValue::Double(d) => AnnotationValue::Double(d),
            TagValue::Str(s) => AnnotationValue::Str(s),
            TagValue::Null => AnnotationValue::Str("0".to_string()),
            TagValue::Json(v) => {
                AnnotationValue::Str(serde_json::to_string(&v).unwrap_or_default())
            }
        }
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}
impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::I64(v)
    }
}
impl From<u64> for TagValue {
    fn from(v: u64) -> Self {
        TagValue::Uint64(v)
    }
}
impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Double(v)
    }
}
impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Str(v.to_string())
    }
}
impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::Str(v)
    }
}
impl From<()> for TagValue {
    fn from(_: ()) -> Self {
        TagValue::Null
    }
}
impl From<serde_json::Value> for TagValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            Value::Null => TagValue::Null,
            Value::Bool(b) => TagValue::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map(TagValue::I64)
                .or_else(|| n.as_u64().map(TagValue::Uint64))
                .unwrap_or_else(|| TagValue::Double(n.as_f64().unwrap_or(0.0))),
            Value::String(s) => TagValue::Str(s),
            other @ (Value::Array(_) | Value::Object(_)) => TagValue::Json(other),
        }
    }
}

/// How a [`StartSpanOptions`] reference relates to the span being started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanReferenceType {
    /// The new span is a child of the referenced span.
    ChildOf,
    /// The new span follows from the referenced span without a strict
    /// parent/child relationship. Treated identically to `ChildOf` by this
    /// tracer, per the original's "first reference wins" rule.
    FollowsFrom,
}

/// Inputs to `StartSpanWithOptions`.
#[derive(Default)]
pub struct StartSpanOptions {
    /// References to prior spans/contexts; the first `ChildOf` (or
    /// `FollowsFrom`, treated the same) reference found wins.
    pub references: Vec<(SpanReferenceType, Arc<dyn SpanContext>)>,
    /// Tags to seed the span with at creation.
    pub tags: Vec<(String, TagValue)>,
    /// Wall-clock start override, microseconds since the Unix epoch.
    pub start_timestamp_micros: Option<u64>,
    /// Steady-clock start override, for callers recording a span after the
    /// fact. If only one of this and `start_timestamp_micros` is given, the
    /// tracer projects the other from it rather than sampling a fresh clock
    /// reading, so the two stay consistent; see
    /// `ZipkinTracer::start_span_with_options`.
    pub start_instant: Option<Instant>,
}

/// Inputs to `FinishWithOptions`.
#[derive(Default)]
pub struct FinishSpanOptions {
    /// Steady-clock finish override, for callers recording a span after
    /// the fact.
    pub finish_instant: Option<Instant>,
}

/// The vendor-neutral span surface.
pub trait Span: Send + Sync {
    /// Replaces the span's operation name.
    fn set_operation_name(&self, name: &str);
    /// Sets (or overwrites) a tag.
    fn set_tag(&self, key: &str, value: TagValue);
    /// Sets a baggage item, propagated to child spans and across process
    /// boundaries.
    fn set_baggage_item(&self, key: &str, value: &str);
    /// Reads a baggage item.
    fn baggage_item(&self, key: &str) -> Option<String>;
    /// Records a structured log event. A no-op in this façade: see
    /// the crate's non-goal on structured log-event payloads.
    fn log(&self, fields: &[(String, TagValue)]);
    /// The span's context, shareable with children and injectable over
    /// B3.
    fn context(&self) -> &dyn SpanContext;
    /// Finishes the span now.
    fn finish(&self);
    /// Finishes the span with explicit options. Idempotent: only the
    /// first call (whether this or [`Span::finish`]) has any effect.
    fn finish_with_options(&self, options: FinishSpanOptions);
}

struct MutableState {
    span: Option<zipkin_core::Span>,
    tags: HashMap<String, TagValue>,
}

/// The concrete, Zipkin-backed [`Span`].
pub struct ZipkinSpan {
    endpoint: Endpoint,
    span_context: ZipkinSpanContext,
    start_instant: Instant,
    start_timestamp_micros: u64,
    state: Mutex<MutableState>,
    is_finished: AtomicBool,
}

impl ZipkinSpan {
    pub(crate) fn new(
        inner: zipkin_core::Span,
        span_context: ZipkinSpanContext,
        endpoint: Endpoint,
        start_instant: Instant,
        start_timestamp_micros: u64,
        tags: Vec<(String, TagValue)>,
    ) -> Self {
        Self {
            endpoint,
            span_context,
            start_instant,
            start_timestamp_micros,
            state: Mutex::new(MutableState {
                span: Some(inner),
                tags: tags.into_iter().collect(),
            }),
            is_finished: AtomicBool::new(false),
        }
    }
}

impl Span for ZipkinSpan {
    fn set_operation_name(&self, name: &str) {
        let mut state = self.state.lock();
        if let Some(span) = state.span.as_mut() {
            span.set_name(name);
        }
    }

    fn set_tag(&self, key: &str, value: TagValue) {
        self.state.lock().tags.insert(key.to_string(), value);
    }

    fn set_baggage_item(&self, key: &str, value: &str) {
        self.span_context.set_baggage_item(key, value);
    }

    fn baggage_item(&self, key: &str) -> Option<String> {
        self.span_context.baggage_item(key)
    }

    fn log(&self, _fields: &[(String, TagValue)]) {}

    fn context(&self) -> &dyn SpanContext {
        &self.span_context
    }

    fn finish(&self) {
        self.finish_with_options(FinishSpanOptions::default());
    }

    fn finish_with_options(&self, options: FinishSpanOptions) {
        if self.is_finished.swap(true, Ordering::SeqCst) {
            return;
        }

        let finish_instant = options.finish_instant.unwrap_or_else(Instant::now);
        let duration_micros = finish_instant
            .saturating_duration_since(self.start_instant)
            .as_micros() as u64;

        let mut state = self.state.lock();
        let Some(mut span) = state.span.take() else {
            return;
        };

        if let Some(TagValue::Str(kind)) = state.tags.get("span.kind") {
            match kind.as_str() {
                "client" => {
                    span.add_annotation(Annotation::with_endpoint(
                        self.start_timestamp_micros,
                        well_known::CLIENT_SEND,
                        self.endpoint.clone(),
                    ));
                    span.add_annotation(Annotation::with_endpoint(
                        self.start_timestamp_micros + duration_micros,
                        well_known::CLIENT_RECV,
                        self.endpoint.clone(),
                    ));
                }
                "server" => {
                    span.add_annotation(Annotation::with_endpoint(
                        self.start_timestamp_micros,
                        well_known::SERVER_RECV,
                        self.endpoint.clone(),
                    ));
                    span.add_annotation(Annotation::with_endpoint(
                        self.start_timestamp_micros + duration_micros,
                        well_known::SERVER_SEND,
                        self.endpoint.clone(),
                    ));
                }
                _ => {}
            }
        }

        for (key, value) in state.tags.drain() {
            span.add_binary_annotation(BinaryAnnotation::new(key, AnnotationValue::from(value)));
        }

        span.finish();
    }
}

impl Drop for ZipkinSpan {
    fn drop(&mut self) {
        if !self.is_finished.load(Ordering::SeqCst) {
            self.finish();
        }
    }
}
