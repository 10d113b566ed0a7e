//! The mutable, in-flight [`Span`] and its immutable-at-propagation
//! [`SpanContext`] snapshot.

use std::sync::Weak;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::annotation::well_known;
use crate::flags::{self, Sampled};
use crate::{Annotation, BinaryAnnotation, SpanId, TraceId};

/// Receives spans that have finished. Implemented by the tracer core in
/// `zipkin-opentracing`; kept as a trait here so the data model does not
/// depend on the crate that owns the reporter.
pub trait SpanSink: Send + Sync {
    /// Called exactly once per span, from [`Span::finish`].
    fn report_span(&self, span: Span);
}

/// Which of the four well-known RPC-corner annotations (`cs`/`cr`/`ss`/`sr`)
/// are present on a span, used by propagation to decide how to continue a
/// trace across a process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnnotationSet {
    /// Client send is present.
    pub cs: bool,
    /// Client receive is present.
    pub cr: bool,
    /// Server send is present.
    pub ss: bool,
    /// Server receive is present.
    pub sr: bool,
}

impl AnnotationSet {
    /// Computes the set by scanning a span's recorded annotations.
    pub fn from_annotations(annotations: &[Annotation]) -> Self {
        let mut set = AnnotationSet::default();
        for a in annotations {
            match a.value.as_str() {
                well_known::CLIENT_SEND => set.cs = true,
                well_known::CLIENT_RECV => set.cr = true,
                well_known::SERVER_SEND => set.ss = true,
                well_known::SERVER_RECV => set.sr = true,
                _ => {}
            }
        }
        set
    }
}

/// The propagatable identity of a span's position in its trace tree: trace
/// id, span id, optional parent id, sampling/debug flags, and a snapshot of
/// which RPC-corner annotations the originating span carries.
///
/// A default-constructed context is invalid (`is_valid() == false`); it
/// represents "no context" without needing an `Option` wrapper at every call
/// site, mirroring the original's `is_initialized_` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanContext {
    trace_id: TraceId,
    id: SpanId,
    parent_id: Option<SpanId>,
    flags: u64,
    annotation_set: AnnotationSet,
    valid: bool,
}

impl Default for SpanContext {
    fn default() -> Self {
        Self {
            trace_id: TraceId::default(),
            id: 0,
            parent_id: None,
            flags: 0,
            annotation_set: AnnotationSet::default(),
            valid: false,
        }
    }
}

impl SpanContext {
    /// Builds a context directly from its constituent ids and flags. Used
    /// by propagation when reconstructing a context received over the
    /// wire.
    pub fn new(trace_id: TraceId, id: SpanId, parent_id: Option<SpanId>, flags: u64) -> Self {
        if parent_id.is_none() {
            Self {
                trace_id,
                id,
                parent_id,
                flags: flags | flags::IS_ROOT,
                annotation_set: AnnotationSet::default(),
                valid: true,
            }
        } else {
            Self {
                trace_id,
                id,
                parent_id,
                flags,
                annotation_set: AnnotationSet::default(),
                valid: true,
            }
        }
    }

    /// Derives a context from a live span: copies its ids, the sampled bit,
    /// and the annotation-presence snapshot used by propagation's
    /// continue-vs-share decision.
    pub fn from_span(span: &Span) -> Self {
        let mut flags = 0u64;
        if span.sampled {
            flags |= crate::flags::SAMPLED | crate::flags::SAMPLING_SET;
        }
        if span.parent_id.is_none() {
            flags |= crate::flags::IS_ROOT;
        }
        if span.debug {
            flags |= crate::flags::DEBUG;
        }
        Self {
            trace_id: span.trace_id,
            id: span.id,
            parent_id: span.parent_id,
            flags,
            annotation_set: AnnotationSet::from_annotations(&span.annotations),
            valid: true,
        }
    }

    /// `true` unless this is a default/empty context.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The trace id.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The span id.
    pub fn id(&self) -> SpanId {
        self.id
    }

    /// The parent span id, absent for a root span.
    pub fn parent_id(&self) -> Option<SpanId> {
        self.parent_id
    }

    /// `true` when there is no parent id, i.e. this is a trace root.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// The raw flags bitfield.
    pub fn flags(&self) -> u64 {
        self.flags
    }

    /// The tristate sampling decision.
    pub fn sampled(&self) -> Sampled {
        Sampled::from_flags(self.flags)
    }

    /// `true` when the debug bit is set.
    pub fn debug(&self) -> bool {
        self.flags & crate::flags::DEBUG != 0
    }

    /// Which RPC-corner annotations the originating span carried.
    pub fn annotation_set(&self) -> AnnotationSet {
        self.annotation_set
    }
}

/// A span in flight. Mutable until [`Span::finish`] consumes it and hands
/// it to the owning tracer's [`SpanSink`].
pub struct Span {
    trace_id: TraceId,
    name: String,
    id: SpanId,
    parent_id: Option<SpanId>,
    debug: bool,
    annotations: Vec<Annotation>,
    binary_annotations: Vec<BinaryAnnotation>,
    timestamp: Option<u64>,
    start_instant: Option<Instant>,
    duration: Option<u64>,
    sampled: bool,
    /// Marks a span derived from a remote context (and reusing its span
    /// id) as "shared" per the Zipkin v1 convention that a client and
    /// server may record under the same span id.
    shared: bool,
    tracer: Option<Weak<dyn SpanSink>>,
}

impl Span {
    /// Starts building a new span with the given name; ids, timestamps, and
    /// sampling are filled in by the tracer core per spec §4.2.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            trace_id: TraceId::default(),
            name: name.into(),
            id: 0,
            parent_id: None,
            debug: false,
            annotations: Vec::new(),
            binary_annotations: Vec::new(),
            timestamp: None,
            start_instant: None,
            duration: None,
            sampled: false,
            shared: false,
            tracer: None,
        }
    }

    /// Microseconds since the Unix epoch, for use as a wall-clock
    /// timestamp.
    pub fn now_micros() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }

    /// Records the wall-clock and steady-clock start times. Call once, at
    /// span creation.
    pub fn start_now(&mut self) {
        self.timestamp = Some(Self::now_micros());
        self.start_instant = Some(Instant::now());
    }

    /// Overrides the wall-clock start timestamp (microseconds since epoch),
    /// e.g. when `StartTimestamp` was supplied explicitly to the façade.
    pub fn set_timestamp(&mut self, timestamp_micros: u64) {
        self.timestamp = Some(timestamp_micros);
    }

    /// Overrides the steady-clock start instant.
    pub fn set_start_instant(&mut self, instant: Instant) {
        self.start_instant = Some(instant);
    }

    /// The wall-clock start timestamp, if set.
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// The steady-clock start instant, if set.
    pub fn start_instant(&self) -> Option<Instant> {
        self.start_instant
    }

    /// Sets the span's trace id.
    pub fn set_trace_id(&mut self, trace_id: TraceId) {
        self.trace_id = trace_id;
    }

    /// The span's trace id.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// Sets the span's own id.
    pub fn set_id(&mut self, id: SpanId) {
        self.id = id;
    }

    /// The span's own id.
    pub fn id(&self) -> SpanId {
        self.id
    }

    /// Sets the parent span id.
    pub fn set_parent_id(&mut self, parent_id: SpanId) {
        self.parent_id = Some(parent_id);
    }

    /// The parent span id, if any.
    pub fn parent_id(&self) -> Option<SpanId> {
        self.parent_id
    }

    /// Sets the operation name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marks the span as a forced/debug sample.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Whether this span is a forced/debug sample.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Sets the sampled decision.
    pub fn set_sampled(&mut self, sampled: bool) {
        self.sampled = sampled;
    }

    /// The sampled decision made at (or inherited by) this span.
    pub fn sampled(&self) -> bool {
        self.sampled
    }

    /// Marks this span as sharing its id with a remote peer (see spec
    /// §4.2's "shared context" branch).
    pub fn set_shared(&mut self, shared: bool) {
        self.shared = shared;
    }

    /// Whether this span shares its id with a remote peer.
    pub fn shared(&self) -> bool {
        self.shared
    }

    /// Appends an annotation.
    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Appends a binary annotation.
    pub fn add_binary_annotation(&mut self, annotation: BinaryAnnotation) {
        self.binary_annotations.push(annotation);
    }

    /// All annotations recorded so far.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// All binary annotations recorded so far.
    pub fn binary_annotations(&self) -> &[BinaryAnnotation] {
        &self.binary_annotations
    }

    /// Associates the tracer this span reports to on [`Span::finish`].
    pub fn set_tracer(&mut self, tracer: Weak<dyn SpanSink>) {
        self.tracer = Some(tracer);
    }

    /// The span's duration in microseconds, if it has finished.
    pub fn duration(&self) -> Option<u64> {
        self.duration
    }

    /// Finalizes the span's duration from the elapsed steady-clock time and
    /// hands it to the tracer's sink, if the tracer is still alive and the
    /// span is sampled (or forced via the debug flag).
    ///
    /// Consuming `self` makes double-finishing a span a compile error
    /// rather than a runtime concern; the façade layer that wraps
    /// OpenTracing's repeatable `Finish()` call is responsible for calling
    /// this at most once (see `zipkin-opentracing`'s atomic finished
    /// guard).
    pub fn finish(mut self) {
        let duration = self
            .start_instant
            .map(|start| start.elapsed().as_micros() as u64)
            .unwrap_or(0);
        self.duration = Some(duration);

        if !self.sampled && !self.debug {
            return;
        }

        if let Some(sink) = self.tracer.take().and_then(|w| w.upgrade()) {
            sink.report_span(self);
        }
        // If the tracer has been torn down, the span is dropped silently.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    struct Recorder(Arc<Mutex<Vec<Span>>>);
    impl SpanSink for Recorder {
        fn report_span(&self, span: Span) {
            self.0.lock().unwrap().push(span);
        }
    }

    #[test]
    fn finish_reports_to_sink_and_sets_duration() {
        let store = Arc::new(Mutex::new(Vec::new()));
        let sink: Arc<dyn SpanSink> = Arc::new(Recorder(store.clone()));
        let mut span = Span::new("a");
        span.start_now();
        span.set_sampled(true);
        span.set_tracer(Arc::downgrade(&sink));
        span.finish();
        let reported = store.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert!(reported[0].duration().is_some());
    }

    #[test]
    fn unsampled_non_debug_span_is_not_reported() {
        let store = Arc::new(Mutex::new(Vec::new()));
        let sink: Arc<dyn SpanSink> = Arc::new(Recorder(store.clone()));
        let mut span = Span::new("a");
        span.set_tracer(Arc::downgrade(&sink));
        span.finish();
        assert!(store.lock().unwrap().is_empty());
    }

    #[test]
    fn debug_span_is_reported_even_when_unsampled() {
        let store = Arc::new(Mutex::new(Vec::new()));
        let sink: Arc<dyn SpanSink> = Arc::new(Recorder(store.clone()));
        let mut span = Span::new("a");
        span.set_debug(true);
        span.set_tracer(Arc::downgrade(&sink));
        span.finish();
        assert_eq!(store.lock().unwrap().len(), 1);
    }

    #[test]
    fn finish_with_dead_tracer_drops_silently() {
        let sink: Arc<dyn SpanSink> = Arc::new(Recorder(Arc::new(Mutex::new(Vec::new()))));
        let weak = Arc::downgrade(&sink);
        drop(sink);
        let mut span = Span::new("a");
        span.set_tracer(weak);
        span.finish(); // must not panic
    }

    #[test]
    fn span_context_from_span_copies_sampled_and_root() {
        let mut span = Span::new("a");
        span.set_trace_id(TraceId::from_low(1));
        span.set_id(2);
        span.set_sampled(true);
        let ctx = SpanContext::from_span(&span);
        assert!(ctx.is_valid());
        assert!(ctx.is_root());
        assert_eq!(ctx.sampled(), Sampled::Yes);
    }

    #[test]
    fn default_span_context_is_invalid() {
        assert!(!SpanContext::default().is_valid());
    }

    #[test]
    fn annotation_set_detects_client_and_server_markers() {
        let anns = vec![
            Annotation::new(1, well_known::CLIENT_SEND),
            Annotation::new(2, well_known::SERVER_RECV),
        ];
        let set = AnnotationSet::from_annotations(&anns);
        assert!(set.cs && set.sr && !set.cr && !set.ss);
    }
}
