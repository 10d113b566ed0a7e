//! The tracer: turns `StartSpanWithOptions` calls into correctly-seeded
//! spans, and implements B3 `Inject`/`Extract` and `Close` (flush on
//! shutdown).

use std::sync::Arc;
use std::time::{Duration, Instant};

use zipkin_core::{
    random_id, well_known, Annotation, BinaryAnnotation, Endpoint, Sample, Span as CoreSpan,
    SpanContext as CoreSpanContext, SpanSink, TraceId,
};
use zipkin_propagation as b3;
use zipkin_reporter::BufferedReporter;

use crate::context::{SpanContext, ZipkinSpanContext};
use crate::error::{Error, Result};
use crate::span::{Span, SpanReferenceType, StartSpanOptions, ZipkinSpan};

/// The vendor-neutral tracer surface: starts spans, and injects/extracts
/// their contexts across a process boundary.
pub trait Tracer: Send + Sync {
    /// Starts a new span.
    fn start_span_with_options(
        &self,
        operation_name: &str,
        options: StartSpanOptions,
    ) -> Box<dyn Span>;

    /// Writes `context`'s B3 headers (and baggage) into `writer`. Fails
    /// with [`Error::InvalidSpanContext`] if `context` did not come from
    /// this tracer.
    fn inject(&self, context: &dyn SpanContext, writer: &mut dyn b3::Writer) -> Result<()>;

    /// Reads a B3 context and baggage out of `reader`. Returns `Ok(None)`
    /// when the carrier had no trace context at all.
    fn extract(&self, reader: &dyn b3::Reader) -> Result<Option<Arc<dyn SpanContext>>>;

    /// Flushes any buffered spans (with a generous timeout) and stops
    /// accepting new ones.
    fn close(&self);
}

/// Everything a tracer needs to seed a new span: identity, sampling, and
/// where finished spans go.
///
/// Exposed directly (not just through [`ZipkinTracer`]'s OpenTracing
/// surface) because [`TracerCore::start_span_from_context`] is a
/// lower-level operation the OpenTracing façade never calls: it continues
/// an existing in-process [`zipkin_core::SpanContext`] rather than
/// starting from `StartSpanOptions` references.
pub struct TracerCore {
    service_name: String,
    endpoint: Endpoint,
    sampler: Box<dyn Sample>,
    reporter: Arc<BufferedReporter>,
}

impl TracerCore {
    /// Builds a tracer core from its identity, sampler, and reporter.
    pub fn new(
        service_name: String,
        endpoint: Endpoint,
        sampler: Box<dyn Sample>,
        reporter: Arc<BufferedReporter>,
    ) -> Self {
        Self {
            service_name,
            endpoint,
            sampler,
            reporter,
        }
    }

    fn sink(&self) -> Arc<dyn SpanSink> {
        self.reporter.clone() as Arc<dyn SpanSink>
    }

    /// Starts a span continuing an existing span context, per the
    /// annotation-set-driven continuation rule: a context that has seen
    /// `sr` but not `cs` yields a new child span (fresh id, `cs` added);
    /// one that has seen `cs` but not `sr` yields a span sharing the same
    /// id (`sr` added); any other combination yields an empty, untraced
    /// span whose `finish` is a no-op.
    pub fn start_span_from_context(&self, name: &str, previous: &CoreSpanContext) -> CoreSpan {
        let mut span = CoreSpan::new(name);
        let timestamp = CoreSpan::now_micros();
        let set = previous.annotation_set();

        if set.sr && !set.cs {
            span.set_id(random_id());
            span.set_trace_id(previous.trace_id());
            span.set_parent_id(previous.id());
            span.set_timestamp(timestamp);
            span.add_annotation(Annotation::with_endpoint(
                timestamp,
                well_known::CLIENT_SEND,
                self.endpoint.clone(),
            ));
        } else if set.cs && !set.sr {
            span.set_id(previous.id());
            if let Some(parent_id) = previous.parent_id() {
                span.set_parent_id(parent_id);
            }
            span.set_trace_id(previous.trace_id());
            span.set_timestamp(timestamp);
            span.set_shared(true);
            span.add_annotation(Annotation::with_endpoint(
                timestamp,
                well_known::SERVER_RECV,
                self.endpoint.clone(),
            ));
        } else {
            return span;
        }

        span.set_sampled(previous.sampled().is_yes());
        span.set_start_instant(std::time::Instant::now());
        span.set_tracer(Arc::downgrade(&self.sink()));
        span
    }
}

/// Reconciles a span's wall-clock and steady-clock start times when a
/// caller supplies only one of the two (e.g. recording a span after the
/// fact from a timestamp logged elsewhere). Mirrors the original's
/// `computeStartTimestamps`: given neither, sample both clocks now; given
/// one, project the other from it so the pair stays consistent instead of
/// sampling a fresh, unrelated reading for it.
fn compute_start_times(
    start_timestamp_micros: Option<u64>,
    start_instant: Option<Instant>,
) -> (u64, Instant) {
    match (start_timestamp_micros, start_instant) {
        (Some(wall), Some(steady)) => (wall, steady),
        (None, None) => (CoreSpan::now_micros(), Instant::now()),
        (Some(wall), None) => {
            let now_wall = CoreSpan::now_micros();
            let now_steady = Instant::now();
            let elapsed = Duration::from_micros(now_wall.saturating_sub(wall));
            let steady = now_steady.checked_sub(elapsed).unwrap_or(now_steady);
            (wall, steady)
        }
        (None, Some(steady)) => {
            let now_wall = CoreSpan::now_micros();
            let now_steady = Instant::now();
            let elapsed_micros = now_steady.saturating_duration_since(steady).as_micros() as u64;
            let wall = now_wall.saturating_sub(elapsed_micros);
            (wall, steady)
        }
    }
}

fn find_parent(
    references: &[(SpanReferenceType, Arc<dyn SpanContext>)],
) -> Option<&Arc<dyn SpanContext>> {
    references.iter().find_map(|(_, ctx)| {
        ctx.as_any()
            .downcast_ref::<ZipkinSpanContext>()
            .map(|_| ctx)
    })
}

/// The OpenTracing-compatible façade over [`TracerCore`].
pub struct ZipkinTracer {
    core: Arc<TracerCore>,
}

impl ZipkinTracer {
    pub(crate) fn new(core: Arc<TracerCore>) -> Self {
        Self { core }
    }
}

impl Tracer for ZipkinTracer {
    fn start_span_with_options(
        &self,
        operation_name: &str,
        options: StartSpanOptions,
    ) -> Box<dyn Span> {
        let parent = find_parent(&options.references).and_then(|ctx| {
            ctx.as_any().downcast_ref::<ZipkinSpanContext>()
        });

        let mut span = CoreSpan::new(operation_name);
        span.set_id(random_id());

        if let Some(parent_ctx) = parent {
            let parent_inner = parent_ctx.inner();
            span.set_trace_id(parent_inner.trace_id());
            span.set_parent_id(parent_inner.id());
            span.set_sampled(parent_inner.sampled().is_yes());
        } else {
            span.set_trace_id(TraceId::from_low(random_id()));
            let sampled = self.core.sampler.is_sampled(span.trace_id().high(), span.trace_id().low());
            span.set_sampled(sampled);
        }

        let (start_timestamp_micros, start_instant) =
            compute_start_times(options.start_timestamp_micros, options.start_instant);
        span.set_timestamp(start_timestamp_micros);
        span.set_start_instant(start_instant);
        span.set_tracer(Arc::downgrade(&self.core.sink()));

        span.add_binary_annotation(BinaryAnnotation::with_endpoint(
            "lc",
            self.core.service_name.clone(),
            self.core.endpoint.clone(),
        ));

        let span_context = if let Some(parent_ctx) = parent {
            ZipkinSpanContext::with_baggage(
                zipkin_core::SpanContext::from_span(&span),
                parent_ctx.baggage_snapshot(),
            )
        } else {
            ZipkinSpanContext::new(zipkin_core::SpanContext::from_span(&span))
        };

        Box::new(ZipkinSpan::new(
            span,
            span_context,
            self.core.endpoint.clone(),
            start_instant,
            start_timestamp_micros,
            options.tags,
        ))
    }

    fn inject(&self, context: &dyn SpanContext, writer: &mut dyn b3::Writer) -> Result<()> {
        let zipkin_context = context
            .as_any()
            .downcast_ref::<ZipkinSpanContext>()
            .ok_or(Error::InvalidSpanContext)?;
        b3::inject(zipkin_context.inner(), &zipkin_context.baggage_snapshot(), writer)
            .map_err(Error::from)
    }

    fn extract(&self, reader: &dyn b3::Reader) -> Result<Option<Arc<dyn SpanContext>>> {
        let extracted = b3::extract(reader)?;
        match extracted.context {
            None => Ok(None),
            Some(context) => Ok(Some(Arc::new(ZipkinSpanContext::with_baggage(
                context,
                extracted.baggage,
            )) as Arc<dyn SpanContext>)),
        }
    }

    fn close(&self) {
        // A generous timeout: best-effort drain, not a hard deadline. Runs
        // its own current-thread runtime on a dedicated OS thread so this
        // blocks correctly whether the caller holds a tokio runtime of its
        // own (calling `block_on` from inside one panics) or none at all.
        let reporter = self.core.reporter.clone();
        let joined = std::thread::spawn(move || {
            if let Ok(rt) = tokio::runtime::Builder::new_current_thread().enable_time().build() {
                rt.block_on(
                    reporter.flush_with_timeout(std::time::Duration::from_secs(24 * 60 * 60)),
                );
            }
        })
        .join();
        if joined.is_err() {
            tracing::warn!("tracer close: flush thread panicked");
        }
    }
}
