//! An OpenTracing-compatible tracer façade over the Zipkin v1 core span
//! model, B3 propagation, and the buffered HTTP reporter.
//!
//! Application code talks to [`Tracer`]/[`Span`]/[`SpanContext`] — the
//! vendor-neutral surface — while spans underneath are built, sampled,
//! annotated with Zipkin client/server semantics, and shipped off to a
//! collector by the lower crates. [`Config`]/[`TracerBuilder`] assemble a
//! running tracer from a JSON configuration document; [`TracerCore`] is
//! the lower-level seam used to continue a span context extracted from an
//! incoming request rather than one of this process's own spans.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod span;
mod tracer;

pub use config::{Config, TracerBuilder};
pub use context::{SpanContext, ZipkinSpanContext};
pub use error::{Error, Result};
pub use span::{FinishSpanOptions, Span, SpanReferenceType, StartSpanOptions, TagValue, ZipkinSpan};
pub use tracer::{Tracer, TracerCore, ZipkinTracer};

pub use zipkin_propagation::{Reader, Writer};
