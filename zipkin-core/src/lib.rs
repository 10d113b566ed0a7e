//! The Zipkin v1 data model: span and trace identifiers, the span/endpoint/
//! annotation types, a bounded span buffer, a probabilistic sampler, and a
//! JSON encoder for the collector wire format.
//!
//! This crate has no knowledge of tracer lifecycle, propagation headers, or
//! transport; those live in `zipkin-propagation`, `zipkin-reporter`, and
//! `zipkin-opentracing` respectively. [`Span`] exposes a [`span::SpanSink`]
//! seam so those higher layers can receive finished spans without this
//! crate depending on them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod annotation;
mod buffer;
mod endpoint;
mod error;
mod flags;
mod ids;
mod json;
mod sampler;
mod span;

pub use annotation::{well_known, Annotation, AnnotationValue, BinaryAnnotation};
pub use buffer::SpanBuffer;
pub use endpoint::{Endpoint, IpAddress, IpVersion};
pub use error::{Error, Result};
pub use flags::{Sampled, DEBUG, IS_ROOT, SAMPLED, SAMPLING_SET};
pub use ids::{hex_to_u64, random_id, span_id_from_hex, span_id_to_hex, u64_to_hex, SpanId, TraceId};
pub use json::{batch_to_json, span_to_json, try_batch_to_json};
pub use sampler::{FixedSampler, ProbabilisticSampler, Sample};
pub use span::{AnnotationSet, Span, SpanContext, SpanSink};
