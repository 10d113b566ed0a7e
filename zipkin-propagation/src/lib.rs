//! B3 text-map propagation: injecting a [`zipkin_core::SpanContext`] and its
//! baggage into outgoing headers, and extracting them back out of incoming
//! ones.
//!
//! This crate only deals in text-map carriers (anything implementing
//! [`b3::Writer`]/[`b3::Reader`]); the OpenTracing façade in
//! `zipkin-opentracing` is responsible for rejecting binary/stream carriers
//! with `invalid_carrier` before ever reaching here.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod b3;
mod error;

pub use b3::{extract, inject, Extracted, Reader, Writer, BAGGAGE_PREFIX};
pub use error::{Error, Result};
