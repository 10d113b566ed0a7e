//! Buffering finished spans and shipping them to a Zipkin collector over
//! HTTP, off the caller's thread.
//!
//! [`BufferedReporter`] is the production path: it implements
//! [`zipkin_core::SpanSink`] so it can be installed directly as a tracer's
//! sink, and owns a single background writer task that periodically swaps
//! the buffer and calls a [`Transport`]. [`memory::InMemoryTransport`] is a
//! test double standing in for [`transport::HttpTransport`] in tests and
//! the demo binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod reporter;
mod transport;

pub use error::{Error, Result};
pub use memory::{ExportedSpan, InMemoryTransport};
pub use reporter::{BufferedReporter, ReporterConfig};
pub use transport::{HttpTransport, Transport, DEFAULT_COLLECTOR_ENDPOINT};
