use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the core Zipkin data model.
///
/// Most producer-facing operations in this crate do not return `Result` at
/// all: span construction and tag recording are meant to be effectively
/// infallible from the caller's perspective (see the tracer core's handling
/// of allocation failure). This enum exists for the small set of operations
/// that do have a real failure mode: hex decoding and JSON serialization.
#[derive(Debug, Error)]
pub enum Error {
    /// A hex string was not valid lowercase/mixed-case hex, or exceeded the
    /// maximum digit count for the target type.
    #[error("corrupted hex value: {0}")]
    CorruptedHex(String),
    /// JSON serialization of a span or batch failed.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// The process ran out of memory while building a span or batch.
    ///
    /// Rust's global allocator aborts the process on allocation failure by
    /// default, so this variant is not reachable in ordinary builds; it is
    /// kept so the error taxonomy matches the one the reporter and
    /// propagation layers surface to callers (`not_enough_memory` in the
    /// original design).
    #[error("not enough memory")]
    NotEnoughMemory,
}
