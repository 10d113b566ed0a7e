use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by B3 inject/extract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Exactly one of `x-b3-traceid`/`x-b3-spanid` was present, or a
    /// present header held a malformed hex value.
    #[error("span context corrupted")]
    SpanContextCorrupted,
}
