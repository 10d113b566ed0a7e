use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced while building a reporter or its transport.
#[derive(Debug, Error)]
pub enum Error {
    /// The collector URL could not be built/parsed from its parts.
    #[error("invalid collector url: {0}")]
    InvalidCollectorUrl(String),
    /// Building the underlying HTTP client failed.
    #[error("failed to build http client: {0}")]
    Transport(#[from] reqwest::Error),
}
