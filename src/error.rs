//! Error taxonomy for the engine. Every public operation returns a
//! `Result<T>` instead of panicking or aborting; the only calls to
//! `debug_assert!` guard invariants the caller cannot violate through the
//! public API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("insert key must be strictly greater than the previously inserted key")]
    OrderingViolation,

    #[error("feature not enabled for this engine: {0}")]
    FeatureDisabled(&'static str),

    #[error("key not found")]
    NotFound,

    #[error("variable payload has been evicted by ring wrap")]
    Overwritten,

    #[error("page store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("allocation failed: {0}")]
    OutOfMemory(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
