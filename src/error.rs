//! Typed errors for the engine's one fallible boundary: snippet file I/O.
//!
//! Nothing in this enum ever reaches a caller of [`crate::Extractor::extract`]
//! — extraction itself cannot fail. Snippet reads return `Result<_,
//! EngineError>` internally and are folded into `None`/failure counters at
//! the public boundary, logged with `warn!`/`debug!` rather than propagated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to read sensitive path: {0}")]
    SensitivePath(String),

    #[error("refusing to follow symlink: {0}")]
    Symlink(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("file too large ({size} bytes): {path}")]
    TooLarge { path: String, size: u64 },

    #[error("file appears to be binary: {0}")]
    Binary(String),

    #[error("path traversal: {requested} escapes base {base}")]
    Traversal { base: String, requested: String },

    #[error("file changed during read (TOCTOU guard tripped): {0}")]
    Toctouched(String),

    #[error("invalid snippet request: {0}")]
    InvalidRequest(String),
}
