//! Error taxonomy for the ingestion core.
//!
//! Most of these never escape to a caller as an `Err` — a document's failure
//! is recorded on `Document.status`/`Document.error` instead. `CoreError` is
//! the shared vocabulary every component raises internally; only
//! [`CoreError::Validation`] is surfaced directly by `DocumentManager`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad input: unsupported type, empty file, oversize name, invalid doc id, SSRF-blocked URL.
    /// No document row is created for this kind.
    #[error("validation error: {0}")]
    Validation(String),

    /// A parser returned an error or an empty result.
    #[error("parse failure: {0}")]
    Parse(String),

    /// Identical content_hash already exists among `success` documents.
    #[error("duplicate content")]
    DedupConflict,

    /// The embedding API exhausted its retries.
    #[error("embedding failure: {0}")]
    Embedding(String),

    /// Vector store or metadata store write failed.
    #[error("store failure: {0}")]
    Store(String),

    /// A supervisor or per-item deadline was exceeded.
    #[error("timeout: {0}")]
    Timeout(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
