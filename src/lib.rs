//! ingestcore - Document Manager and Video Pipeline for a retrieval-augmented
//! knowledge base.
//!
//! Two ingestion paths converge on the same chunk/embed/store discipline:
//! - Non-video documents (PDF, Word, Excel, PPT, Markdown, HTML, URL) are
//!   parsed, chunked, and embedded synchronously on the caller's task.
//! - Video documents are dispatched to a supervised background task that
//!   runs three independent, panic-isolated, concurrent phases: transcript,
//!   keyframe embedding, and keyframe OCR.

pub mod chunker;
pub mod codec;
pub mod config;
pub mod document_manager;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod metadata_store;
pub mod parsers;
pub mod sanitize;
pub mod types;
pub mod url_fetch;
pub mod vector_store;
pub mod video;

pub use config::Config;
pub use document_manager::DocumentManager;
pub use error::{CoreError, Result};
pub use types::{DocStatus, DocType, Document, DocumentInfo, FileInput, ImportStats, UrlInput};
