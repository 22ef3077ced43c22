//! Typed errors for each pipeline stage.
//!
//! Every stage catches its own failure and turns it into a failure message
//! (see [`crate::protocol`]); these enums are what gets rendered into the
//! `error` field of that message.

use std::path::PathBuf;

/// Per-file parsing failure. Recoverable: the ingestion stage degrades the
/// file to a single diagnostic chunk and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("file is not valid UTF-8: {}", path.display())]
    Encoding { path: PathBuf },
}

/// Failure writing a batch into the vector index. The batch is abandoned
/// as a whole; the index is left exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("embedder returned {got} vectors for {expected} texts")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding dimension mismatch: index holds {expected}-d vectors, got {got}")]
    Dimension { expected: usize, got: usize },
}

/// Failure answering a similarity query.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embedding(String),

    #[error("query embedding dimension mismatch: index holds {expected}-d vectors, got {got}")]
    Dimension { expected: usize, got: usize },
}

/// Failure calling the generation service.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request timed out after {0}s")]
    Timeout(u64),

    #[error("API request failed: {0}")]
    Transport(String),

    #[error("generation API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed generation response: {0}")]
    Malformed(String),

    #[error("{0} environment variable not set")]
    MissingApiKey(String),

    #[error("generation provider is disabled")]
    Disabled,
}
