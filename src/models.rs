//! Core data models that flow through the pipeline.
//!
//! Chunks are created by the ingestion stage, cached by the retrieval stage
//! for metadata re-association, and echoed back as sources by generation.

use serde::{Deserialize, Serialize};

/// A bounded span of extracted document text: the atomic retrieval unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source_file: String,
    /// `<source_file>_chunk_<chunk_index>`, unique per file and index.
    pub chunk_id: String,
    pub chunk_index: usize,
}

impl Chunk {
    pub fn new(source_file: &str, chunk_index: usize, content: String) -> Self {
        Self {
            content,
            source_file: source_file.to_string(),
            chunk_id: format!("{}_chunk_{}", source_file, chunk_index),
            chunk_index,
        }
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source_file: self.source_file.clone(),
            chunk_id: self.chunk_id.clone(),
            chunk_index: self.chunk_index,
        }
    }
}

/// Where a retrieved chunk came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_file: String,
    pub chunk_id: String,
    pub chunk_index: usize,
}

/// Per-file summary recorded by ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub chunks_count: usize,
    /// Lower-cased extension, empty when the file has none.
    pub file_type: String,
}

/// A file that degraded to a diagnostic chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileParseFailure {
    pub filename: String,
    pub error: String,
}
