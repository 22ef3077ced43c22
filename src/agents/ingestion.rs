//! Ingestion stage: files in, `DOC_PARSED` out.
//!
//! Every file is parsed independently. A file that fails to parse does not
//! fail the stage; it contributes one diagnostic chunk naming the error and
//! is listed under `parse_failures`. An empty file list is an empty
//! `DOC_PARSED`; only a path without a file name yields `DOC_PARSE_ERROR`.

use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, FileMetadata, FileParseFailure};
use crate::parser::{diagnostic_chunk, parse_document};
use crate::protocol::{AgentId, DocParseFailure, DocParsed, Message, Payload};

pub struct IngestionAgent {
    config: ChunkingConfig,
}

impl IngestionAgent {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn process(&self, paths: &[PathBuf], trace_id: Uuid) -> Message {
        let payload = match self.ingest(paths) {
            Ok(parsed) => Payload::DocParsed(parsed),
            Err(error) => {
                warn!(%trace_id, %error, "ingestion failed");
                Payload::DocParseError(DocParseFailure {
                    error,
                    files_attempted: paths.iter().map(|p| display_name(p)).collect(),
                })
            }
        };
        Message::new(
            AgentId::IngestionAgent,
            AgentId::RetrievalAgent,
            trace_id,
            payload,
        )
    }

    fn ingest(&self, paths: &[PathBuf]) -> Result<DocParsed, String> {
        let mut chunks = Vec::new();
        let mut files_processed = Vec::with_capacity(paths.len());
        let mut parse_failures = Vec::new();

        for path in paths {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| format!("path has no file name: {}", path.display()))?;
            info!(file = %filename, "processing file");

            let texts = match parse_document(path, &self.config) {
                Ok(texts) => texts,
                Err(e) => {
                    warn!(file = %filename, error = %e, "parse failed, using diagnostic chunk");
                    parse_failures.push(FileParseFailure {
                        filename: filename.clone(),
                        error: e.to_string(),
                    });
                    vec![diagnostic_chunk(&filename, &e)]
                }
            };

            files_processed.push(FileMetadata {
                filename: filename.clone(),
                chunks_count: texts.len(),
                file_type: file_type(path),
            });
            chunks.extend(
                texts
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| Chunk::new(&filename, i, text)),
            );
        }

        Ok(DocParsed {
            total_chunks: chunks.len(),
            chunks,
            files_processed,
            parse_failures,
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_type(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
