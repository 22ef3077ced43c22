//! Storage and retrieval stage.
//!
//! `store` embeds the chunks of a `DOC_PARSED` message into the vector
//! index and remembers their metadata; `retrieve` queries the index and
//! joins each hit back to that metadata by exact content match.
//!
//! The index is append-only for the life of the agent, but the remembered
//! chunk records are replaced on every successful store. A hit whose text
//! belongs only to an earlier run therefore has no record to join to and is
//! dropped from the result. Texts already in the index are not embedded
//! again, so re-ingesting the same files in a session adds nothing.

use std::collections::HashSet;

use tracing::{info, warn};
use uuid::Uuid;

use crate::index::VectorIndex;
use crate::models::{Chunk, ChunkMetadata};
use crate::protocol::{
    AgentId, Message, Payload, RetrievalFailure, RetrievalResult, StorageComplete, StorageFailure,
};

pub const PARSE_ERROR_STORAGE_MESSAGE: &str = "Cannot store documents due to parsing error";

pub struct RetrievalAgent {
    index: VectorIndex,
    stored_chunks: Vec<Chunk>,
    top_k: usize,
}

impl RetrievalAgent {
    pub fn new(index: VectorIndex, top_k: usize) -> Self {
        Self {
            index,
            stored_chunks: Vec::new(),
            top_k,
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn stored_chunks(&self) -> &[Chunk] {
        &self.stored_chunks
    }

    /// Index the chunks of an ingestion message.
    pub fn store(&mut self, msg: &Message) -> Message {
        let payload = match &msg.payload {
            Payload::DocParsed(parsed) => {
                let fresh: Vec<String> = {
                    let indexed: HashSet<&str> =
                        self.index.texts().iter().map(String::as_str).collect();
                    parsed
                        .chunks
                        .iter()
                        .filter(|c| !indexed.contains(c.content.as_str()))
                        .map(|c| c.content.clone())
                        .collect()
                };
                match self.index.add(&fresh) {
                    Ok(()) => {
                        self.stored_chunks = parsed.chunks.clone();
                        info!(
                            trace_id = %msg.trace_id,
                            chunks = parsed.chunks.len(),
                            embedded = fresh.len(),
                            "stored chunks"
                        );
                        Payload::StorageComplete(StorageComplete {
                            chunks_stored: parsed.chunks.len(),
                            files_processed: parsed.files_processed.clone(),
                        })
                    }
                    Err(e) => {
                        warn!(trace_id = %msg.trace_id, error = %e, "storage failed");
                        Payload::StorageError(StorageFailure {
                            error: e.to_string(),
                        })
                    }
                }
            }
            Payload::DocParseError(_) => Payload::StorageError(StorageFailure {
                error: PARSE_ERROR_STORAGE_MESSAGE.to_string(),
            }),
            Payload::StorageComplete(_)
            | Payload::StorageError(_)
            | Payload::RetrievalResult(_)
            | Payload::RetrievalError(_)
            | Payload::LlmResponse(_)
            | Payload::LlmError(_) => Payload::StorageError(StorageFailure {
                error: format!("unexpected {} message for storage", msg.message_type()),
            }),
        };
        Message::new(
            AgentId::RetrievalAgent,
            AgentId::Coordinator,
            msg.trace_id,
            payload,
        )
    }

    /// Query the index for `query` and attach metadata to each hit.
    pub fn retrieve(&self, query: &str, trace_id: Uuid) -> Message {
        let payload = match self.index.search(query, self.top_k) {
            Ok(hits) => {
                let mut retrieved_context = Vec::with_capacity(hits.len());
                let mut context_metadata = Vec::with_capacity(hits.len());
                let mut similarity_scores = Vec::with_capacity(hits.len());
                for hit in hits {
                    if let Some(meta) = self.metadata_for(&hit.text) {
                        context_metadata.push(meta);
                        retrieved_context.push(hit.text);
                        similarity_scores.push(hit.score);
                    }
                }
                info!(%trace_id, hits = retrieved_context.len(), "retrieved context");
                Payload::RetrievalResult(RetrievalResult {
                    retrieved_context,
                    context_metadata,
                    similarity_scores,
                    query: query.to_string(),
                })
            }
            Err(e) => {
                warn!(%trace_id, error = %e, "retrieval failed");
                Payload::RetrievalError(RetrievalFailure {
                    error: e.to_string(),
                    query: query.to_string(),
                })
            }
        };
        Message::new(
            AgentId::RetrievalAgent,
            AgentId::LlmResponseAgent,
            trace_id,
            payload,
        )
    }

    /// First stored record whose content equals `text`.
    fn metadata_for(&self, text: &str) -> Option<ChunkMetadata> {
        self.stored_chunks
            .iter()
            .find(|c| c.content == text)
            .map(Chunk::metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DisabledEmbedder, HashEmbedder};
    use crate::models::FileMetadata;
    use crate::protocol::{DocParseFailure, DocParsed, MessageType};

    fn doc_parsed(chunks: Vec<Chunk>) -> Message {
        Message::new(
            AgentId::IngestionAgent,
            AgentId::RetrievalAgent,
            Uuid::new_v4(),
            Payload::DocParsed(DocParsed {
                total_chunks: chunks.len(),
                files_processed: vec![FileMetadata {
                    filename: "a.txt".to_string(),
                    chunks_count: chunks.len(),
                    file_type: "txt".to_string(),
                }],
                chunks,
                parse_failures: Vec::new(),
            }),
        )
    }

    fn hash_agent(top_k: usize) -> RetrievalAgent {
        RetrievalAgent::new(VectorIndex::new(Box::new(HashEmbedder::new(256))), top_k)
    }

    #[test]
    fn store_then_retrieve_joins_metadata() {
        let mut agent = hash_agent(1);
        let msg = doc_parsed(vec![
            Chunk::new("a.txt", 0, "Alpha fact.".to_string()),
            Chunk::new("b.txt", 0, "Beta fact.".to_string()),
        ]);
        let stored = agent.store(&msg);
        assert_eq!(stored.receiver, AgentId::Coordinator);
        assert_eq!(stored.trace_id, msg.trace_id);
        match stored.payload {
            Payload::StorageComplete(s) => assert_eq!(s.chunks_stored, 2),
            other => panic!("unexpected {:?}", other.message_type()),
        }

        let trace_id = Uuid::new_v4();
        let result = agent.retrieve("Alpha", trace_id);
        assert_eq!(result.receiver, AgentId::LlmResponseAgent);
        assert_eq!(result.trace_id, trace_id);
        match result.payload {
            Payload::RetrievalResult(r) => {
                assert_eq!(r.retrieved_context, vec!["Alpha fact.".to_string()]);
                assert_eq!(r.context_metadata[0].chunk_id, "a.txt_chunk_0");
                assert_eq!(r.similarity_scores.len(), 1);
                assert_eq!(r.query, "Alpha");
            }
            other => panic!("unexpected {:?}", other.message_type()),
        }
    }

    #[test]
    fn duplicate_text_joins_to_first_record() {
        let mut agent = hash_agent(5);
        agent.store(&doc_parsed(vec![
            Chunk::new("first.txt", 0, "Same text.".to_string()),
            Chunk::new("second.txt", 4, "Same text.".to_string()),
        ]));
        match agent.retrieve("Same text.", Uuid::new_v4()).payload {
            Payload::RetrievalResult(r) => {
                assert_eq!(r.retrieved_context.len(), 2);
                assert!(r
                    .context_metadata
                    .iter()
                    .all(|m| m.source_file == "first.txt"));
            }
            other => panic!("unexpected {:?}", other.message_type()),
        }
    }

    #[test]
    fn hits_from_superseded_runs_are_dropped() {
        let mut agent = hash_agent(5);
        agent.store(&doc_parsed(vec![Chunk::new("old.txt", 0, "Old news.".to_string())]));
        agent.store(&doc_parsed(vec![Chunk::new("new.txt", 0, "New news.".to_string())]));
        assert_eq!(agent.index().len(), 2);
        assert_eq!(agent.stored_chunks().len(), 1);

        match agent.retrieve("news", Uuid::new_v4()).payload {
            Payload::RetrievalResult(r) => {
                assert_eq!(r.retrieved_context, vec!["New news.".to_string()]);
            }
            other => panic!("unexpected {:?}", other.message_type()),
        }
    }

    #[test]
    fn restoring_the_same_chunks_embeds_nothing_new() {
        let mut agent = hash_agent(5);
        let chunks = vec![
            Chunk::new("a.txt", 0, "Alpha fact.".to_string()),
            Chunk::new("a.txt", 1, "Beta fact.".to_string()),
        ];
        agent.store(&doc_parsed(chunks.clone()));
        let again = agent.store(&doc_parsed(chunks));
        match again.payload {
            Payload::StorageComplete(s) => assert_eq!(s.chunks_stored, 2),
            other => panic!("unexpected {:?}", other.message_type()),
        }
        assert_eq!(agent.index().len(), 2);

        match agent.retrieve("fact", Uuid::new_v4()).payload {
            Payload::RetrievalResult(r) => {
                let ids: Vec<&str> = r
                    .context_metadata
                    .iter()
                    .map(|m| m.chunk_id.as_str())
                    .collect();
                assert_eq!(ids.len(), 2);
                assert!(ids.contains(&"a.txt_chunk_0"));
                assert!(ids.contains(&"a.txt_chunk_1"));
            }
            other => panic!("unexpected {:?}", other.message_type()),
        }
    }

    #[test]
    fn parse_error_becomes_storage_error() {
        let mut agent = hash_agent(5);
        let msg = Message::new(
            AgentId::IngestionAgent,
            AgentId::RetrievalAgent,
            Uuid::new_v4(),
            Payload::DocParseError(DocParseFailure {
                error: "no files provided".to_string(),
                files_attempted: Vec::new(),
            }),
        );
        let out = agent.store(&msg);
        assert_eq!(out.trace_id, msg.trace_id);
        match out.payload {
            Payload::StorageError(f) => assert_eq!(f.error, PARSE_ERROR_STORAGE_MESSAGE),
            other => panic!("unexpected {:?}", other.message_type()),
        }
        assert!(agent.index().is_empty());
    }

    #[test]
    fn embedding_failure_keeps_previous_records() {
        let mut agent = RetrievalAgent::new(VectorIndex::new(Box::new(DisabledEmbedder)), 5);
        let out = agent.store(&doc_parsed(vec![Chunk::new("a.txt", 0, "x".to_string())]));
        assert_eq!(out.message_type(), MessageType::StorageError);
        assert!(agent.stored_chunks().is_empty());
        assert!(agent.index().is_empty());
    }

    #[test]
    fn empty_index_retrieves_nothing() {
        let agent = hash_agent(5);
        match agent.retrieve("anything", Uuid::new_v4()).payload {
            Payload::RetrievalResult(r) => {
                assert!(r.retrieved_context.is_empty());
                assert!(r.context_metadata.is_empty());
            }
            other => panic!("unexpected {:?}", other.message_type()),
        }
    }
}
