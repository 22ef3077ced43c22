//! Inter-stage message protocol.
//!
//! Every stage transition produces one immutable [`Message`]: sender,
//! receiver, trace id, UTC timestamp, and a [`Payload`]. The payload is a
//! tagged union, one variant per message type, so a stage consuming a
//! message has to match every variant, failures included.
//!
//! Serialised, a message looks like:
//!
//! ```json
//! {
//!   "sender": "IngestionAgent",
//!   "receiver": "RetrievalAgent",
//!   "trace_id": "7b0c...",
//!   "timestamp": "2024-05-01T12:00:00Z",
//!   "type": "DOC_PARSED",
//!   "payload": { "chunks": [...], "total_chunks": 3, "files_processed": [...] }
//! }
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Chunk, ChunkMetadata, FileMetadata, FileParseFailure};

/// Pipeline participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentId {
    Coordinator,
    IngestionAgent,
    RetrievalAgent,
    #[serde(rename = "LLMResponseAgent")]
    LlmResponseAgent,
}

impl AgentId {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Coordinator => "Coordinator",
            AgentId::IngestionAgent => "IngestionAgent",
            AgentId::RetrievalAgent => "RetrievalAgent",
            AgentId::LlmResponseAgent => "LLMResponseAgent",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The discriminant of a [`Payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    DocParsed,
    DocParseError,
    StorageComplete,
    StorageError,
    RetrievalResult,
    RetrievalError,
    LlmResponse,
    LlmError,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::DocParsed => "DOC_PARSED",
            MessageType::DocParseError => "DOC_PARSE_ERROR",
            MessageType::StorageComplete => "STORAGE_COMPLETE",
            MessageType::StorageError => "STORAGE_ERROR",
            MessageType::RetrievalResult => "RETRIEVAL_RESULT",
            MessageType::RetrievalError => "RETRIEVAL_ERROR",
            MessageType::LlmResponse => "LLM_RESPONSE",
            MessageType::LlmError => "LLM_ERROR",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocParsed {
    pub chunks: Vec<Chunk>,
    pub total_chunks: usize,
    pub files_processed: Vec<FileMetadata>,
    /// Files that degraded to a diagnostic chunk.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parse_failures: Vec<FileParseFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocParseFailure {
    pub error: String,
    pub files_attempted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageComplete {
    pub chunks_stored: usize,
    pub files_processed: Vec<FileMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageFailure {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub retrieved_context: Vec<String>,
    pub context_metadata: Vec<ChunkMetadata>,
    /// Cosine score per retrieved chunk, aligned with `retrieved_context`.
    pub similarity_scores: Vec<f32>,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalFailure {
    pub error: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub source_metadata: Vec<ChunkMetadata>,
    pub query: String,
    pub model_used: String,
    pub context_chunks_used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmFailure {
    pub error: String,
    pub query: String,
    /// The upstream failure this one short-circuited on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Type-specific message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    DocParsed(DocParsed),
    DocParseError(DocParseFailure),
    StorageComplete(StorageComplete),
    StorageError(StorageFailure),
    RetrievalResult(RetrievalResult),
    RetrievalError(RetrievalFailure),
    LlmResponse(LlmResponse),
    LlmError(LlmFailure),
}

impl Payload {
    pub fn message_type(&self) -> MessageType {
        match self {
            Payload::DocParsed(_) => MessageType::DocParsed,
            Payload::DocParseError(_) => MessageType::DocParseError,
            Payload::StorageComplete(_) => MessageType::StorageComplete,
            Payload::StorageError(_) => MessageType::StorageError,
            Payload::RetrievalResult(_) => MessageType::RetrievalResult,
            Payload::RetrievalError(_) => MessageType::RetrievalError,
            Payload::LlmResponse(_) => MessageType::LlmResponse,
            Payload::LlmError(_) => MessageType::LlmError,
        }
    }
}

/// One stage transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub sender: AgentId,
    pub receiver: AgentId,
    pub trace_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Message {
    /// Stamp a new message with the current UTC time.
    pub fn new(sender: AgentId, receiver: AgentId, trace_id: Uuid, payload: Payload) -> Self {
        Self {
            sender,
            receiver,
            trace_id,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }
}
