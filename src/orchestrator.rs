//! Pipeline sequencer.
//!
//! One call to [`Orchestrator::run_pipeline`] runs the four stages in fixed
//! order under a fresh trace id:
//!
//! ```text
//! IngestionAgent.process ─▶ RetrievalAgent.store ─▶ RetrievalAgent.retrieve ─▶ GenerationAgent.process
//!      DOC_PARSED              STORAGE_COMPLETE         RETRIEVAL_RESULT             LLM_RESPONSE
//!   | DOC_PARSE_ERROR        | STORAGE_ERROR          | RETRIEVAL_ERROR            | LLM_ERROR
//! ```
//!
//! The orchestrator does not branch on message types or retry. Each stage
//! returns a message whatever happens, and a failure message flows into the
//! next stage like any other. Retrieval runs even when storage failed; it
//! then searches whatever the index already held.
//!
//! The orchestrator owns the agents, and therefore the vector index and the
//! conversation history, for the lifetime of a session. The message log is
//! scoped to a single run.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, info_span};
use uuid::Uuid;

use crate::agents::{GenerationAgent, IngestionAgent, RetrievalAgent};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::index::VectorIndex;
use crate::models::ChunkMetadata;
use crate::protocol::{Message, Payload};

/// Messages kept in a [`PipelineResponse`].
pub const HISTORY_LEN: usize = 4;

/// Ordered log of the messages produced by one run.
#[derive(Debug, Default)]
pub struct RunLog {
    messages: Vec<Message>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and emit one log event for it. Returns the message
    /// so the next stage can consume it.
    pub fn record(&mut self, msg: Message) -> &Message {
        info!(
            sender = %msg.sender,
            receiver = %msg.receiver,
            message_type = %msg.message_type(),
            trace_id = %msg.trace_id,
            "pipeline message"
        );
        self.messages.push(msg);
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last `n` messages, oldest first.
    pub fn tail(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

/// Outcome of one pipeline run.
///
/// Exactly one of `answer` and `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResponse {
    pub trace_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub sources: Vec<String>,
    pub source_metadata: Vec<ChunkMetadata>,
    pub message_history: Vec<Message>,
}

impl PipelineResponse {
    fn from_run(trace_id: Uuid, log: &RunLog) -> Self {
        let history = log.tail(HISTORY_LEN).to_vec();
        let mut response = Self {
            trace_id,
            answer: None,
            error: None,
            sources: Vec::new(),
            source_metadata: Vec::new(),
            message_history: history,
        };
        match log.messages().last().map(|m| &m.payload) {
            Some(Payload::LlmResponse(r)) => {
                response.answer = Some(r.answer.clone());
                response.sources = r.sources.clone();
                response.source_metadata = r.source_metadata.clone();
            }
            Some(Payload::LlmError(f)) => response.error = Some(f.error.clone()),
            Some(other) => {
                response.error = Some(format!(
                    "pipeline ended with {} instead of a generation result",
                    other.message_type()
                ))
            }
            None => response.error = Some("pipeline produced no messages".to_string()),
        }
        response
    }
}

pub struct Orchestrator {
    ingestion: IngestionAgent,
    retrieval: RetrievalAgent,
    generation: GenerationAgent,
}

impl Orchestrator {
    pub fn new(
        ingestion: IngestionAgent,
        retrieval: RetrievalAgent,
        generation: GenerationAgent,
    ) -> Self {
        Self {
            ingestion,
            retrieval,
            generation,
        }
    }

    /// Build every stage from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Ok(Self::new(
            IngestionAgent::new(config.chunking.clone()),
            RetrievalAgent::new(VectorIndex::new(embedder), config.retrieval.top_k),
            GenerationAgent::with_history_limit(generator, config.generation.history_exchanges),
        ))
    }

    pub fn retrieval(&self) -> &RetrievalAgent {
        &self.retrieval
    }

    pub fn generation(&self) -> &GenerationAgent {
        &self.generation
    }

    /// Ingest `paths`, index them, and answer `query` from the index.
    pub fn run_pipeline(&mut self, paths: &[PathBuf], query: &str) -> PipelineResponse {
        let trace_id = Uuid::new_v4();
        let span = info_span!("pipeline", %trace_id);
        let _enter = span.enter();

        let mut log = RunLog::new();

        let parsed = log.record(self.ingestion.process(paths, trace_id)).clone();
        log.record(self.retrieval.store(&parsed));
        let retrieved = log.record(self.retrieval.retrieve(query, trace_id)).clone();
        log.record(self.generation.process(&retrieved));

        PipelineResponse::from_run(trace_id, &log)
    }
}
