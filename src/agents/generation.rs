//! Generation stage: retrieved context in, answer out.
//!
//! A `RETRIEVAL_ERROR` input is answered with `LLM_ERROR` without calling
//! the generator. On success the user prompt and the answer are appended
//! to the session history, so the next question is asked in context. Only
//! the most recent exchanges are kept (ten unless configured otherwise).

use tracing::{info, warn};

use crate::generation::{
    build_user_prompt, format_context, ChatTurn, GenerationRequest, Generator, SYSTEM_PROMPT,
};
use crate::protocol::{AgentId, LlmFailure, LlmResponse, Message, Payload, RetrievalResult};

pub const RETRIEVAL_ERROR_GENERATION_MESSAGE: &str =
    "Cannot generate response due to retrieval error";

/// Question/answer exchanges kept in the session history by default.
pub const DEFAULT_HISTORY_EXCHANGES: usize = 10;

pub struct GenerationAgent {
    generator: Box<dyn Generator>,
    history: Vec<ChatTurn>,
    max_exchanges: usize,
}

impl GenerationAgent {
    pub fn new(generator: Box<dyn Generator>) -> Self {
        Self::with_history_limit(generator, DEFAULT_HISTORY_EXCHANGES)
    }

    /// Keep at most `max_exchanges` user/assistant pairs; 0 disables history.
    pub fn with_history_limit(generator: Box<dyn Generator>, max_exchanges: usize) -> Self {
        Self {
            generator,
            history: Vec::new(),
            max_exchanges,
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn process(&mut self, msg: &Message) -> Message {
        let payload = match &msg.payload {
            Payload::RetrievalResult(result) => self.answer(result),
            Payload::RetrievalError(failure) => {
                warn!(trace_id = %msg.trace_id, "skipping generation after retrieval error");
                Payload::LlmError(LlmFailure {
                    error: RETRIEVAL_ERROR_GENERATION_MESSAGE.to_string(),
                    query: failure.query.clone(),
                    cause: Some(failure.error.clone()),
                })
            }
            Payload::DocParsed(_)
            | Payload::DocParseError(_)
            | Payload::StorageComplete(_)
            | Payload::StorageError(_)
            | Payload::LlmResponse(_)
            | Payload::LlmError(_) => Payload::LlmError(LlmFailure {
                error: format!("unexpected {} message for generation", msg.message_type()),
                query: "unknown".to_string(),
                cause: None,
            }),
        };
        Message::new(
            AgentId::LlmResponseAgent,
            AgentId::Coordinator,
            msg.trace_id,
            payload,
        )
    }

    fn answer(&mut self, result: &RetrievalResult) -> Payload {
        let context = format_context(
            result
                .retrieved_context
                .iter()
                .zip(&result.context_metadata)
                .map(|(text, meta)| (meta.source_file.as_str(), text.as_str())),
        );
        let prompt = build_user_prompt(&context, &result.query);
        let request = GenerationRequest {
            system_prompt: SYSTEM_PROMPT,
            history: &self.history,
            prompt: &prompt,
        };

        match self.generator.generate(&request) {
            Ok(answer) => {
                self.history.push(ChatTurn::user(prompt));
                self.history.push(ChatTurn::assistant(answer.clone()));
                let keep = self.max_exchanges * 2;
                if self.history.len() > keep {
                    self.history.drain(..self.history.len() - keep);
                }
                info!(
                    model = self.generator.model_name(),
                    context_chunks = result.retrieved_context.len(),
                    "generated answer"
                );
                Payload::LlmResponse(LlmResponse {
                    answer,
                    sources: result.retrieved_context.clone(),
                    source_metadata: result.context_metadata.clone(),
                    query: result.query.clone(),
                    model_used: self.generator.model_name().to_string(),
                    context_chunks_used: result.retrieved_context.len(),
                })
            }
            Err(e) => {
                warn!(error = %e, "generation failed");
                Payload::LlmError(LlmFailure {
                    error: e.to_string(),
                    query: result.query.clone(),
                    cause: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::models::ChunkMetadata;
    use crate::protocol::{MessageType, RetrievalFailure};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    /// Records every prompt it sees and echoes a canned answer.
    struct RecordingGenerator {
        seen: Arc<Mutex<Vec<Vec<ChatTurn>>>>,
        fail: bool,
    }

    impl Generator for RecordingGenerator {
        fn model_name(&self) -> &str {
            "recording"
        }
        fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push(request.messages());
            if self.fail {
                Err(GenerationError::Transport("connection refused".to_string()))
            } else {
                Ok("The answer.".to_string())
            }
        }
    }

    fn agent(fail: bool) -> (GenerationAgent, Arc<Mutex<Vec<Vec<ChatTurn>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let agent = GenerationAgent::new(Box::new(RecordingGenerator {
            seen: seen.clone(),
            fail,
        }));
        (agent, seen)
    }

    fn retrieval_result(query: &str) -> Message {
        Message::new(
            AgentId::RetrievalAgent,
            AgentId::LlmResponseAgent,
            Uuid::new_v4(),
            Payload::RetrievalResult(RetrievalResult {
                retrieved_context: vec!["Alpha fact.".to_string()],
                context_metadata: vec![ChunkMetadata {
                    source_file: "a.txt".to_string(),
                    chunk_id: "a.txt_chunk_0".to_string(),
                    chunk_index: 0,
                }],
                similarity_scores: vec![0.7],
                query: query.to_string(),
            }),
        )
    }

    #[test]
    fn answers_with_sources_and_model() {
        let (mut agent, seen) = agent(false);
        let input = retrieval_result("What is alpha?");
        let out = agent.process(&input);
        assert_eq!(out.trace_id, input.trace_id);
        assert_eq!(out.receiver, AgentId::Coordinator);
        match out.payload {
            Payload::LlmResponse(r) => {
                assert_eq!(r.answer, "The answer.");
                assert_eq!(r.sources, vec!["Alpha fact.".to_string()]);
                assert_eq!(r.model_used, "recording");
                assert_eq!(r.context_chunks_used, 1);
            }
            other => panic!("unexpected {:?}", other.message_type()),
        }

        let seen = seen.lock().unwrap();
        let prompt = &seen[0].last().unwrap().content;
        assert!(prompt.contains("[Source: a.txt]\nAlpha fact.\n\n"));
        assert!(prompt.contains("Question: What is alpha?"));
    }

    #[test]
    fn history_carries_into_next_question() {
        let (mut agent, seen) = agent(false);
        agent.process(&retrieval_result("first"));
        agent.process(&retrieval_result("second"));
        assert_eq!(agent.history().len(), 4);

        let seen = seen.lock().unwrap();
        // system + prompt, then system + 2 history turns + prompt
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[1].len(), 4);
        assert_eq!(seen[1][2].content, "The answer.");
    }

    #[test]
    fn history_keeps_only_recent_exchanges() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut agent = GenerationAgent::with_history_limit(
            Box::new(RecordingGenerator {
                seen: seen.clone(),
                fail: false,
            }),
            1,
        );
        agent.process(&retrieval_result("first"));
        agent.process(&retrieval_result("second"));
        agent.process(&retrieval_result("third"));

        assert_eq!(agent.history().len(), 2);
        assert!(agent.history()[0].content.contains("Question: second"));

        let seen = seen.lock().unwrap();
        // system + one kept exchange + prompt
        assert_eq!(seen[2].len(), 4);
        assert!(seen[2][1].content.contains("Question: second"));
    }

    #[test]
    fn zero_limit_sends_no_history() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut agent = GenerationAgent::with_history_limit(
            Box::new(RecordingGenerator {
                seen: seen.clone(),
                fail: false,
            }),
            0,
        );
        agent.process(&retrieval_result("first"));
        agent.process(&retrieval_result("second"));
        assert!(agent.history().is_empty());
        assert_eq!(seen.lock().unwrap()[1].len(), 2);
    }

    #[test]
    fn failed_generation_leaves_history_alone() {
        let (mut agent, _) = agent(true);
        let out = agent.process(&retrieval_result("q"));
        match out.payload {
            Payload::LlmError(f) => {
                assert_eq!(f.error, "API request failed: connection refused");
                assert_eq!(f.query, "q");
                assert!(f.cause.is_none());
            }
            other => panic!("unexpected {:?}", other.message_type()),
        }
        assert!(agent.history().is_empty());
    }

    #[test]
    fn retrieval_error_short_circuits() {
        let (mut agent, seen) = agent(false);
        let input = Message::new(
            AgentId::RetrievalAgent,
            AgentId::LlmResponseAgent,
            Uuid::new_v4(),
            Payload::RetrievalError(RetrievalFailure {
                error: "query embedding failed: boom".to_string(),
                query: "q".to_string(),
            }),
        );
        let out = agent.process(&input);
        assert_eq!(out.trace_id, input.trace_id);
        match out.payload {
            Payload::LlmError(f) => {
                assert_eq!(f.error, RETRIEVAL_ERROR_GENERATION_MESSAGE);
                assert_eq!(f.cause.as_deref(), Some("query embedding failed: boom"));
            }
            other => panic!("unexpected {:?}", other.message_type()),
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn unexpected_input_is_an_llm_error() {
        let (mut agent, seen) = agent(false);
        let input = Message::new(
            AgentId::RetrievalAgent,
            AgentId::LlmResponseAgent,
            Uuid::new_v4(),
            Payload::StorageError(crate::protocol::StorageFailure {
                error: "x".to_string(),
            }),
        );
        assert_eq!(agent.process(&input).message_type(), MessageType::LlmError);
        assert!(seen.lock().unwrap().is_empty());
    }
}
