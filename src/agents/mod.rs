//! The three pipeline stages.
//!
//! Each agent consumes plain inputs or the previous stage's [`Message`]
//! and always returns a [`Message`]: a success payload, or the failure
//! payload for its stage. Agents never call each other; the
//! [`Orchestrator`](crate::orchestrator::Orchestrator) moves messages
//! between them.
//!
//! [`Message`]: crate::protocol::Message

pub mod generation;
pub mod ingestion;
pub mod retrieval;

pub use generation::GenerationAgent;
pub use ingestion::IngestionAgent;
pub use retrieval::RetrievalAgent;
