//! # ragtrace
//!
//! A retrieval-augmented question answering pipeline with a traced message
//! protocol.
//!
//! Documents are parsed into chunks, embedded into an in-memory vector
//! index, and searched for the chunks closest to a question; a chat model
//! then answers from those chunks. Every hand-off between stages is a
//! typed [`protocol::Message`] stamped with the run's trace id, so a run
//! can be followed end to end.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────────┐   ┌────────────┐
//! │ Ingestion │──▶│   Storage    │──▶│  Retrieval   │──▶│ Generation │
//! │  parser   │   │ VectorIndex  │   │ top-k cosine │   │ chat model │
//! └───────────┘   └──────────────┘   └──────────────┘   └────────────┘
//!        └──────────── Orchestrator (one trace id per run) ─────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragtrace parse ./docs/report.pdf
//! ragtrace ask "What changed in Q3?" --file ./docs/report.pdf
//! ragtrace chat --dir ./docs
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed stage errors |
//! | [`models`] | Chunk and file metadata |
//! | [`chunk`] | Text cleanup and sentence chunking |
//! | [`extract`] | PDF / DOCX / PPTX text extraction |
//! | [`parser`] | Per-format document parsing |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory vector index |
//! | [`generation`] | Chat-completions answer generation |
//! | [`protocol`] | Inter-stage message envelope |
//! | [`agents`] | Ingestion, retrieval and generation stages |
//! | [`orchestrator`] | Stage sequencing and the run log |
//! | [`commands`] | CLI command implementations |

pub mod agents;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod protocol;
