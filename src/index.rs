//! In-memory vector index with brute-force cosine search.
//!
//! Texts and their embeddings live in two parallel, append-only vectors;
//! position is the join key. A batch passed to [`VectorIndex::add`] is
//! embedded and validated in full before either vector is touched, so a
//! failed batch leaves the index unchanged.
//!
//! The index has no internal locking. It is owned by the retrieval stage
//! and written by one ingestion at a time (`add` takes `&mut self`).

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{RetrievalError, StorageError};

/// A stored text and its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredText {
    pub text: String,
    pub score: f32,
}

pub struct VectorIndex {
    embedder: Box<dyn Embedder>,
    texts: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    /// Fixed by the first successful batch.
    dims: Option<usize>,
}

impl VectorIndex {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            texts: Vec::new(),
            embeddings: Vec::new(),
            dims: None,
        }
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Dimensionality of the stored vectors, once anything is stored.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// Embed and append a batch of texts, preserving their order.
    ///
    /// No deduplication: adding the same text twice stores it twice.
    pub fn add(&mut self, texts: &[String]) -> Result<(), StorageError> {
        if texts.is_empty() {
            return Ok(());
        }

        let vectors = self
            .embedder
            .embed(texts)
            .map_err(|e| StorageError::Embedding(e.to_string()))?;
        if vectors.len() != texts.len() {
            return Err(StorageError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }

        let expected = self.dims.unwrap_or(vectors[0].len());
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(StorageError::Dimension {
                expected,
                got: bad.len(),
            });
        }

        self.texts.extend(texts.iter().cloned());
        self.embeddings.extend(vectors);
        self.dims = Some(expected);
        Ok(())
    }

    /// The `top_k` stored texts most similar to `text`, most similar first.
    pub fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(self
            .search(text, top_k)?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Like [`query`](Self::query) but keeps each hit's cosine score.
    ///
    /// Ties keep insertion order. An empty index (or `top_k == 0`) returns
    /// nothing without calling the embedder.
    pub fn search(&self, text: &str, top_k: usize) -> Result<Vec<ScoredText>, RetrievalError> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[text.to_string()])
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("empty embedding response".to_string()))?;
        if let Some(expected) = self.dims {
            if query_vec.len() != expected {
                return Err(RetrievalError::Dimension {
                    expected,
                    got: query_vec.len(),
                });
            }
        }

        let scores: Vec<f32> = self
            .embeddings
            .iter()
            .map(|e| cosine_similarity(&query_vec, e))
            .collect();

        let mut order: Vec<usize> = (0..scores.len()).collect();
        // sort_by is stable, so equal scores stay in insertion order
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(top_k);

        Ok(order
            .into_iter()
            .map(|i| ScoredText {
                text: self.texts[i].clone(),
                score: scores[i],
            })
            .collect())
    }
}
