use std::collections::VecDeque;

use crate::shared::embedding::Embedding;

/// Embeddings of every face accepted into a track, oldest first.
///
/// Uncapped histories grow for the whole run, one entry per accepted face.
/// With a capacity the history becomes a ring buffer that evicts the oldest
/// entry, bounding memory on long sequences at the cost of forgetting the
/// earliest appearances of the target.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmbeddingHistory {
    entries: VecDeque<Embedding>,
    capacity: Option<usize>,
}

impl EmbeddingHistory {
    /// A capacity of zero is raised to one: the latest embedding is always kept.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.map(|c| c.max(1)),
        }
    }

    pub fn seeded(first: Embedding, capacity: Option<usize>) -> Self {
        let mut history = Self::new(capacity);
        history.push(first);
        history
    }

    pub fn push(&mut self, embedding: Embedding) {
        if let Some(cap) = self.capacity {
            while self.entries.len() >= cap {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(embedding);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Embedding> {
        self.entries.iter()
    }

    pub fn matches(&self, embedding: &Embedding, threshold: f64) -> bool {
        embedding.is_similar_to_any(self.iter(), threshold)
    }
}
