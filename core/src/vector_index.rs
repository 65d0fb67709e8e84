//! Exact cosine-similarity search over the ingested chunks.
//!
//! Built once, read-only afterwards; `&VectorIndex` is shared freely between
//! concurrent queries.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::chunker::Chunk;
use crate::chunker::ChunkId;
use crate::embeddings::EmbeddingVector;
use crate::error::RagError;
use crate::error::Result;

/// A chunk together with its embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: EmbeddingVector,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub id: ChunkId,
    pub score: f32,
}

struct Row {
    entry: IndexEntry,
    magnitude: f32,
}

pub struct VectorIndex {
    dimensions: usize,
    rows: Vec<Row>,
    by_id: HashMap<ChunkId, usize>,
}

impl VectorIndex {
    /// Bulk-load all entries. Every vector must have the same dimension and
    /// every chunk id must be unique.
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self> {
        let Some(first) = entries.first() else {
            return Err(RagError::EmptyIndex);
        };
        let dimensions = first.vector.len();
        if dimensions == 0 {
            return Err(RagError::EmbeddingService(
                "embedding has zero dimensions".to_string(),
            ));
        }

        let mut rows = Vec::with_capacity(entries.len());
        let mut by_id = HashMap::with_capacity(entries.len());
        for entry in entries {
            if entry.vector.len() != dimensions {
                return Err(RagError::EmbeddingService(format!(
                    "dimension mismatch for chunk {}: expected {dimensions}, got {}",
                    entry.chunk.id,
                    entry.vector.len()
                )));
            }
            if by_id.insert(entry.chunk.id, rows.len()).is_some() {
                return Err(RagError::RetrievalFailed(format!(
                    "duplicate chunk id {}",
                    entry.chunk.id
                )));
            }
            let magnitude = magnitude(&entry.vector);
            rows.push(Row { entry, magnitude });
        }

        Ok(Self {
            dimensions,
            rows,
            by_id,
        })
    }

    /// Up to `k` chunks, best first. Equal scores are ordered by lower id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.rows.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        if query.len() != self.dimensions {
            return Err(RagError::EmbeddingService(format!(
                "query dimension mismatch: expected {}, got {}",
                self.dimensions,
                query.len()
            )));
        }

        let query_magnitude = magnitude(query);
        let mut results: Vec<ScoredChunk> = self
            .rows
            .iter()
            .map(|row| ScoredChunk {
                id: row.entry.chunk.id,
                score: cosine_similarity(query, query_magnitude, &row.entry.vector, row.magnitude),
            })
            .collect();

        results.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        });
        results.truncate(k);
        Ok(results)
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.by_id.get(&id).map(|&i| &self.rows[i].entry.chunk)
    }

    /// Entries in build order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.rows.iter().map(|row| &row.entry)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimensions", &self.dimensions)
            .field("len", &self.rows.len())
            .finish()
    }
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Zero-magnitude vectors score 0.0 against everything.
fn cosine_similarity(a: &[f32], magnitude_a: f32, b: &[f32], magnitude_b: f32) -> f32 {
    let denominator = magnitude_a * magnitude_b;
    if denominator == 0.0 {
        return 0.0;
    }
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot_product / denominator
}
