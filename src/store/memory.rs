//! In-memory vector index.
//!
//! Brute-force cosine scan over a `Vec` behind a `tokio::sync::RwLock`. Fast
//! enough for tests and small local corpora, and the reference for backend
//! semantics: owner filtering happens before ranking, ties break by
//! insertion order, deletes are idempotent.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::embedding::cosine_similarity;
use crate::error::RetrievalError;
use crate::store::{IndexedPoint, ScoredPoint, VectorIndex};

struct StoredPoint {
    /// Monotonic insertion counter, the tie-break for equal scores.
    seq: u64,
    point: IndexedPoint,
}

/// Vector index backed by process memory.
pub struct MemoryIndex {
    dims: usize,
    next_seq: RwLock<u64>,
    points: RwLock<Vec<StoredPoint>>,
}

impl MemoryIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            next_seq: RwLock::new(0),
            points: RwLock::new(Vec::new()),
        }
    }

    /// Total points stored, across all owners.
    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}

fn payload_str<'a>(point: &'a IndexedPoint, key: &str) -> Option<&'a str> {
    point.payload.get(key).and_then(Value::as_str)
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_collection(&self) -> Result<(), RetrievalError> {
        Ok(())
    }

    async fn upsert_points(&self, points: Vec<IndexedPoint>) -> Result<(), RetrievalError> {
        for point in &points {
            if point.vector.len() != self.dims {
                return Err(RetrievalError::IndexWrite(format!(
                    "vector dimension mismatch: expected {}, got {}",
                    self.dims,
                    point.vector.len()
                )));
            }
        }

        let mut seq = self.next_seq.write().await;
        let mut stored = self.points.write().await;
        for point in points {
            stored.push(StoredPoint { seq: *seq, point });
            *seq += 1;
        }
        Ok(())
    }

    async fn search(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RetrievalError> {
        let stored = self.points.read().await;

        // Owner filter first, then rank. Other owners' points never enter
        // the candidate set.
        let mut scored: Vec<(f32, u64, ScoredPoint)> = stored
            .iter()
            .filter(|s| payload_str(&s.point, "owner_id") == Some(owner_id))
            .map(|s| {
                let score = cosine_similarity(query, &s.point.vector);
                (
                    score,
                    s.seq,
                    ScoredPoint {
                        id: s.point.id.clone(),
                        score,
                        payload: s.point.payload.clone(),
                    },
                )
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(_, _, p)| p).collect())
    }

    async fn delete(
        &self,
        owner_id: &str,
        document_id: Option<&str>,
    ) -> Result<(), RetrievalError> {
        let mut stored = self.points.write().await;
        stored.retain(|s| {
            let owner_match = payload_str(&s.point, "owner_id") == Some(owner_id);
            let doc_match = match document_id {
                Some(doc) => payload_str(&s.point, "document_id") == Some(doc),
                None => true,
            };
            !(owner_match && doc_match)
        });
        Ok(())
    }
}
