//! Vector index abstraction and the owner-scoped gateway over it.
//!
//! The [`VectorIndex`] trait defines the operations the retrieval pipeline
//! needs from a vector database — create-if-absent collection, point upsert,
//! filtered nearest-neighbor search, filtered delete — enabling pluggable
//! backends (in-memory for tests and local runs, Qdrant over REST for
//! deployments).
//!
//! # Tenant isolation
//!
//! `search` and `delete` take the owner id as part of the trait contract, and
//! every backend applies the owner filter *before* ranking. This is a
//! security invariant, not an optimization: no query content can ever pull
//! another owner's points out of the index.
//!
//! # Payload shape
//!
//! Every stored point carries the reserved payload keys `owner_id`,
//! `document_id`, `chunk_index`, and `text`, merged with caller metadata.
//! Reserved keys win on conflict — caller metadata can never spoof the owner
//! a point belongs to.

pub mod memory;
pub mod qdrant;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::config::IndexConfig;
use crate::error::RetrievalError;

/// Payload keys managed by the gateway; caller metadata cannot override them.
pub const RESERVED_PAYLOAD_KEYS: [&str; 4] = ["owner_id", "document_id", "chunk_index", "text"];

/// The unit stored in the vector index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedPoint {
    /// Fresh UUID, generated per point per upsert call, never reused.
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

/// A raw search result from a backend: point id, similarity score, payload.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: Map<String, Value>,
}

/// A formatted search result as callers consume it.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub score: f32,
    pub document_id: String,
    pub chunk_index: i64,
    /// Caller metadata stored with the point, reserved keys stripped.
    pub metadata: Value,
}

/// Result of upserting one document's chunks.
#[derive(Debug, Clone, Serialize)]
pub struct UpsertSummary {
    pub chunk_count: usize,
    pub document_id: String,
}

/// Abstract vector index backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](VectorIndex::ensure_collection) | Create the collection if absent (fixed dims, cosine distance) |
/// | [`upsert_points`](VectorIndex::upsert_points) | Store points (at-least-once; no rollback of partial writes) |
/// | [`search`](VectorIndex::search) | Owner-filtered nearest-neighbor search |
/// | [`delete`](VectorIndex::delete) | Owner-filtered delete, optionally narrowed to one document; idempotent |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn ensure_collection(&self) -> Result<(), RetrievalError>;

    async fn upsert_points(&self, points: Vec<IndexedPoint>) -> Result<(), RetrievalError>;

    /// Nearest neighbors among `owner_id`'s points only, ordered by
    /// descending score; ties broken by insertion order.
    async fn search(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RetrievalError>;

    /// Delete all of `owner_id`'s points, narrowed to `document_id` when
    /// given. Deleting what does not exist succeeds with zero effect.
    async fn delete(&self, owner_id: &str, document_id: Option<&str>)
        -> Result<(), RetrievalError>;
}

/// Assemble and upsert the points for one document's chunks.
///
/// Requires one vector per chunk. Each point gets a fresh UUID and a payload
/// of the reserved keys merged over the caller metadata.
///
/// # Errors
///
/// [`RetrievalError::IndexWrite`] on a chunk/vector count mismatch or any
/// backend write failure. Writes are at-least-once: a failure partway leaves
/// earlier points in place.
pub async fn upsert_chunks(
    index: &dyn VectorIndex,
    owner_id: &str,
    document_id: &str,
    chunks: &[String],
    vectors: Vec<Vec<f32>>,
    metadata: &Value,
) -> Result<UpsertSummary, RetrievalError> {
    if chunks.len() != vectors.len() {
        return Err(RetrievalError::IndexWrite(format!(
            "chunk/vector count mismatch: {} chunks, {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }

    let points = build_points(owner_id, document_id, chunks, vectors, metadata);
    let count = points.len();
    index.upsert_points(points).await?;

    tracing::debug!(owner = %owner_id, document = %document_id, count, "points upserted");

    Ok(UpsertSummary {
        chunk_count: count,
        document_id: document_id.to_string(),
    })
}

/// Build indexable points: caller metadata first, then the reserved keys on
/// top so they win any conflict.
pub fn build_points(
    owner_id: &str,
    document_id: &str,
    chunks: &[String],
    vectors: Vec<Vec<f32>>,
    metadata: &Value,
) -> Vec<IndexedPoint> {
    chunks
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(i, (chunk, vector))| {
            let mut payload = metadata.as_object().cloned().unwrap_or_default();
            payload.insert("owner_id".to_string(), json!(owner_id));
            payload.insert("document_id".to_string(), json!(document_id));
            payload.insert("chunk_index".to_string(), json!(i as i64));
            payload.insert("text".to_string(), json!(chunk));

            IndexedPoint {
                id: Uuid::new_v4().to_string(),
                vector,
                payload,
            }
        })
        .collect()
}

/// Shape raw backend results into caller-facing hits, separating the
/// reserved keys back out from the stored metadata.
pub fn format_hits(points: Vec<ScoredPoint>) -> Vec<SearchHit> {
    points
        .into_iter()
        .map(|point| {
            let text = point
                .payload
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let document_id = point
                .payload
                .get("document_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let chunk_index = point
                .payload
                .get("chunk_index")
                .and_then(Value::as_i64)
                .unwrap_or(0);

            let metadata: Map<String, Value> = point
                .payload
                .into_iter()
                .filter(|(k, _)| !RESERVED_PAYLOAD_KEYS.contains(&k.as_str()))
                .collect();

            SearchHit {
                text,
                score: point.score,
                document_id,
                chunk_index,
                metadata: Value::Object(metadata),
            }
        })
        .collect()
}

/// Create the appropriate [`VectorIndex`] based on configuration.
///
/// | Config Value | Backend |
/// |-------------|---------|
/// | `"memory"` | [`memory::MemoryIndex`] |
/// | `"qdrant"` | [`qdrant::QdrantIndex`] (REST; `QDRANT_API_KEY` from env if set) |
pub fn create_index(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(memory::MemoryIndex::new(config.dims))),
        "qdrant" => {
            let url = match config.url.as_deref() {
                Some(url) if !url.trim().is_empty() => url,
                _ => bail!("index.url required for the qdrant backend"),
            };
            let api_key = std::env::var("QDRANT_API_KEY").ok();
            Ok(Arc::new(qdrant::QdrantIndex::new(
                url,
                api_key,
                &config.collection,
                config.dims,
                std::time::Duration::from_secs(config.timeout_secs),
            )?))
        }
        other => bail!("Unknown index backend: {}", other),
    }
}
