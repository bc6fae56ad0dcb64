//! Document ingestion pipeline.
//!
//! Coordinates the indexing flow for one owner's document: chunking →
//! embedding → vector upsert. Each stage fails fast; a failure before the
//! upsert leaves the index untouched, a failure during it may leave a
//! partial write (callers re-index the document to converge).

use serde_json::Value;

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::store::{upsert_chunks, UpsertSummary, VectorIndex};

/// Chunk `text`, embed every chunk, and upsert the results under
/// `(owner_id, document_id)`. `metadata` is stored on every point.
///
/// Empty or whitespace-only text indexes nothing and reports zero chunks.
pub async fn index_document(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    chunking: &ChunkingConfig,
    owner_id: &str,
    document_id: &str,
    text: &str,
    metadata: &Value,
) -> Result<UpsertSummary, RetrievalError> {
    if text.trim().is_empty() {
        return Ok(UpsertSummary {
            chunk_count: 0,
            document_id: document_id.to_string(),
        });
    }

    let chunks = chunk_text(text, chunking.chunk_size, chunking.overlap)?;
    tracing::debug!(
        owner = %owner_id,
        document = %document_id,
        chunks = chunks.len(),
        "document chunked"
    );

    let vectors = provider.embed_batch(&chunks).await?;
    let summary = upsert_chunks(index, owner_id, document_id, &chunks, vectors, metadata).await?;

    tracing::info!(
        owner = %owner_id,
        document = %document_id,
        chunks = summary.chunk_count,
        "document indexed"
    );
    Ok(summary)
}

/// Remove an owner's points, narrowed to one document when `document_id` is
/// given. Idempotent: deleting what is not there succeeds.
pub async fn delete_document(
    index: &dyn VectorIndex,
    owner_id: &str,
    document_id: Option<&str>,
) -> Result<(), RetrievalError> {
    index.delete(owner_id, document_id).await?;
    tracing::info!(owner = %owner_id, document = ?document_id, "points deleted");
    Ok(())
}
