//! Semantic search over an owner's indexed chunks.

use crate::embedding::EmbeddingProvider;
use crate::error::RetrievalError;
use crate::store::{format_hits, SearchHit, VectorIndex};

/// Embed `query` and return `owner_id`'s closest chunks, best first.
///
/// An empty or whitespace-only query short-circuits to no results without
/// touching the model or the index.
pub async fn search_chunks(
    index: &dyn VectorIndex,
    provider: &dyn EmbeddingProvider,
    owner_id: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<SearchHit>, RetrievalError> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let vector = provider.embed_one(query).await?;
    let points = index.search(owner_id, &vector, limit).await?;

    tracing::debug!(owner = %owner_id, hits = points.len(), "search complete");
    Ok(format_hits(points))
}
