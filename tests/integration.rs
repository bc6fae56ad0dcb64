//! End-to-end retrieval pipeline tests over the in-memory index.
//!
//! Uses a deterministic bag-of-words embedding provider so similarity
//! rankings are stable and meaningful without downloading a model.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde_json::json;

use tenant_context::embedding::EmbeddingProvider;
use tenant_context::error::RetrievalError;
use tenant_context::ingest::{delete_document, index_document};
use tenant_context::search::search_chunks;
use tenant_context::store::memory::MemoryIndex;
use tenant_context::config::ChunkingConfig;

const DIMS: usize = 384;

/// Deterministic embedding: each lowercase word hashes into one of the 384
/// buckets, so texts sharing vocabulary get similar vectors.
struct BagOfWordsProvider;

fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMS];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        vector[(hasher.finish() as usize) % DIMS] += 1.0;
    }
    vector
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsProvider {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

#[tokio::test]
async fn test_embeddings_are_deterministic_and_fixed_width() {
    let provider = BagOfWordsProvider;
    let texts = vec![
        "gulls circle the lighthouse".to_string(),
        "basalt columns above the delta".to_string(),
    ];

    let first = provider.embed_batch(&texts).await.unwrap();
    let second = provider.embed_batch(&texts).await.unwrap();
    assert_eq!(first, second);
    for vector in &first {
        assert_eq!(vector.len(), provider.dims());
    }

    let one = provider.embed_one("gulls circle the lighthouse").await.unwrap();
    let again = provider.embed_one("gulls circle the lighthouse").await.unwrap();
    assert_eq!(one, again);
    assert_eq!(one.len(), provider.dims());
    assert_eq!(one, first[0]);
}

fn chunking() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 500,
        overlap: 50,
    }
}

/// ~1200 characters in three distinct topical sections, so the default
/// window yields three chunks with different vocabulary.
fn three_topic_document() -> String {
    let mut text = String::new();
    for _ in 0..8 {
        text.push_str("Sailing ships cross the harbor while gulls circle the lighthouse. ");
    }
    for _ in 0..8 {
        text.push_str("Volcanic basalt columns tower above the glacier fed river delta. ");
    }
    for _ in 0..8 {
        text.push_str("Orchestras rehearse symphonies as violinists tune their strings. ");
    }
    text
}

#[tokio::test]
async fn test_index_then_search_ranks_matching_chunk_first() {
    let index = MemoryIndex::new(DIMS);
    let provider = BagOfWordsProvider;
    let text = three_topic_document();

    let summary = index_document(
        &index,
        &provider,
        &chunking(),
        "alice",
        "doc-1",
        &text,
        &json!({"filename": "topics.txt"}),
    )
    .await
    .unwrap();
    assert!(summary.chunk_count >= 3);

    let hits = search_chunks(&index, &provider, "alice", "glacier basalt volcanic river", 3)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].text.contains("basalt"));
    assert_eq!(hits[0].document_id, "doc-1");
    assert_eq!(hits[0].metadata, json!({"filename": "topics.txt"}));
    assert!(hits[0].score >= hits[hits.len() - 1].score);
}

#[tokio::test]
async fn test_owners_cannot_see_each_others_documents() {
    let index = MemoryIndex::new(DIMS);
    let provider = BagOfWordsProvider;

    index_document(
        &index,
        &provider,
        &chunking(),
        "alice",
        "doc-a",
        "The treasury audit covers quarterly ledgers and invoices.",
        &json!({}),
    )
    .await
    .unwrap();
    index_document(
        &index,
        &provider,
        &chunking(),
        "bob",
        "doc-b",
        "The treasury audit covers quarterly ledgers and invoices.",
        &json!({}),
    )
    .await
    .unwrap();

    let alice_hits = search_chunks(&index, &provider, "alice", "treasury audit", 10)
        .await
        .unwrap();
    assert_eq!(alice_hits.len(), 1);
    assert_eq!(alice_hits[0].document_id, "doc-a");

    let stranger_hits = search_chunks(&index, &provider, "mallory", "treasury audit", 10)
        .await
        .unwrap();
    assert!(stranger_hits.is_empty());
}

#[tokio::test]
async fn test_delete_scopes_to_document_then_owner() {
    let index = MemoryIndex::new(DIMS);
    let provider = BagOfWordsProvider;

    for doc in ["d1", "d2"] {
        index_document(
            &index,
            &provider,
            &chunking(),
            "alice",
            doc,
            "Herons wade through the shallow marsh at dawn.",
            &json!({}),
        )
        .await
        .unwrap();
    }

    delete_document(&index, "alice", Some("d1")).await.unwrap();
    let hits = search_chunks(&index, &provider, "alice", "marsh herons", 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_id, "d2");

    delete_document(&index, "alice", None).await.unwrap();
    let hits = search_chunks(&index, &provider, "alice", "marsh herons", 10)
        .await
        .unwrap();
    assert!(hits.is_empty());

    // Deleting again, or for an owner that never existed, is a no-op.
    delete_document(&index, "alice", None).await.unwrap();
    delete_document(&index, "nobody", Some("ghost")).await.unwrap();
}

#[tokio::test]
async fn test_metadata_cannot_spoof_ownership() {
    let index = MemoryIndex::new(DIMS);
    let provider = BagOfWordsProvider;

    index_document(
        &index,
        &provider,
        &chunking(),
        "alice",
        "doc-1",
        "Confidential merger briefing for the board.",
        &json!({"owner_id": "bob", "document_id": "stolen"}),
    )
    .await
    .unwrap();

    // The reserved keys overrode the spoofed metadata, so only alice finds it.
    let bob_hits = search_chunks(&index, &provider, "bob", "merger briefing", 10)
        .await
        .unwrap();
    assert!(bob_hits.is_empty());

    let alice_hits = search_chunks(&index, &provider, "alice", "merger briefing", 10)
        .await
        .unwrap();
    assert_eq!(alice_hits.len(), 1);
    assert_eq!(alice_hits[0].document_id, "doc-1");
    // The spoofed keys were dropped rather than surfaced as metadata.
    assert_eq!(alice_hits[0].metadata, json!({}));
}

#[tokio::test]
async fn test_reindexing_accumulates_points() {
    // At-least-once semantics: re-indexing the same document id adds fresh
    // points rather than replacing old ones. Callers delete first to replace.
    let index = MemoryIndex::new(DIMS);
    let provider = BagOfWordsProvider;
    let text = "Falcons dive from the cliff face toward the valley floor.";

    for _ in 0..2 {
        index_document(&index, &provider, &chunking(), "alice", "d1", text, &json!({}))
            .await
            .unwrap();
    }
    assert_eq!(index.len().await, 2);

    delete_document(&index, "alice", Some("d1")).await.unwrap();
    index_document(&index, &provider, &chunking(), "alice", "d1", text, &json!({}))
        .await
        .unwrap();
    assert_eq!(index.len().await, 1);
}
