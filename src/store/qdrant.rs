//! Qdrant backend over its REST API.
//!
//! Speaks plain JSON to a Qdrant server with `reqwest`. Collection creation
//! is idempotent, upserts and deletes use `wait=true` so completion means
//! durability, and both search and delete carry a `must` filter on
//! `owner_id` so isolation is enforced inside the database, not in the
//! client.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::RetrievalError;
use crate::store::{IndexedPoint, ScoredPoint, VectorIndex};

/// Vector index backed by a Qdrant server.
pub struct QdrantIndex {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    dims: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Map<String, Value>,
}

impl QdrantIndex {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dims: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(timeout);
        if let Some(key) = api_key {
            let mut headers = reqwest::header::HeaderMap::new();
            let mut value = reqwest::header::HeaderValue::from_str(&key)?;
            value.set_sensitive(true);
            headers.insert("api-key", value);
            builder = builder.default_headers(headers);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            dims,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    fn owner_filter(owner_id: &str, document_id: Option<&str>) -> Value {
        let mut must = vec![json!({"key": "owner_id", "match": {"value": owner_id}})];
        if let Some(doc) = document_id {
            must.push(json!({"key": "document_id", "match": {"value": doc}}));
        }
        json!({"must": must})
    }
}

fn write_err(err: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::IndexWrite(err.to_string())
}

fn read_err(err: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::IndexRead(err.to_string())
}

async fn check_status(
    response: reqwest::Response,
    to_err: fn(String) -> RetrievalError,
) -> Result<reqwest::Response, RetrievalError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(to_err(format!("qdrant returned {}: {}", status, body)))
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self) -> Result<(), RetrievalError> {
        let probe = self
            .http
            .get(self.collection_url(""))
            .send()
            .await
            .map_err(write_err)?;

        if probe.status().is_success() {
            return Ok(());
        }
        if probe.status() != StatusCode::NOT_FOUND {
            return check_status(probe, RetrievalError::IndexWrite)
                .await
                .map(|_| ());
        }

        tracing::info!(collection = %self.collection, dims = self.dims, "creating collection");
        let response = self
            .http
            .put(self.collection_url(""))
            .json(&json!({
                "vectors": {"size": self.dims, "distance": "Cosine"}
            }))
            .send()
            .await
            .map_err(write_err)?;
        // Another writer may have created the collection between the probe
        // and this PUT; already-exists counts as success.
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        check_status(response, RetrievalError::IndexWrite).await?;
        Ok(())
    }

    async fn upsert_points(&self, points: Vec<IndexedPoint>) -> Result<(), RetrievalError> {
        if points.is_empty() {
            return Ok(());
        }

        let body: Vec<Value> = points
            .iter()
            .map(|p| json!({"id": p.id, "vector": p.vector, "payload": p.payload}))
            .collect();

        let response = self
            .http
            .put(self.collection_url("/points?wait=true"))
            .json(&json!({"points": body}))
            .send()
            .await
            .map_err(write_err)?;
        check_status(response, RetrievalError::IndexWrite).await?;
        Ok(())
    }

    async fn search(
        &self,
        owner_id: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>, RetrievalError> {
        let response = self
            .http
            .post(self.collection_url("/points/search"))
            .json(&json!({
                "vector": query,
                "limit": limit,
                "with_payload": true,
                "filter": Self::owner_filter(owner_id, None),
            }))
            .send()
            .await
            .map_err(read_err)?;
        let response = check_status(response, RetrievalError::IndexRead).await?;

        let parsed: SearchResponse = response.json().await.map_err(read_err)?;
        Ok(parsed
            .result
            .into_iter()
            .map(|r| ScoredPoint {
                // Qdrant ids may be uuids or integers.
                id: match r.id {
                    Value::String(s) => s,
                    other => other.to_string(),
                },
                score: r.score,
                payload: r.payload,
            })
            .collect())
    }

    async fn delete(
        &self,
        owner_id: &str,
        document_id: Option<&str>,
    ) -> Result<(), RetrievalError> {
        let response = self
            .http
            .post(self.collection_url("/points/delete?wait=true"))
            .json(&json!({"filter": Self::owner_filter(owner_id, document_id)}))
            .send()
            .await
            .map_err(write_err)?;

        // A missing collection means there is nothing to delete.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(response, RetrievalError::IndexWrite).await?;
        Ok(())
    }
}
