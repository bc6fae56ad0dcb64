use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Auth provider base URL (e.g. `https://project-ref.supabase.co`).
    pub provider_url: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    /// Key set cache lifetime in seconds. Omitted = cache for the process
    /// lifetime (unknown key ids still trigger a refetch, so rotation is
    /// observed either way).
    #[serde(default)]
    pub jwks_ttl_secs: Option<u64>,
}

impl AuthConfig {
    /// Expected `iss` claim value for tokens from this provider.
    pub fn issuer(&self) -> String {
        format!("{}/auth/v1", self.provider_url.trim_end_matches('/'))
    }

    /// Well-known JWKS endpoint published by this provider.
    pub fn jwks_url(&self) -> String {
        format!(
            "{}/auth/v1/.well-known/jwks.json",
            self.provider_url.trim_end_matches('/')
        )
    }
}

fn default_audience() -> String {
    "authenticated".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_model() -> String {
    "all-minilm-l6-v2".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Qdrant base URL; required when `backend = "qdrant"`. The API key, if
    /// the cluster needs one, comes from the `QDRANT_API_KEY` environment
    /// variable.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_distance")]
    pub distance: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            collection: default_collection(),
            dims: default_dims(),
            distance: default_distance(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "memory".to_string()
}
fn default_collection() -> String {
    "multimodal_docs".to_string()
}
fn default_distance() -> String {
    "cosine".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate auth
    if config.auth.provider_url.trim().is_empty() {
        anyhow::bail!("auth.provider_url must be set");
    }

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or local.",
            other
        ),
    }
    if config.embedding.is_enabled() && config.embedding.dims == 0 {
        anyhow::bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }

    // Validate index
    match config.index.backend.as_str() {
        "memory" => {}
        "qdrant" => {
            if config.index.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                anyhow::bail!("index.url must be set when backend is 'qdrant'");
            }
        }
        other => anyhow::bail!("Unknown index backend: '{}'. Must be memory or qdrant.", other),
    }
    if config.index.dims == 0 {
        anyhow::bail!("index.dims must be > 0");
    }
    if config.index.distance != "cosine" {
        anyhow::bail!("index.distance must be 'cosine', got '{}'", config.index.distance);
    }
    if config.embedding.is_enabled() && config.embedding.dims != config.index.dims {
        anyhow::bail!(
            "embedding.dims ({}) must match index.dims ({})",
            config.embedding.dims,
            config.index.dims
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(content: &str) -> (TempDir, std::path::PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tenant-context.toml");
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let (_tmp, path) = write_config(
            r#"[auth]
provider_url = "https://example.supabase.co"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.auth.audience, "authenticated");
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.embedding.dims, 384);
        assert_eq!(config.index.backend, "memory");
        assert_eq!(config.index.collection, "multimodal_docs");
    }

    #[test]
    fn test_derived_urls_trim_trailing_slash() {
        let (_tmp, path) = write_config(
            r#"[auth]
provider_url = "https://example.supabase.co/"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.auth.issuer(), "https://example.supabase.co/auth/v1");
        assert_eq!(
            config.auth.jwks_url(),
            "https://example.supabase.co/auth/v1/.well-known/jwks.json"
        );
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let (_tmp, path) = write_config(
            r#"[auth]
provider_url = "https://example.supabase.co"

[chunking]
chunk_size = 100
overlap = 100
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_qdrant_backend_requires_url() {
        let (_tmp, path) = write_config(
            r#"[auth]
provider_url = "https://example.supabase.co"

[index]
backend = "qdrant"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_embedding_dims_must_match_index_dims() {
        let (_tmp, path) = write_config(
            r#"[auth]
provider_url = "https://example.supabase.co"

[embedding]
dims = 768

[index]
dims = 384
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
