//! # Tenant Context
//!
//! Owner-scoped document retrieval with bearer-token authentication.
//!
//! Tenant Context verifies Supabase-issued JWTs against the provider's
//! rotating JWKS, then gives each verified owner a private slice of a shared
//! vector index: documents are chunked, embedded, and stored with the owner
//! id on every point, and search and delete are filtered to that owner
//! inside the backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌───────────┐
//! │  Bearer  │──▶│ TokenVerifier│──▶│ Principal │
//! │  token   │   │  (JWKS cache)│   │ owner_id  │
//! └──────────┘   └─────────────┘   └─────┬─────┘
//!                                        │
//!                ┌───────────────────────┤
//!                ▼                       ▼
//!          ┌───────────┐          ┌───────────┐
//!          │  Ingest   │          │  Search   │
//!          │ chunk+embed│         │ embed+rank│
//!          └─────┬─────┘          └─────┬─────┘
//!                └──────────┬───────────┘
//!                           ▼
//!                    ┌─────────────┐
//!                    │ VectorIndex │
//!                    │ memory/qdrant│
//!                    └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Auth and retrieval error types |
//! | [`jwks`] | JWKS document model and refreshable key cache |
//! | [`verify`] | Bearer-token verification pipeline |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector index trait and backends |
//! | [`ingest`] | Chunk → embed → upsert pipeline |
//! | [`search`] | Owner-scoped semantic search |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod jwks;
pub mod search;
pub mod store;
pub mod verify;
