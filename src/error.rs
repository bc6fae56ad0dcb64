//! Error types for token verification and retrieval.
//!
//! Both enums are typed taxonomies, not stringly errors: callers match on the
//! variant to decide the outer response, and the variant name is what gets
//! logged. Neither core ever degrades an error into an empty result (the one
//! documented exception is deleting a nonexistent owner or document, which is
//! success with zero effect).

use thiserror::Error;

/// Token verification failures.
///
/// Every variant except [`KeyFetch`](AuthError::KeyFetch) is a
/// 401-equivalent. An HTTP layer must collapse the whole 401 family into a
/// single opaque "unauthorized" response — the specific variant is for
/// logging only, so a rejected caller learns nothing about which check
/// failed. `KeyFetch` is the provider's key endpoint misbehaving, which is a
/// 5xx-equivalent and not the caller's fault.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases; downstream match expressions
/// must include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The published key set could not be fetched or parsed.
    #[error("key set fetch failed: {0}")]
    KeyFetch(String),

    /// The token is not a decodable three-part JWT, or a required claim is
    /// structurally absent.
    #[error("malformed token")]
    MalformedToken,

    /// No signing key in the key set matches the token's key id, or the
    /// matched key uses an unsupported algorithm family.
    #[error("no signing key matches the token")]
    UnknownKey,

    /// Signature verification failed.
    #[error("signature verification failed")]
    BadSignature,

    /// The `exp` claim is in the past.
    #[error("token expired")]
    Expired,

    /// The `iss` claim does not equal the configured provider issuer.
    #[error("invalid issuer")]
    BadIssuer,

    /// The `aud` claim does not contain the configured audience.
    #[error("invalid audience")]
    BadAudience,

    /// The `sub` claim is missing or empty.
    #[error("missing subject claim")]
    MissingSubject,
}

impl AuthError {
    /// True for failures that are the provider's fault, not the caller's
    /// (map to 5xx rather than 401).
    pub fn is_server_error(&self) -> bool {
        matches!(self, AuthError::KeyFetch(_))
    }
}

/// Retrieval pipeline failures.
///
/// # Non-exhaustive
///
/// New variants may be added in minor releases; downstream match expressions
/// must include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RetrievalError {
    /// Caller supplied `overlap >= chunk_size` (or a zero chunk size).
    /// Programmer error; not retryable.
    #[error("invalid chunking config: overlap {overlap} must be smaller than chunk size {chunk_size}")]
    InvalidChunkConfig {
        /// Configured maximum characters per chunk.
        chunk_size: usize,
        /// Configured overlap between consecutive chunks.
        overlap: usize,
    },

    /// The embedding model failed to load or run. Treat as fatal for the
    /// process until restarted; do not retry per call.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// The vector index rejected or failed a write. Writes are at-least-once:
    /// points upserted before the failure are not rolled back.
    #[error("vector index write failed: {0}")]
    IndexWrite(String),

    /// The vector index failed a query.
    #[error("vector index read failed: {0}")]
    IndexRead(String),
}
