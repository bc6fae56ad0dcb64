//! Bearer token verification against the provider's published key set.
//!
//! [`TokenVerifier::verify`] runs a linear pipeline with no retries:
//!
//! ```text
//! header parsed → key resolved → signature checked → claims checked → Principal
//! ```
//!
//! Each stage rejects with a distinct [`AuthError`] variant. The signature is
//! always checked with the *token's own* declared algorithm, restricted to a
//! closed allow-list of RSA and elliptic-curve families — a token can never
//! steer verification onto an algorithm outside that list, which is what
//! defeats algorithm-confusion attacks.
//!
//! Claim checks (expiry, issuer, audience, subject) run manually after the
//! signature check so that the rejection kind is deterministic regardless of
//! how many claims are simultaneously wrong.

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};
use serde::Deserialize;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::jwks::{Jwk, KeySet, KeySetCache};

/// The authenticated identity extracted from a verified token.
///
/// Derived fresh per request and never persisted. `owner_id` is the token's
/// `sub` claim and is the value every retrieval operation must be scoped by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub owner_id: String,
    /// Optional pass-through of the `email` claim, when the provider sets it.
    pub email: Option<String>,
}

/// Closed set of supported signature families.
///
/// Anything outside this enum is an unsupported key, full stop — there is no
/// open dispatch on the algorithm string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    EllipticCurve,
}

impl KeyFamily {
    /// Classify an algorithm tag (`RS256`, `ES384`, ...) into a family.
    pub fn from_alg(alg: &str) -> Option<Self> {
        if alg.starts_with("RS") {
            Some(KeyFamily::Rsa)
        } else if alg.starts_with("ES") {
            Some(KeyFamily::EllipticCurve)
        } else {
            None
        }
    }
}

/// Algorithms a token header may declare. Everything else resolves to
/// [`AuthError::UnknownKey`] before any cryptography runs.
const SUPPORTED_ALGORITHMS: [Algorithm; 5] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::ES256,
    Algorithm::ES384,
];

/// Claims this crate consumes. Everything is optional at the serde level so
/// that *which* claim is missing decides the rejection kind, instead of a
/// generic deserialization error.
#[derive(Debug, Clone, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
    #[serde(default)]
    exp: Option<u64>,
    #[serde(default)]
    email: Option<String>,
}

/// RFC 7519 allows `aud` to be a single string or an array of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn matches(&self, expected: &str) -> bool {
        match self {
            Audience::One(aud) => aud == expected,
            Audience::Many(auds) => auds.iter().any(|a| a == expected),
        }
    }
}

/// Verifies bearer tokens issued by the configured auth provider.
///
/// Stateless apart from the injected [`KeySetCache`]; one instance serves
/// concurrent requests.
pub struct TokenVerifier {
    cache: KeySetCache,
    issuer: String,
    audience: String,
}

impl TokenVerifier {
    pub fn new(
        cache: KeySetCache,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    /// Build a verifier from configuration, with its own HTTP client and
    /// key set cache derived from the provider URL.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        let ttl = config.jwks_ttl_secs.map(std::time::Duration::from_secs);
        let cache = KeySetCache::new(http, config.jwks_url(), ttl);
        Ok(Self::new(cache, config.issuer(), config.audience.clone()))
    }

    /// Verify a compact JWT and return the authenticated principal.
    ///
    /// # Errors
    ///
    /// One [`AuthError`] variant per failed stage; see the module docs for
    /// the pipeline order. [`AuthError::KeyFetch`] can only surface from a
    /// cold or expired key set cache.
    pub async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "undecodable token header");
            AuthError::MalformedToken
        })?;

        let (key, algorithm) = self.resolve(&header).await?;
        let claims = verify_signature(token, &key, algorithm)?;

        let now = Utc::now().timestamp();
        match claims.exp {
            // A token without an expiry is structurally unacceptable.
            None => return Err(AuthError::MalformedToken),
            Some(exp) if exp as i64 <= now => return Err(AuthError::Expired),
            Some(_) => {}
        }

        if claims.iss.as_deref() != Some(self.issuer.as_str()) {
            return Err(AuthError::BadIssuer);
        }

        match &claims.aud {
            Some(aud) if aud.matches(&self.audience) => {}
            _ => return Err(AuthError::BadAudience),
        }

        let owner_id = match claims.sub {
            Some(sub) if !sub.is_empty() => sub,
            _ => return Err(AuthError::MissingSubject),
        };

        let prefix: String = owner_id.chars().take(8).collect();
        tracing::debug!(owner = %prefix, "token verified");

        Ok(Principal {
            owner_id,
            email: claims.email,
        })
    }

    /// Locate and materialize the public key the token was signed with.
    ///
    /// On a key id the cached set does not contain, the key set is refetched
    /// once before giving up — that is how a long-running process observes
    /// provider key rotation. The refetch is cooldown-throttled so forged
    /// key ids cannot amplify into one outbound request per token, and a
    /// failed refetch falls back to the cached set's verdict rather than
    /// masking the unknown key as a fetch error.
    async fn resolve(&self, header: &Header) -> Result<(DecodingKey, Algorithm), AuthError> {
        let kid = match header.kid.as_deref() {
            Some(kid) => kid,
            None => {
                tracing::warn!("token header missing kid");
                return Err(AuthError::UnknownKey);
            }
        };

        if !SUPPORTED_ALGORITHMS.contains(&header.alg) {
            tracing::warn!(alg = ?header.alg, "token declares unsupported algorithm");
            return Err(AuthError::UnknownKey);
        }

        let keys = self.cache.get().await?;
        let jwk = match keys.find(kid) {
            Some(jwk) => jwk.clone(),
            None => match self.cache.refresh_throttled().await {
                Ok(fresh) => match fresh.find(kid) {
                    Some(jwk) => jwk.clone(),
                    None => {
                        tracing::warn!(kid = %kid, "no key set entry matches kid");
                        return Err(AuthError::UnknownKey);
                    }
                },
                Err(e) => {
                    tracing::warn!(kid = %kid, error = %e, "JWKS refetch after kid miss failed");
                    return Err(AuthError::UnknownKey);
                }
            },
        };

        match decoding_key(&jwk) {
            Some(key) => Ok((key, header.alg)),
            None => {
                tracing::warn!(kid = %kid, "matched key record is unsupported or malformed");
                Err(AuthError::UnknownKey)
            }
        }
    }
}

/// Materialize a [`DecodingKey`] from a JWK record, branching on the record's
/// algorithm family. Returns `None` for unsupported families or records with
/// missing/undecodable components.
fn decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    // Providers that omit `alg` on a key record mean RS256.
    let alg = jwk.alg.as_deref().unwrap_or("RS256");
    match KeyFamily::from_alg(alg)? {
        KeyFamily::Rsa => {
            let n = jwk.n.as_deref()?;
            let e = jwk.e.as_deref()?;
            DecodingKey::from_rsa_components(n, e).ok()
        }
        KeyFamily::EllipticCurve => {
            let x = jwk.x.as_deref()?;
            let y = jwk.y.as_deref()?;
            DecodingKey::from_ec_components(x, y).ok()
        }
    }
}

/// Check the signature only; claim validation runs afterwards in a fixed
/// order, so all of jsonwebtoken's own claim checks are switched off here.
fn verify_signature(
    token: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = Default::default();

    let data = decode::<Claims>(token, key, &validation).map_err(|e| {
        use jsonwebtoken::errors::ErrorKind;
        match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::MalformedToken
            }
            _ => AuthError::BadSignature,
        }
    })?;

    Ok(data.claims)
}

/// Build a verifier whose cache is primed with a fixed key set.
///
/// Intended for tests and key-pinning deployments; see
/// [`KeySetCache::preloaded`].
pub fn verifier_with_keys(
    keys: KeySet,
    issuer: impl Into<String>,
    audience: impl Into<String>,
) -> TokenVerifier {
    TokenVerifier::new(KeySetCache::preloaded(keys), issuer, audience)
}
