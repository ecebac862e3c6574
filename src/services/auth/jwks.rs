//! Signing-key resolution for ID-token verification.
//!
//! The provider's keys rotate, so lookups go through `KeyProvider` and the
//! JWKS implementation caches the fetched set with a TTL. Without the cache
//! every verification would trigger a remote fetch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("jwks fetch failed: {0}")]
    Fetch(String),

    #[error("no signing key matches kid {0:?}")]
    NoMatchingKey(Option<String>),

    #[error("unsupported key type in jwks")]
    Unsupported,
}

/// Resolves a `kid` from a token header to a decoding key.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn decoding_key(&self, kid: Option<&str>) -> Result<(DecodingKey, Algorithm), KeyError>;
}

struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// JWKS-backed `KeyProvider` with a TTL cache.
#[derive(Clone)]
pub struct JwksKeyProvider {
    jwks_url: String,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    client: reqwest::Client,
}

impl JwksKeyProvider {
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    async fn get_jwks(&self) -> Result<JwkSet, KeyError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(entry.jwks.clone());
                }
            }
        }

        let jwks = self.fetch_jwks().await?;

        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });

        Ok(jwks)
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, KeyError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| KeyError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeyError::Fetch(format!(
                "HTTP {} from jwks endpoint",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeyError::Fetch(e.to_string()))
    }

    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        match &*cache {
            Some(entry) => entry.fetched_at.elapsed() < self.cache_ttl,
            None => false,
        }
    }
}

#[async_trait]
impl KeyProvider for JwksKeyProvider {
    async fn decoding_key(&self, kid: Option<&str>) -> Result<(DecodingKey, Algorithm), KeyError> {
        let jwks = self.get_jwks().await?;

        let jwk = match kid {
            Some(kid) => jwks
                .keys
                .iter()
                .find(|k| k.common.key_id.as_deref() == Some(kid))
                .ok_or_else(|| KeyError::NoMatchingKey(Some(kid.to_string())))?,
            // Tokens without a kid only work while the set has a single usable key.
            None => jwks
                .keys
                .first()
                .ok_or(KeyError::NoMatchingKey(None))?,
        };

        jwk_to_decoding_key(jwk)
    }
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), KeyError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|_| KeyError::Unsupported)?;

            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                _ => Algorithm::RS256,
            };

            Ok((key, alg))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|_| KeyError::Unsupported)?;

            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::ES384) => Algorithm::ES384,
                _ => Algorithm::ES256,
            };

            Ok((key, alg))
        }
        _ => Err(KeyError::Unsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_initially_empty() {
        let provider = JwksKeyProvider::new("https://id.example.com/.well-known/jwks.json");
        assert!(!provider.is_cached().await);
    }

    #[test]
    fn custom_cache_ttl() {
        let provider = JwksKeyProvider::new("https://id.example.com/jwks")
            .with_cache_ttl(Duration::from_secs(60));
        assert_eq!(provider.cache_ttl, Duration::from_secs(60));
    }
}
