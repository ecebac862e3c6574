//! ID-token verification.
//!
//! Two-phase by design:
//! (a) structural decode: split + base64url-decode WITHOUT trust, used for
//!     routing decisions (`kid`, `auth_time`, `iat`);
//! (b) cryptographic verify: signature against a key resolved by `kid`,
//!     then claim checks (`exp`, `nbf`, `iss`/`aud`, non-empty `sub`,
//!     algorithm allow-list).
//!
//! Reasons are a closed enum so the resolver can branch on them (notably
//! `Expired` gates refresh eligibility).

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use jsonwebtoken::{Algorithm, Validation, decode};

use crate::services::auth::claims::{DecodedClaims, IdTokenPayload};
use crate::services::auth::jwks::{KeyError, KeyProvider};
use crate::services::auth::request_state::AuthReason;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The token cannot even be parsed as a JWT.
    #[error("token is malformed")]
    Malformed,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token algorithm {0:?} is not allowed")]
    InvalidAlgorithm(Algorithm),

    #[error("token '{0}' claim does not match policy")]
    ClaimMismatch(&'static str),

    #[error("token 'sub' claim is missing or empty")]
    MissingSubject,

    #[error("no signing key found for kid {0:?}")]
    UnknownKeyId(Option<String>),

    /// Infrastructure failure, not a statement about the token.
    #[error("signing key lookup failed: {0}")]
    KeyLookup(String),
}

impl VerifyError {
    pub fn reason(&self) -> AuthReason {
        match self {
            VerifyError::Expired => AuthReason::TokenExpired,
            VerifyError::NotYetValid => AuthReason::TokenNotYetValid,
            VerifyError::InvalidAlgorithm(_) => AuthReason::TokenInvalidAlgorithm,
            VerifyError::MissingSubject => AuthReason::TokenMissingSubject,
            VerifyError::UnknownKeyId(_) => AuthReason::TokenUnknownKeyId,
            VerifyError::KeyLookup(_) => AuthReason::UnexpectedError,
            VerifyError::Malformed
            | VerifyError::InvalidSignature
            | VerifyError::ClaimMismatch(_) => AuthReason::TokenInvalid,
        }
    }
}

impl From<KeyError> for VerifyError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::NoMatchingKey(kid) => VerifyError::UnknownKeyId(kid),
            KeyError::Fetch(msg) => VerifyError::KeyLookup(msg),
            KeyError::Unsupported => VerifyError::KeyLookup("unsupported jwks key".to_string()),
        }
    }
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<DecodedClaims, VerifyError>;
}

/// Structural decode: header + payload without any trust.
///
/// The result routes decisions (timeout anchor, staleness ordering) but must
/// never be promoted to claims without a subsequent `verify`.
pub fn decode_unverified(token: &str) -> Result<(jsonwebtoken::Header, IdTokenPayload), VerifyError> {
    let header = jsonwebtoken::decode_header(token).map_err(|_| VerifyError::Malformed)?;

    let payload_b64 = token.split('.').nth(1).ok_or(VerifyError::Malformed)?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| VerifyError::Malformed)?;
    let payload: IdTokenPayload =
        serde_json::from_slice(&bytes).map_err(|_| VerifyError::Malformed)?;

    Ok((header, payload))
}

/// Short stable fingerprint for correlating a token in logs without logging it.
pub fn fingerprint(token: &str) -> String {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(token.as_bytes());
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);
    encoded[..12].to_string()
}

/// Production verifier: JWKS-resolved keys + strict claim validation.
pub struct JwtVerifier {
    keys: Arc<dyn KeyProvider>,
    issuer: String,
    audience: String,
    leeway_seconds: u64,
    allowed_algs: Vec<Algorithm>,
}

impl JwtVerifier {
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        leeway_seconds: u64,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_seconds,
            // The provider signs ID tokens with RSA; widen only deliberately.
            allowed_algs: vec![Algorithm::RS256],
        }
    }

    pub fn with_allowed_algorithms(mut self, algs: Vec<Algorithm>) -> Self {
        self.allowed_algs = algs;
        self
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<DecodedClaims, VerifyError> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| VerifyError::Malformed)?;

        // Allow-list BEFORE any key work: an attacker-chosen `alg` must not
        // influence which key material we fetch or how we use it.
        if !self.allowed_algs.contains(&header.alg) {
            return Err(VerifyError::InvalidAlgorithm(header.alg));
        }

        let (decoding_key, _) = self.keys.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = self.leeway_seconds;
        validation.validate_nbf = true;
        validation.required_spec_claims = std::collections::HashSet::from(["exp".to_string()]);

        let data = decode::<IdTokenPayload>(token, &decoding_key, &validation)
            .map_err(map_jwt_error)?;

        if data.claims.sub.trim().is_empty() {
            return Err(VerifyError::MissingSubject);
        }

        Ok(DecodedClaims::from_payload(data.claims))
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> VerifyError {
    use jsonwebtoken::errors::ErrorKind;

    match e.kind() {
        ErrorKind::ExpiredSignature => VerifyError::Expired,
        ErrorKind::ImmatureSignature => VerifyError::NotYetValid,
        ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
        ErrorKind::InvalidIssuer => VerifyError::ClaimMismatch("iss"),
        ErrorKind::InvalidAudience => VerifyError::ClaimMismatch("aud"),
        ErrorKind::MissingRequiredClaim(claim) if claim.as_str() == "sub" => {
            VerifyError::MissingSubject
        }
        ErrorKind::MissingRequiredClaim(_) => VerifyError::ClaimMismatch("exp"),
        _ => VerifyError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::DecodingKey;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn encode_segment(value: &serde_json::Value) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(value.to_string())
    }

    /// Structurally valid JWT with an arbitrary (untrusted) signature segment.
    fn unsigned_token(alg: &str, payload: serde_json::Value) -> String {
        let header = serde_json::json!({"alg": alg, "typ": "JWT", "kid": "k1"});
        format!("{}.{}.sig", encode_segment(&header), encode_segment(&payload))
    }

    struct StubKeys {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KeyProvider for StubKeys {
        async fn decoding_key(
            &self,
            kid: Option<&str>,
        ) -> Result<(DecodingKey, Algorithm), KeyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(KeyError::NoMatchingKey(kid.map(|s| s.to_string())))
        }
    }

    fn verifier(keys: Arc<StubKeys>) -> JwtVerifier {
        JwtVerifier::new(keys, "https://issuer.example.com", "tenant-a", 60)
    }

    #[test]
    fn decode_unverified_extracts_routing_claims() {
        let token = unsigned_token(
            "RS256",
            serde_json::json!({"sub": "u1", "auth_time": 100, "iat": 200, "exp": 300}),
        );
        let (header, payload) = decode_unverified(&token).expect("decodes");
        assert_eq!(header.kid.as_deref(), Some("k1"));
        assert_eq!(payload.auth_time, Some(100));
        assert_eq!(payload.iat, Some(200));
    }

    #[test]
    fn decode_unverified_rejects_garbage() {
        for bad in ["", "not-a-jwt", "a.b", "!!!.###.$$$"] {
            assert!(matches!(
                decode_unverified(bad),
                Err(VerifyError::Malformed)
            ));
        }
    }

    #[tokio::test]
    async fn disallowed_algorithm_is_rejected_before_key_lookup() {
        let keys = Arc::new(StubKeys {
            calls: AtomicUsize::new(0),
        });
        let v = verifier(keys.clone());

        let token = unsigned_token("HS256", serde_json::json!({"sub": "u1"}));
        let err = v.verify(&token).await.unwrap_err();

        assert!(matches!(err, VerifyError::InvalidAlgorithm(Algorithm::HS256)));
        assert_eq!(err.reason(), AuthReason::TokenInvalidAlgorithm);
        assert_eq!(keys.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_kid_maps_to_typed_error() {
        let keys = Arc::new(StubKeys {
            calls: AtomicUsize::new(0),
        });
        let v = verifier(keys.clone());

        let token = unsigned_token("RS256", serde_json::json!({"sub": "u1"}));
        let err = v.verify(&token).await.unwrap_err();

        assert!(matches!(err, VerifyError::UnknownKeyId(Some(ref kid)) if kid == "k1"));
        assert_eq!(err.reason(), AuthReason::TokenUnknownKeyId);
        assert_eq!(keys.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fingerprint_is_short_and_deterministic() {
        let a = fingerprint("token-a");
        assert_eq!(a.len(), 12);
        assert_eq!(a, fingerprint("token-a"));
        assert_ne!(a, fingerprint("token-b"));
    }
}
