use serde::Deserialize;
use serde_json::{Map, Value};

/// ID-token payload as minted by the identity provider.
///
/// NOTE:
/// - `aud` in JWT can be either string or array; jsonwebtoken validates it via `Validation::set_audience`.
/// - Everything except `sub` is optional at the *structural* level so that an
///   unsigned decode can still extract `auth_time` / `iat` for routing
///   decisions. The cryptographic verify enforces the required claims.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenPayload {
    /// Empty when the provider omitted it; the verifier rejects that case.
    #[serde(default)]
    pub sub: String,

    // Keep as Value to accept both string and array. Validated by
    // jsonwebtoken via `set_audience`, not read directly.
    #[allow(dead_code)]
    #[serde(default)]
    pub aud: Value,

    #[allow(dead_code)]
    #[serde(default)]
    pub iss: Option<String>,

    /// Time the user last actively authenticated (Unix seconds).
    #[serde(default)]
    pub auth_time: Option<i64>,

    /// Time this specific token was minted (Unix seconds).
    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(default)]
    pub exp: Option<i64>,

    #[allow(dead_code)]
    #[serde(default)]
    pub nbf: Option<i64>,

    /// Provider that performed the sign-in ("password", "google.com", ...).
    #[serde(default)]
    pub sign_in_provider: Option<String>,

    // Tenant-defined custom claims ride along untyped.
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

/// Verified claims in the shape the rest of the application consumes.
///
/// - `auth_time` / `issued_at` are `0` when the provider omitted them; callers
///   treat `0` as "absent", same convention as the marker cookie.
#[derive(Debug, Clone)]
pub struct DecodedClaims {
    pub uid: String,
    pub auth_time: i64,
    pub issued_at: i64,
    pub expires_at: i64,
    pub provider: Option<String>,
    pub custom: Map<String, Value>,
}

impl DecodedClaims {
    pub fn from_payload(payload: IdTokenPayload) -> Self {
        Self {
            uid: payload.sub,
            auth_time: payload.auth_time.unwrap_or(0),
            issued_at: payload.iat.unwrap_or(0),
            expires_at: payload.exp.unwrap_or(0),
            provider: payload.sign_in_provider,
            custom: payload.custom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> IdTokenPayload {
        serde_json::from_value(serde_json::json!({
            "sub": "user-123",
            "iss": "https://issuer.example.com",
            "aud": "tenant-a",
            "auth_time": 1_700_000_000,
            "iat": 1_700_000_100,
            "exp": 1_700_003_600,
            "sign_in_provider": "password",
            "role": "editor"
        }))
        .expect("payload deserializes")
    }

    #[test]
    fn from_payload_maps_core_claims() {
        let claims = DecodedClaims::from_payload(sample_payload());
        assert_eq!(claims.uid, "user-123");
        assert_eq!(claims.auth_time, 1_700_000_000);
        assert_eq!(claims.issued_at, 1_700_000_100);
        assert_eq!(claims.expires_at, 1_700_003_600);
        assert_eq!(claims.provider.as_deref(), Some("password"));
    }

    #[test]
    fn custom_claims_are_preserved() {
        let claims = DecodedClaims::from_payload(sample_payload());
        assert_eq!(claims.custom.get("role"), Some(&Value::from("editor")));
    }

    #[test]
    fn missing_timestamps_default_to_zero() {
        let payload: IdTokenPayload =
            serde_json::from_value(serde_json::json!({ "sub": "user-123" })).unwrap();
        let claims = DecodedClaims::from_payload(payload);
        assert_eq!(claims.auth_time, 0);
        assert_eq!(claims.issued_at, 0);
        assert_eq!(claims.expires_at, 0);
    }
}
