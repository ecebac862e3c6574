//! Terminal per-request authentication state.
//!
//! Exactly one `RequestState` is produced per resolution. The variants carry
//! typed cookie mutations instead of raw header strings; rendering them into
//! `Set-Cookie` / diagnostic headers is `cookies::emit`'s job, and nothing
//! re-opens a state after construction.

use crate::services::auth::claims::DecodedClaims;

/// Why a request ended up signed-out (or in a handshake).
///
/// Closed enumeration so callers can branch exhaustively; `code()` is the
/// wire form used in the `X-Auth-Reason` header and 401 bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthReason {
    /// Neither an ID-token cookie nor a marker cookie was present.
    SessionTokenAndAuthMissing,
    /// Session-timeout policy elapsed since the last verified authentication.
    AuthTimeout,
    /// A session token exists but no usable authentication-time evidence.
    SessionTokenWithoutTernAut,
    /// A marker exists but no session token, and none could be minted.
    TernAutWithoutSessionToken,
    /// The token cookie predates the marker and failed re-validation.
    SessionTokenIatBeforeTernAut,
    /// A route required authentication and the request carried none.
    SessionTokenMissing,
    UnexpectedError,

    // Verifier outcomes.
    TokenExpired,
    TokenInvalid,
    TokenInvalidAlgorithm,
    TokenNotYetValid,
    TokenUnknownKeyId,
    TokenMissingSubject,
}

impl AuthReason {
    pub fn code(&self) -> &'static str {
        match self {
            AuthReason::SessionTokenAndAuthMissing => "session_token_and_auth_missing",
            AuthReason::AuthTimeout => "auth_timeout",
            AuthReason::SessionTokenWithoutTernAut => "session_token_without_tern_aut",
            AuthReason::TernAutWithoutSessionToken => "tern_aut_without_session_token",
            AuthReason::SessionTokenIatBeforeTernAut => "session_token_iat_before_tern_aut",
            AuthReason::SessionTokenMissing => "session_token_missing",
            AuthReason::UnexpectedError => "unexpected_error",
            AuthReason::TokenExpired => "token_expired",
            AuthReason::TokenInvalid => "token_invalid",
            AuthReason::TokenInvalidAlgorithm => "token_invalid_algorithm",
            AuthReason::TokenNotYetValid => "token_not_yet_valid",
            AuthReason::TokenUnknownKeyId => "token_unknown_key_id",
            AuthReason::TokenMissingSubject => "token_missing_subject",
        }
    }
}

/// Cookie writes a resolution wants on the response.
///
/// 0-2 of these per state. Deletion is intentionally not expressible here;
/// sign-out flows clear cookies through their own explicit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieMutation {
    /// Store a freshly minted ID token.
    SetIdToken(String),
    /// Promote the authentication-time marker to a freshly *verified* auth_time.
    PromoteMarker(i64),
}

/// The single artifact surviving a resolution.
#[derive(Debug, Clone)]
pub enum RequestState {
    SignedIn {
        user_id: String,
        claims: DecodedClaims,
        token: String,
        mutations: Vec<CookieMutation>,
    },
    SignedOut {
        reason: AuthReason,
        message: Option<String>,
        mutations: Vec<CookieMutation>,
    },
    Handshake {
        reason: AuthReason,
        mutations: Vec<CookieMutation>,
    },
}

impl RequestState {
    pub fn signed_in(claims: DecodedClaims, token: impl Into<String>, mutations: Vec<CookieMutation>) -> Self {
        Self::SignedIn {
            user_id: claims.uid.clone(),
            claims,
            token: token.into(),
            mutations,
        }
    }

    pub fn signed_out(reason: AuthReason) -> Self {
        Self::SignedOut {
            reason,
            message: None,
            mutations: Vec::new(),
        }
    }

    pub fn signed_out_with(reason: AuthReason, message: impl Into<String>) -> Self {
        Self::SignedOut {
            reason,
            message: Some(message.into()),
            mutations: Vec::new(),
        }
    }

    pub fn handshake(reason: AuthReason) -> Self {
        Self::Handshake {
            reason,
            mutations: Vec::new(),
        }
    }

    /// Wire value for `X-Auth-Status`.
    pub fn status(&self) -> &'static str {
        match self {
            Self::SignedIn { .. } => "signed-in",
            Self::SignedOut { .. } => "signed-out",
            Self::Handshake { .. } => "handshake",
        }
    }

    pub fn reason(&self) -> Option<AuthReason> {
        match self {
            Self::SignedIn { .. } => None,
            Self::SignedOut { reason, .. } | Self::Handshake { reason, .. } => Some(*reason),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::SignedOut { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn mutations(&self) -> &[CookieMutation] {
        match self {
            Self::SignedIn { mutations, .. }
            | Self::SignedOut { mutations, .. }
            | Self::Handshake { mutations, .. } => mutations,
        }
    }

    pub fn claims(&self) -> Option<&DecodedClaims> {
        match self {
            Self::SignedIn { claims, .. } => Some(claims),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn sample_claims() -> DecodedClaims {
        DecodedClaims {
            uid: "user-123".to_string(),
            auth_time: 1_700_000_000,
            issued_at: 1_700_000_100,
            expires_at: 1_700_003_600,
            provider: Some("password".to_string()),
            custom: Map::new(),
        }
    }

    #[test]
    fn signed_in_copies_uid() {
        let state = RequestState::signed_in(sample_claims(), "tok", vec![]);
        match &state {
            RequestState::SignedIn { user_id, .. } => assert_eq!(user_id, "user-123"),
            other => panic!("unexpected state: {other:?}"),
        }
        assert_eq!(state.status(), "signed-in");
        assert_eq!(state.reason(), None);
    }

    #[test]
    fn signed_out_exposes_reason_and_message() {
        let state =
            RequestState::signed_out_with(AuthReason::AuthTimeout, "Authentication expired");
        assert_eq!(state.status(), "signed-out");
        assert_eq!(state.reason(), Some(AuthReason::AuthTimeout));
        assert_eq!(state.message(), Some("Authentication expired"));
        assert!(state.mutations().is_empty());
    }

    #[test]
    fn reason_codes_are_stable() {
        // These are wire values; renaming them breaks diagnostic consumers.
        assert_eq!(AuthReason::AuthTimeout.code(), "auth_timeout");
        assert_eq!(
            AuthReason::TernAutWithoutSessionToken.code(),
            "tern_aut_without_session_token"
        );
        assert_eq!(AuthReason::TokenExpired.code(), "token_expired");
    }
}
