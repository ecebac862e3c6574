//! Typed cookie registry + response-header emitter.
//!
//! Cookie names are not built by ad-hoc string concatenation at call sites:
//! every `(logical cookie, environment)` pair resolves here, so both the dev
//! and production (`__Host-` prefixed) forms are unit-testable in one place.
//!
//! `emit` is the only component that renders a `RequestState` into headers.
//! It never deletes cookies; sign-out clearing is a separate explicit flow.

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration as TimeDuration;

use crate::config::AppEnv;
use crate::services::auth::request_state::{CookieMutation, RequestState};

pub const X_AUTH_STATUS: &str = "x-auth-status";
pub const X_AUTH_REASON: &str = "x-auth-reason";
pub const X_AUTH_MESSAGE: &str = "x-auth-message";

/// Marker cookie lifetime. The marker only carries a timestamp, so a long
/// lifetime is safe; session-timeout policy is enforced from its *value*.
const MARKER_MAX_AGE: TimeDuration = TimeDuration::days(365);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieKind {
    IdToken,
    RefreshToken,
    Csrf,
    Session,
    /// Unsigned authentication-time marker (integer Unix seconds).
    AuthMarker,
    Handshake,
}

impl CookieKind {
    fn suffix(&self) -> &'static str {
        match self {
            CookieKind::IdToken => "tern_id_token",
            CookieKind::RefreshToken => "tern_refresh_token",
            CookieKind::Csrf => "tern_csrf",
            CookieKind::Session => "tern_session",
            CookieKind::AuthMarker => "tern_aut",
            CookieKind::Handshake => "tern_handshake",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CookieRegistry {
    env: AppEnv,
}

impl CookieRegistry {
    pub fn new(env: AppEnv) -> Self {
        Self { env }
    }

    /// Concrete cookie name for this environment.
    ///
    /// Production names carry the `__Host-` prefix, which browsers only accept
    /// with `Secure` + `Path=/` and no `Domain`, which is how we build them.
    pub fn name(&self, kind: CookieKind) -> String {
        if self.env.is_production() {
            format!("__Host-{}", kind.suffix())
        } else {
            kind.suffix().to_string()
        }
    }

    fn secure(&self) -> bool {
        // Dev runs over plain http on localhost.
        self.env.is_production()
    }

    /// Render one mutation into a concrete cookie.
    ///
    /// - ID token: `HttpOnly`, it is a credential.
    /// - Marker: NOT `HttpOnly`; it carries no secret (only a timestamp) and
    ///   client scripts read it to anticipate session expiry.
    pub fn render(&self, mutation: &CookieMutation) -> Cookie<'static> {
        match mutation {
            CookieMutation::SetIdToken(token) => {
                Cookie::build((self.name(CookieKind::IdToken), token.clone()))
                    .path("/")
                    .http_only(true)
                    .secure(self.secure())
                    .same_site(SameSite::Strict)
                    .build()
            }
            CookieMutation::PromoteMarker(auth_time) => {
                Cookie::build((self.name(CookieKind::AuthMarker), auth_time.to_string()))
                    .path("/")
                    .secure(self.secure())
                    .same_site(SameSite::Strict)
                    .max_age(MARKER_MAX_AGE)
                    .build()
            }
        }
    }
}

/// Pure `RequestState -> response headers`.
///
/// Always emits the diagnostic trio; appends 0-2 `Set-Cookie` values for the
/// state's mutations.
pub fn emit(state: &RequestState, registry: &CookieRegistry) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(
        HeaderName::from_static(X_AUTH_STATUS),
        HeaderValue::from_static(state.status()),
    );

    if let Some(reason) = state.reason() {
        headers.insert(
            HeaderName::from_static(X_AUTH_REASON),
            HeaderValue::from_static(reason.code()),
        );
    }

    if let Some(message) = state.message() {
        // Messages are diagnostic; drop one that does not fit a header value
        // rather than failing the response.
        if let Ok(value) = HeaderValue::from_str(message) {
            headers.insert(HeaderName::from_static(X_AUTH_MESSAGE), value);
        }
    }

    for mutation in state.mutations() {
        let cookie = registry.render(mutation);
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            headers.append(header::SET_COOKIE, value);
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::request_state::AuthReason;

    #[test]
    fn dev_names_have_no_prefix() {
        let registry = CookieRegistry::new(AppEnv::Development);
        assert_eq!(registry.name(CookieKind::IdToken), "tern_id_token");
        assert_eq!(registry.name(CookieKind::AuthMarker), "tern_aut");
    }

    #[test]
    fn production_names_are_host_locked() {
        let registry = CookieRegistry::new(AppEnv::Production);
        assert_eq!(registry.name(CookieKind::IdToken), "__Host-tern_id_token");
        assert_eq!(registry.name(CookieKind::RefreshToken), "__Host-tern_refresh_token");
        assert_eq!(registry.name(CookieKind::AuthMarker), "__Host-tern_aut");
    }

    #[test]
    fn id_token_cookie_is_http_only_strict() {
        let registry = CookieRegistry::new(AppEnv::Production);
        let cookie = registry.render(&CookieMutation::SetIdToken("tok".to_string()));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn marker_cookie_is_readable_by_scripts() {
        let registry = CookieRegistry::new(AppEnv::Production);
        let cookie = registry.render(&CookieMutation::PromoteMarker(1_700_000_000));
        // No secret inside, so HttpOnly stays off.
        assert_ne!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(MARKER_MAX_AGE));
        assert_eq!(cookie.value(), "1700000000");
    }

    #[test]
    fn emit_sets_diagnostic_headers() {
        let registry = CookieRegistry::new(AppEnv::Development);
        let state =
            RequestState::signed_out_with(AuthReason::AuthTimeout, "Authentication expired");
        let headers = emit(&state, &registry);

        assert_eq!(headers.get(X_AUTH_STATUS).unwrap(), "signed-out");
        assert_eq!(headers.get(X_AUTH_REASON).unwrap(), "auth_timeout");
        assert_eq!(headers.get(X_AUTH_MESSAGE).unwrap(), "Authentication expired");
        assert!(headers.get(header::SET_COOKIE).is_none());
    }

    #[test]
    fn emit_renders_marker_promotion() {
        let registry = CookieRegistry::new(AppEnv::Development);
        let state = RequestState::SignedOut {
            reason: AuthReason::AuthTimeout,
            message: None,
            mutations: vec![CookieMutation::PromoteMarker(42)],
        };
        let headers = emit(&state, &registry);

        let set_cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("tern_aut=42"));
        assert!(set_cookie.contains("SameSite=Strict"));
    }
}
