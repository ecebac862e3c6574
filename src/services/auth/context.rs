//! Per-request snapshot of every auth-relevant input.
//!
//! `build_context` is a pure function over the raw request: it reads cookies,
//! headers and the query string exactly once and returns an immutable value.
//! Nothing downstream re-reads the request, so there is no partially-built
//! context and no drift between decision inputs.

use axum::http::{HeaderMap, Method, Uri, header};
use axum_extra::extract::cookie::CookieJar;

use crate::services::auth::cookies::{CookieKind, CookieRegistry};

/// Query parameter carrying the cross-domain handshake nonce.
const HANDSHAKE_QUERY_PARAM: &str = "tern_hs";

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// `Authorization: Bearer <token>`, when present. Bypasses cookie logic.
    pub bearer_token: Option<String>,

    pub id_token: Option<String>,
    pub refresh_token: Option<String>,

    /// Snapshot-only: consumed by the CSRF / sign-out flows, not by the
    /// state machine itself.
    #[allow(dead_code)]
    pub csrf_token: Option<String>,
    #[allow(dead_code)]
    pub session_cookie: Option<String>,

    /// Unsigned authentication-time marker (Unix seconds). `0` means absent.
    pub tern_auth_marker: i64,

    pub handshake_nonce_in_query: Option<String>,
    pub handshake_nonce_in_cookie: Option<String>,

    pub method: Method,
    pub session_max_age_seconds: i64,

    // Context only, not decision-bearing.
    pub origin: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

/// Build the immutable snapshot for one request.
pub fn build_context(
    headers: &HeaderMap,
    method: &Method,
    uri: &Uri,
    registry: &CookieRegistry,
    session_max_age_seconds: i64,
) -> RequestContext {
    let jar = CookieJar::from_headers(headers);

    let cookie = |kind: CookieKind| {
        jar.get(&registry.name(kind))
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    };

    RequestContext {
        bearer_token: bearer_token(headers),
        id_token: cookie(CookieKind::IdToken),
        refresh_token: cookie(CookieKind::RefreshToken),
        csrf_token: cookie(CookieKind::Csrf),
        session_cookie: cookie(CookieKind::Session),
        tern_auth_marker: parse_marker(cookie(CookieKind::AuthMarker).as_deref()),
        handshake_nonce_in_query: query_param(uri, HANDSHAKE_QUERY_PARAM),
        handshake_nonce_in_cookie: cookie(CookieKind::Handshake),
        method: method.clone(),
        session_max_age_seconds,
        origin: header_string(headers, header::ORIGIN),
        referer: header_string(headers, header::REFERER),
        user_agent: header_string(headers, header::USER_AGENT),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// A marker that does not parse as a positive integer counts as absent;
/// a garbled cookie must never look like a valid authentication time.
fn parse_marker(raw: Option<&str>) -> i64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(0)
}

fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppEnv;

    fn registry() -> CookieRegistry {
        CookieRegistry::new(AppEnv::Development)
    }

    fn headers_with_cookies(cookie_line: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, cookie_line.parse().unwrap());
        headers
    }

    #[test]
    fn reads_cookies_and_marker() {
        let headers =
            headers_with_cookies("tern_id_token=abc.def.ghi; tern_aut=1700000000; tern_refresh_token=r1");
        let ctx = build_context(
            &headers,
            &Method::GET,
            &Uri::from_static("/api/v1/session"),
            &registry(),
            3600,
        );

        assert_eq!(ctx.id_token.as_deref(), Some("abc.def.ghi"));
        assert_eq!(ctx.refresh_token.as_deref(), Some("r1"));
        assert_eq!(ctx.tern_auth_marker, 1_700_000_000);
        assert_eq!(ctx.session_max_age_seconds, 3600);
    }

    #[test]
    fn garbled_marker_counts_as_absent() {
        for bad in ["abc", "-5", "0", ""] {
            assert_eq!(parse_marker(Some(bad)), 0, "marker {bad:?}");
        }
        assert_eq!(parse_marker(None), 0);
    }

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer tok-123".parse().unwrap());
        let ctx = build_context(
            &headers,
            &Method::GET,
            &Uri::from_static("/"),
            &registry(),
            3600,
        );
        assert_eq!(ctx.bearer_token.as_deref(), Some("tok-123"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        let ctx = build_context(
            &headers,
            &Method::GET,
            &Uri::from_static("/"),
            &registry(),
            3600,
        );
        assert_eq!(ctx.bearer_token, None);
    }

    #[test]
    fn reads_handshake_nonce_from_query() {
        let headers = HeaderMap::new();
        let ctx = build_context(
            &headers,
            &Method::GET,
            &Uri::from_static("/login?tern_hs=n-42&other=x"),
            &registry(),
            3600,
        );
        assert_eq!(ctx.handshake_nonce_in_query.as_deref(), Some("n-42"));
    }

    #[test]
    fn production_registry_reads_prefixed_names() {
        let headers = headers_with_cookies("__Host-tern_aut=1700000000; tern_aut=999");
        let ctx = build_context(
            &headers,
            &Method::GET,
            &Uri::from_static("/"),
            &CookieRegistry::new(AppEnv::Production),
            3600,
        );
        // Only the prefixed name counts in production.
        assert_eq!(ctx.tern_auth_marker, 1_700_000_000);
    }
}
