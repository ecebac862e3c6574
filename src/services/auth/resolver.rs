//! The request-authentication state machine.
//!
//! `resolve` reconciles two independently-expiring trust signals (the
//! cryptographically verifiable ID-token cookie and the unsigned
//! authentication-time marker) into exactly one terminal `RequestState`,
//! without any server-side session storage.
//!
//! The branch order is load-bearing:
//! 1. `Authorization: Bearer` header bypasses cookie logic entirely
//! 2. both signals absent → signed out (or handshake) without any verifier call
//! 3. token without marker → timeout on the token's own auth_time, then
//!    verify-and-promote
//! 4. marker without token → timeout on the marker, then gated refresh
//! 5. both present → timeout on the marker, staleness ordering, verify
//!
//! Within one resolution the ordering guarantees hold: timeout check precedes
//! verification, verification precedes promotion, refresh precedes
//! re-verification. There are no retries here; retry policy belongs to the
//! HTTP client layer.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::services::auth::claims::DecodedClaims;
use crate::services::auth::context::RequestContext;
use crate::services::auth::refresh::{RefreshContext, RefreshCoordinator};
use crate::services::auth::request_state::{AuthReason, CookieMutation, RequestState};
use crate::services::auth::verifier::{TokenVerifier, VerifyError, decode_unverified, fingerprint};

/// Infrastructure failure no decision branch claims; the outer boundary folds
/// it into `SignedOut(UnexpectedError)` so callers never see an error type.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct EngineFailure(String);

pub struct AuthStateResolver {
    verifier: Arc<dyn TokenVerifier>,
    refresher: Arc<dyn RefreshCoordinator>,
}

impl AuthStateResolver {
    pub fn new(verifier: Arc<dyn TokenVerifier>, refresher: Arc<dyn RefreshCoordinator>) -> Self {
        Self {
            verifier,
            refresher,
        }
    }

    /// Resolve one request snapshot into its terminal state.
    pub async fn resolve(&self, ctx: &RequestContext) -> RequestState {
        match self.resolve_inner(ctx).await {
            Ok(state) => state,
            Err(failure) => {
                warn!(error = %failure, "authentication pipeline failed unexpectedly");
                RequestState::signed_out_with(
                    AuthReason::UnexpectedError,
                    "unexpected authentication error",
                )
            }
        }
    }

    async fn resolve_inner(&self, ctx: &RequestContext) -> Result<RequestState, EngineFailure> {
        // 1) Header bypass. Bearer callers manage their own token lifecycle:
        //    no cookie is read or written, and no refresh is attempted.
        if let Some(token) = ctx.bearer_token.as_deref() {
            return Ok(match self.verify(token).await? {
                Ok(claims) => RequestState::signed_in(claims, token, Vec::new()),
                Err(err) => {
                    debug!(token = %fingerprint(token), error = %err, "bearer token rejected");
                    RequestState::signed_out_with(err.reason(), err.to_string())
                }
            });
        }

        match (ctx.tern_auth_marker, ctx.id_token.as_deref()) {
            // 2) Neither signal present.
            (0, None) => {
                if let Some(nonce) = ctx.handshake_nonce_in_query.as_deref() {
                    // Cross-domain sync in flight; the cookie half of the
                    // nonce pair, when present, must agree with the query.
                    let cookie_agrees = ctx
                        .handshake_nonce_in_cookie
                        .as_deref()
                        .is_none_or(|c| c == nonce);
                    if cookie_agrees {
                        return Ok(RequestState::handshake(
                            AuthReason::SessionTokenAndAuthMissing,
                        ));
                    }
                }
                Ok(RequestState::signed_out(
                    AuthReason::SessionTokenAndAuthMissing,
                ))
            }
            (0, Some(token)) => self.resolve_token_without_marker(ctx, token).await,
            (_, None) => self.resolve_marker_without_token(ctx).await,
            (_, Some(token)) => self.resolve_token_and_marker(ctx, token).await,
        }
    }

    /// 3) Token present, marker absent: first request after sign-in, or the
    /// marker cookie was lost. Timeout runs against the token's own auth_time;
    /// a successful verification promotes that auth_time into the marker.
    async fn resolve_token_without_marker(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<RequestState, EngineFailure> {
        let payload = match decode_unverified(token) {
            Ok((_, payload)) => payload,
            Err(err) => {
                return Ok(RequestState::signed_out_with(err.reason(), err.to_string()));
            }
        };

        let auth_time = payload.auth_time.unwrap_or(0);
        if auth_time > 0 && session_expired(auth_time, ctx.session_max_age_seconds) {
            return Ok(RequestState::signed_out_with(
                AuthReason::AuthTimeout,
                "Authentication expired",
            ));
        }

        match self.verify(token).await? {
            Ok(claims) => Ok(promote(claims, token)),
            Err(VerifyError::Expired) => {
                self.try_refresh(ctx, AuthReason::TokenExpired, "token has expired")
                    .await
            }
            Err(err) => Ok(RequestState::signed_out_with(err.reason(), err.to_string())),
        }
    }

    /// 4) Marker present, token absent. An expired session is never silently
    /// extended: the timeout check runs before any refresh. A missing token
    /// inside a live session is expired session evidence, so it goes through
    /// the same gated refresh as any `Expired` verification outcome.
    async fn resolve_marker_without_token(
        &self,
        ctx: &RequestContext,
    ) -> Result<RequestState, EngineFailure> {
        if session_expired(ctx.tern_auth_marker, ctx.session_max_age_seconds) {
            return Ok(RequestState::signed_out_with(
                AuthReason::AuthTimeout,
                "Authentication expired",
            ));
        }

        self.try_refresh(
            ctx,
            AuthReason::TernAutWithoutSessionToken,
            "no session token for a live authentication marker",
        )
        .await
    }

    /// 5) Both present. Timeout against the marker first; then the staleness
    /// ordering decides between re-promotion and the cheap no-op path.
    async fn resolve_token_and_marker(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<RequestState, EngineFailure> {
        let marker = ctx.tern_auth_marker;

        if session_expired(marker, ctx.session_max_age_seconds) {
            return Ok(RequestState::signed_out_with(
                AuthReason::AuthTimeout,
                "Authentication expired",
            ));
        }

        let payload = match decode_unverified(token) {
            Ok((_, payload)) => payload,
            Err(err) => {
                return Ok(RequestState::signed_out_with(err.reason(), err.to_string()));
            }
        };

        if payload.iat.unwrap_or(0) < marker {
            // Stale evidence: the cookie predates the trust marker (an old
            // token lingering after a marker update). The marker already
            // vouched for freshness, so there is no second timeout check,
            // but the stale token must re-verify before it is trusted.
            return Ok(match self.verify(token).await? {
                Ok(claims) => promote(claims, token),
                Err(VerifyError::Expired) => {
                    return self
                        .try_refresh(ctx, AuthReason::TokenExpired, "token has expired")
                        .await;
                }
                Err(err) => {
                    debug!(token = %fingerprint(token), error = %err, "stale token failed re-validation");
                    RequestState::signed_out_with(
                        AuthReason::SessionTokenIatBeforeTernAut,
                        format!("stale ID token failed re-validation: {err}"),
                    )
                }
            });
        }

        // Steady state: verify and return without rewriting any cookie.
        match self.verify(token).await? {
            Ok(claims) => Ok(RequestState::signed_in(claims, token, Vec::new())),
            Err(VerifyError::Expired) => {
                self.try_refresh(ctx, AuthReason::TokenExpired, "token has expired")
                    .await
            }
            Err(err) => Ok(RequestState::signed_out_with(err.reason(), err.to_string())),
        }
    }

    /// Single chokepoint for the refresh-eligibility constraint: every caller
    /// reaches this with an `Expired`-class trigger, and the method/cookie
    /// gates are enforced here. Violating any gate signs out without a
    /// network call.
    async fn try_refresh(
        &self,
        ctx: &RequestContext,
        ineligible_reason: AuthReason,
        ineligible_message: &str,
    ) -> Result<RequestState, EngineFailure> {
        if ctx.method != axum::http::Method::GET {
            // Never mint a new credential under a mutating request.
            return Ok(RequestState::signed_out_with(
                ineligible_reason,
                ineligible_message,
            ));
        }

        let Some(refresh_token) = ctx.refresh_token.as_deref() else {
            return Ok(RequestState::signed_out_with(
                ineligible_reason,
                ineligible_message,
            ));
        };

        let refresh_ctx = RefreshContext {
            referer: ctx.referer.clone(),
        };

        let minted = match self.refresher.refresh(refresh_token, &refresh_ctx).await {
            Ok(minted) => minted,
            Err(err) => {
                warn!(error = %err, "id token refresh failed");
                return Ok(RequestState::signed_out_with(
                    AuthReason::TernAutWithoutSessionToken,
                    "Failed to refresh idToken",
                ));
            }
        };

        // Defense in depth: the exchange endpoint's output is never trusted
        // until the verifier has seen it.
        match self.verify(&minted.id_token).await? {
            Ok(claims) => {
                debug!(uid = %claims.uid, token = %fingerprint(&minted.id_token), "id token refreshed");
                Ok(RequestState::signed_in(
                    claims,
                    minted.id_token.clone(),
                    vec![CookieMutation::SetIdToken(minted.id_token)],
                ))
            }
            Err(err) => {
                warn!(error = %err, "refreshed id token failed verification");
                Ok(RequestState::signed_out_with(err.reason(), err.to_string()))
            }
        }
    }

    /// Split infrastructure failures (key lookup) from typed verification
    /// outcomes so the branches only ever see decisions about the token.
    async fn verify(
        &self,
        token: &str,
    ) -> Result<Result<DecodedClaims, VerifyError>, EngineFailure> {
        match self.verifier.verify(token).await {
            Ok(claims) => Ok(Ok(claims)),
            Err(VerifyError::KeyLookup(msg)) => Err(EngineFailure(msg)),
            Err(err) => Ok(Err(err)),
        }
    }
}

/// Signed in + marker promotion. A token whose verified claims carry no
/// auth_time cannot establish a marker we could later re-validate against.
fn promote(claims: DecodedClaims, token: &str) -> RequestState {
    if claims.auth_time == 0 {
        return RequestState::signed_out_with(
            AuthReason::SessionTokenWithoutTernAut,
            "ID token carries no auth_time",
        );
    }
    let auth_time = claims.auth_time;
    RequestState::signed_in(claims, token, vec![CookieMutation::PromoteMarker(auth_time)])
}

fn session_expired(anchor_seconds: i64, max_age_seconds: i64) -> bool {
    chrono::Utc::now().timestamp() - anchor_seconds > max_age_seconds
}
