//! Per-request authentication pipeline.
//!
//! Snapshot the request (cookies/headers/query) → run the resolver → copy the
//! emitter's headers onto the response → hand `AuthCtx` to handlers via
//! request extensions. Routes themselves decide whether a signed-out request
//! is acceptable; this middleware never rejects on its own.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};
use tracing::warn;

use crate::api::v1::extractors::AuthCtx;
use crate::services::auth::request_state::{AuthReason, RequestState};
use crate::services::auth::{build_context, cookies};
use crate::state::AppState;

/// Apply the auth pipeline to every route of the given router.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, session_middleware))
}

async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ctx = build_context(
        req.headers(),
        req.method(),
        req.uri(),
        &state.cookies,
        state.session_max_age_seconds,
    );

    let mut resolved = state.engine.resolve(&ctx).await;

    tracing::debug!(
        method = %ctx.method,
        status = resolved.status(),
        origin = ctx.origin.as_deref().unwrap_or("-"),
        user_agent = ctx.user_agent.as_deref().unwrap_or("-"),
        "request auth resolved"
    );

    // Revocation is advisory and orthogonal to the state machine: a positive
    // hit downgrades the request, a backend failure does not block it.
    if let (RequestState::SignedIn { user_id, .. }, Some(store)) = (&resolved, &state.revocation) {
        match store.is_disabled(user_id).await {
            Ok(true) => {
                warn!(uid = %user_id, "signed-in user is disabled");
                resolved = RequestState::signed_out_with(AuthReason::TokenInvalid, "user is disabled");
            }
            Ok(false) => {}
            Err(err) => {
                warn!(error = %err, "revocation lookup failed, continuing");
            }
        }
    }

    let headers = cookies::emit(&resolved, &state.cookies);

    if let RequestState::SignedIn { user_id, claims, .. } = &resolved {
        req.extensions_mut()
            .insert(AuthCtx::new(user_id.clone(), claims.clone()));
    }
    req.extensions_mut().insert(resolved);

    let mut res = next.run(req).await;
    res.headers_mut().extend(headers);
    res
}
