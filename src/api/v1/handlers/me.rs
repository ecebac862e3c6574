/*
 * Responsibility
 * - GET /me: 認証必須の例。AuthCtx extractor 経由でのみ claims に触る
 */
use axum::{Json, response::IntoResponse};
use serde_json::json;

use crate::api::v1::extractors::AuthCtxExtractor;

pub async fn me(AuthCtxExtractor(ctx): AuthCtxExtractor) -> impl IntoResponse {
    Json(json!({
        "uid": ctx.user_id,
        "auth_time": ctx.claims.auth_time,
        "provider": ctx.claims.provider,
        "claims": ctx.claims.custom,
    }))
}
