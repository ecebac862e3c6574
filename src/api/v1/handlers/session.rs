/*
 * Responsibility
 * - GET /session: この request の認証状態をそのまま返す (診断/フロント用)
 * - 判定は middleware 済み。ここでは extensions の RequestState を読むだけ
 */
use axum::{Extension, Json, response::IntoResponse};
use serde_json::json;

use crate::services::auth::RequestState;

pub async fn session(Extension(state): Extension<RequestState>) -> impl IntoResponse {
    Json(json!({
        "status": state.status(),
        "reason": state.reason().map(|r| r.code()),
        "uid": state.claims().map(|c| c.uid.clone()),
        "auth_time": state.claims().map(|c| c.auth_time),
    }))
}
