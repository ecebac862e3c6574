/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - /health, /session, /me を nest/merge
 * - 認証必須の範囲は handler 側の extractor で決める
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{health::health, me::me, session::session};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/session", get(session))
        .route("/me", get(me))
}
