/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が解決して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - state machine / cookie の詳細は services/auth 側の責務
 * - ここは「型（契約）」として固定化する
 */

use crate::services::auth::claims::DecodedClaims;

/// 認証済みのリクエストに付与されるコンテキスト
///
/// - `user_id` は identity provider の `sub`（provider 発番の文字列 ID）
/// - `claims` は検証済みトークンの内容（custom claims 含む）
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub user_id: String,
    pub claims: DecodedClaims,
}

impl AuthCtx {
    pub fn new(user_id: String, claims: DecodedClaims) -> Self {
        Self { user_id, claims }
    }
}
