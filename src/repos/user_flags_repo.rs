/*
 * Responsibility
 * - userFlags テーブル向け SQLx 操作 (revocation lookup)
 * - PgPool を受け取り読み取りを提供
 * - DB エラーは RepoError に変換しやすい形で返す
 */
use sqlx::PgPool;

use crate::repos::error::RepoError;

/// Per-user disabled flag as maintained by the admin surface.
///
/// `None` means the user has no flag row at all (treated as not disabled).
pub async fn is_disabled(db: &PgPool, uid: &str) -> Result<Option<bool>, RepoError> {
    let row: Option<bool> = sqlx::query_scalar(
        r#"
        SELECT "disabled"
        FROM "userFlags"
        WHERE "uid" = $1
        "#,
    )
    .bind(uid)
    .fetch_optional(db)
    .await?;

    Ok(row)
}
