use async_trait::async_trait;
use sqlx::PgPool;

use crate::repos::user_flags_repo;
use crate::services::revocation::store::{RevocationError, UserDisabledStore};

/// Postgres-backed disabled-user flags (source of truth).
///
/// A user without a flag row is not disabled.
#[derive(Clone)]
pub struct PostgresUserDisabledStore {
    db: PgPool,
}

impl PostgresUserDisabledStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDisabledStore for PostgresUserDisabledStore {
    async fn is_disabled(&self, uid: &str) -> Result<bool, RevocationError> {
        let flag = user_flags_repo::is_disabled(&self.db, uid).await?;
        Ok(flag.unwrap_or(false))
    }
}
