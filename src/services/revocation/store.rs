use async_trait::async_trait;

use crate::repos::error::RepoError;
use crate::services::cache::CacheError;

/// Revoked/disabled-user lookup.
///
/// Consulted after a signed-in resolution, orthogonally to the state machine.
/// Returns:
/// - `Ok(true)`  => the user has been disabled; do not serve them
/// - `Ok(false)` => no revocation on record
/// - `Err(_)`    => backend failure (callers fail open with a warning)
#[async_trait]
pub trait UserDisabledStore: Send + Sync {
    async fn is_disabled(&self, uid: &str) -> Result<bool, RevocationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}
