/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::services::auth::{AuthStateResolver, CookieRegistry};
use crate::services::revocation::UserDisabledStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AuthStateResolver>,
    pub cookies: CookieRegistry,
    pub session_max_age_seconds: i64,
    /// Optional: the engine works without a revocation backend.
    pub revocation: Option<Arc<dyn UserDisabledStore>>,
}

impl AppState {
    pub fn new(
        engine: Arc<AuthStateResolver>,
        cookies: CookieRegistry,
        session_max_age_seconds: i64,
        revocation: Option<Arc<dyn UserDisabledStore>>,
    ) -> Self {
        Self {
            engine,
            cookies,
            session_max_age_seconds,
            revocation,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("cookies", &self.cookies)
            .field("session_max_age_seconds", &self.session_max_age_seconds)
            .field("revocation", &self.revocation.is_some())
            .finish()
    }
}
