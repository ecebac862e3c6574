/*
 * Responsibility
 * - Config読み込み → 依存生成 → Router 組み立て
 * - Middleware の適用 (CORS/session pipeline など)
 * - axum::serve() で起動
 */
use std::time::Duration;
use std::{panic, process, sync::Arc};

use anyhow::Result;
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::auth::jwks::JwksKeyProvider;
use crate::services::auth::refresh::{IdentityClient, IdentityCredential};
use crate::services::auth::verifier::JwtVerifier;
use crate::services::auth::{AuthStateResolver, CookieRegistry};
use crate::services::revocation::{
    PostgresUserDisabledStore, UserDisabledStore, ValkeyUserDisabledStore,
};
use crate::state::AppState;
use crate::{api, middleware};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,tern_auth=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing so they don't get "lost"
        // (stderr can be hidden depending on how the process is launched.)
        tracing::error!(?info, "panic");

        // In development, fail fast: crash the whole process so we notice immediately.
        // In production, prefer the default behavior (stderr) and let the server keep running.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    let abort_on_panic = !config.app_env.is_production();
    init_panic_hook(abort_on_panic);

    tracing::info!(
        "starting auth gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    // Process-level collaborators, constructed once and injected. No
    // module-level singletons: everything the resolver touches arrives here.
    let keys = Arc::new(
        JwksKeyProvider::new(&config.jwks_url)
            .with_cache_ttl(Duration::from_secs(config.jwks_cache_ttl_seconds)),
    );

    let verifier = Arc::new(JwtVerifier::new(
        keys,
        &config.auth_issuer,
        &config.auth_audience,
        config.token_leeway_seconds,
    ));

    let refresher = Arc::new(IdentityClient::new(IdentityCredential {
        token_endpoint: config.token_endpoint.clone(),
        api_key: config.api_key.clone(),
    }));

    let engine = Arc::new(AuthStateResolver::new(verifier, refresher));

    let revocation: Option<Arc<dyn UserDisabledStore>> = if let Some(url) = &config.redis_url {
        let store = ValkeyUserDisabledStore::new(url).await?;
        Some(Arc::new(store))
    } else if let Some(url) = &config.database_url {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Some(Arc::new(PostgresUserDisabledStore::new(pool)))
    } else {
        tracing::info!("no revocation backend configured");
        None
    };

    Ok(AppState::new(
        engine,
        CookieRegistry::new(config.app_env),
        config.session_max_age_seconds,
        revocation,
    ))
}

fn build_router(state: AppState, config: &Config) -> Router {
    let v1 = middleware::session::apply(api::v1::routes(), state.clone());

    let router = Router::new().nest("/api/v1", v1).with_state(state);

    let router = middleware::cors::apply(router, config);
    let router = middleware::security_headers::apply(router);
    middleware::http::apply(router)
}
