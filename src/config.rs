/*
 * Responsibility
 * - 環境変数や設定の読み込み (identity provider, session policy, CORS 許可など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::{env, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    // Session-timeout policy, measured from auth_time / the marker cookie.
    pub session_max_age_seconds: i64,

    pub auth_issuer: String,
    pub auth_audience: String,
    pub token_leeway_seconds: u64,

    // Identity provider endpoints / credential.
    pub jwks_url: String,
    pub jwks_cache_ttl_seconds: u64,
    pub token_endpoint: String,
    pub api_key: String,

    // Revocation adapters are optional; the engine works without them.
    pub redis_url: Option<String>,
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let session_max_age_seconds = std::env::var("SESSION_MAX_AGE_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(3600); // 1 hour

        let auth_issuer =
            env::var("AUTH_ISSUER").map_err(|_| ConfigError::Missing("AUTH_ISSUER"))?;

        let auth_audience =
            env::var("AUTH_AUDIENCE").map_err(|_| ConfigError::Missing("AUTH_AUDIENCE"))?;

        let token_leeway_seconds = std::env::var("TOKEN_LEEWAY_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        let jwks_url =
            env::var("AUTH_JWKS_URL").map_err(|_| ConfigError::Missing("AUTH_JWKS_URL"))?;

        let jwks_cache_ttl_seconds = std::env::var("JWKS_CACHE_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(300); // 5 min

        let token_endpoint = env::var("AUTH_TOKEN_ENDPOINT")
            .map_err(|_| ConfigError::Missing("AUTH_TOKEN_ENDPOINT"))?;

        let api_key = env::var("AUTH_API_KEY").map_err(|_| ConfigError::Missing("AUTH_API_KEY"))?;

        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.is_empty());
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            session_max_age_seconds,
            auth_issuer,
            auth_audience,
            token_leeway_seconds,
            jwks_url,
            jwks_cache_ttl_seconds,
            token_endpoint,
            api_key,
            redis_url,
            database_url,
        })
    }
}
