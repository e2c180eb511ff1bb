use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;
use crate::users::{memory::MemoryUserStore, repo::PgUserStore, repo::UserStore};

/// `DATABASE_URL` prefix selecting the ephemeral in-process store.
pub const MEMORY_STORE_URL: &str = "memory:";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Builds the state from the environment. The Postgres pool is returned
    /// alongside so the caller can run migrations; it is `None` for the
    /// in-memory store.
    pub async fn init() -> anyhow::Result<(Self, Option<PgPool>)> {
        let config = Arc::new(AppConfig::from_env()?);

        if config.database_url.starts_with(MEMORY_STORE_URL) {
            tracing::warn!("using in-memory user store; data is lost on restart");
            let store = Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>;
            return Ok((Self::from_parts(store, config), None));
        }

        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let store = Arc::new(PgUserStore::new(db.clone())) as Arc<dyn UserStore>;
        Ok((Self::from_parts(store, config), Some(db)))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// In-memory store with a fixed JWT configuration.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{CorsConfig, JwtConfig, ServerConfig};

        let config = Arc::new(AppConfig {
            database_url: MEMORY_STORE_URL.into(),
            max_connections: 1,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            cors: CorsConfig {
                allowed_origin: "http://localhost:3000".into(),
            },
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            enforce_active: true,
        });
        let store = Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>;
        Self::from_parts(store, config)
    }
}
