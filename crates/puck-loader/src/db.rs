//! Database configuration and connection pool

use crate::error::{LoadError, LoadResult};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "nhl";
pub const DEFAULT_DB_USER: &str = "postgres";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: connection_url(DEFAULT_DB_HOST, DEFAULT_DB_PORT, DEFAULT_DB_NAME, DEFAULT_DB_USER, ""),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: Some(600),
        }
    }
}

impl DbConfig {
    /// Read `DATABASE_URL`, falling back to `DB_HOST`/`DB_PORT`/`DB_NAME`/`DB_USER`/`DB_PASSWORD`
    pub fn from_env() -> LoadResult<Self> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => url_from_parts()?,
        };

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        let connect_timeout_secs = std::env::var("DB_CONNECT_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

        let idle_timeout_secs = std::env::var("DB_IDLE_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok());

        let config = Self {
            url,
            max_connections,
            min_connections,
            connect_timeout_secs,
            idle_timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LoadResult<()> {
        if self.url.is_empty() {
            return Err(LoadError::config("database URL cannot be empty"));
        }
        if self.max_connections == 0 {
            return Err(LoadError::config("DB_MAX_CONNECTIONS must be greater than 0"));
        }
        if self.min_connections > self.max_connections {
            return Err(LoadError::config(format!(
                "DB_MIN_CONNECTIONS ({}) cannot exceed DB_MAX_CONNECTIONS ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

fn url_from_parts() -> LoadResult<String> {
    let host = std::env::var("DB_HOST").unwrap_or_else(|_| DEFAULT_DB_HOST.to_string());
    let port = match std::env::var("DB_PORT") {
        Ok(port) => port
            .parse()
            .map_err(|_| LoadError::config(format!("Invalid DB_PORT: {}", port)))?,
        Err(_) => DEFAULT_DB_PORT,
    };
    let name = std::env::var("DB_NAME").unwrap_or_else(|_| DEFAULT_DB_NAME.to_string());
    let user = std::env::var("DB_USER").unwrap_or_else(|_| DEFAULT_DB_USER.to_string());
    let password = std::env::var("DB_PASSWORD").unwrap_or_default();

    Ok(connection_url(&host, port, &name, &user, &password))
}

fn connection_url(host: &str, port: u16, name: &str, user: &str, password: &str) -> String {
    if password.is_empty() {
        format!("postgresql://{}@{}:{}/{}", user, host, port, name)
    } else {
        format!("postgresql://{}:{}@{}:{}/{}", user, password, host, port, name)
    }
}

pub async fn create_pool(config: &DbConfig) -> LoadResult<PgPool> {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

    if let Some(idle_timeout) = config.idle_timeout_secs {
        options = options.idle_timeout(Duration::from_secs(idle_timeout));
    }

    let pool = options
        .connect(&config.url)
        .await
        .map_err(|e| LoadError::from_sqlx("database", e))?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> LoadResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|e| LoadError::from_sqlx("database", e))
}
