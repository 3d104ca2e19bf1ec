use std::env;
use std::net::SocketAddr;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Longest session lifetime `SESSION_DURATION_DAYS` may ask for.
pub const MAX_SESSION_DURATION_DAYS: i64 = 365;

const SECONDS_PER_DAY: u64 = 86400;

/// Parses `SESSION_DURATION_DAYS`, which must lie in `1..=MAX_SESSION_DURATION_DAYS`.
fn parse_session_duration_days(raw: &str) -> Result<i64> {
    let days: i64 = raw.trim().parse().context("Invalid SESSION_DURATION_DAYS")?;
    if !(1..=MAX_SESSION_DURATION_DAYS).contains(&days) {
        anyhow::bail!(
            "SESSION_DURATION_DAYS must be between 1 and {}, got {}",
            MAX_SESSION_DURATION_DAYS,
            days
        );
    }
    Ok(days)
}

/// Where users, interests and sessions are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL for entities, Redis for sessions.
    Postgres,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

/// Connection parameters for the PostgreSQL store.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Zeroizing<String>,
}

impl DatabaseConfig {
    /// Reads `DATABASE_URL`, or the discrete `DB_*` variables when it is unset.
    fn from_env() -> Result<Self> {
        if let Ok(url) = env::var("DATABASE_URL") {
            return Self::from_url(&url);
        }

        Ok(Self {
            host: env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("DB_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse()
                .context("Invalid DB_PORT")?,
            dbname: env::var("DB_NAME").context("DB_NAME must be set")?,
            user: env::var("DB_USERNAME").context("DB_USERNAME must be set")?,
            password: Zeroizing::new(
                env::var("DB_PASSWORD").context("DB_PASSWORD must be set")?,
            ),
        })
    }

    pub fn from_url(url: &str) -> Result<Self> {
        let pg_config: tokio_postgres::Config =
            url.parse().context("DATABASE_URL must be a valid PostgreSQL URL")?;

        let host = pg_config.get_hosts().first().and_then(|h| match h {
            tokio_postgres::config::Host::Tcp(name) => Some(name.clone()),
            _ => None,
        });

        Ok(Self {
            host: host.unwrap_or_else(|| "localhost".to_string()),
            port: pg_config.get_ports().first().copied().unwrap_or(5432),
            dbname: pg_config
                .get_dbname()
                .context("DATABASE_URL must name a database")?
                .to_string(),
            user: pg_config
                .get_user()
                .context("DATABASE_URL must name a user")?
                .to_string(),
            password: Zeroizing::new(
                pg_config
                    .get_password()
                    .map(|p| String::from_utf8_lossy(p).to_string())
                    .unwrap_or_default(),
            ),
        })
    }
}

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// Which stores back the repositories and sessions.
    pub backend: StorageBackend,
    /// The PostgreSQL connection parameters; absent for the memory backend.
    pub database: Option<DatabaseConfig>,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The duration of a session in days.
    pub session_duration_days: i64,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Whether cookies are marked `Secure`.
    pub secure_cookies: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        let backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .as_str()
        {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => anyhow::bail!("STORAGE_BACKEND must be 'postgres' or 'memory', got '{}'", other),
        };

        let database = match backend {
            StorageBackend::Postgres => Some(DatabaseConfig::from_env()?),
            StorageBackend::Memory => None,
        };

        let session_duration_days = parse_session_duration_days(
            &env::var("SESSION_DURATION_DAYS").unwrap_or_else(|_| "7".to_string()),
        )?;

        Ok(Self {
            backend,
            database,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            session_duration_days,
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            secure_cookies: env::var("APP_ENV")
                .unwrap_or_else(|_| "development".to_string())
                == "production",
        })
    }

    /// Session lifetime in seconds, used for both the Redis TTL and the cookie.
    pub fn session_ttl_secs(&self) -> u64 {
        let days = self.session_duration_days.clamp(0, MAX_SESSION_DURATION_DAYS) as u64;
        days * SECONDS_PER_DAY
    }
}
