use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::{
    config::{Config, StorageBackend},
    error::{AppError, Result},
    repositories::{
        interest::InterestRepository,
        memory::MemoryStore,
        postgres::PgStore,
        session::{InMemorySessionStore, RedisSessionStore},
        store::{InterestStore, SessionStore, UserStore},
        user::{UserRepository, placeholder_hash},
    },
    services::session::CookiePolicy,
};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// Users and their interests.
    pub users: UserRepository,
    /// Interests and their users.
    pub interests: InterestRepository,
    /// Server-side session records.
    pub sessions: Arc<dyn SessionStore>,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Creates a new `AppState` on the backend named by `config`.
    pub async fn new(config: &Config) -> Result<Self> {
        placeholder_hash()?;
        tracing::info!("✅ Login placeholder hash prepared");

        match config.backend {
            StorageBackend::Postgres => Self::connect(config).await,
            StorageBackend::Memory => {
                tracing::warn!("⚠️ In-memory storage: nothing survives a restart");
                Ok(Self::in_memory(config.clone()))
            }
        }
    }

    async fn connect(config: &Config) -> Result<Self> {
        let database = config
            .database
            .as_ref()
            .ok_or_else(|| AppError::Internal("PostgreSQL backend without database settings".to_string()))?;

        let pool = crate::db::create_pool(database)?;
        tracing::info!("✅ PostgreSQL Pool initialized with deadpool-postgres");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis Connection Manager initialized");

        let store = Arc::new(PgStore::new(pool)?);
        Ok(Self {
            users: UserRepository::new(store.clone() as Arc<dyn UserStore>),
            interests: InterestRepository::new(store as Arc<dyn InterestStore>),
            sessions: Arc::new(RedisSessionStore::new(redis)),
            config: config.clone(),
        })
    }

    /// State backed by process-local stores.
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: UserRepository::new(store.clone() as Arc<dyn UserStore>),
            interests: InterestRepository::new(store as Arc<dyn InterestStore>),
            sessions: Arc::new(InMemorySessionStore::new()),
            config,
        }
    }

    pub fn cookie_policy(&self) -> CookiePolicy {
        CookiePolicy {
            ttl_secs: self.config.session_ttl_secs(),
            secure: self.config.secure_cookies,
        }
    }
}
