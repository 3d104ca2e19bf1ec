use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, Result},
    models::session::SessionRecord,
    repositories::store::SessionStore,
};

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

/// Session records in Redis under `session:{token}`, expiring with the session.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, token: &str, record: &SessionRecord, ttl_secs: u64) -> Result<()> {
        let session_json = sonic_rs::to_string(record)
            .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

        let mut redis = self.redis.clone();
        let _: () = redis
            .set_ex(session_key(token), &session_json, ttl_secs)
            .await
            .map_err(|e| {
                tracing::error!("❌ Redis set_ex failed: {}", e);
                AppError::Redis(e)
            })?;

        tracing::debug!("✅ Session saved for user: {}", record.user_id);
        Ok(())
    }

    async fn load(&self, token: &str) -> Result<Option<SessionRecord>> {
        let mut redis = self.redis.clone();
        let session_json: Option<String> = redis.get(session_key(token)).await?;

        let Some(session_json) = session_json else {
            return Ok(None);
        };

        match sonic_rs::from_str::<SessionRecord>(&session_json) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!("❌ Invalid session JSON, dropping it: {}", e);
                let _: () = redis.del(session_key(token)).await.unwrap_or(());
                Ok(None)
            }
        }
    }

    async fn remove(&self, token: &str) -> Result<()> {
        let mut redis = self.redis.clone();
        let _: () = redis.del(session_key(token)).await?;
        Ok(())
    }
}

/// Process-local session records. Sessions are lost on restart.
///
/// Expiry is enforced on load through [`SessionRecord::expires_at`].
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored sessions.
    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, token: &str, record: &SessionRecord, _ttl_secs: u64) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(token.to_string(), record.clone());
        Ok(())
    }

    async fn load(&self, token: &str) -> Result<Option<SessionRecord>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(token).cloned())
    }

    async fn remove(&self, token: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token);
        Ok(())
    }
}
