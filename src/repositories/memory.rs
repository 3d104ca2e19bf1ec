//! In-memory users, interests and associations.
//!
//! Mirrors the PostgreSQL schema closely enough to stand in for it: unique
//! email and name, a composite key on the association table, cascading
//! deletes, and left-join row shapes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, Result},
    models::{
        interest::InterestUserRow,
        user::{NewUser, StoredCredentials, User, UserInterestRow},
    },
    repositories::store::{InterestStore, UserStore},
};

#[derive(Clone)]
struct UserRecord {
    username: String,
    email: String,
    avatar: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone)]
struct InterestRecord {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, UserRecord>,
    interests: BTreeMap<i64, InterestRecord>,
    /// (user_id, interest_id)
    links: BTreeSet<(i64, i64)>,
    last_user_id: i64,
    last_interest_id: i64,
}

impl Tables {
    fn user_rows(&self, id: i64, user: &UserRecord) -> Vec<UserInterestRow> {
        let mut interests: Vec<(i64, &str)> = self
            .links
            .iter()
            .filter(|(user_id, _)| *user_id == id)
            .filter_map(|(_, interest_id)| {
                self.interests
                    .get(interest_id)
                    .map(|i| (*interest_id, i.name.as_str()))
            })
            .collect();
        interests.sort_by(|a, b| a.1.cmp(b.1));

        let row = |interest_id: Option<i64>, interest_name: Option<String>| UserInterestRow {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            password_hash: user.password_hash.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            interest_id,
            interest_name,
        };

        if interests.is_empty() {
            return vec![row(None, None)];
        }
        interests
            .into_iter()
            .map(|(interest_id, name)| row(Some(interest_id), Some(name.to_string())))
            .collect()
    }

    fn interest_rows(&self, id: i64, interest: &InterestRecord) -> Vec<InterestUserRow> {
        let user_ids: Vec<i64> = self
            .links
            .iter()
            .filter(|(_, interest_id)| *interest_id == id)
            .map(|(user_id, _)| *user_id)
            .collect();

        let row = |user_id: Option<i64>| InterestUserRow {
            id,
            name: interest.name.clone(),
            created_at: interest.created_at,
            updated_at: interest.updated_at,
            user_id,
        };

        if user_ids.is_empty() {
            return vec![row(None)];
        }
        user_ids.into_iter().map(|u| row(Some(u))).collect()
    }

    fn email_taken_by_other(&self, email: &str, id: Option<i64>) -> bool {
        self.users
            .iter()
            .any(|(other, u)| u.email == email && Some(*other) != id)
    }

    fn name_taken_by_other(&self, name: &str, id: Option<i64>) -> bool {
        self.interests
            .iter()
            .any(|(other, i)| i.name == name && Some(*other) != id)
    }
}

/// Process-local store implementing both [`UserStore`] and [`InterestStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert(&self, user: &NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.email_taken_by_other(&user.email, None) {
            return Err(AppError::DuplicateEntity("users_email_key".to_string()));
        }

        tables.last_user_id += 1;
        let id = tables.last_user_id;
        let now = Utc::now();
        tables.users.insert(
            id,
            UserRecord {
                username: user.username.clone(),
                email: user.email.clone(),
                avatar: user.avatar.clone(),
                password_hash: user.password_hash.clone(),
                created_at: now,
                updated_at: now,
            },
        );

        Ok(User {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            password_hash: user.password_hash.clone(),
            created_at: now,
            updated_at: now,
            interests: Vec::new(),
        })
    }

    async fn credentials_by_email(&self, email: &str) -> Result<Option<StoredCredentials>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|(_, u)| u.email == email)
            .map(|(id, u)| StoredCredentials {
                id: *id,
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.tables.read().await.email_taken_by_other(email, None))
    }

    async fn rows_by_id(&self, id: i64) -> Result<Vec<UserInterestRow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .get(&id)
            .map(|u| tables.user_rows(id, u))
            .unwrap_or_default())
    }

    async fn all_rows(&self) -> Result<Vec<UserInterestRow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .flat_map(|(id, u)| tables.user_rows(*id, u))
            .collect())
    }

    async fn update(&self, user: &User) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Ok(false);
        }
        if tables.email_taken_by_other(&user.email, Some(user.id)) {
            return Err(AppError::DuplicateEntity("users_email_key".to_string()));
        }

        if let Some(record) = tables.users.get_mut(&user.id) {
            record.username = user.username.clone();
            record.email = user.email.clone();
            record.avatar = user.avatar.clone();
            record.password_hash = user.password_hash.clone();
            record.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.users.remove(&id).is_some();
        tables.links.retain(|(user_id, _)| *user_id != id);
        Ok(removed)
    }

    async fn link_interest(&self, user_id: i64, interest_id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) || !tables.interests.contains_key(&interest_id) {
            return Err(AppError::NotFound);
        }
        if !tables.links.insert((user_id, interest_id)) {
            return Err(AppError::DuplicateEntity("users_interests_pkey".to_string()));
        }
        Ok(true)
    }

    async fn unlink_interest(&self, user_id: i64, interest_id: i64) -> Result<bool> {
        Ok(self.tables.write().await.links.remove(&(user_id, interest_id)))
    }
}

#[async_trait]
impl InterestStore for MemoryStore {
    async fn insert(&self, name: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.name_taken_by_other(name, None) {
            return Err(AppError::DuplicateEntity("interests_name_key".to_string()));
        }

        tables.last_interest_id += 1;
        let id = tables.last_interest_id;
        let now = Utc::now();
        tables.interests.insert(
            id,
            InterestRecord {
                name: name.to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn rows_by_id(&self, id: i64) -> Result<Vec<InterestUserRow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .interests
            .get(&id)
            .map(|i| tables.interest_rows(id, i))
            .unwrap_or_default())
    }

    async fn all_rows(&self) -> Result<Vec<InterestUserRow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .interests
            .iter()
            .flat_map(|(id, i)| tables.interest_rows(*id, i))
            .collect())
    }

    async fn rename(&self, id: i64, name: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.interests.contains_key(&id) {
            return Ok(false);
        }
        if tables.name_taken_by_other(name, Some(id)) {
            return Err(AppError::DuplicateEntity("interests_name_key".to_string()));
        }

        if let Some(record) = tables.interests.get_mut(&id) {
            record.name = name.to_string();
            record.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.interests.remove(&id).is_some();
        tables.links.retain(|(_, interest_id)| *interest_id != id);
        Ok(removed)
    }

    async fn name_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tables.read().await.name_taken_by_other(name, None))
    }
}
