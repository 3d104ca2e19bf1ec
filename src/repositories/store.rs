//! Persistence capabilities behind the repositories.
//!
//! Stores return flat typed rows; grouping joined rows into entities happens
//! once, in the repositories, whichever store is plugged in.

use async_trait::async_trait;

use crate::{
    error::Result,
    models::{
        interest::InterestUserRow,
        session::SessionRecord,
        user::{NewUser, StoredCredentials, User, UserInterestRow},
    },
};

/// Row-level access to `users` and `users_interests`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user. A taken email is `AppError::DuplicateEntity`.
    async fn insert(&self, user: &NewUser) -> Result<User>;

    async fn credentials_by_email(&self, email: &str) -> Result<Option<StoredCredentials>>;

    async fn email_exists(&self, email: &str) -> Result<bool>;

    /// Joined rows for one user; empty when the user does not exist.
    async fn rows_by_id(&self, id: i64) -> Result<Vec<UserInterestRow>>;

    /// Joined rows for every user, ordered by user id.
    async fn all_rows(&self) -> Result<Vec<UserInterestRow>>;

    /// Rewrites username, email, avatar and password hash.
    async fn update(&self, user: &User) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn link_interest(&self, user_id: i64, interest_id: i64) -> Result<bool>;

    async fn unlink_interest(&self, user_id: i64, interest_id: i64) -> Result<bool>;
}

/// Row-level access to `interests` and `users_interests`.
#[async_trait]
pub trait InterestStore: Send + Sync {
    /// Inserts an interest. A taken name is `AppError::DuplicateEntity`.
    async fn insert(&self, name: &str) -> Result<bool>;

    async fn rows_by_id(&self, id: i64) -> Result<Vec<InterestUserRow>>;

    /// Joined rows for every interest, ordered by interest id.
    async fn all_rows(&self) -> Result<Vec<InterestUserRow>>;

    async fn rename(&self, id: i64, name: &str) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn name_exists(&self, name: &str) -> Result<bool>;
}

/// Server-side session records keyed by token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, token: &str, record: &SessionRecord, ttl_secs: u64) -> Result<()>;

    async fn load(&self, token: &str) -> Result<Option<SessionRecord>>;

    async fn remove(&self, token: &str) -> Result<()>;
}
