use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use zeroize::Zeroizing;

use crate::{
    crypto::password::{hash_password, verify_password},
    error::{AppError, Result},
    models::user::{NewUser, User, UserInterestRow},
    repositories::store::UserStore,
};

/// Avatar service the profile picture URL points at.
const AVATAR_BASE_URL: &str = "https://ui-avatars.com/api/";

static PLACEHOLDER_HASH: OnceCell<String> = OnceCell::new();

/// The hash verified against when an email is unknown, so both login failures
/// cost one Argon2 verification.
///
/// Computed on first use. Startup calls this so that a failure stops the server
/// instead of leaving unknown emails on a fast path.
pub fn placeholder_hash() -> Result<&'static str> {
    PLACEHOLDER_HASH
        .get_or_try_init(|| hash_password("unknown-account-placeholder"))
        .map(String::as_str)
}

/// Builds the avatar URL for `username`. The same name always yields the same URL.
pub fn avatar_url(username: &str) -> Result<String> {
    url::Url::parse_with_params(
        AVATAR_BASE_URL,
        &[
            ("name", username),
            ("background", "random"),
            ("size", "256"),
            ("rounded", "true"),
        ],
    )
    .map(String::from)
    .map_err(|e| AppError::Internal(format!("Avatar URL: {}", e)))
}

/// Groups joined rows into users, one per distinct id, in first-seen order.
///
/// Rows whose interest columns are null contribute no interest, so a user
/// with no interests comes out with an empty list.
pub fn aggregate_users(rows: Vec<UserInterestRow>) -> Vec<User> {
    let mut users: Vec<User> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.id).or_insert_with(|| {
            users.push(User {
                id: row.id,
                username: row.username.clone(),
                email: row.email.clone(),
                avatar: row.avatar.clone(),
                password_hash: row.password_hash.clone(),
                created_at: row.created_at,
                updated_at: row.updated_at,
                interests: Vec::new(),
            });
            users.len() - 1
        });

        if let (Some(_), Some(name)) = (row.interest_id, row.interest_name) {
            users[slot].interests.push(name);
        }
    }

    users
}

async fn hash_blocking(password: Zeroizing<String>) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

async fn verify_blocking(password: Zeroizing<String>, hash: Option<String>) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let hash = match hash {
            Some(hash) => hash,
            None => placeholder_hash()?.to_string(),
        };
        Ok::<_, AppError>(verify_password(&password, &hash))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
}

/// User persistence, including the user → interests association.
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn UserStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Creates an account. Inputs are expected to be validated already.
    ///
    /// A taken email surfaces as `AppError::DuplicateEntity`.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        tracing::debug!("🔐 Creating user: {}", username);

        let new_user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            avatar: avatar_url(username)?,
            password_hash: hash_blocking(Zeroizing::new(password.to_string())).await?,
        };

        let user = self.store.insert(&new_user).await?;
        tracing::info!("✅ User created with ID: {}", user.id);
        Ok(user)
    }

    /// Whether an account uses `email`. Reveals nothing else about it.
    pub async fn exists(&self, email: &str) -> Result<bool> {
        self.store.email_exists(email).await
    }

    /// Checks `password` against the account registered under `email`.
    ///
    /// Unknown email and wrong password both return `None` after one Argon2
    /// verification each.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let credentials = self.store.credentials_by_email(email).await?;

        let hash = credentials.as_ref().map(|c| c.password_hash.clone());
        let verified = verify_blocking(Zeroizing::new(password.to_string()), hash).await?;

        match credentials {
            Some(c) if verified => {
                tracing::info!("✅ User authenticated: {}", c.id);
                self.get(c.id).await
            }
            _ => {
                tracing::debug!("Login rejected");
                Ok(None)
            }
        }
    }

    /// Loads one user with their interest names.
    pub async fn get(&self, id: i64) -> Result<Option<User>> {
        let rows = self.store.rows_by_id(id).await?;
        Ok(aggregate_users(rows).into_iter().next())
    }

    /// Loads every user with their interest names.
    pub async fn get_all(&self) -> Result<Vec<User>> {
        let rows = self.store.all_rows().await?;
        Ok(aggregate_users(rows))
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let deleted = self.store.delete(id).await?;
        tracing::info!("🗑️ Delete user {}: {}", id, deleted);
        Ok(deleted)
    }

    /// Rewrites username, email, avatar and password hash from `user`.
    pub async fn update(&self, user: &User) -> Result<bool> {
        self.store.update(user).await
    }

    /// Tags a user with an interest. Tagging twice is `DuplicateEntity`.
    pub async fn add_interest(&self, user_id: i64, interest_id: i64) -> Result<bool> {
        self.store.link_interest(user_id, interest_id).await
    }

    pub async fn remove_interest(&self, user_id: i64, interest_id: i64) -> Result<bool> {
        self.store.unlink_interest(user_id, interest_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{
        interest::InterestRepository, memory::MemoryStore, store::InterestStore,
    };
    use chrono::Utc;
    use std::time::{Duration, Instant};

    fn repos() -> (UserRepository, InterestRepository) {
        let store = Arc::new(MemoryStore::new());
        (
            UserRepository::new(store.clone()),
            InterestRepository::new(store as Arc<dyn InterestStore>),
        )
    }

    fn row(id: i64, interest: Option<(i64, &str)>) -> UserInterestRow {
        UserInterestRow {
            id,
            username: format!("user{}", id),
            email: format!("user{}@example.com", id),
            avatar: String::new(),
            password_hash: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            interest_id: interest.map(|(i, _)| i),
            interest_name: interest.map(|(_, n)| n.to_string()),
        }
    }

    #[test]
    fn avatar_is_derived_from_username() {
        assert_eq!(
            avatar_url("alice").unwrap(),
            "https://ui-avatars.com/api/?name=alice&background=random&size=256&rounded=true"
        );
        assert_eq!(avatar_url("alice").unwrap(), avatar_url("alice").unwrap());
        assert!(avatar_url("two words").unwrap().contains("name=two+words&"));
    }

    #[test]
    fn placeholder_hash_is_a_real_argon2_hash() {
        let hash = placeholder_hash().unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=19456,t=3,p=1$"));
        assert!(verify_password("unknown-account-placeholder", hash));
        assert!(!verify_password("", hash));
        assert!(std::ptr::eq(hash, placeholder_hash().unwrap()));
    }

    #[test]
    fn aggregate_filters_null_interests() {
        let users = aggregate_users(vec![row(1, None)]);
        assert_eq!(users.len(), 1);
        assert!(users[0].interests.is_empty());
    }

    #[test]
    fn aggregate_groups_duplicate_user_rows() {
        let users = aggregate_users(vec![
            row(1, Some((10, "chess"))),
            row(2, None),
            row(1, Some((11, "music"))),
            row(3, Some((11, "music"))),
        ]);

        assert_eq!(users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(users[0].interests, vec!["chess", "music"]);
        assert!(users[1].interests.is_empty());
        assert_eq!(users[2].interests, vec!["music"]);
    }

    #[test]
    fn aggregate_is_order_independent_for_membership() {
        let forward = aggregate_users(vec![row(1, Some((10, "chess"))), row(1, Some((11, "music")))]);
        let reverse = aggregate_users(vec![row(1, Some((11, "music"))), row(1, Some((10, "chess")))]);

        let mut a = forward[0].interests.clone();
        let mut b = reverse[0].interests.clone();
        a.sort();
        b.sort();
        assert_eq!(a, vec!["chess", "music"]);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn register_stores_a_hash() {
        let (users, _) = repos();
        let user = users.register("alice", "a@b.com", "Passw0rd!").await.unwrap();

        assert!(user.id > 0);
        assert_eq!(user.username, "alice");
        assert_ne!(user.password_hash, "Passw0rd!");
        assert!(verify_password("Passw0rd!", &user.password_hash));
        assert!(user.avatar.contains("name=alice"));
        assert!(user.interests.is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (users, _) = repos();
        let first = users.register("alice", "a@b.com", "Passw0rd!").await.unwrap();

        let err = users.register("mallory", "a@b.com", "Other1!xx").await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEntity(_)));

        let stored = users.get(first.id).await.unwrap().unwrap();
        assert_eq!(stored, first);
        assert_eq!(users.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exists_reports_taken_emails() {
        let (users, _) = repos();
        assert!(!users.exists("a@b.com").await.unwrap());
        users.register("alice", "a@b.com", "Passw0rd!").await.unwrap();
        assert!(users.exists("a@b.com").await.unwrap());
        assert!(!users.exists("b@b.com").await.unwrap());
    }

    #[tokio::test]
    async fn authenticate_outcomes() {
        let (users, _) = repos();
        let alice = users.register("alice", "a@b.com", "Passw0rd!").await.unwrap();

        let found = users.authenticate("a@b.com", "Passw0rd!").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
        assert_eq!(found.username, "alice");

        assert!(users.authenticate("a@b.com", "wrong").await.unwrap().is_none());
        assert!(users.authenticate("nobody@b.com", "Passw0rd!").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn authenticate_failures_cost_the_same() {
        let (users, _) = repos();
        users.register("alice", "a@b.com", "Passw0rd!").await.unwrap();
        // Warm the placeholder hash so its one-off computation is not measured.
        users.authenticate("warmup@b.com", "x").await.unwrap();

        let mut unknown = Duration::MAX;
        let mut wrong = Duration::MAX;
        for _ in 0..3 {
            let start = Instant::now();
            assert!(users.authenticate("nobody@b.com", "Passw0rd!").await.unwrap().is_none());
            unknown = unknown.min(start.elapsed());

            let start = Instant::now();
            assert!(users.authenticate("a@b.com", "Wrong0rd!").await.unwrap().is_none());
            wrong = wrong.min(start.elapsed());
        }

        assert!(unknown * 3 >= wrong, "unknown {:?} vs wrong {:?}", unknown, wrong);
        assert!(wrong * 3 >= unknown, "unknown {:?} vs wrong {:?}", unknown, wrong);
    }

    #[tokio::test]
    async fn get_with_and_without_interests() {
        let (users, interests) = repos();
        let alice = users.register("alice", "a@b.com", "Passw0rd!").await.unwrap();
        assert!(users.get(alice.id).await.unwrap().unwrap().interests.is_empty());

        interests.create("music").await.unwrap();
        interests.create("chess").await.unwrap();
        for interest in interests.get_all_interests().await.unwrap() {
            assert!(users.add_interest(alice.id, interest.id).await.unwrap());
        }

        let mut names = users.get(alice.id).await.unwrap().unwrap().interests;
        names.sort();
        assert_eq!(names, vec!["chess", "music"]);

        assert!(users.get(alice.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_all_groups_per_user() {
        let (users, interests) = repos();
        let alice = users.register("alice", "a@b.com", "Passw0rd!").await.unwrap();
        let bob = users.register("bob", "b@b.com", "Passw0rd!").await.unwrap();
        interests.create("chess").await.unwrap();
        interests.create("music").await.unwrap();
        let all_interests = interests.get_all_interests().await.unwrap();
        for interest in &all_interests {
            users.add_interest(alice.id, interest.id).await.unwrap();
        }

        let all = users.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        let a = all.iter().find(|u| u.id == alice.id).unwrap();
        let b = all.iter().find(|u| u.id == bob.id).unwrap();
        assert_eq!(a.interests.len(), 2);
        assert!(b.interests.is_empty());
    }

    #[tokio::test]
    async fn interest_links() {
        let (users, interests) = repos();
        let alice = users.register("alice", "a@b.com", "Passw0rd!").await.unwrap();
        interests.create("chess").await.unwrap();
        let chess = interests.get_all_interests().await.unwrap().remove(0);

        assert!(users.add_interest(alice.id, chess.id).await.unwrap());
        assert!(matches!(
            users.add_interest(alice.id, chess.id).await,
            Err(AppError::DuplicateEntity(_))
        ));
        assert!(matches!(
            users.add_interest(alice.id, chess.id + 100).await,
            Err(AppError::NotFound)
        ));

        assert!(users.remove_interest(alice.id, chess.id).await.unwrap());
        assert!(!users.remove_interest(alice.id, chess.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_rewrites_every_mutable_field() {
        let (users, _) = repos();
        let mut alice = users.register("alice", "a@b.com", "Passw0rd!").await.unwrap();
        users.register("bob", "b@b.com", "Passw0rd!").await.unwrap();

        alice.username = "alicia".to_string();
        alice.email = "alicia@b.com".to_string();
        alice.avatar = avatar_url("alicia").unwrap();
        alice.password_hash = hash_password("N3w-Passw0rd").unwrap();
        assert!(users.update(&alice).await.unwrap());

        let stored = users.get(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.username, "alicia");
        assert_eq!(stored.email, "alicia@b.com");
        assert_eq!(stored.avatar, alice.avatar);
        assert!(users.authenticate("alicia@b.com", "N3w-Passw0rd").await.unwrap().is_some());
        assert!(users.authenticate("a@b.com", "Passw0rd!").await.unwrap().is_none());

        alice.email = "b@b.com".to_string();
        assert!(matches!(users.update(&alice).await, Err(AppError::DuplicateEntity(_))));

        alice.id += 100;
        assert!(!users.update(&alice).await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_user() {
        let (users, _) = repos();
        let alice = users.register("alice", "a@b.com", "Passw0rd!").await.unwrap();
        assert!(users.delete(alice.id).await.unwrap());
        assert!(!users.delete(alice.id).await.unwrap());
        assert!(users.get(alice.id).await.unwrap().is_none());
        assert!(!users.exists("a@b.com").await.unwrap());
    }
}
