use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use tokio_postgres::{Row, types::FromSql};

use crate::{
    error::{AppError, Result},
    models::{
        interest::InterestUserRow,
        user::{NewUser, StoredCredentials, User, UserInterestRow},
    },
    repositories::{
        store::{InterestStore, UserStore},
        table::{Table, Value},
    },
};

const USER_ROWS_BY_ID: &str = r#"
    SELECT u.id, u.username, u.email, u.avatar, u.password_hash, u.created_at, u.updated_at,
           i.id AS interest_id, i.name AS interest_name
    FROM users u
    LEFT JOIN users_interests ui ON u.id = ui.user_id
    LEFT JOIN interests i ON ui.interest_id = i.id
    WHERE u.id = $1
    ORDER BY i.name
"#;

const USER_ROWS_ALL: &str = r#"
    SELECT u.id, u.username, u.email, u.avatar, u.password_hash, u.created_at, u.updated_at,
           i.id AS interest_id, i.name AS interest_name
    FROM users u
    LEFT JOIN users_interests ui ON u.id = ui.user_id
    LEFT JOIN interests i ON ui.interest_id = i.id
    ORDER BY u.id, i.name
"#;

const INTEREST_ROWS_BY_ID: &str = r#"
    SELECT i.id, i.name, i.created_at, i.updated_at, ui.user_id
    FROM interests i
    LEFT JOIN users_interests ui ON i.id = ui.interest_id
    WHERE i.id = $1
    ORDER BY ui.user_id
"#;

const INTEREST_ROWS_ALL: &str = r#"
    SELECT i.id, i.name, i.created_at, i.updated_at, ui.user_id
    FROM interests i
    LEFT JOIN users_interests ui ON i.id = ui.interest_id
    ORDER BY i.id, ui.user_id
"#;

const LINK_INTEREST: &str =
    "INSERT INTO users_interests (user_id, interest_id) VALUES ($1, $2)";

const UNLINK_INTEREST: &str =
    "DELETE FROM users_interests WHERE user_id = $1 AND interest_id = $2";

fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T> {
    row.try_get(name)
        .map_err(|_| AppError::MissingData(name.to_string()))
}

fn row_to_user_interest(row: &Row) -> Result<UserInterestRow> {
    Ok(UserInterestRow {
        id: column(row, "id")?,
        username: column(row, "username")?,
        email: column(row, "email")?,
        avatar: column(row, "avatar")?,
        password_hash: column(row, "password_hash")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        interest_id: column(row, "interest_id")?,
        interest_name: column(row, "interest_name")?,
    })
}

fn row_to_interest_user(row: &Row) -> Result<InterestUserRow> {
    Ok(InterestUserRow {
        id: column(row, "id")?,
        name: column(row, "name")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        user_id: column(row, "user_id")?,
    })
}

/// PostgreSQL-backed users and interests.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    users: Table,
    interests: Table,
}

impl PgStore {
    pub fn new(pool: Pool) -> Result<Self> {
        Ok(Self {
            users: Table::new(pool.clone(), "users", "id")?,
            interests: Table::new(pool.clone(), "interests", "id")?,
            pool,
        })
    }

    /// Runs one of the fixed join queries above.
    async fn query(&self, sql: &str, params: &[Value<'_>]) -> Result<Vec<Row>> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(sql).await.map_err(AppError::from_store)?;
        client
            .query(&stmt, params)
            .await
            .map_err(AppError::from_store)
    }

    async fn execute(&self, sql: &str, params: &[Value<'_>]) -> Result<u64> {
        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(sql).await.map_err(AppError::from_store)?;
        client
            .execute(&stmt, params)
            .await
            .map_err(AppError::from_store)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert(&self, user: &NewUser) -> Result<User> {
        let row = self
            .users
            .create_returning(
                &[
                    ("username", &user.username),
                    ("email", &user.email),
                    ("avatar", &user.avatar),
                    ("password_hash", &user.password_hash),
                ],
                &["id", "created_at", "updated_at"],
            )
            .await?;

        Ok(User {
            id: column(&row, "id")?,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            password_hash: user.password_hash.clone(),
            created_at: column(&row, "created_at")?,
            updated_at: column(&row, "updated_at")?,
            interests: Vec::new(),
        })
    }

    async fn credentials_by_email(&self, email: &str) -> Result<Option<StoredCredentials>> {
        let rows = self.users.get_by("email", &email).await?;
        rows.first()
            .map(|row| {
                Ok(StoredCredentials {
                    id: column(row, "id")?,
                    password_hash: column(row, "password_hash")?,
                })
            })
            .transpose()
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(!self.users.get_by("email", &email).await?.is_empty())
    }

    async fn rows_by_id(&self, id: i64) -> Result<Vec<UserInterestRow>> {
        self.query(USER_ROWS_BY_ID, &[&id])
            .await?
            .iter()
            .map(row_to_user_interest)
            .collect()
    }

    async fn all_rows(&self) -> Result<Vec<UserInterestRow>> {
        self.query(USER_ROWS_ALL, &[])
            .await?
            .iter()
            .map(row_to_user_interest)
            .collect()
    }

    async fn update(&self, user: &User) -> Result<bool> {
        let now = Utc::now();
        self.users
            .update(
                user.id,
                &[
                    ("username", &user.username),
                    ("email", &user.email),
                    ("avatar", &user.avatar),
                    ("password_hash", &user.password_hash),
                    ("updated_at", &now),
                ],
            )
            .await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.users.delete(id).await
    }

    async fn link_interest(&self, user_id: i64, interest_id: i64) -> Result<bool> {
        Ok(self.execute(LINK_INTEREST, &[&user_id, &interest_id]).await? > 0)
    }

    async fn unlink_interest(&self, user_id: i64, interest_id: i64) -> Result<bool> {
        Ok(self.execute(UNLINK_INTEREST, &[&user_id, &interest_id]).await? > 0)
    }
}

#[async_trait]
impl InterestStore for PgStore {
    async fn insert(&self, name: &str) -> Result<bool> {
        self.interests.create(&[("name", &name)]).await
    }

    async fn rows_by_id(&self, id: i64) -> Result<Vec<InterestUserRow>> {
        self.query(INTEREST_ROWS_BY_ID, &[&id])
            .await?
            .iter()
            .map(row_to_interest_user)
            .collect()
    }

    async fn all_rows(&self) -> Result<Vec<InterestUserRow>> {
        self.query(INTEREST_ROWS_ALL, &[])
            .await?
            .iter()
            .map(row_to_interest_user)
            .collect()
    }

    async fn rename(&self, id: i64, name: &str) -> Result<bool> {
        let now = Utc::now();
        self.interests
            .update(id, &[("name", &name), ("updated_at", &now)])
            .await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.interests.delete(id).await
    }

    async fn name_exists(&self, name: &str) -> Result<bool> {
        Ok(!self.interests.get_by("name", &name).await?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DatabaseConfig,
        db::create_pool,
        repositories::{interest::aggregate_interests, user::aggregate_users},
    };

    /// Connects to `DATABASE_URL` and applies the schema.
    async fn live_store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = create_pool(&DatabaseConfig::from_url(&url).unwrap()).unwrap();
        pool.get()
            .await
            .unwrap()
            .batch_execute(include_str!("../../migrations/0001_init.sql"))
            .await
            .unwrap();
        PgStore::new(pool).unwrap()
    }

    fn duplicate_of(result: Result<impl std::fmt::Debug>) -> String {
        match result {
            Err(AppError::DuplicateEntity(constraint)) => constraint,
            other => panic!("expected a duplicate, got {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL server at DATABASE_URL"]
    async fn test_joined_rows_and_constraint_errors() {
        let store = live_store().await;
        let stamp = Utc::now().timestamp_micros() % 1_000_000_000;

        let new_user = NewUser {
            username: format!("pg{}", stamp),
            email: format!("pg{}@example.com", stamp),
            avatar: String::new(),
            password_hash: "$argon2id$placeholder".to_string(),
        };
        let user = UserStore::insert(&store, &new_user).await.unwrap();

        // No interests yet: one row whose interest columns are NULL.
        let rows = UserStore::rows_by_id(&store, user.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].interest_id, None);
        assert_eq!(rows[0].interest_name, None);
        assert!(aggregate_users(rows)[0].interests.is_empty());

        assert_eq!(
            duplicate_of(UserStore::insert(&store, &new_user).await),
            "users_email_key"
        );

        let name = format!("pg-interest-{}", stamp);
        assert!(InterestStore::insert(&store, &name).await.unwrap());
        assert_eq!(
            duplicate_of(InterestStore::insert(&store, &name).await),
            "interests_name_key"
        );

        let interest = aggregate_interests(InterestStore::all_rows(&store).await.unwrap())
            .into_iter()
            .find(|i| i.name == name)
            .unwrap();
        assert!(interest.user_ids.is_empty());

        assert!(store.link_interest(user.id, interest.id).await.unwrap());
        assert_eq!(
            duplicate_of(store.link_interest(user.id, interest.id).await),
            "users_interests_pkey"
        );
        assert!(matches!(
            store.link_interest(user.id, -1).await,
            Err(AppError::NotFound)
        ));

        let users = aggregate_users(UserStore::rows_by_id(&store, user.id).await.unwrap());
        assert_eq!(users[0].interests, vec![name.clone()]);
        let rows = InterestStore::rows_by_id(&store, interest.id).await.unwrap();
        assert_eq!(rows[0].user_id, Some(user.id));

        assert!(store.unlink_interest(user.id, interest.id).await.unwrap());
        assert!(!store.unlink_interest(user.id, interest.id).await.unwrap());

        assert!(UserStore::delete(&store, user.id).await.unwrap());
        assert!(InterestStore::delete(&store, interest.id).await.unwrap());
    }
}
