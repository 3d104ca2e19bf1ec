use chrono::{DateTime, Utc};
use serde::Serialize;

/// Represents a user in the system.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct User {
    /// The store-assigned identifier.
    pub id: i64,
    /// The user's username, 3 to 20 characters, free of HTML metacharacters.
    pub username: String,
    /// The user's email address, unique across users.
    pub email: String,
    /// The avatar URL derived from the username at registration.
    pub avatar: String,
    /// The Argon2id PHC string. Never plaintext.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the user was last updated.
    pub updated_at: DateTime<Utc>,
    /// Names of the user's interests, computed from the association table.
    pub interests: Vec<String>,
}

/// The columns written when a user is registered.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub password_hash: String,
}

/// Identifier and stored hash, as read by the login path.
#[derive(Clone, Debug)]
pub struct StoredCredentials {
    pub id: i64,
    pub password_hash: String,
}

/// One row of `users LEFT JOIN users_interests LEFT JOIN interests`.
///
/// A user without interests yields a single row with both interest columns null.
#[derive(Clone, Debug)]
pub struct UserInterestRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub interest_id: Option<i64>,
    pub interest_name: Option<String>,
}
