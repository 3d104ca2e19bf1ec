use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The server-side record behind a session token.
///
/// `username` is stored as entered; escape it when reading it out for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    /// The ID of the user this session belongs to.
    pub user_id: i64,
    /// The user's username, unescaped.
    pub username: String,
    /// The user's email address.
    pub email: String,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}
