use chrono::{DateTime, Utc};
use serde::Serialize;

/// An interest that users can be tagged with.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Interest {
    /// The store-assigned identifier.
    pub id: i64,
    /// The unique, non-empty name.
    pub name: String,
    /// The timestamp when the interest was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the interest was last updated.
    pub updated_at: DateTime<Utc>,
    /// Identifiers of the users tagged with this interest.
    pub user_ids: Vec<i64>,
}

/// One row of `interests LEFT JOIN users_interests`.
#[derive(Clone, Debug)]
pub struct InterestUserRow {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: Option<i64>,
}
