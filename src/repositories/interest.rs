use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::{AppError, Result},
    models::interest::{Interest, InterestUserRow},
    repositories::store::InterestStore,
};

/// Groups joined rows into interests, one per distinct id, in first-seen order.
///
/// Rows with a null user id contribute no user.
pub fn aggregate_interests(rows: Vec<InterestUserRow>) -> Vec<Interest> {
    let mut interests: Vec<Interest> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.id).or_insert_with(|| {
            interests.push(Interest {
                id: row.id,
                name: row.name.clone(),
                created_at: row.created_at,
                updated_at: row.updated_at,
                user_ids: Vec::new(),
            });
            interests.len() - 1
        });

        if let Some(user_id) = row.user_id {
            interests[slot].user_ids.push(user_id);
        }
    }

    interests
}

fn checked_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::field("name", "Interest name cannot be empty"));
    }
    Ok(name)
}

/// Interest persistence, including the interest → users association.
#[derive(Clone)]
pub struct InterestRepository {
    store: Arc<dyn InterestStore>,
}

impl InterestRepository {
    pub fn new(store: Arc<dyn InterestStore>) -> Self {
        Self { store }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Interest>> {
        let rows = self.store.rows_by_id(id).await?;
        Ok(aggregate_interests(rows).into_iter().next())
    }

    pub async fn get_all_interests(&self) -> Result<Vec<Interest>> {
        let rows = self.store.all_rows().await?;
        Ok(aggregate_interests(rows))
    }

    /// Adds an interest. A taken name is `AppError::DuplicateEntity`.
    pub async fn create(&self, name: &str) -> Result<bool> {
        let name = checked_name(name)?;
        let created = self.store.insert(name).await?;
        tracing::info!("✅ Interest created: {}", name);
        Ok(created)
    }

    /// Renames an interest.
    pub async fn update(&self, id: i64, name: &str) -> Result<bool> {
        let name = checked_name(name)?;
        self.store.rename(id, name).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        self.store.delete(id).await
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        self.store.name_exists(name.trim()).await
    }
}
