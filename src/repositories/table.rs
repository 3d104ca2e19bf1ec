//! Generic single-table CRUD over PostgreSQL.
//!
//! Only identifiers (table and column names) are ever interpolated into SQL,
//! and only after passing [`is_identifier`]. Every value travels as a bound
//! parameter. A name that fails the allow-list is rejected before a connection
//! is checked out of the pool.

use deadpool_postgres::Pool;
use tokio_postgres::{Row, types::ToSql};

use crate::error::{AppError, Result};

/// A bound query parameter.
pub type Value<'a> = &'a (dyn ToSql + Sync);

/// A column name paired with the value to write into it.
pub type Attribute<'a> = (&'a str, Value<'a>);

/// ASCII letters, digits and underscore; nothing else, not even empty.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn quote(name: &str) -> Result<String> {
    if !is_identifier(name) {
        return Err(AppError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

fn quote_all(names: &[&str]) -> Result<Vec<String>> {
    names.iter().map(|n| quote(n)).collect()
}

fn require_columns(columns: &[&str]) -> Result<()> {
    if columns.is_empty() {
        return Err(AppError::InvalidIdentifier("<empty column list>".to_string()));
    }
    Ok(())
}

pub fn insert_sql(table: &str, columns: &[&str], returning: &[&str]) -> Result<String> {
    require_columns(columns)?;
    let table = quote(table)?;
    let columns = quote_all(columns)?;
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );
    if !returning.is_empty() {
        sql.push_str(" RETURNING ");
        sql.push_str(&quote_all(returning)?.join(", "));
    }
    Ok(sql)
}

pub fn update_sql(table: &str, primary_key: &str, columns: &[&str]) -> Result<String> {
    require_columns(columns)?;
    let table = quote(table)?;
    let primary_key = quote(primary_key)?;
    let assignments = quote_all(columns)?
        .into_iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", c, i + 1))
        .collect::<Vec<_>>();

    Ok(format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        table,
        assignments.join(", "),
        primary_key,
        columns.len() + 1
    ))
}

pub fn select_by_sql(table: &str, column: &str) -> Result<String> {
    Ok(format!("SELECT * FROM {} WHERE {} = $1", quote(table)?, quote(column)?))
}

pub fn delete_sql(table: &str, primary_key: &str) -> Result<String> {
    Ok(format!("DELETE FROM {} WHERE {} = $1", quote(table)?, quote(primary_key)?))
}

/// CRUD handle for one table keyed by one integer primary key.
#[derive(Clone)]
pub struct Table {
    pool: Pool,
    name: String,
    primary_key: String,
}

impl Table {
    /// Binds a table name and its primary-key column.
    ///
    /// Both names are checked here, so a hostile name never reaches a query.
    pub fn new(pool: Pool, name: &str, primary_key: &str) -> Result<Self> {
        quote(name)?;
        quote(primary_key)?;
        Ok(Self {
            pool,
            name: name.to_string(),
            primary_key: primary_key.to_string(),
        })
    }

    /// Inserts one row. Returns `true` iff a row was written.
    pub async fn create(&self, attributes: &[Attribute<'_>]) -> Result<bool> {
        let columns: Vec<&str> = attributes.iter().map(|(c, _)| *c).collect();
        let sql = insert_sql(&self.name, &columns, &[])?;
        let params: Vec<Value<'_>> = attributes.iter().map(|(_, v)| *v).collect();

        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(&sql).await.map_err(AppError::from_store)?;
        let affected = client
            .execute(&stmt, &params)
            .await
            .map_err(AppError::from_store)?;

        tracing::debug!(table = %self.name, affected, "insert");
        Ok(affected > 0)
    }

    /// Inserts one row and reads back the requested columns.
    pub async fn create_returning(
        &self,
        attributes: &[Attribute<'_>],
        returning: &[&str],
    ) -> Result<Row> {
        let columns: Vec<&str> = attributes.iter().map(|(c, _)| *c).collect();
        let sql = insert_sql(&self.name, &columns, returning)?;
        let params: Vec<Value<'_>> = attributes.iter().map(|(_, v)| *v).collect();

        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(&sql).await.map_err(AppError::from_store)?;
        let row = client
            .query_one(&stmt, &params)
            .await
            .map_err(AppError::from_store)?;

        tracing::debug!(table = %self.name, "insert returning");
        Ok(row)
    }

    /// Rewrites the given columns of the row with primary key `id`.
    pub async fn update(&self, id: i64, attributes: &[Attribute<'_>]) -> Result<bool> {
        let columns: Vec<&str> = attributes.iter().map(|(c, _)| *c).collect();
        let sql = update_sql(&self.name, &self.primary_key, &columns)?;
        let mut params: Vec<Value<'_>> = attributes.iter().map(|(_, v)| *v).collect();
        params.push(&id);

        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(&sql).await.map_err(AppError::from_store)?;
        let affected = client
            .execute(&stmt, &params)
            .await
            .map_err(AppError::from_store)?;

        tracing::debug!(table = %self.name, id, affected, "update");
        Ok(affected > 0)
    }

    /// Every row whose `column` equals `value`.
    pub async fn get_by(&self, column: &str, value: Value<'_>) -> Result<Vec<Row>> {
        let sql = select_by_sql(&self.name, column)?;

        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(&sql).await.map_err(AppError::from_store)?;
        let rows = client
            .query(&stmt, &[value])
            .await
            .map_err(AppError::from_store)?;

        tracing::debug!(table = %self.name, column, rows = rows.len(), "select");
        Ok(rows)
    }

    /// Deletes the row with primary key `id`.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let sql = delete_sql(&self.name, &self.primary_key)?;

        let client = self.pool.get().await?;
        let stmt = client.prepare_cached(&sql).await.map_err(AppError::from_store)?;
        let affected = client
            .execute(&stmt, &[&id])
            .await
            .map_err(AppError::from_store)?;

        tracing::debug!(table = %self.name, id, affected, "delete");
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use zeroize::Zeroizing;

    fn unreachable_pool() -> Pool {
        crate::db::create_pool(&DatabaseConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            dbname: "none".to_string(),
            user: "none".to_string(),
            password: Zeroizing::new(String::new()),
        })
        .unwrap()
    }

    #[test]
    fn allow_list() {
        assert!(is_identifier("users"));
        assert!(is_identifier("password_hash"));
        assert!(is_identifier("users_interests2"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("users;"));
        assert!(!is_identifier("na\"me"));
        assert!(!is_identifier("name'"));
        assert!(!is_identifier("users interests"));
        assert!(!is_identifier("users--"));
        assert!(!is_identifier("émail"));
    }

    #[test]
    fn insert_binds_every_value() {
        let sql = insert_sql("users", &["username", "email"], &["id"]).unwrap();
        assert_eq!(
            sql,
            r#"INSERT INTO "users" ("username", "email") VALUES ($1, $2) RETURNING "id""#
        );
    }

    #[test]
    fn update_keys_on_primary_key() {
        let sql = update_sql("interests", "id", &["name", "updated_at"]).unwrap();
        assert_eq!(
            sql,
            r#"UPDATE "interests" SET "name" = $1, "updated_at" = $2 WHERE "id" = $3"#
        );
    }

    #[test]
    fn select_and_delete() {
        assert_eq!(
            select_by_sql("users", "email").unwrap(),
            r#"SELECT * FROM "users" WHERE "email" = $1"#
        );
        assert_eq!(
            delete_sql("users", "id").unwrap(),
            r#"DELETE FROM "users" WHERE "id" = $1"#
        );
    }

    #[test]
    fn hostile_identifiers_are_rejected() {
        assert!(matches!(
            insert_sql("users", &["email", "x'); DROP TABLE users; --"], &[]),
            Err(AppError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            update_sql("users", "id\"", &["email"]),
            Err(AppError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            select_by_sql("users;", "email"),
            Err(AppError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            insert_sql("users", &[], &[]),
            Err(AppError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            insert_sql("users", &["email"], &["id; --"]),
            Err(AppError::InvalidIdentifier(_))
        ));
    }

    #[tokio::test]
    async fn table_rejects_before_touching_the_pool() {
        assert!(matches!(
            Table::new(unreachable_pool(), "users\"; --", "id"),
            Err(AppError::InvalidIdentifier(_))
        ));

        let table = Table::new(unreachable_pool(), "users", "id").unwrap();
        let email = "a@b.com";

        // A pool error here would mean a connection attempt was made.
        let err = table.get_by("email; DROP TABLE users", &email).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentifier(_)));

        let err = table
            .create(&[("email", &email), ("user'name", &email)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentifier(_)));

        let err = table.update(1, &[("email\"", &email)]).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentifier(_)));
    }
}
