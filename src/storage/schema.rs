//! Table management for the resources table.
//!
//! Table names are interpolated into statements, so every function here
//! validates the name as a plain SQL identifier first.

use sqlx::Row;

use crate::error_handling::DatabaseError;

use super::pool::ConnectionPool;

/// Returns true for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn checked(table: &str) -> Result<&str, DatabaseError> {
    if is_valid_identifier(table) {
        Ok(table)
    } else {
        Err(DatabaseError::InvalidTableName(table.to_string()))
    }
}

/// Creates the table if it doesn't exist.
///
/// `data` holds the JSON encoding of a record's properties; the CHECK
/// constraint makes the store reject anything that is not valid JSON.
pub async fn create_table(pool: &ConnectionPool, table: &str) -> Result<(), DatabaseError> {
    let table = checked(table)?;
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            uid TEXT PRIMARY KEY,
            cluster TEXT,
            data TEXT NOT NULL CHECK (json_valid(data))
        )"
    ))
    .execute(pool.inner())
    .await?;
    Ok(())
}

/// Drops the table if it exists.
pub async fn drop_table(pool: &ConnectionPool, table: &str) -> Result<(), DatabaseError> {
    let table = checked(table)?;
    sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
        .execute(pool.inner())
        .await?;
    Ok(())
}

/// `SELECT count(*)` over the table.
pub async fn count_rows(pool: &ConnectionPool, table: &str) -> Result<i64, DatabaseError> {
    let table = checked(table)?;
    let count: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM {table}"))
        .fetch_one(pool.inner())
        .await?;
    Ok(count)
}

/// A persisted row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResource {
    pub uid: String,
    pub cluster: Option<String>,
    pub data: serde_json::Value,
}

/// Looks up one row by uid.
pub async fn fetch_resource(
    pool: &ConnectionPool,
    table: &str,
    uid: &str,
) -> Result<Option<StoredResource>, DatabaseError> {
    let table = checked(table)?;
    let row = sqlx::query(&format!(
        "SELECT uid, cluster, data FROM {table} WHERE uid = ?"
    ))
    .bind(uid)
    .fetch_optional(pool.inner())
    .await?;

    row.map(|row| to_stored(&row)).transpose()
}

/// Every row, ordered by uid.
pub async fn fetch_all_resources(
    pool: &ConnectionPool,
    table: &str,
) -> Result<Vec<StoredResource>, DatabaseError> {
    let table = checked(table)?;
    let rows = sqlx::query(&format!(
        "SELECT uid, cluster, data FROM {table} ORDER BY uid"
    ))
    .fetch_all(pool.inner())
    .await?;

    rows.iter().map(to_stored).collect()
}

fn to_stored(row: &sqlx::sqlite::SqliteRow) -> Result<StoredResource, DatabaseError> {
    let raw: String = row.try_get("data")?;
    let data = serde_json::from_str(&raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(StoredResource {
        uid: row.try_get("uid")?,
        cluster: row.try_get("cluster")?,
        data,
    })
}
