//! Key-value settings access
//!
//! Upsert semantics: an absent key is created, an existing key's value is
//! overwritten. No versioning or history.

use regis_common::{Error, Result};
use sqlx::SqlitePool;

pub struct SettingsStore {
    pool: SqlitePool,
}

impl SettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn set<T>(&self, key: &str, value: T) -> Result<()>
    where
        T: std::fmt::Display,
    {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT value FROM settings WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((Some(value),)) => {
                let parsed = value
                    .parse::<T>()
                    .map_err(|e| Error::Config(format!("setting '{key}' failed to parse: {e}")))?;
                Ok(Some(parsed))
            }
            _ => Ok(None),
        }
    }

    /// Get with a fallback for absent keys.
    pub async fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.get(key).await?.unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_get_absent_key() {
        let store = SettingsStore::new(test_pool().await);

        let value: Option<String> = store.get("missing").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = SettingsStore::new(test_pool().await);

        store.set("registration_open", "true").await.unwrap();

        let value: Option<bool> = store.get("registration_open").await.unwrap();
        assert_eq!(value, Some(true));
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_key() {
        let store = SettingsStore::new(test_pool().await);

        store.set("default_section_capacity", 30).await.unwrap();
        store.set("default_section_capacity", 45).await.unwrap();

        let value: i64 = store.get_or("default_section_capacity", 0).await.unwrap();
        assert_eq!(value, 45);
    }

    #[tokio::test]
    async fn test_unparsable_value_is_a_config_error() {
        let store = SettingsStore::new(test_pool().await);

        store.set("default_section_capacity", "lots").await.unwrap();

        let err = store.get::<i64>("default_section_capacity").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
