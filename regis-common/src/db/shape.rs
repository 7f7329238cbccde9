//! Declarative table shapes and additive column evolution
//!
//! Each table declares its expected columns in code; on startup the actual
//! database shape is introspected via `PRAGMA table_info` and any missing
//! column is added with `ALTER TABLE ADD COLUMN`. Additions are the only
//! drift this module repairs. Type or constraint changes require a manual
//! migration (see `db::migrations`).

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// Expected definition of one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    /// SQL type ("TEXT", "INTEGER", "REAL", "TIMESTAMP")
    pub sql_type: &'static str,
    /// DEFAULT clause appended when the column is added after the fact
    pub default_value: Option<&'static str>,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self {
            name,
            sql_type,
            default_value: None,
        }
    }

    pub const fn default(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Expected shape of one database table
pub trait TableShape {
    fn table_name() -> &'static str;

    fn expected_columns() -> Vec<ColumnSpec>;
}

/// Check whether a table exists.
pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name = ?
        )
        "#,
    )
    .bind(table_name)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Names of the columns a table currently has, in database order.
///
/// The table name is structural (never caller-supplied data), which is why
/// it may be interpolated: `PRAGMA table_info` does not accept bind
/// parameters.
pub async fn column_names(pool: &SqlitePool, table_name: &str) -> Result<Vec<String>> {
    let query = format!("PRAGMA table_info({})", table_name);
    let rows = sqlx::query(&query).fetch_all(pool).await?;

    let mut columns: Vec<(i32, String)> = rows
        .iter()
        .map(|row| (row.get("cid"), row.get("name")))
        .collect();
    columns.sort_by_key(|(cid, _)| *cid);

    Ok(columns.into_iter().map(|(_, name)| name).collect())
}

/// Add a column unless the table already has it.
///
/// The desired end-state is "column present", so a duplicate-column failure
/// from a concurrent initializer counts as success.
pub async fn add_column_if_missing(
    pool: &SqlitePool,
    table: &str,
    column: &ColumnSpec,
) -> Result<()> {
    let existing = column_names(pool, table).await?;
    if existing.iter().any(|name| name == column.name) {
        return Ok(());
    }

    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table, column.name, column.sql_type
    );
    if let Some(default) = column.default_value {
        sql.push_str(&format!(" DEFAULT {}", default));
    }

    info!("Adding column {}.{} ({})", table, column.name, column.sql_type);

    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            debug!(
                "Column {}.{} already added by a concurrent initializer",
                table, column.name
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Bring a table's shape up to date by adding any missing columns.
///
/// Skips tables that do not exist yet: creation is the job of the
/// `CREATE TABLE IF NOT EXISTS` phase that runs before shape sync.
pub async fn sync_table<T: TableShape>(pool: &SqlitePool) -> Result<()> {
    let table = T::table_name();

    if !table_exists(pool, table).await? {
        debug!("Table '{}' does not exist yet, skipping shape sync", table);
        return Ok(());
    }

    let existing = column_names(pool, table).await?;
    let mut added = 0usize;

    for column in T::expected_columns() {
        if !existing.iter().any(|name| name == column.name) {
            add_column_if_missing(pool, table, &column).await?;
            added += 1;
        }
    }

    if added > 0 {
        info!("Shape sync: added {} column(s) to '{}'", added, table);
    } else {
        debug!("Shape sync: '{}' is up to date", table);
    }

    Ok(())
}
