//! Versioned schema migrations
//!
//! Handles the transformations that additive shape sync cannot: today that
//! is the one-time rebuild of the sections table away from its legacy
//! (`semester`-carrying) layout. Applied migrations are tracked in the
//! `schema_version` table and never modified once shipped; each new schema
//! change gets a new migration function and a version bump.
//!
//! Migration failure is fatal. The rebuild runs inside a single transaction
//! so a failure rolls back and leaves the original table untouched, but the
//! error still propagates as `Error::Migration`: continuing on an unknown
//! schema shape risks corrupting every later write.

use crate::db::shape::{column_names, table_exists};
use crate::{Error, Result};
use sqlx::{Connection, SqlitePool};
use tracing::{debug, info, warn};

/// Current schema version. Increment when adding a migration.
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Placeholder used when a legacy section row has no name.
pub const DEFAULT_SECTION_NAME: &str = "Main";

/// Seat count used when a legacy section row has no capacity.
pub const DEFAULT_SECTION_CAPACITY: i64 = 30;

/// Get current schema version, 0 when nothing has been recorded yet.
async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    if !table_exists(pool, "schema_version").await? {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations. Idempotent: safe to call on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        debug!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({}), possible downgrade",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    Ok(())
}

/// Migration v1: rebuild the sections table from its legacy layout.
///
/// The legacy layout is detected by the presence of the retired `semester`
/// column. Detection outcomes:
/// - no sections table: first run, nothing to migrate;
/// - no `semester` column: table is already in (or additively close to) the
///   target layout, and shape sync will fill in any missing columns;
/// - `semester` present: rebuild via shadow table, below.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    if !table_exists(pool, "sections").await? {
        debug!("Sections table doesn't exist yet, skipping migration");
        return Ok(());
    }

    let columns = column_names(pool, "sections").await?;
    if !columns.iter().any(|c| c == "semester") {
        debug!("Sections table has no legacy marker, skipping migration");
        return Ok(());
    }

    info!("Legacy sections layout detected, rebuilding table");

    rebuild_sections_table(pool, &columns)
        .await
        .map_err(|e| {
            Error::Migration(format!(
                "sections table rebuild failed (original table preserved): {e}"
            ))
        })?;

    info!("Sections table rebuilt in target layout");
    Ok(())
}

/// Copy every legacy row into a shadow table in the target layout, then
/// swap the shadow over the original. All of it happens in one transaction:
/// any failure rolls back, leaving the original table exactly as it was,
/// never two partial tables or zero section tables.
///
/// Defaulting during the copy: `name` falls back to a placeholder,
/// `capacity` to a standard seat count, `room` is taken from the legacy
/// `room` or `location` column when one exists.
async fn rebuild_sections_table(pool: &SqlitePool, legacy_columns: &[String]) -> Result<()> {
    let has = |name: &str| legacy_columns.iter().any(|c| c == name);

    let mut insert_columns = vec![
        "guid",
        "course_id",
        "instructor_id",
        "name",
        "capacity",
        "room",
        "timetable",
    ];
    let mut select_exprs = vec![
        "guid".to_string(),
        "course_id".to_string(),
        if has("instructor_id") {
            "instructor_id".to_string()
        } else {
            "NULL".to_string()
        },
        if has("name") {
            format!("COALESCE(name, '{}')", DEFAULT_SECTION_NAME)
        } else {
            format!("'{}'", DEFAULT_SECTION_NAME)
        },
        if has("capacity") {
            format!("COALESCE(capacity, {})", DEFAULT_SECTION_CAPACITY)
        } else {
            DEFAULT_SECTION_CAPACITY.to_string()
        },
        if has("room") {
            "room".to_string()
        } else if has("location") {
            "location".to_string()
        } else {
            "NULL".to_string()
        },
        if has("timetable") {
            "timetable".to_string()
        } else {
            "NULL".to_string()
        },
    ];

    // Preserve row timestamps when the legacy table carried them
    for ts in ["created_at", "updated_at"] {
        if has(ts) {
            insert_columns.push(ts);
            select_exprs.push(ts.to_string());
        }
    }

    let copy_sql = format!(
        "INSERT INTO sections_shadow ({}) SELECT {} FROM sections",
        insert_columns.join(", "),
        select_exprs.join(", ")
    );

    let mut conn = pool.acquire().await?;

    // The swap drops the original table while enrollments still reference
    // it by name. Enforcement is suspended on this connection only, for the
    // duration of the rebuild; the pragma is connection-scoped and cannot
    // change inside the transaction itself.
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await?;

    let outcome: Result<()> = async {
        let mut tx = conn.begin().await?;

        // A shadow left behind by an interrupted earlier run is stale
        sqlx::query("DROP TABLE IF EXISTS sections_shadow")
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE sections_shadow (
                guid TEXT PRIMARY KEY,
                course_id TEXT NOT NULL REFERENCES courses(guid),
                instructor_id TEXT REFERENCES instructors(guid),
                name TEXT NOT NULL,
                capacity INTEGER NOT NULL,
                room TEXT,
                timetable TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(&copy_sql).execute(&mut *tx).await?;

        sqlx::query("DROP TABLE sections").execute(&mut *tx).await?;

        sqlx::query("ALTER TABLE sections_shadow RENAME TO sections")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
    .await;

    let _ = sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await;

    outcome
}
