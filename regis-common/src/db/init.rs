//! Database initialization
//!
//! `init_database` is the single startup entry point. It is idempotent and
//! safe to call on every launch, against a fresh file, a database already in
//! the target shape, or one still in the legacy shape:
//!
//! 1. Open a pooled connection (created on first run) with foreign keys
//!    enforced, WAL journaling, and a bounded busy timeout on every
//!    connection.
//! 2. `CREATE TABLE IF NOT EXISTS` for every table.
//! 3. Manual migrations (`db::migrations`), which run before shape sync so
//!    the legacy sections layout is detected before any column is touched.
//! 4. Additive shape sync (`db::tables`).
//! 5. Default settings seeding.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Bounded wait for lock acquisition, applied to every pooled connection.
/// Contended statements fail with a storage error after this long rather
/// than blocking indefinitely.
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection pool and bring the schema to the target
/// shape.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Phase 1: create missing tables
    create_all_tables(&pool).await?;

    // Phase 2: manual migrations. Must precede shape sync: legacy layout
    // detection has to observe the sections table exactly as it was left.
    crate::db::migrations::run_migrations(&pool).await?;

    // Phase 3: additive column evolution
    crate::db::tables::sync_all_tables(&pool).await?;

    // Phase 4: default settings
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create every table that does not exist yet.
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_students_table(pool).await?;
    create_instructors_table(pool).await?;
    create_courses_table(pool).await?;
    create_sections_table(pool).await?;
    create_enrollments_table(pool).await?;
    create_grades_table(pool).await?;
    create_settings_table(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_students_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            program TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_instructors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS instructors (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            department TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_courses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            guid TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            credits INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sections_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sections (
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
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sections_course ON sections(course_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_enrollments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS enrollments (
            guid TEXT PRIMARY KEY,
            student_id TEXT NOT NULL REFERENCES students(guid),
            section_id TEXT NOT NULL REFERENCES sections(guid),
            grade_id TEXT REFERENCES grades(guid),
            enrolled_at INTEGER NOT NULL,
            UNIQUE(student_id, section_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_enrollments_section ON enrollments(section_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_grades_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS grades (
            guid TEXT PRIMARY KEY,
            enrollment_id TEXT NOT NULL UNIQUE REFERENCES enrollments(guid),
            grade TEXT,
            recorded_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table (key-value configuration).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed required settings with defaults. Existing values are left alone;
/// NULL values are reset to the default.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "default_section_capacity", "30").await?;
    ensure_setting(pool, "db_busy_timeout_ms", &BUSY_TIMEOUT_MS.to_string()).await?;
    ensure_setting(pool, "registration_open", "true").await?;

    Ok(())
}

async fn ensure_setting(pool: &SqlitePool, key: &str, default: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default)
        .execute(pool)
        .await?;

    sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default)
        .bind(key)
        .execute(pool)
        .await?;

    Ok(())
}
