//! Expected shapes for the records-store tables
//!
//! Single source of truth for additive column evolution. The shapes here
//! mirror the `CREATE TABLE IF NOT EXISTS` statements in `db::init`; when a
//! column is added to a shape, existing databases pick it up on the next
//! startup without a manual migration.

use crate::db::shape::{sync_table, ColumnSpec, TableShape};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

pub struct StudentsShape;

impl TableShape for StudentsShape {
    fn table_name() -> &'static str {
        "students"
    }

    fn expected_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("guid", "TEXT"),
            ColumnSpec::new("name", "TEXT"),
            ColumnSpec::new("email", "TEXT"),
            ColumnSpec::new("program", "TEXT"),
            ColumnSpec::new("created_at", "TIMESTAMP"),
            ColumnSpec::new("updated_at", "TIMESTAMP"),
        ]
    }
}

pub struct InstructorsShape;

impl TableShape for InstructorsShape {
    fn table_name() -> &'static str {
        "instructors"
    }

    fn expected_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("guid", "TEXT"),
            ColumnSpec::new("name", "TEXT"),
            ColumnSpec::new("email", "TEXT"),
            ColumnSpec::new("department", "TEXT"),
            ColumnSpec::new("created_at", "TIMESTAMP"),
            ColumnSpec::new("updated_at", "TIMESTAMP"),
        ]
    }
}

pub struct CoursesShape;

impl TableShape for CoursesShape {
    fn table_name() -> &'static str {
        "courses"
    }

    fn expected_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("guid", "TEXT"),
            ColumnSpec::new("code", "TEXT"),
            ColumnSpec::new("title", "TEXT"),
            ColumnSpec::new("credits", "INTEGER"),
            ColumnSpec::new("created_at", "TIMESTAMP"),
            ColumnSpec::new("updated_at", "TIMESTAMP"),
        ]
    }
}

/// Target shape of the sections table.
///
/// The one-time rebuild away from the legacy (`semester`-carrying) layout is
/// handled by `db::migrations`; this shape only covers additive drift, e.g.
/// a database that predates the `room` column.
pub struct SectionsShape;

impl TableShape for SectionsShape {
    fn table_name() -> &'static str {
        "sections"
    }

    fn expected_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("guid", "TEXT"),
            ColumnSpec::new("course_id", "TEXT"),
            ColumnSpec::new("instructor_id", "TEXT"),
            ColumnSpec::new("name", "TEXT"),
            ColumnSpec::new("capacity", "INTEGER"),
            ColumnSpec::new("room", "TEXT"),
            ColumnSpec::new("timetable", "TEXT"),
            ColumnSpec::new("created_at", "TIMESTAMP"),
            ColumnSpec::new("updated_at", "TIMESTAMP"),
        ]
    }
}

pub struct EnrollmentsShape;

impl TableShape for EnrollmentsShape {
    fn table_name() -> &'static str {
        "enrollments"
    }

    fn expected_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("guid", "TEXT"),
            ColumnSpec::new("student_id", "TEXT"),
            ColumnSpec::new("section_id", "TEXT"),
            ColumnSpec::new("grade_id", "TEXT"),
            ColumnSpec::new("enrolled_at", "INTEGER"),
        ]
    }
}

pub struct GradesShape;

impl TableShape for GradesShape {
    fn table_name() -> &'static str {
        "grades"
    }

    fn expected_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("guid", "TEXT"),
            ColumnSpec::new("enrollment_id", "TEXT"),
            ColumnSpec::new("grade", "TEXT"),
            ColumnSpec::new("recorded_at", "INTEGER"),
        ]
    }
}

pub struct SettingsShape;

impl TableShape for SettingsShape {
    fn table_name() -> &'static str {
        "settings"
    }

    fn expected_columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("key", "TEXT"),
            ColumnSpec::new("value", "TEXT"),
            ColumnSpec::new("updated_at", "TIMESTAMP"),
        ]
    }
}

/// Synchronize the shapes of all tables.
///
/// Runs after `CREATE TABLE IF NOT EXISTS` and after the manual migrations,
/// so the sections legacy rebuild sees the untouched legacy layout.
pub async fn sync_all_tables(pool: &SqlitePool) -> Result<()> {
    sync_table::<StudentsShape>(pool).await?;
    sync_table::<InstructorsShape>(pool).await?;
    sync_table::<CoursesShape>(pool).await?;
    sync_table::<SectionsShape>(pool).await?;
    sync_table::<EnrollmentsShape>(pool).await?;
    sync_table::<GradesShape>(pool).await?;
    sync_table::<SettingsShape>(pool).await?;

    info!("Table shape synchronization complete");
    Ok(())
}
