//! Entity repositories and settings access

pub mod courses;
pub mod enrollments;
pub mod grades;
pub mod instructors;
pub mod sections;
pub mod settings;
pub mod students;

pub use courses::CourseRepository;
pub use enrollments::EnrollmentRepository;
pub use grades::GradeRepository;
pub use instructors::InstructorRepository;
pub use sections::SectionRepository;
pub use settings::SettingsStore;
pub use students::StudentRepository;

use regis_common::{Error, Result};
use uuid::Uuid;

/// Parse a guid column read back from storage.
pub(crate) fn parse_guid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Storage(sqlx::Error::Decode(e.into())))
}

/// Shared in-memory database for repository unit tests. Single connection:
/// every in-memory connection is its own database.
#[cfg(test)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to create in-memory database");

    regis_common::db::init::create_all_tables(&pool)
        .await
        .expect("Schema initialization failed");

    pool
}
