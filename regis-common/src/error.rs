//! Common error types for the regis records store

use thiserror::Error;
use uuid::Uuid;

/// Common result type for regis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by all regis components
///
/// Repository and controller operations return one of these kinds rather
/// than suppressing failures into empty results. `Migration` is fatal:
/// startup must not proceed with an ambiguous schema.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage engine failure (connectivity, lock timeout, unexpected engine error)
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or out-of-range input, caught before reaching storage
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Referenced row absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation or a delete blocked by dependent rows
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Duplicate admission attempt for the same (student, section) pair
    #[error("Student {student_id} is already enrolled in section {section_id}")]
    AlreadyEnrolled { student_id: Uuid, section_id: Uuid },

    /// Admission rejected: the section has no remaining seats
    #[error("Section {section_id} is full ({capacity} seats)")]
    CapacityExceeded { section_id: Uuid, capacity: i64 },

    /// Schema cannot be brought to a known-good shape; aborts startup
    #[error("Migration error: {0}")]
    Migration(String),
}

/// True when a write failed a UNIQUE constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}

/// True when a write violated a foreign key.
///
/// On INSERT this means the referenced parent row is absent; on DELETE it
/// means dependent child rows still exist. Callers map accordingly.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("FOREIGN KEY constraint failed"))
}
