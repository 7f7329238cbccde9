//! Student records

use crate::db::parse_guid;
use crate::models::Student;
use regis_common::error::{is_foreign_key_violation, is_unique_violation};
use regis_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub struct StudentRepository {
    pool: SqlitePool,
}

impl StudentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new student row. Returns the assigned guid.
    pub async fn create(&self, student: &Student) -> Result<Uuid> {
        validate(student)?;

        sqlx::query(
            r#"
            INSERT INTO students (guid, name, email, program)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(student.guid.to_string())
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.program)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("email {} is already registered", student.email))
            } else {
                e.into()
            }
        })?;

        Ok(student.guid)
    }

    pub async fn get_by_id(&self, guid: Uuid) -> Result<Option<Student>> {
        let row = sqlx::query(
            "SELECT guid, name, email, program FROM students WHERE guid = ?",
        )
        .bind(guid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_student).transpose()
    }

    /// Lookup by the unique email column. Always parameter-bound.
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Student>> {
        let row = sqlx::query(
            "SELECT guid, name, email, program FROM students WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_student).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query(
            "SELECT guid, name, email, program FROM students ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_student).collect()
    }

    /// Persist the whole row back. `NotFound` when the guid has no row.
    pub async fn update(&self, student: &Student) -> Result<()> {
        validate(student)?;

        let result = sqlx::query(
            r#"
            UPDATE students
            SET name = ?, email = ?, program = ?, updated_at = CURRENT_TIMESTAMP
            WHERE guid = ?
            "#,
        )
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.program)
        .bind(student.guid.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("email {} is already registered", student.email))
            } else {
                e.into()
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("student {}", student.guid)));
        }

        Ok(())
    }

    pub async fn delete(&self, guid: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM students WHERE guid = ?")
            .bind(guid.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::Conflict(format!("student {guid} still has enrollments"))
                } else {
                    e.into()
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("student {guid}")));
        }

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn validate(student: &Student) -> Result<()> {
    if student.name.trim().is_empty() {
        return Err(Error::Validation("student name must not be empty".into()));
    }
    if !student.email.contains('@') {
        return Err(Error::Validation(format!(
            "malformed email: {}",
            student.email
        )));
    }
    if student.program.trim().is_empty() {
        return Err(Error::Validation("student program must not be empty".into()));
    }
    Ok(())
}

fn row_to_student(row: &SqliteRow) -> Result<Student> {
    let guid: String = row.get("guid");
    Ok(Student {
        guid: parse_guid(&guid)?,
        name: row.get("name"),
        email: row.get("email"),
        program: row.get("program"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_create_and_get_student() {
        let repo = StudentRepository::new(test_pool().await);

        let student = Student::new("Asha Rao", "asha@campus.edu", "Physics");
        let guid = repo.create(&student).await.expect("Failed to save student");

        let loaded = repo
            .get_by_id(guid)
            .await
            .expect("Failed to load student")
            .expect("Student not found");

        assert_eq!(loaded, student);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_a_conflict() {
        let repo = StudentRepository::new(test_pool().await);

        repo.create(&Student::new("A", "same@campus.edu", "Math"))
            .await
            .unwrap();

        let err = repo
            .create(&Student::new("B", "same@campus.edu", "Math"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_student_is_not_found() {
        let repo = StudentRepository::new(test_pool().await);

        let ghost = Student::new("Ghost", "ghost@campus.edu", "Math");
        let err = repo.update(&ghost).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_email_rejected_before_storage() {
        let repo = StudentRepository::new(test_pool().await);

        let err = repo
            .create(&Student::new("A", "not-an-email", "Math"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_name() {
        let repo = StudentRepository::new(test_pool().await);

        repo.create(&Student::new("Zoe", "z@campus.edu", "Math"))
            .await
            .unwrap();
        repo.create(&Student::new("Ann", "a@campus.edu", "Math"))
            .await
            .unwrap();

        let names: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Ann", "Zoe"]);
    }
}
