//! Instructor records

use crate::db::parse_guid;
use crate::models::Instructor;
use regis_common::error::{is_foreign_key_violation, is_unique_violation};
use regis_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub struct InstructorRepository {
    pool: SqlitePool,
}

impl InstructorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, instructor: &Instructor) -> Result<Uuid> {
        validate(instructor)?;

        sqlx::query(
            r#"
            INSERT INTO instructors (guid, name, email, department)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(instructor.guid.to_string())
        .bind(&instructor.name)
        .bind(&instructor.email)
        .bind(&instructor.department)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!(
                    "email {} is already registered",
                    instructor.email
                ))
            } else {
                e.into()
            }
        })?;

        Ok(instructor.guid)
    }

    pub async fn get_by_id(&self, guid: Uuid) -> Result<Option<Instructor>> {
        let row = sqlx::query(
            "SELECT guid, name, email, department FROM instructors WHERE guid = ?",
        )
        .bind(guid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_instructor).transpose()
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<Instructor>> {
        let row = sqlx::query(
            "SELECT guid, name, email, department FROM instructors WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_instructor).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Instructor>> {
        let rows = sqlx::query(
            "SELECT guid, name, email, department FROM instructors ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_instructor).collect()
    }

    pub async fn update(&self, instructor: &Instructor) -> Result<()> {
        validate(instructor)?;

        let result = sqlx::query(
            r#"
            UPDATE instructors
            SET name = ?, email = ?, department = ?, updated_at = CURRENT_TIMESTAMP
            WHERE guid = ?
            "#,
        )
        .bind(&instructor.name)
        .bind(&instructor.email)
        .bind(&instructor.department)
        .bind(instructor.guid.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!(
                    "email {} is already registered",
                    instructor.email
                ))
            } else {
                e.into()
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("instructor {}", instructor.guid)));
        }

        Ok(())
    }

    pub async fn delete(&self, guid: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM instructors WHERE guid = ?")
            .bind(guid.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::Conflict(format!("instructor {guid} is still assigned to sections"))
                } else {
                    e.into()
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("instructor {guid}")));
        }

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM instructors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn validate(instructor: &Instructor) -> Result<()> {
    if instructor.name.trim().is_empty() {
        return Err(Error::Validation("instructor name must not be empty".into()));
    }
    if !instructor.email.contains('@') {
        return Err(Error::Validation(format!(
            "malformed email: {}",
            instructor.email
        )));
    }
    if instructor.department.trim().is_empty() {
        return Err(Error::Validation(
            "instructor department must not be empty".into(),
        ));
    }
    Ok(())
}

fn row_to_instructor(row: &SqliteRow) -> Result<Instructor> {
    let guid: String = row.get("guid");
    Ok(Instructor {
        guid: parse_guid(&guid)?,
        name: row.get("name"),
        email: row.get("email"),
        department: row.get("department"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_create_and_get_instructor() {
        let repo = InstructorRepository::new(test_pool().await);

        let instructor = Instructor::new("Lena Ortiz", "lortiz@campus.edu", "Mathematics");
        let guid = repo.create(&instructor).await.unwrap();

        let loaded = repo.get_by_id(guid).await.unwrap().unwrap();
        assert_eq!(loaded, instructor);
    }

    #[tokio::test]
    async fn test_lookup_by_email() {
        let repo = InstructorRepository::new(test_pool().await);

        let instructor = Instructor::new("Lena Ortiz", "lortiz@campus.edu", "Mathematics");
        repo.create(&instructor).await.unwrap();

        let found = repo.get_by_email("lortiz@campus.edu").await.unwrap();
        assert_eq!(found.map(|i| i.guid), Some(instructor.guid));

        let missing = repo.get_by_email("nobody@campus.edu").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_instructor_is_not_found() {
        let repo = InstructorRepository::new(test_pool().await);

        let err = repo.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
