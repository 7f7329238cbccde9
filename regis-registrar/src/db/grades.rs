//! Grade records
//!
//! A grade belongs to exactly one enrollment. Recording a grade writes the
//! grade row and the enrollment's back-reference in one transaction.

use crate::db::parse_guid;
use crate::models::Grade;
use regis_common::error::{is_foreign_key_violation, is_unique_violation};
use regis_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub struct GradeRepository {
    pool: SqlitePool,
}

impl GradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a grade for an enrollment and link the enrollment to it.
    pub async fn record(&self, grade: &Grade) -> Result<Uuid> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO grades (guid, enrollment_id, grade, recorded_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(grade.guid.to_string())
        .bind(grade.enrollment_id.to_string())
        .bind(&grade.score)
        .bind(grade.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!(
                    "enrollment {} already has a grade",
                    grade.enrollment_id
                ))
            } else if is_foreign_key_violation(&e) {
                Error::NotFound(format!("enrollment {}", grade.enrollment_id))
            } else {
                e.into()
            }
        })?;

        sqlx::query("UPDATE enrollments SET grade_id = ? WHERE guid = ?")
            .bind(grade.guid.to_string())
            .bind(grade.enrollment_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(grade.guid)
    }

    pub async fn get_by_id(&self, guid: Uuid) -> Result<Option<Grade>> {
        let row = sqlx::query(
            "SELECT guid, enrollment_id, grade, recorded_at FROM grades WHERE guid = ?",
        )
        .bind(guid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_grade).transpose()
    }

    pub async fn get_for_enrollment(&self, enrollment_id: Uuid) -> Result<Option<Grade>> {
        let row = sqlx::query(
            "SELECT guid, enrollment_id, grade, recorded_at FROM grades WHERE enrollment_id = ?",
        )
        .bind(enrollment_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_grade).transpose()
    }

    /// Overwrite the stored score.
    pub async fn update(&self, grade: &Grade) -> Result<()> {
        let result = sqlx::query("UPDATE grades SET grade = ? WHERE guid = ?")
            .bind(&grade.score)
            .bind(grade.guid.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("grade {}", grade.guid)));
        }

        Ok(())
    }

    /// Delete a grade and clear the enrollment's back-reference.
    pub async fn delete(&self, guid: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE enrollments SET grade_id = NULL WHERE grade_id = ?")
            .bind(guid.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM grades WHERE guid = ?")
            .bind(guid.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("grade {guid}")));
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM grades")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_grade(row: &SqliteRow) -> Result<Grade> {
    let guid: String = row.get("guid");
    let enrollment_id: String = row.get("enrollment_id");

    Ok(Grade {
        guid: parse_guid(&guid)?,
        enrollment_id: parse_guid(&enrollment_id)?,
        score: row.get("grade"),
        recorded_at: row.get("recorded_at"),
    })
}
