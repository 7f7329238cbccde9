//! Enrollment records
//!
//! `create` performs no capacity check. Admission, with its capacity and
//! duplicate preconditions, goes through `admission::AdmissionController`;
//! this repository is the storage layer beneath it.

use crate::db::parse_guid;
use crate::models::Enrollment;
use regis_common::error::{is_foreign_key_violation, is_unique_violation};
use regis_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub struct EnrollmentRepository {
    pool: SqlitePool,
}

impl EnrollmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, enrollment: &Enrollment) -> Result<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO enrollments (guid, student_id, section_id, grade_id, enrolled_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(enrollment.guid.to_string())
        .bind(enrollment.student_id.to_string())
        .bind(enrollment.section_id.to_string())
        .bind(enrollment.grade_id.map(|id| id.to_string()))
        .bind(enrollment.enrolled_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::AlreadyEnrolled {
                    student_id: enrollment.student_id,
                    section_id: enrollment.section_id,
                }
            } else if is_foreign_key_violation(&e) {
                Error::NotFound(format!(
                    "student {} or section {} does not exist",
                    enrollment.student_id, enrollment.section_id
                ))
            } else {
                e.into()
            }
        })?;

        Ok(enrollment.guid)
    }

    pub async fn get_by_id(&self, guid: Uuid) -> Result<Option<Enrollment>> {
        let row = sqlx::query(
            r#"
            SELECT guid, student_id, section_id, grade_id, enrolled_at
            FROM enrollments
            WHERE guid = ?
            "#,
        )
        .bind(guid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_enrollment).transpose()
    }

    pub async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<Enrollment>> {
        let rows = sqlx::query(
            r#"
            SELECT guid, student_id, section_id, grade_id, enrolled_at
            FROM enrollments
            WHERE student_id = ?
            ORDER BY enrolled_at
            "#,
        )
        .bind(student_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_enrollment).collect()
    }

    pub async fn list_for_section(&self, section_id: Uuid) -> Result<Vec<Enrollment>> {
        let rows = sqlx::query(
            r#"
            SELECT guid, student_id, section_id, grade_id, enrolled_at
            FROM enrollments
            WHERE section_id = ?
            ORDER BY enrolled_at
            "#,
        )
        .bind(section_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_enrollment).collect()
    }

    /// Withdraw: no precondition beyond existence. Never needs the
    /// admission lock because it only decreases the section count.
    pub async fn delete(&self, guid: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM enrollments WHERE guid = ?")
            .bind(guid.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::Conflict(format!("enrollment {guid} has a recorded grade"))
                } else {
                    e.into()
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("enrollment {guid}")));
        }

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Current enrollment count for one section, computed fresh per call.
    pub async fn count_for_section(&self, section_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE section_id = ?")
            .bind(section_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn row_to_enrollment(row: &SqliteRow) -> Result<Enrollment> {
    let guid: String = row.get("guid");
    let student_id: String = row.get("student_id");
    let section_id: String = row.get("section_id");
    let grade_id: Option<String> = row.get("grade_id");

    Ok(Enrollment {
        guid: parse_guid(&guid)?,
        student_id: parse_guid(&student_id)?,
        section_id: parse_guid(&section_id)?,
        grade_id: grade_id.as_deref().map(parse_guid).transpose()?,
        enrolled_at: row.get("enrolled_at"),
    })
}
