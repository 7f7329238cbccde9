//! Course catalog records

use crate::db::parse_guid;
use crate::models::Course;
use regis_common::error::{is_foreign_key_violation, is_unique_violation};
use regis_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Bounds for the credits column
pub const MIN_CREDITS: i64 = 1;
pub const MAX_CREDITS: i64 = 6;

pub struct CourseRepository {
    pool: SqlitePool,
}

impl CourseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, course: &Course) -> Result<Uuid> {
        validate(course)?;

        sqlx::query(
            r#"
            INSERT INTO courses (guid, code, title, credits)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(course.guid.to_string())
        .bind(&course.code)
        .bind(&course.title)
        .bind(course.credits)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("course code {} already exists", course.code))
            } else {
                e.into()
            }
        })?;

        Ok(course.guid)
    }

    pub async fn get_by_id(&self, guid: Uuid) -> Result<Option<Course>> {
        let row = sqlx::query("SELECT guid, code, title, credits FROM courses WHERE guid = ?")
            .bind(guid.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_course).transpose()
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<Course>> {
        let row = sqlx::query("SELECT guid, code, title, credits FROM courses WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_course).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query("SELECT guid, code, title, credits FROM courses ORDER BY code")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_course).collect()
    }

    pub async fn update(&self, course: &Course) -> Result<()> {
        validate(course)?;

        let result = sqlx::query(
            r#"
            UPDATE courses
            SET code = ?, title = ?, credits = ?, updated_at = CURRENT_TIMESTAMP
            WHERE guid = ?
            "#,
        )
        .bind(&course.code)
        .bind(&course.title)
        .bind(course.credits)
        .bind(course.guid.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict(format!("course code {} already exists", course.code))
            } else {
                e.into()
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("course {}", course.guid)));
        }

        Ok(())
    }

    pub async fn delete(&self, guid: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM courses WHERE guid = ?")
            .bind(guid.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::Conflict(format!("course {guid} still has sections"))
                } else {
                    e.into()
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("course {guid}")));
        }

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Codes of the courses a student is enrolled in, computed fresh per call.
    pub async fn codes_for_student(&self, student_id: Uuid) -> Result<Vec<String>> {
        let codes = sqlx::query_scalar(
            r#"
            SELECT DISTINCT c.code
            FROM courses c
            JOIN sections s ON s.course_id = c.guid
            JOIN enrollments e ON e.section_id = s.guid
            WHERE e.student_id = ?
            ORDER BY c.code
            "#,
        )
        .bind(student_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    /// Codes of the courses an instructor teaches a section of.
    pub async fn codes_for_instructor(&self, instructor_id: Uuid) -> Result<Vec<String>> {
        let codes = sqlx::query_scalar(
            r#"
            SELECT DISTINCT c.code
            FROM courses c
            JOIN sections s ON s.course_id = c.guid
            WHERE s.instructor_id = ?
            ORDER BY c.code
            "#,
        )
        .bind(instructor_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }
}

fn validate(course: &Course) -> Result<()> {
    if course.code.trim().is_empty() {
        return Err(Error::Validation("course code must not be empty".into()));
    }
    if course.title.trim().is_empty() {
        return Err(Error::Validation("course title must not be empty".into()));
    }
    if !(MIN_CREDITS..=MAX_CREDITS).contains(&course.credits) {
        return Err(Error::Validation(format!(
            "credits must be between {MIN_CREDITS} and {MAX_CREDITS}, got {}",
            course.credits
        )));
    }
    Ok(())
}

fn row_to_course(row: &SqliteRow) -> Result<Course> {
    let guid: String = row.get("guid");
    Ok(Course {
        guid: parse_guid(&guid)?,
        code: row.get("code"),
        title: row.get("title"),
        credits: row.get("credits"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_course_round_trip() {
        let repo = CourseRepository::new(test_pool().await);

        let course = Course::new("CS101", "Intro", 4);
        let guid = repo.create(&course).await.unwrap();

        let loaded = repo.get_by_id(guid).await.unwrap().unwrap();
        assert_eq!(loaded.code, "CS101");
        assert_eq!(loaded.title, "Intro");
        assert_eq!(loaded.credits, 4);
        assert_eq!(loaded.guid, guid);
    }

    #[tokio::test]
    async fn test_duplicate_code_is_a_conflict() {
        let repo = CourseRepository::new(test_pool().await);

        repo.create(&Course::new("CS101", "Intro", 4)).await.unwrap();

        let err = repo
            .create(&Course::new("CS101", "Other", 3))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_credits_out_of_range_rejected() {
        let repo = CourseRepository::new(test_pool().await);

        for credits in [0, -1, 7] {
            let err = repo
                .create(&Course::new("CS900", "Bad", credits))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "credits {credits}");
        }
    }
}
