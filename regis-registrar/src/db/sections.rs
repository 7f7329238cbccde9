//! Section records
//!
//! The timetable is stored as a JSON array in a TEXT column; a NULL column
//! reads back as an empty timetable.

use crate::db::parse_guid;
use crate::models::{MeetingTime, Section};
use regis_common::error::is_foreign_key_violation;
use regis_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub struct SectionRepository {
    pool: SqlitePool,
}

impl SectionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, section: &Section) -> Result<Uuid> {
        validate(section)?;

        sqlx::query(
            r#"
            INSERT INTO sections (guid, course_id, instructor_id, name, capacity, room, timetable)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(section.guid.to_string())
        .bind(section.course_id.to_string())
        .bind(section.instructor_id.map(|id| id.to_string()))
        .bind(&section.name)
        .bind(section.capacity)
        .bind(&section.room)
        .bind(encode_timetable(&section.timetable)?)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                Error::NotFound(format!(
                    "course {} or referenced instructor does not exist",
                    section.course_id
                ))
            } else {
                e.into()
            }
        })?;

        Ok(section.guid)
    }

    pub async fn get_by_id(&self, guid: Uuid) -> Result<Option<Section>> {
        let row = sqlx::query(
            r#"
            SELECT guid, course_id, instructor_id, name, capacity, room, timetable
            FROM sections
            WHERE guid = ?
            "#,
        )
        .bind(guid.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_section).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Section>> {
        let rows = sqlx::query(
            r#"
            SELECT guid, course_id, instructor_id, name, capacity, room, timetable
            FROM sections
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_section).collect()
    }

    pub async fn list_for_course(&self, course_id: Uuid) -> Result<Vec<Section>> {
        let rows = sqlx::query(
            r#"
            SELECT guid, course_id, instructor_id, name, capacity, room, timetable
            FROM sections
            WHERE course_id = ?
            ORDER BY name
            "#,
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_section).collect()
    }

    pub async fn update(&self, section: &Section) -> Result<()> {
        validate(section)?;

        let result = sqlx::query(
            r#"
            UPDATE sections
            SET course_id = ?, instructor_id = ?, name = ?, capacity = ?,
                room = ?, timetable = ?, updated_at = CURRENT_TIMESTAMP
            WHERE guid = ?
            "#,
        )
        .bind(section.course_id.to_string())
        .bind(section.instructor_id.map(|id| id.to_string()))
        .bind(&section.name)
        .bind(section.capacity)
        .bind(&section.room)
        .bind(encode_timetable(&section.timetable)?)
        .bind(section.guid.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                Error::NotFound(format!(
                    "course {} or referenced instructor does not exist",
                    section.course_id
                ))
            } else {
                e.into()
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("section {}", section.guid)));
        }

        Ok(())
    }

    pub async fn delete(&self, guid: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM sections WHERE guid = ?")
            .bind(guid.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    Error::Conflict(format!("section {guid} still has enrollments"))
                } else {
                    e.into()
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("section {guid}")));
        }

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM sections")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn validate(section: &Section) -> Result<()> {
    if section.name.trim().is_empty() {
        return Err(Error::Validation("section name must not be empty".into()));
    }
    if section.capacity < 1 {
        return Err(Error::Validation(format!(
            "section capacity must be at least 1, got {}",
            section.capacity
        )));
    }
    Ok(())
}

fn encode_timetable(slots: &[MeetingTime]) -> Result<Option<String>> {
    if slots.is_empty() {
        return Ok(None);
    }
    serde_json::to_string(slots)
        .map(Some)
        .map_err(|e| Error::Storage(sqlx::Error::Encode(e.into())))
}

fn decode_timetable(raw: Option<String>) -> Result<Vec<MeetingTime>> {
    match raw {
        None => Ok(Vec::new()),
        Some(json) => {
            serde_json::from_str(&json).map_err(|e| Error::Storage(sqlx::Error::Decode(e.into())))
        }
    }
}

fn row_to_section(row: &SqliteRow) -> Result<Section> {
    let guid: String = row.get("guid");
    let course_id: String = row.get("course_id");
    let instructor_id: Option<String> = row.get("instructor_id");

    Ok(Section {
        guid: parse_guid(&guid)?,
        course_id: parse_guid(&course_id)?,
        instructor_id: instructor_id.as_deref().map(parse_guid).transpose()?,
        name: row.get("name"),
        capacity: row.get("capacity"),
        room: row.get("room"),
        timetable: decode_timetable(row.get("timetable"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::CourseRepository;
    use crate::models::Course;

    async fn seed_course(pool: &SqlitePool) -> Uuid {
        let course = Course::new("CS101", "Intro", 4);
        CourseRepository::new(pool.clone())
            .create(&course)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_section_round_trip_with_timetable() {
        let pool = test_pool().await;
        let course_id = seed_course(&pool).await;
        let repo = SectionRepository::new(pool);

        let mut section = Section::new(course_id, "Morning", 40);
        section.room = Some("B-204".into());
        section.timetable = vec![MeetingTime {
            day: "Mon".into(),
            starts: "09:00".into(),
            ends: "10:30".into(),
        }];

        let guid = repo.create(&section).await.unwrap();
        let loaded = repo.get_by_id(guid).await.unwrap().unwrap();

        assert_eq!(loaded, section);
    }

    #[tokio::test]
    async fn test_empty_timetable_reads_back_empty() {
        let pool = test_pool().await;
        let course_id = seed_course(&pool).await;
        let repo = SectionRepository::new(pool);

        let guid = repo
            .create(&Section::new(course_id, "Evening", 20))
            .await
            .unwrap();

        let loaded = repo.get_by_id(guid).await.unwrap().unwrap();
        assert!(loaded.timetable.is_empty());
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let pool = test_pool().await;
        let course_id = seed_course(&pool).await;
        let repo = SectionRepository::new(pool);

        let err = repo
            .create(&Section::new(course_id, "Bad", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_dangling_course_reference_is_not_found() {
        let pool = test_pool().await;
        let repo = SectionRepository::new(pool);

        let err = repo
            .create(&Section::new(Uuid::new_v4(), "Orphan", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_section_is_not_found() {
        let pool = test_pool().await;
        let repo = SectionRepository::new(pool);

        let err = repo.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
