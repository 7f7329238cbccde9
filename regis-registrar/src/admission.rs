//! Enrollment admission
//!
//! Admission is the only operation with a real invariant to defend under
//! concurrency: the enrollment count of a section must never exceed its
//! capacity. A bare check-then-insert loses that race, so same-section
//! admissions are serialized through a per-section lock held across one
//! transaction covering the capacity check, the duplicate check, and the
//! insert. Admissions against different sections do not contend.
//!
//! Withdrawal only decreases the count and needs no lock.

use crate::models::Enrollment;
use regis_common::error::{is_foreign_key_violation, is_unique_violation};
use regis_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Registry of per-section admission locks.
///
/// Lock handles are created on first use and kept for the life of the
/// controller; the registry mutex is only held long enough to clone the
/// per-section handle, never across storage I/O.
struct SectionLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SectionLocks {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    async fn handle_for(&self, section_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().await;
        locks
            .entry(section_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

pub struct AdmissionController {
    pool: SqlitePool,
    locks: SectionLocks,
}

impl AdmissionController {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: SectionLocks::new(),
        }
    }

    /// Admit a student into a section.
    ///
    /// Preconditions, checked in one atomic unit of work:
    /// 1. the section exists (`NotFound` otherwise);
    /// 2. the student is not already enrolled in it (`AlreadyEnrolled`);
    /// 3. the current enrollment count is strictly below capacity
    ///    (`CapacityExceeded`).
    ///
    /// Student existence is enforced by the foreign key on insert.
    pub async fn admit(&self, student_id: Uuid, section_id: Uuid) -> Result<Enrollment> {
        let handle = self.locks.handle_for(section_id).await;
        let _section_guard = handle.lock().await;

        let mut tx = self.pool.begin().await?;

        let capacity: Option<i64> = sqlx::query_scalar("SELECT capacity FROM sections WHERE guid = ?")
            .bind(section_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let capacity =
            capacity.ok_or_else(|| Error::NotFound(format!("section {section_id}")))?;

        let already_enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM enrollments WHERE student_id = ? AND section_id = ?)",
        )
        .bind(student_id.to_string())
        .bind(section_id.to_string())
        .fetch_one(&mut *tx)
        .await?;
        if already_enrolled {
            return Err(Error::AlreadyEnrolled {
                student_id,
                section_id,
            });
        }

        let enrolled: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE section_id = ?")
                .bind(section_id.to_string())
                .fetch_one(&mut *tx)
                .await?;
        if enrolled >= capacity {
            debug!(
                %section_id,
                enrolled, capacity, "admission rejected: section full"
            );
            return Err(Error::CapacityExceeded {
                section_id,
                capacity,
            });
        }

        let enrollment = Enrollment::new(student_id, section_id);
        sqlx::query(
            r#"
            INSERT INTO enrollments (guid, student_id, section_id, grade_id, enrolled_at)
            VALUES (?, ?, ?, NULL, ?)
            "#,
        )
        .bind(enrollment.guid.to_string())
        .bind(student_id.to_string())
        .bind(section_id.to_string())
        .bind(enrollment.enrolled_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                Error::NotFound(format!("student {student_id}"))
            } else if is_unique_violation(&e) {
                Error::AlreadyEnrolled {
                    student_id,
                    section_id,
                }
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;

        debug!(
            %student_id, %section_id,
            seat = enrolled + 1, capacity, "admission accepted"
        );

        Ok(enrollment)
    }

    /// Withdraw an enrollment. `NotFound` when it does not exist.
    pub async fn withdraw(&self, enrollment_id: Uuid) -> Result<()> {
        crate::db::EnrollmentRepository::new(self.pool.clone())
            .delete(enrollment_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::{CourseRepository, SectionRepository, StudentRepository};
    use crate::models::{Course, Section, Student};

    async fn seed_section(pool: &SqlitePool, capacity: i64) -> Uuid {
        let course_id = CourseRepository::new(pool.clone())
            .create(&Course::new("CS101", "Intro", 4))
            .await
            .unwrap();
        SectionRepository::new(pool.clone())
            .create(&Section::new(course_id, "Morning", capacity))
            .await
            .unwrap()
    }

    async fn seed_student(pool: &SqlitePool, email: &str) -> Uuid {
        StudentRepository::new(pool.clone())
            .create(&Student::new("Student", email, "Physics"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_admit_into_missing_section() {
        let pool = test_pool().await;
        let student_id = seed_student(&pool, "a@campus.edu").await;
        let controller = AdmissionController::new(pool);

        let err = controller
            .admit(student_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_admit_missing_student() {
        let pool = test_pool().await;
        let section_id = seed_section(&pool, 10).await;
        let controller = AdmissionController::new(pool);

        let err = controller
            .admit(Uuid::new_v4(), section_id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_admission_rejected() {
        let pool = test_pool().await;
        let section_id = seed_section(&pool, 10).await;
        let student_id = seed_student(&pool, "a@campus.edu").await;
        let controller = AdmissionController::new(pool.clone());

        controller.admit(student_id, section_id).await.unwrap();

        let err = controller
            .admit(student_id, section_id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyEnrolled { .. }));

        let count = crate::db::EnrollmentRepository::new(pool)
            .count_for_section(section_id)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let pool = test_pool().await;
        let section_id = seed_section(&pool, 2).await;
        let controller = AdmissionController::new(pool.clone());

        for email in ["a@campus.edu", "b@campus.edu"] {
            let student_id = seed_student(&pool, email).await;
            controller.admit(student_id, section_id).await.unwrap();
        }

        let third = seed_student(&pool, "c@campus.edu").await;
        let err = controller.admit(third, section_id).await.unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { capacity: 2, .. }));

        let count = crate::db::EnrollmentRepository::new(pool)
            .count_for_section(section_id)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_withdraw_then_admit_reuses_seat() {
        let pool = test_pool().await;
        let section_id = seed_section(&pool, 1).await;
        let first = seed_student(&pool, "a@campus.edu").await;
        let second = seed_student(&pool, "b@campus.edu").await;
        let controller = AdmissionController::new(pool);

        let enrollment = controller.admit(first, section_id).await.unwrap();

        let err = controller.admit(second, section_id).await.unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { .. }));

        controller.withdraw(enrollment.guid).await.unwrap();
        controller.admit(second, section_id).await.unwrap();
    }
}
