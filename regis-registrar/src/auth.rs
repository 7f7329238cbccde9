//! Credential bridge and registration flows
//!
//! The credential service is an external collaborator consumed through the
//! narrow [`AuthBridge`] contract. Registration is a two-step flow (create
//! the credential, then the profile row); on profile failure the
//! compensating actions collected so far run in reverse so no orphaned
//! credential is left behind.
//!
//! Methods return `impl Future + Send` rather than using `async fn` so the
//! futures are guaranteed `Send` and safe to drive from spawned tasks.

use crate::db::{InstructorRepository, StudentRepository};
use crate::models::{Instructor, Student};
use regis_common::Result;
use std::future::Future;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

/// Credential returned by a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub role: Role,
}

/// Contract for the external credential service.
pub trait AuthBridge: Send + Sync {
    fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> impl Future<Output = Result<()>> + Send;

    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Credential>> + Send;

    fn delete_user(&self, username: &str) -> impl Future<Output = Result<()>> + Send;

    fn change_password(
        &self,
        username: &str,
        current: &str,
        new_password: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Compensating action for one completed registration step
enum Compensation {
    DeleteCredential { username: String },
}

async fn run_compensations<A: AuthBridge>(auth: &A, compensations: Vec<Compensation>) {
    for compensation in compensations.into_iter().rev() {
        match compensation {
            Compensation::DeleteCredential { username } => {
                if let Err(e) = auth.delete_user(&username).await {
                    warn!(%username, error = %e, "compensating credential delete failed");
                }
            }
        }
    }
}

/// Register a student: credential first, then the profile row.
///
/// When the profile insert fails (duplicate email, validation), the freshly
/// created credential is deleted and the profile error is returned.
pub async fn register_student<A: AuthBridge>(
    auth: &A,
    students: &StudentRepository,
    student: &Student,
    username: &str,
    password: &str,
) -> Result<Uuid> {
    auth.register(username, password, Role::Student).await?;

    let mut compensations = Vec::new();
    compensations.push(Compensation::DeleteCredential {
        username: username.to_string(),
    });

    match students.create(student).await {
        Ok(guid) => Ok(guid),
        Err(err) => {
            run_compensations(auth, compensations).await;
            Err(err)
        }
    }
}

/// Register an instructor: same flow as [`register_student`].
pub async fn register_instructor<A: AuthBridge>(
    auth: &A,
    instructors: &InstructorRepository,
    instructor: &Instructor,
    username: &str,
    password: &str,
) -> Result<Uuid> {
    auth.register(username, password, Role::Instructor).await?;

    let mut compensations = Vec::new();
    compensations.push(Compensation::DeleteCredential {
        username: username.to_string(),
    });

    match instructors.create(instructor).await {
        Ok(guid) => Ok(guid),
        Err(err) => {
            run_compensations(auth, compensations).await;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use regis_common::Error;
    use std::sync::Mutex;

    /// In-memory credential service double
    #[derive(Default)]
    struct FakeAuthBridge {
        users: Mutex<Vec<String>>,
        reject_register: bool,
    }

    impl AuthBridge for FakeAuthBridge {
        async fn register(&self, username: &str, _password: &str, _role: Role) -> Result<()> {
            if self.reject_register {
                return Err(Error::Conflict(format!("username {username} taken")));
            }
            self.users.lock().unwrap().push(username.to_string());
            Ok(())
        }

        async fn login(&self, username: &str, _password: &str) -> Result<Credential> {
            if self.users.lock().unwrap().iter().any(|u| u == username) {
                Ok(Credential {
                    username: username.to_string(),
                    role: Role::Student,
                })
            } else {
                Err(Error::NotFound(format!("user {username}")))
            }
        }

        async fn delete_user(&self, username: &str) -> Result<()> {
            self.users.lock().unwrap().retain(|u| u != username);
            Ok(())
        }

        async fn change_password(
            &self,
            _username: &str,
            _current: &str,
            _new_password: &str,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_register_student_creates_credential_and_profile() {
        let pool = test_pool().await;
        let students = StudentRepository::new(pool);
        let auth = FakeAuthBridge::default();

        let student = Student::new("Asha", "asha@campus.edu", "Physics");
        let guid = register_student(&auth, &students, &student, "asha", "hunter2")
            .await
            .unwrap();

        assert_eq!(guid, student.guid);
        assert!(auth.users.lock().unwrap().contains(&"asha".to_string()));
        assert!(students.get_by_id(guid).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_profile_failure_deletes_credential() {
        let pool = test_pool().await;
        let students = StudentRepository::new(pool);
        let auth = FakeAuthBridge::default();

        students
            .create(&Student::new("First", "taken@campus.edu", "Math"))
            .await
            .unwrap();

        let duplicate = Student::new("Second", "taken@campus.edu", "Math");
        let err = register_student(&auth, &students, &duplicate, "second", "hunter2")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Conflict(_)));
        // Compensating delete ran: no orphaned credential
        assert!(auth.users.lock().unwrap().is_empty());
        assert_eq!(students.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_credential_failure_creates_no_profile() {
        let pool = test_pool().await;
        let students = StudentRepository::new(pool);
        let auth = FakeAuthBridge {
            reject_register: true,
            ..Default::default()
        };

        let student = Student::new("Asha", "asha@campus.edu", "Physics");
        let err = register_student(&auth, &students, &student, "asha", "hunter2")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(students.count().await.unwrap(), 0);
    }
}
