//! Entity models
//!
//! Rows are owned by their repositories: callers load a fresh copy, mutate
//! fields, and persist the whole row back. Constructors assign the guid.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub guid: Uuid,
    pub name: String,
    pub email: String,
    pub program: String,
}

impl Student {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        program: impl Into<String>,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            program: program.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instructor {
    pub guid: Uuid,
    pub name: String,
    pub email: String,
    pub department: String,
}

impl Instructor {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            department: department.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub guid: Uuid,
    pub code: String,
    pub title: String,
    pub credits: i64,
}

impl Course {
    pub fn new(code: impl Into<String>, title: impl Into<String>, credits: i64) -> Self {
        Self {
            guid: Uuid::new_v4(),
            code: code.into(),
            title: title.into(),
            credits,
        }
    }
}

/// One meeting slot in a section's weekly timetable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingTime {
    pub day: String,
    pub starts: String,
    pub ends: String,
}

/// One scheduled offering of a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub guid: Uuid,
    pub course_id: Uuid,
    pub instructor_id: Option<Uuid>,
    pub name: String,
    pub capacity: i64,
    pub room: Option<String>,
    pub timetable: Vec<MeetingTime>,
}

impl Section {
    pub fn new(course_id: Uuid, name: impl Into<String>, capacity: i64) -> Self {
        Self {
            guid: Uuid::new_v4(),
            course_id,
            instructor_id: None,
            name: name.into(),
            capacity,
            room: None,
            timetable: Vec::new(),
        }
    }
}

/// A binding of one student to one section, optionally carrying a grade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub guid: Uuid,
    pub student_id: Uuid,
    pub section_id: Uuid,
    pub grade_id: Option<Uuid>,
    pub enrolled_at: i64,
}

impl Enrollment {
    pub fn new(student_id: Uuid, section_id: Uuid) -> Self {
        Self {
            guid: Uuid::new_v4(),
            student_id,
            section_id,
            grade_id: None,
            enrolled_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Numeric score for one enrollment, stored as text and parsed on read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub guid: Uuid,
    pub enrollment_id: Uuid,
    pub score: Option<String>,
    pub recorded_at: i64,
}

impl Grade {
    pub fn new(enrollment_id: Uuid, score: Option<String>) -> Self {
        Self {
            guid: Uuid::new_v4(),
            enrollment_id,
            score,
            recorded_at: chrono::Utc::now().timestamp(),
        }
    }
}
