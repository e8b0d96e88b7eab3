use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::schedule::{ClassSchedule, Recurrence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            _ => Err(AppError::Internal(format!(
                "Unknown attendance status: {}",
                s
            ))),
        }
    }
}

/// How a record was produced: a teacher's roster entry or a QR scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkSource {
    Manual,
    Qr,
}

impl MarkSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkSource::Manual => "manual",
            MarkSource::Qr => "qr",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "manual" => Ok(MarkSource::Manual),
            "qr" => Ok(MarkSource::Qr),
            _ => Err(AppError::Internal(format!("Unknown mark source: {}", s))),
        }
    }
}

/// First name, middle initial and last name, skipping blanks.
pub fn compose_full_name(
    first: Option<&str>,
    middle: Option<&str>,
    last: Option<&str>,
) -> Option<String> {
    let middle_initial = middle.and_then(|m| m.trim().chars().next()).map(String::from);

    let parts: Vec<&str> = [first, middle_initial.as_deref(), last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn name_or_fallback(full_name: Option<String>, display_name: &str, username: &str) -> String {
    full_name
        .or_else(|| Some(display_name.to_string()).filter(|d| !d.is_empty()))
        .unwrap_or_else(|| username.to_string())
}

#[derive(Debug, Serialize, Clone)]
pub struct TeacherProfile {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub employee_number: Option<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTeacherProfile {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub employee_number: Option<String>,
}

impl From<DbTeacherProfile> for TeacherProfile {
    fn from(db: DbTeacherProfile) -> Self {
        let full_name = compose_full_name(
            db.first_name.as_deref(),
            db.middle_name.as_deref(),
            db.last_name.as_deref(),
        );

        Self {
            id: db.id,
            user_id: db.user_id,
            name: name_or_fallback(full_name, &db.display_name, &db.username),
            username: db.username,
            employee_number: db.employee_number,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct StudentProfile {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub student_number: Option<String>,
    #[serde(skip_serializing)]
    pub qr_token: String,
    pub archived: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbStudentProfile {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub archived: bool,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub student_number: Option<String>,
    pub qr_token: String,
}

impl From<DbStudentProfile> for StudentProfile {
    fn from(db: DbStudentProfile) -> Self {
        let full_name = compose_full_name(
            db.first_name.as_deref(),
            db.middle_name.as_deref(),
            db.last_name.as_deref(),
        );

        Self {
            id: db.id,
            user_id: db.user_id,
            name: name_or_fallback(full_name, &db.display_name, &db.username),
            username: db.username,
            student_number: db.student_number,
            qr_token: db.qr_token,
            archived: db.archived,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Class {
    pub id: i64,
    pub teacher_id: i64,
    pub name: String,
    pub description: String,
    pub schedule: ClassSchedule,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbClass {
    pub id: i64,
    pub teacher_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub meeting_days: String,
    pub session_date: Option<NaiveDate>,
}

impl TryFrom<DbClass> for Class {
    type Error = AppError;

    fn try_from(db: DbClass) -> Result<Self, Self::Error> {
        let recurrence = Recurrence::from_columns(&db.meeting_days, db.session_date)?;
        let schedule = ClassSchedule::new(db.start_time, db.end_time, recurrence)?;

        Ok(Self {
            id: db.id,
            teacher_id: db.teacher_id,
            name: db.name,
            description: db.description.unwrap_or_default(),
            schedule,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub class_id: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub class_id: i64,
    pub session_date: NaiveDate,
    pub status: AttendanceStatus,
    pub source: MarkSource,
    pub marked_by: i64,
    pub marked_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub class_id: i64,
    pub session_date: NaiveDate,
    pub status: String,
    pub source: String,
    pub marked_by: i64,
    pub marked_at: NaiveDateTime,
}

impl TryFrom<DbAttendanceRecord> for AttendanceRecord {
    type Error = AppError;

    fn try_from(db: DbAttendanceRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: db.id,
            student_id: db.student_id,
            class_id: db.class_id,
            session_date: db.session_date,
            status: AttendanceStatus::parse(&db.status)?,
            source: MarkSource::parse(&db.source)?,
            marked_by: db.marked_by,
            marked_at: DateTime::<Utc>::from_naive_utc_and_offset(db.marked_at, Utc),
        })
    }
}

/// A record joined with the names shown in history views.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AttendanceEntry {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub student_name: String,
    pub class_name: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbAttendanceEntry {
    #[sqlx(flatten)]
    pub record: DbAttendanceRecord,
    pub username: String,
    pub display_name: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub class_name: String,
}

impl TryFrom<DbAttendanceEntry> for AttendanceEntry {
    type Error = AppError;

    fn try_from(db: DbAttendanceEntry) -> Result<Self, Self::Error> {
        let full_name = compose_full_name(
            db.first_name.as_deref(),
            db.middle_name.as_deref(),
            db.last_name.as_deref(),
        );

        Ok(Self {
            record: AttendanceRecord::try_from(db.record)?,
            student_name: name_or_fallback(full_name, &db.display_name, &db.username),
            class_name: db.class_name,
        })
    }
}
