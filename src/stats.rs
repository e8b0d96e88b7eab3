//! Read-only views over attendance records: history, percentages and the two
//! dashboards.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::auth::RequestContext;
use crate::classes::get_owned_class;
use crate::db;
use crate::error::AppError;
use crate::models::{
    AttendanceEntry, AttendanceRecord, AttendanceStatus, Class, StudentProfile, TeacherProfile,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl HistoryFilter {
    /// An exact date overrides the range.
    pub fn bounds(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>), AppError> {
        if let Some(date) = self.date {
            return Ok((Some(date), Some(date)));
        }

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(AppError::Validation(format!(
                    "History range starts after it ends ({} > {})",
                    from, to
                )));
            }
        }

        Ok((self.from, self.to))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    pub percent: f64,
}

/// Present sessions over recorded sessions, as a percentage rounded to two
/// decimals. Late does not count as present. No sessions yet reads as 100.
pub fn summarize<'a, I>(records: I) -> AttendanceSummary
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let (mut present, mut late, mut absent) = (0, 0, 0);

    for record in records {
        match record.status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Late => late += 1,
            AttendanceStatus::Absent => absent += 1,
        }
    }

    let total = present + late + absent;
    let percent = if total == 0 {
        100.0
    } else {
        (present as f64 / total as f64 * 10_000.0).round() / 100.0
    };

    AttendanceSummary {
        total,
        present,
        late,
        absent,
        percent,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassHistory {
    pub class: Class,
    pub entries: Vec<AttendanceEntry>,
    /// Every date with at least one record, newest first, for filter pickers.
    pub dates: Vec<NaiveDate>,
    pub summary: AttendanceSummary,
}

#[instrument(skip(pool, ctx), fields(actor = %ctx.user.username))]
pub async fn class_history(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    class_id: i64,
    filter: &HistoryFilter,
) -> Result<ClassHistory, AppError> {
    let class = get_owned_class(pool, ctx, class_id).await?;
    let (from, to) = filter.bounds()?;

    let entries = db::get_class_attendance_entries(pool, class_id, from, to).await?;
    let dates = db::get_recorded_dates(pool, class_id).await?;
    let summary = summarize(entries.iter().map(|e| &e.record));

    Ok(ClassHistory {
        class,
        entries,
        dates,
        summary,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentHistory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<Class>,
    pub entries: Vec<AttendanceEntry>,
    pub summary: AttendanceSummary,
}

/// The acting student's own records, optionally for one enrolled class.
#[instrument(skip(pool, ctx), fields(actor = %ctx.user.username))]
pub async fn student_history(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    class_id: Option<i64>,
) -> Result<StudentHistory, AppError> {
    let student = ctx.student()?;

    let class = match class_id {
        Some(class_id) => {
            let class = db::get_class(pool, class_id).await?;
            if !db::is_enrolled(pool, student.id, class_id).await? {
                return Err(AppError::NotEnrolled {
                    student_id: student.id,
                    class_id,
                });
            }
            Some(class)
        }
        None => None,
    };

    let entries = db::get_student_attendance_entries(pool, student.id, class_id).await?;
    let summary = summarize(entries.iter().map(|e| &e.record));

    Ok(StudentHistory {
        class,
        entries,
        summary,
    })
}

fn split_by_session(
    classes: &[Class],
    now: DateTime<Utc>,
    timezone: FixedOffset,
) -> (Vec<Class>, Vec<Class>) {
    let mut in_session = Vec::new();
    let mut upcoming = Vec::new();

    for class in classes {
        if let Some(window) = class.schedule.window_around(now, timezone) {
            if window.contains(now) {
                in_session.push(class.clone());
            } else if window.not_started(now) {
                upcoming.push(class.clone());
            }
        }
    }

    (in_session, upcoming)
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherDashboard {
    pub teacher: TeacherProfile,
    pub total_classes: usize,
    pub total_students: i64,
    pub in_session: Vec<Class>,
    pub upcoming_today: Vec<Class>,
    pub classes: Vec<Class>,
}

#[instrument(skip(pool, ctx), fields(actor = %ctx.user.username))]
pub async fn teacher_dashboard(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    now: DateTime<Utc>,
    timezone: FixedOffset,
) -> Result<TeacherDashboard, AppError> {
    let teacher = ctx.teacher()?;

    let classes = db::get_classes_for_teacher(pool, teacher.id).await?;
    let total_students = db::count_students_for_teacher(pool, teacher.id).await?;
    let (in_session, upcoming_today) = split_by_session(&classes, now, timezone);

    Ok(TeacherDashboard {
        teacher: teacher.clone(),
        total_classes: classes.len(),
        total_students,
        in_session,
        upcoming_today,
        classes,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentDashboard {
    pub student: StudentProfile,
    pub classes: Vec<Class>,
    pub in_session: Vec<Class>,
    pub upcoming_today: Vec<Class>,
    pub summary: AttendanceSummary,
}

#[instrument(skip(pool, ctx), fields(actor = %ctx.user.username))]
pub async fn student_dashboard(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    now: DateTime<Utc>,
    timezone: FixedOffset,
) -> Result<StudentDashboard, AppError> {
    let student = ctx.student()?;

    let classes = db::get_classes_for_student(pool, student.id).await?;
    let entries = db::get_student_attendance_entries(pool, student.id, None).await?;
    let (in_session, upcoming_today) = split_by_session(&classes, now, timezone);

    Ok(StudentDashboard {
        student: student.clone(),
        classes,
        in_session,
        upcoming_today,
        summary: summarize(entries.iter().map(|e| &e.record)),
    })
}
