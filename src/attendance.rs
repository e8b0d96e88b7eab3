//! Recording attendance: the window check, the enrollment check and the
//! upsert, shared by manual roster entry and QR check-in.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::auth::{Profile, RequestContext};
use crate::classes::owned_by;
use crate::db::{self, AttendanceMark};
use crate::error::AppError;
use crate::models::{AttendanceRecord, AttendanceStatus, Class, MarkSource, StudentProfile};
use crate::qr::{QrCodec, resolve_scan};
use crate::schedule::{SessionWindow, local_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    pub timezone: FixedOffset,
    /// Teachers may record Absent or Late after the window closes, until the
    /// end of the session's local day.
    pub allow_manual_backdate: bool,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            timezone: Utc.fix(),
            allow_manual_backdate: true,
        }
    }
}

/// Decides whether a mark with this status and source may be written at `now`.
pub fn check_window(
    window: &SessionWindow,
    status: AttendanceStatus,
    source: MarkSource,
    now: DateTime<Utc>,
    policy: &WindowPolicy,
) -> Result<(), AppError> {
    if window.contains(now) {
        return Ok(());
    }

    let backdate = policy.allow_manual_backdate
        && source == MarkSource::Manual
        && status != AttendanceStatus::Present
        && window.has_ended(now)
        && window.same_local_day(now);

    if backdate {
        return Ok(());
    }

    Err(window.outside_error())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkRequest {
    pub student_id: i64,
    pub class_id: i64,
    pub session_date: NaiveDate,
    pub status: AttendanceStatus,
    pub source: MarkSource,
}

fn authorize_mark(ctx: &RequestContext, class: &Class, req: &MarkRequest) -> Result<(), AppError> {
    let allowed = match &ctx.profile {
        Profile::Teacher(teacher) => teacher.id == class.teacher_id,
        Profile::Student(student) => {
            req.source == MarkSource::Qr && student.id == req.student_id
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::UnauthorizedActor(format!(
            "{} cannot mark attendance for student {} in class {}",
            ctx.user.username, req.student_id, class.id
        )))
    }
}

/// Runs every precondition of a mark without writing anything.
///
/// Checks run in a fixed order: class exists, actor may act, student is
/// enrolled, the class meets on the date, and finally the window.
async fn check_mark(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    req: &MarkRequest,
    now: DateTime<Utc>,
    policy: &WindowPolicy,
) -> Result<(), AppError> {
    let class = db::get_class(pool, req.class_id).await?;

    authorize_mark(ctx, &class, req)?;

    if !db::is_enrolled(pool, req.student_id, req.class_id).await? {
        return Err(AppError::NotEnrolled {
            student_id: req.student_id,
            class_id: req.class_id,
        });
    }

    let window = class
        .schedule
        .window_for(req.session_date, policy.timezone)
        .ok_or(AppError::InvalidSessionDate {
            class_id: class.id,
            date: req.session_date,
        })?;

    if let Err(err) = check_window(&window, req.status, req.source, now, policy) {
        warn!(
            class_id = class.id,
            student_id = req.student_id,
            %now,
            "Mark attempted outside the attendance window"
        );
        return Err(err);
    }

    Ok(())
}

fn mark_for(ctx: &RequestContext, req: &MarkRequest, now: DateTime<Utc>) -> AttendanceMark {
    AttendanceMark {
        student_id: req.student_id,
        class_id: req.class_id,
        session_date: req.session_date,
        status: req.status,
        source: req.source,
        marked_by: ctx.user.id,
        marked_at: now,
    }
}

/// Creates or overwrites the record for (student, class, session date).
#[instrument(skip(pool, ctx, policy), fields(actor = %ctx.user.username))]
pub async fn mark_attendance(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    req: &MarkRequest,
    now: DateTime<Utc>,
    policy: &WindowPolicy,
) -> Result<AttendanceRecord, AppError> {
    check_mark(pool, ctx, req, now, policy).await?;

    let record = db::upsert_attendance(pool, &mark_for(ctx, req, now)).await?;

    info!(
        record_id = record.id,
        status = record.status.as_str(),
        source = record.source.as_str(),
        "Attendance recorded"
    );

    Ok(record)
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckIn {
    pub student: StudentProfile,
    pub record: AttendanceRecord,
    pub already_present: bool,
}

/// Marks the scanned student Present for today's session of the class.
///
/// A teacher's ownership of the class is checked before the payload is read.
#[instrument(skip(pool, codec, ctx, payload, policy), fields(actor = %ctx.user.username))]
pub async fn check_in_by_scan(
    pool: &Pool<Sqlite>,
    codec: &QrCodec,
    ctx: &RequestContext,
    class_id: i64,
    payload: &str,
    now: DateTime<Utc>,
    policy: &WindowPolicy,
) -> Result<CheckIn, AppError> {
    let class = db::get_class(pool, class_id).await?;
    if let Profile::Teacher(_) = ctx.profile {
        owned_by(ctx, &class)?;
    }

    let student = resolve_scan(pool, codec, payload).await?;

    let req = MarkRequest {
        student_id: student.id,
        class_id,
        session_date: local_date(now, policy.timezone),
        status: AttendanceStatus::Present,
        source: MarkSource::Qr,
    };
    check_mark(pool, ctx, &req, now, policy).await?;

    let (record, already_present) =
        match db::upsert_attendance_if_changed(pool, &mark_for(ctx, &req, now)).await? {
            Some(record) => (record, false),
            None => {
                let record = db::find_attendance(pool, student.id, class_id, req.session_date)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal("attendance record vanished after check-in".to_string())
                    })?;
                (record, true)
            }
        };

    info!(
        record_id = record.id,
        student_id = student.id,
        already_present,
        "QR check-in recorded"
    );

    Ok(CheckIn {
        student,
        record,
        already_present,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    pub student: StudentProfile,
    pub status: AttendanceStatus,
    pub record: Option<AttendanceRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Roster {
    pub class: Class,
    pub session_date: NaiveDate,
    pub window: Option<SessionWindow>,
    pub is_active: bool,
    pub entries: Vec<RosterEntry>,
}

/// Enrolled students with their status for one session. Students without a
/// record show as Absent.
#[instrument(skip(pool, ctx, policy), fields(actor = %ctx.user.username))]
pub async fn roster(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    class_id: i64,
    session_date: Option<NaiveDate>,
    now: DateTime<Utc>,
    policy: &WindowPolicy,
) -> Result<Roster, AppError> {
    let class = db::get_class(pool, class_id).await?;
    owned_by(ctx, &class)?;

    let session_date = session_date.unwrap_or_else(|| local_date(now, policy.timezone));
    let window = class.schedule.window_for(session_date, policy.timezone);
    let is_active = window.is_some_and(|w| w.contains(now));

    let students = db::get_enrolled_students(pool, class_id).await?;
    let mut records = db::get_session_attendance(pool, class_id, session_date).await?;

    let entries = students
        .into_iter()
        .map(|student| {
            let record = records
                .iter()
                .position(|r| r.student_id == student.id)
                .map(|idx| records.swap_remove(idx));
            RosterEntry {
                status: record
                    .as_ref()
                    .map(|r| r.status)
                    .unwrap_or(AttendanceStatus::Absent),
                student,
                record,
            }
        })
        .collect();

    Ok(Roster {
        class,
        session_date,
        window,
        is_active,
        entries,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterResult {
    pub student_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<AttendanceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RosterResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Marks every entry independently. A failing entry does not stop the rest;
/// only an unknown or foreign class fails the whole submission.
#[instrument(skip(pool, ctx, entries, policy), fields(actor = %ctx.user.username, count = entries.len()))]
pub async fn submit_roster(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    class_id: i64,
    session_date: NaiveDate,
    entries: &[(i64, AttendanceStatus)],
    now: DateTime<Utc>,
    policy: &WindowPolicy,
) -> Result<Vec<RosterResult>, AppError> {
    let class = db::get_class(pool, class_id).await?;
    owned_by(ctx, &class)?;

    let mut results = Vec::with_capacity(entries.len());

    for &(student_id, status) in entries {
        let req = MarkRequest {
            student_id,
            class_id,
            session_date,
            status,
            source: MarkSource::Manual,
        };

        let result = match mark_attendance(pool, ctx, &req, now, policy).await {
            Ok(record) => RosterResult {
                student_id,
                record: Some(record),
                error: None,
            },
            Err(err) if err.is_server_error() => return Err(err),
            Err(err) => {
                err.log_and_record("Roster entry");
                RosterResult {
                    student_id,
                    record: None,
                    error: Some(err.to_string()),
                }
            }
        };

        results.push(result);
    }

    info!(
        succeeded = results.iter().filter(|r| r.is_ok()).count(),
        "Roster submitted"
    );

    Ok(results)
}
