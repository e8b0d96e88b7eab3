use crate::{
    auth::{DbUser, DbUserSession, Role, User, UserSession},
    classes::ClassDraft,
    error::AppError,
    qr::QrCodec,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument, warn};

use crate::models::{
    AttendanceEntry, AttendanceRecord, AttendanceStatus, Class, DbAttendanceEntry,
    DbAttendanceRecord, DbClass, DbStudentProfile, DbTeacherProfile, Enrollment, MarkSource,
    StudentProfile, TeacherProfile,
};

const HASH_COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

const USER_COLUMNS: &str = "id, username, role, display_name, archived";

const TEACHER_PROFILE_SELECT: &str = "SELECT tp.id, tp.user_id, u.username, u.display_name,
        tp.first_name, tp.middle_name, tp.last_name, tp.employee_number
     FROM teacher_profiles tp
     JOIN users u ON u.id = tp.user_id";

const STUDENT_PROFILE_SELECT: &str = "SELECT sp.id, sp.user_id, u.username, u.display_name, u.archived,
        sp.first_name, sp.middle_name, sp.last_name, sp.student_number, sp.qr_token
     FROM student_profiles sp
     JOIN users u ON u.id = sp.user_id";

const STUDENT_NAME_ORDER: &str =
    "COALESCE(sp.last_name, NULLIF(u.display_name, ''), u.username), sp.first_name";

const CLASS_COLUMNS: &str =
    "c.id, c.teacher_id, c.name, c.description, c.start_time, c.end_time, c.meeting_days, c.session_date";

const RECORD_COLUMNS: &str =
    "id, student_id, class_id, session_date, status, source, marked_by, marked_at";

const ENTRY_SELECT: &str = "SELECT ar.id, ar.student_id, ar.class_id, ar.session_date, ar.status,
        ar.source, ar.marked_by, ar.marked_at,
        u.username, u.display_name, sp.first_name, sp.middle_name, sp.last_name,
        c.name AS class_name
     FROM attendance_records ar
     JOIN student_profiles sp ON sp.id = ar.student_id
     JOIN users u ON u.id = sp.user_id
     JOIN classes c ON c.id = ar.class_id";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

// Users and sessions

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    debug!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(user) => User::try_from(user),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[cfg(test)]
#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    debug!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.map(User::try_from).transpose()
}

#[instrument(skip(pool))]
pub async fn get_all_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY username"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(User::try_from).collect()
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");

    #[derive(sqlx::FromRow)]
    struct Credentials {
        id: i64,
        password: String,
        archived: bool,
    }

    let credentials = sqlx::query_as::<_, Credentials>(
        "SELECT id, password, archived FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    let Some(credentials) = credentials else {
        return Ok(None);
    };

    if credentials.archived {
        info!("Rejected login for archived account");
        return Ok(None);
    }

    match bcrypt::verify(password, &credentials.password) {
        Ok(true) => Ok(Some(get_user(pool, credentials.id).await?)),
        _ => Ok(None),
    }
}

/// Account details supplied when an administrator provisions a user.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    /// Employee number for teachers, student number for students.
    pub external_id: Option<String>,
}

/// Creates the user and, for teachers and students, the matching profile in
/// one transaction. Students receive their QR token here and never again.
#[instrument(skip_all, fields(username = %account.username, role = %account.role))]
pub async fn provision_user(
    pool: &Pool<Sqlite>,
    codec: &QrCodec,
    account: &NewAccount,
) -> Result<i64, AppError> {
    info!("Provisioning new user");

    let hashed_password = bcrypt::hash(&account.password, HASH_COST)?;

    let mut tx = pool.begin().await?;

    // users.username UNIQUE is the duplicate check.
    let user_id = match sqlx::query(
        "INSERT INTO users (username, password, role, display_name) VALUES (?, ?, ?, ?)",
    )
    .bind(&account.username)
    .bind(&hashed_password)
    .bind(account.role.as_str())
    .bind(&account.display_name)
    .execute(&mut *tx)
    .await
    {
        Ok(result) => result.last_insert_rowid(),
        Err(err) if is_unique_violation(&err) => {
            tx.rollback().await?;
            warn!("Username already taken");
            return Err(AppError::Validation(format!(
                "Username '{}' already exists",
                account.username
            )));
        }
        Err(err) => return Err(AppError::Database(err)),
    };

    let profile_result = match account.role {
        Role::Teacher => sqlx::query(
            "INSERT INTO teacher_profiles (user_id, first_name, middle_name, last_name, employee_number)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&account.first_name)
        .bind(&account.middle_name)
        .bind(&account.last_name)
        .bind(&account.external_id)
        .execute(&mut *tx)
        .await
        .map(|_| ()),
        Role::Student => {
            let inserted = sqlx::query(
                "INSERT INTO student_profiles
                    (user_id, first_name, middle_name, last_name, student_number, qr_token)
                 VALUES (?, ?, ?, ?, ?, 'pending:' || ?)",
            )
            .bind(user_id)
            .bind(&account.first_name)
            .bind(&account.middle_name)
            .bind(&account.last_name)
            .bind(&account.external_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(result) => {
                    let profile_id = result.last_insert_rowid();
                    sqlx::query("UPDATE student_profiles SET qr_token = ? WHERE id = ?")
                        .bind(codec.encode(profile_id))
                        .bind(profile_id)
                        .execute(&mut *tx)
                        .await
                        .map(|_| ())
                }
                Err(err) => Err(err),
            }
        }
        Role::Admin => Ok(()),
    };

    if let Err(err) = profile_result {
        tx.rollback().await?;
        return Err(if is_unique_violation(&err) {
            AppError::Validation(format!(
                "Identifier '{}' is already in use",
                account.external_id.as_deref().unwrap_or_default()
            ))
        } else {
            AppError::Database(err)
        });
    }

    tx.commit().await?;

    Ok(user_id)
}

#[instrument(skip(pool, new_password))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, HASH_COST)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn update_user_display_name(
    pool: &Pool<Sqlite>,
    user_id: i64,
    display_name: &str,
) -> Result<(), AppError> {
    info!("Updating user display name");
    sqlx::query("UPDATE users SET display_name = ? WHERE id = ?")
        .bind(display_name)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn set_user_archived(
    pool: &Pool<Sqlite>,
    user_id: i64,
    archive: bool,
) -> Result<bool, AppError> {
    info!("Toggling user archived status");

    let result = sqlx::query("UPDATE users SET archived = ? WHERE id = ?")
        .bind(archive)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    if archive {
        sqlx::query("DELETE FROM user_sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    Ok(archive)
}

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    debug!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT user_id, token, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(
    pool: &Pool<Sqlite>,
    now: DateTime<Utc>,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now.naive_utc())
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        info!(count = result.rows_affected(), "Cleaned expired sessions");
    }

    Ok(result.rows_affected())
}

// Profiles

#[instrument(skip(pool))]
pub async fn find_teacher_profile_by_user(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Option<TeacherProfile>, AppError> {
    let row = sqlx::query_as::<_, DbTeacherProfile>(&format!(
        "{TEACHER_PROFILE_SELECT} WHERE tp.user_id = ?"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(TeacherProfile::from))
}

#[instrument(skip(pool))]
pub async fn find_student_profile_by_user(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Option<StudentProfile>, AppError> {
    let row = sqlx::query_as::<_, DbStudentProfile>(&format!(
        "{STUDENT_PROFILE_SELECT} WHERE sp.user_id = ?"
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StudentProfile::from))
}

#[instrument(skip(pool))]
pub async fn find_student_profile(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Option<StudentProfile>, AppError> {
    let row = sqlx::query_as::<_, DbStudentProfile>(&format!(
        "{STUDENT_PROFILE_SELECT} WHERE sp.id = ?"
    ))
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(StudentProfile::from))
}

#[instrument(skip(pool))]
pub async fn get_all_students(
    pool: &Pool<Sqlite>,
    include_archived: bool,
) -> Result<Vec<StudentProfile>, AppError> {
    info!(include_archived, "Getting all students");

    let rows = sqlx::query_as::<_, DbStudentProfile>(&format!(
        "{STUDENT_PROFILE_SELECT} WHERE (? OR u.archived = 0) ORDER BY {STUDENT_NAME_ORDER}"
    ))
    .bind(include_archived)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StudentProfile::from).collect())
}

// Classes

#[instrument(skip(pool, draft), fields(name = %draft.name))]
pub async fn insert_class(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
    draft: &ClassDraft,
) -> Result<i64, AppError> {
    info!("Creating class");

    let res = sqlx::query(
        "INSERT INTO classes
            (teacher_id, name, description, start_time, end_time, meeting_days, session_date)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(teacher_id)
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(draft.schedule.start_time)
    .bind(draft.schedule.end_time)
    .bind(draft.schedule.recurrence.meeting_days_column())
    .bind(draft.schedule.recurrence.session_date_column())
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, draft), fields(name = %draft.name))]
pub async fn update_class_row(
    pool: &Pool<Sqlite>,
    class_id: i64,
    draft: &ClassDraft,
) -> Result<(), AppError> {
    info!("Updating class");

    sqlx::query(
        "UPDATE classes
         SET name = ?, description = ?, start_time = ?, end_time = ?,
             meeting_days = ?, session_date = ?
         WHERE id = ?",
    )
    .bind(&draft.name)
    .bind(&draft.description)
    .bind(draft.schedule.start_time)
    .bind(draft.schedule.end_time)
    .bind(draft.schedule.recurrence.meeting_days_column())
    .bind(draft.schedule.recurrence.session_date_column())
    .bind(class_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn find_class(pool: &Pool<Sqlite>, class_id: i64) -> Result<Option<Class>, AppError> {
    let row = sqlx::query_as::<_, DbClass>(&format!(
        "SELECT {CLASS_COLUMNS} FROM classes c WHERE c.id = ?"
    ))
    .bind(class_id)
    .fetch_optional(pool)
    .await?;

    row.map(Class::try_from).transpose()
}

#[instrument(skip(pool))]
pub async fn get_class(pool: &Pool<Sqlite>, class_id: i64) -> Result<Class, AppError> {
    find_class(pool, class_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Class {} not found", class_id)))
}

#[instrument(skip(pool))]
pub async fn get_classes_for_teacher(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
) -> Result<Vec<Class>, AppError> {
    let rows = sqlx::query_as::<_, DbClass>(&format!(
        "SELECT {CLASS_COLUMNS} FROM classes c WHERE c.teacher_id = ? ORDER BY c.start_time, c.name"
    ))
    .bind(teacher_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Class::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn get_classes_for_student(
    pool: &Pool<Sqlite>,
    student_id: i64,
) -> Result<Vec<Class>, AppError> {
    let rows = sqlx::query_as::<_, DbClass>(&format!(
        "SELECT {CLASS_COLUMNS} FROM classes c
         JOIN enrollments e ON e.class_id = c.id
         WHERE e.student_id = ?
         ORDER BY c.start_time, c.name"
    ))
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Class::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn count_students_for_teacher(
    pool: &Pool<Sqlite>,
    teacher_id: i64,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(DISTINCT e.student_id)
         FROM enrollments e
         JOIN classes c ON c.id = e.class_id
         WHERE c.teacher_id = ?",
    )
    .bind(teacher_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

// Enrollments

#[instrument(skip(pool))]
pub async fn insert_enrollment(
    pool: &Pool<Sqlite>,
    student_id: i64,
    class_id: i64,
) -> Result<Enrollment, AppError> {
    info!("Enrolling student");

    sqlx::query_as::<_, Enrollment>(
        "INSERT INTO enrollments (student_id, class_id) VALUES (?, ?)
         RETURNING id, student_id, class_id, created_at",
    )
    .bind(student_id)
    .bind(class_id)
    .fetch_one(pool)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::AlreadyEnrolled {
                student_id,
                class_id,
            }
        } else {
            AppError::Database(err)
        }
    })
}

/// Removes the enrollment only. Attendance records stay for history.
#[instrument(skip(pool))]
pub async fn delete_enrollment(
    pool: &Pool<Sqlite>,
    student_id: i64,
    class_id: i64,
) -> Result<u64, AppError> {
    info!("Unenrolling student");

    let result = sqlx::query("DELETE FROM enrollments WHERE student_id = ? AND class_id = ?")
        .bind(student_id)
        .bind(class_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[instrument(skip(pool))]
pub async fn is_enrolled(
    pool: &Pool<Sqlite>,
    student_id: i64,
    class_id: i64,
) -> Result<bool, AppError> {
    let found = sqlx::query_scalar::<_, i64>(
        "SELECT 1 FROM enrollments WHERE student_id = ? AND class_id = ?",
    )
    .bind(student_id)
    .bind(class_id)
    .fetch_optional(pool)
    .await?;

    Ok(found.is_some())
}

#[instrument(skip(pool))]
pub async fn get_enrolled_students(
    pool: &Pool<Sqlite>,
    class_id: i64,
) -> Result<Vec<StudentProfile>, AppError> {
    let rows = sqlx::query_as::<_, DbStudentProfile>(&format!(
        "{STUDENT_PROFILE_SELECT}
         JOIN enrollments e ON e.student_id = sp.id
         WHERE e.class_id = ?
         ORDER BY {STUDENT_NAME_ORDER}"
    ))
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StudentProfile::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_unenrolled_students(
    pool: &Pool<Sqlite>,
    class_id: i64,
) -> Result<Vec<StudentProfile>, AppError> {
    let rows = sqlx::query_as::<_, DbStudentProfile>(&format!(
        "{STUDENT_PROFILE_SELECT}
         WHERE u.archived = 0
           AND sp.id NOT IN (SELECT student_id FROM enrollments WHERE class_id = ?)
         ORDER BY {STUDENT_NAME_ORDER}"
    ))
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(StudentProfile::from).collect())
}

// Attendance

/// A status to store for one (student, class, session date).
#[derive(Debug, Clone)]
pub struct AttendanceMark {
    pub student_id: i64,
    pub class_id: i64,
    pub session_date: NaiveDate,
    pub status: AttendanceStatus,
    pub source: MarkSource,
    pub marked_by: i64,
    pub marked_at: DateTime<Utc>,
}

/// Inserts the record or overwrites the existing one for the same
/// (student, class, session date). The unique index makes this atomic.
#[instrument(skip(pool))]
pub async fn upsert_attendance(
    pool: &Pool<Sqlite>,
    mark: &AttendanceMark,
) -> Result<AttendanceRecord, AppError> {
    info!("Recording attendance");

    let row = sqlx::query_as::<_, DbAttendanceRecord>(&format!(
        "INSERT INTO attendance_records
            (student_id, class_id, session_date, status, source, marked_by, marked_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (student_id, class_id, session_date) DO UPDATE SET
            status = excluded.status,
            source = excluded.source,
            marked_by = excluded.marked_by,
            marked_at = excluded.marked_at
         RETURNING {RECORD_COLUMNS}"
    ))
    .bind(mark.student_id)
    .bind(mark.class_id)
    .bind(mark.session_date)
    .bind(mark.status.as_str())
    .bind(mark.source.as_str())
    .bind(mark.marked_by)
    .bind(mark.marked_at.naive_utc())
    .fetch_one(pool)
    .await?;

    AttendanceRecord::try_from(row)
}

/// Like [`upsert_attendance`], but leaves a record that already has the same
/// status untouched and returns `None` for it. The insert-or-skip decision is
/// a single statement.
#[instrument(skip(pool))]
pub async fn upsert_attendance_if_changed(
    pool: &Pool<Sqlite>,
    mark: &AttendanceMark,
) -> Result<Option<AttendanceRecord>, AppError> {
    let row = sqlx::query_as::<_, DbAttendanceRecord>(&format!(
        "INSERT INTO attendance_records
            (student_id, class_id, session_date, status, source, marked_by, marked_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (student_id, class_id, session_date) DO UPDATE SET
            status = excluded.status,
            source = excluded.source,
            marked_by = excluded.marked_by,
            marked_at = excluded.marked_at
         WHERE attendance_records.status <> excluded.status
         RETURNING {RECORD_COLUMNS}"
    ))
    .bind(mark.student_id)
    .bind(mark.class_id)
    .bind(mark.session_date)
    .bind(mark.status.as_str())
    .bind(mark.source.as_str())
    .bind(mark.marked_by)
    .bind(mark.marked_at.naive_utc())
    .fetch_optional(pool)
    .await?;

    row.map(AttendanceRecord::try_from).transpose()
}

#[instrument(skip(pool))]
pub async fn find_attendance(
    pool: &Pool<Sqlite>,
    student_id: i64,
    class_id: i64,
    session_date: NaiveDate,
) -> Result<Option<AttendanceRecord>, AppError> {
    let row = sqlx::query_as::<_, DbAttendanceRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM attendance_records
         WHERE student_id = ? AND class_id = ? AND session_date = ?"
    ))
    .bind(student_id)
    .bind(class_id)
    .bind(session_date)
    .fetch_optional(pool)
    .await?;

    row.map(AttendanceRecord::try_from).transpose()
}

#[instrument(skip(pool))]
pub async fn get_session_attendance(
    pool: &Pool<Sqlite>,
    class_id: i64,
    session_date: NaiveDate,
) -> Result<Vec<AttendanceRecord>, AppError> {
    let rows = sqlx::query_as::<_, DbAttendanceRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM attendance_records
         WHERE class_id = ? AND session_date = ?"
    ))
    .bind(class_id)
    .bind(session_date)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AttendanceRecord::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn get_class_attendance_entries(
    pool: &Pool<Sqlite>,
    class_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<AttendanceEntry>, AppError> {
    let rows = sqlx::query_as::<_, DbAttendanceEntry>(&format!(
        "{ENTRY_SELECT}
         WHERE ar.class_id = ?
           AND (? IS NULL OR ar.session_date >= ?)
           AND (? IS NULL OR ar.session_date <= ?)
         ORDER BY ar.session_date DESC, {STUDENT_NAME_ORDER}"
    ))
    .bind(class_id)
    .bind(from)
    .bind(from)
    .bind(to)
    .bind(to)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AttendanceEntry::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn get_recorded_dates(
    pool: &Pool<Sqlite>,
    class_id: i64,
) -> Result<Vec<NaiveDate>, AppError> {
    let dates = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT DISTINCT session_date FROM attendance_records
         WHERE class_id = ?
         ORDER BY session_date DESC",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(dates)
}

#[instrument(skip(pool))]
pub async fn get_student_attendance_entries(
    pool: &Pool<Sqlite>,
    student_id: i64,
    class_id: Option<i64>,
) -> Result<Vec<AttendanceEntry>, AppError> {
    let rows = sqlx::query_as::<_, DbAttendanceEntry>(&format!(
        "{ENTRY_SELECT}
         WHERE ar.student_id = ?
           AND (? IS NULL OR ar.class_id = ?)
         ORDER BY ar.session_date DESC, c.name"
    ))
    .bind(student_id)
    .bind(class_id)
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AttendanceEntry::try_from).collect()
}
