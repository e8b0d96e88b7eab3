use chrono::{NaiveDate, NaiveTime};
use rocket::State;
use rocket::http::{CookieJar, Status};
use rocket::response::Redirect;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::{Validate, ValidationError};

use crate::attendance::{
    self, CheckIn, MarkRequest, Roster, RosterResult, WindowPolicy, check_in_by_scan,
    mark_attendance,
};
use crate::auth::{
    Permission, Profile, RequestContext, Role, SESSION_COOKIE, User, UserSession,
    resolve_dashboard, resolve_profile,
};
use crate::classes::{self, ClassDraft, EnrollmentOverview};
use crate::clock::SharedClock;
use crate::config::AppConfig;
use crate::db::{
    self, NewAccount, authenticate_user, clean_expired_sessions, create_user_session,
    get_all_students, get_all_users, invalidate_session, provision_user, set_user_archived,
    update_user_display_name, update_user_password,
};
use crate::error::AppError;
use crate::models::{
    AttendanceRecord, AttendanceStatus, Class, Enrollment, MarkSource, StudentProfile,
};
use crate::qr::QrCodec;
use crate::schedule::{ClassSchedule, Recurrence, local_date, parse_weekdays};
use crate::stats::{
    ClassHistory, HistoryFilter, StudentDashboard, StudentHistory, TeacherDashboard,
    class_history, student_dashboard, student_history, teacher_dashboard,
};
use crate::validation::{
    AppErrorExt, ApiError, JsonValidateExt, PermissionCheckExt, ValidationResponse,
};

const ADMIN_HOME: &str = "/api/admin/users";

fn parse_query_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                Custom(
                    Status::UnprocessableEntity,
                    Json(ValidationResponse::with_error(
                        field,
                        "Dates must be formatted as YYYY-MM-DD",
                    )),
                )
            }),
        None => Ok(None),
    }
}

fn parse_clock_time(value: &str) -> Result<NaiveTime, AppError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppError::Validation(format!("Invalid time '{}', expected HH:MM", value)))
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub archived: bool,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            role: user.role.to_string(),
            archived: user.archived,
        }
    }
}

async fn home_for(db: &Pool<Sqlite>, user: &User) -> Result<String, AppError> {
    if user.role == Role::Admin {
        return Ok(ADMIN_HOME.to_string());
    }

    let profile = resolve_profile(db, user).await?;
    Ok(resolve_dashboard(&profile).path().to_string())
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    clock: &State<SharedClock>,
    config: &State<AppConfig>,
) -> Result<Json<LoginResponse>, ApiError> {
    use rocket::http::{Cookie, SameSite};

    let validated = login.validate_custom()?;
    let now = clock.now();

    clean_expired_sessions(db, now).await.validate_custom()?;

    match authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let redirect_url = home_for(db, &user).await.validate_custom()?;

            let token = UserSession::generate_token();
            let lifetime = chrono::Duration::try_hours(config.session_hours)
                .ok_or_else(|| AppError::Internal("session_hours out of range".to_string()))
                .validate_custom()?;
            let expires_at = now + lifetime;

            create_user_session(db, user.id, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            let cookie = Cookie::build((SESSION_COOKIE, token))
                .same_site(SameSite::Lax)
                .http_only(true)
                .max_age(rocket::time::Duration::hours(config.session_hours));
            cookies.add_private(cookie);

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
                redirect_url: Some(redirect_url),
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid username or password".to_string()),
            redirect_url: None,
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Status {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(err) = invalidate_session(db, &token).await {
            err.log_and_record("Logout");
        }
    }

    cookies.remove_private(rocket::http::Cookie::build(SESSION_COOKIE));

    Status::Ok
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: UserData,
    pub profile: Option<Profile>,
}

#[get("/me")]
pub async fn api_me(user: User, db: &State<Pool<Sqlite>>) -> Result<Json<MeResponse>, ApiError> {
    user.require_permission(Permission::ViewOwnProfile)
        .validate_custom()?;

    let profile = match user.role {
        Role::Admin => None,
        _ => Some(resolve_profile(db, &user).await.validate_custom()?),
    };

    Ok(Json(MeResponse {
        user: UserData::from(user),
        profile,
    }))
}

#[derive(Deserialize, Validate, Clone)]
pub struct ProfileUpdateRequest {
    #[validate(length(max = 100, message = "Display name is too long"))]
    display_name: String,
}

#[put("/profile", data = "<profile>")]
pub async fn api_update_profile(
    profile: Json<ProfileUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let validated = profile.validate_custom()?;

    update_user_display_name(db, user.id, validated.display_name.trim())
        .await
        .validate_custom()?;

    Ok(Status::Ok)
}

#[derive(Deserialize, Validate)]
pub struct PasswordChangeRequest {
    current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    new_password: String,
}

#[post("/change-password", data = "<password>")]
pub async fn api_change_password(
    password: Json<PasswordChangeRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let validated = password.validate_custom()?;

    let is_valid = authenticate_user(db, &user.username, &validated.current_password)
        .await
        .validate_custom()?;

    match is_valid {
        Some(_) => {
            update_user_password(db, user.id, &validated.new_password)
                .await
                .validate_custom()?;

            Ok(Status::Ok)
        }
        _ => Err(Custom(
            Status::Unauthorized,
            Json(ValidationResponse::with_error(
                "current_password",
                "Current password is incorrect",
            )),
        )),
    }
}

// Dashboards

#[get("/dashboard")]
pub fn api_dashboard(ctx: RequestContext) -> Redirect {
    Redirect::to(resolve_dashboard(&ctx.profile).path())
}

#[get("/teacher/dashboard")]
pub async fn api_teacher_dashboard(
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
    clock: &State<SharedClock>,
    policy: &State<WindowPolicy>,
) -> Result<Json<TeacherDashboard>, ApiError> {
    let dashboard = teacher_dashboard(db, &ctx, clock.now(), policy.timezone)
        .await
        .validate_custom()?;

    Ok(Json(dashboard))
}

#[get("/student/dashboard")]
pub async fn api_student_dashboard(
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
    clock: &State<SharedClock>,
    policy: &State<WindowPolicy>,
) -> Result<Json<StudentDashboard>, ApiError> {
    let dashboard = student_dashboard(db, &ctx, clock.now(), policy.timezone)
        .await
        .validate_custom()?;

    Ok(Json(dashboard))
}

// Classes

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("Must not be blank".into()));
    }
    Ok(())
}

#[derive(Deserialize, Validate)]
pub struct ClassRequest {
    #[validate(
        length(
            min = 1,
            max = 100,
            message = "Class name must be between 1 and 100 characters"
        ),
        custom(function = not_blank)
    )]
    name: String,
    #[validate(length(max = 1000, message = "Description is too long"))]
    description: Option<String>,
    start_time: String,
    end_time: String,
    #[serde(default)]
    meeting_days: Vec<String>,
    session_date: Option<NaiveDate>,
}

impl ClassRequest {
    fn into_draft(self) -> Result<ClassDraft, AppError> {
        let recurrence = match (self.session_date, self.meeting_days.is_empty()) {
            (Some(_), false) => {
                return Err(AppError::Validation(
                    "A class has either a session date or meeting days, not both".to_string(),
                ));
            }
            (Some(date), true) => Recurrence::Once { date },
            (None, false) => Recurrence::Weekly {
                days: parse_weekdays(&self.meeting_days)?,
            },
            (None, true) => Recurrence::Daily,
        };

        let schedule = ClassSchedule::new(
            parse_clock_time(&self.start_time)?,
            parse_clock_time(&self.end_time)?,
            recurrence,
        )?;

        Ok(ClassDraft {
            name: self.name.trim().to_string(),
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            schedule,
        })
    }
}

#[get("/classes")]
pub async fn api_list_classes(
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Class>>, ApiError> {
    ctx.user
        .require_permission(Permission::ManageClasses)
        .validate_custom()?;

    let classes = classes::list_classes(db, &ctx).await.validate_custom()?;

    Ok(Json(classes))
}

#[post("/classes", data = "<request>")]
pub async fn api_create_class(
    request: Json<ClassRequest>,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Class>>, ApiError> {
    ctx.user
        .require_permission(Permission::ManageClasses)
        .validate_custom()?;

    let draft = request.validate_custom()?.into_draft().validate_custom()?;
    let class = classes::create_class(db, &ctx, &draft).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(class)))
}

#[get("/classes/<id>")]
pub async fn api_get_class(
    id: i64,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Class>, ApiError> {
    ctx.user
        .require_permission(Permission::ManageClasses)
        .validate_custom()?;

    let class = classes::get_owned_class(db, &ctx, id)
        .await
        .validate_custom()?;

    Ok(Json(class))
}

#[put("/classes/<id>", data = "<request>")]
pub async fn api_update_class(
    id: i64,
    request: Json<ClassRequest>,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Class>, ApiError> {
    ctx.user
        .require_permission(Permission::ManageClasses)
        .validate_custom()?;

    let draft = request.validate_custom()?.into_draft().validate_custom()?;
    let class = classes::update_class(db, &ctx, id, &draft)
        .await
        .validate_custom()?;

    Ok(Json(class))
}

// Enrollments

#[derive(Deserialize, Validate)]
pub struct EnrollRequest {
    student_id: i64,
}

#[get("/classes/<id>/enrollments")]
pub async fn api_get_enrollments(
    id: i64,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<EnrollmentOverview>, ApiError> {
    ctx.user
        .require_permission(Permission::ManageEnrollments)
        .validate_custom()?;

    let overview = classes::enrollment_overview(db, &ctx, id)
        .await
        .validate_custom()?;

    Ok(Json(overview))
}

#[post("/classes/<id>/enrollments", data = "<request>")]
pub async fn api_enroll_student(
    id: i64,
    request: Json<EnrollRequest>,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Enrollment>>, ApiError> {
    ctx.user
        .require_permission(Permission::ManageEnrollments)
        .validate_custom()?;

    let validated = request.validate_custom()?;
    let enrollment = classes::enroll(db, &ctx, id, validated.student_id)
        .await
        .validate_custom()?;

    Ok(Custom(Status::Created, Json(enrollment)))
}

#[delete("/classes/<id>/enrollments/<student_id>")]
pub async fn api_unenroll_student(
    id: i64,
    student_id: i64,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    ctx.user
        .require_permission(Permission::ManageEnrollments)
        .validate_custom()?;

    classes::unenroll(db, &ctx, id, student_id)
        .await
        .validate_custom()?;

    Ok(Status::NoContent)
}

// Attendance

#[get("/classes/<id>/attendance?<date>")]
pub async fn api_get_roster(
    id: i64,
    date: Option<&str>,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
    clock: &State<SharedClock>,
    policy: &State<WindowPolicy>,
) -> Result<Json<Roster>, ApiError> {
    ctx.user
        .require_permission(Permission::MarkAttendance)
        .validate_custom()?;

    let session_date = parse_query_date("date", date)?;
    let roster = attendance::roster(db, &ctx, id, session_date, clock.now(), policy)
        .await
        .validate_custom()?;

    Ok(Json(roster))
}

#[derive(Serialize, Deserialize, Validate)]
pub struct RosterEntryRequest {
    student_id: i64,
    status: AttendanceStatus,
}

#[derive(Deserialize, Validate)]
pub struct RosterSubmission {
    session_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "At least one entry is required"))]
    entries: Vec<RosterEntryRequest>,
}

#[derive(Serialize)]
pub struct RosterSubmissionResponse {
    pub session_date: NaiveDate,
    pub saved: usize,
    pub results: Vec<RosterResult>,
}

#[post("/classes/<id>/attendance", data = "<submission>")]
pub async fn api_submit_roster(
    id: i64,
    submission: Json<RosterSubmission>,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
    clock: &State<SharedClock>,
    policy: &State<WindowPolicy>,
) -> Result<Json<RosterSubmissionResponse>, ApiError> {
    ctx.user
        .require_permission(Permission::MarkAttendance)
        .validate_custom()?;

    let validated = submission.validate_custom()?;
    let now = clock.now();
    let session_date = validated
        .session_date
        .unwrap_or_else(|| local_date(now, policy.timezone));

    let entries: Vec<(i64, AttendanceStatus)> = validated
        .entries
        .iter()
        .map(|entry| (entry.student_id, entry.status))
        .collect();

    let results = attendance::submit_roster(db, &ctx, id, session_date, &entries, now, policy)
        .await
        .validate_custom()?;

    Ok(Json(RosterSubmissionResponse {
        session_date,
        saved: results.iter().filter(|r| r.is_ok()).count(),
        results,
    }))
}

#[derive(Deserialize, Validate)]
pub struct MarkStudentRequest {
    session_date: Option<NaiveDate>,
    status: AttendanceStatus,
}

#[put("/classes/<id>/attendance/<student_id>", data = "<request>")]
pub async fn api_mark_student(
    id: i64,
    student_id: i64,
    request: Json<MarkStudentRequest>,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
    clock: &State<SharedClock>,
    policy: &State<WindowPolicy>,
) -> Result<Json<AttendanceRecord>, ApiError> {
    ctx.user
        .require_permission(Permission::MarkAttendance)
        .validate_custom()?;

    let validated = request.validate_custom()?;
    let now = clock.now();

    let req = MarkRequest {
        student_id,
        class_id: id,
        session_date: validated
            .session_date
            .unwrap_or_else(|| local_date(now, policy.timezone)),
        status: validated.status,
        source: MarkSource::Manual,
    };

    let record = mark_attendance(db, &ctx, &req, now, policy)
        .await
        .validate_custom()?;

    Ok(Json(record))
}

#[derive(Deserialize, Validate)]
pub struct ScanRequest {
    #[validate(length(min = 1, max = 200, message = "Scanned payload is empty"))]
    payload: String,
}

#[derive(Serialize)]
pub struct CheckInResponse {
    pub message: String,
    #[serde(flatten)]
    pub check_in: CheckIn,
}

impl From<CheckIn> for CheckInResponse {
    fn from(check_in: CheckIn) -> Self {
        let message = if check_in.already_present {
            format!("Already marked present: {}", check_in.student.name)
        } else {
            format!("{} marked present", check_in.student.name)
        };

        Self { message, check_in }
    }
}

#[post("/classes/<id>/scan", data = "<scan>")]
pub async fn api_scan(
    id: i64,
    scan: Json<ScanRequest>,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
    codec: &State<QrCodec>,
    clock: &State<SharedClock>,
    policy: &State<WindowPolicy>,
) -> Result<Json<CheckInResponse>, ApiError> {
    ctx.user
        .require_permission(Permission::MarkAttendance)
        .validate_custom()?;

    let validated = scan.validate_custom()?;
    let check_in = check_in_by_scan(db, codec, &ctx, id, &validated.payload, clock.now(), policy)
        .await
        .validate_custom()?;

    Ok(Json(CheckInResponse::from(check_in)))
}

#[derive(Deserialize, Validate)]
pub struct SelfCheckInRequest {
    class_id: i64,
    #[validate(length(min = 1, max = 200, message = "Scanned payload is empty"))]
    payload: String,
}

#[post("/student/check-in", data = "<request>")]
pub async fn api_student_check_in(
    request: Json<SelfCheckInRequest>,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
    codec: &State<QrCodec>,
    clock: &State<SharedClock>,
    policy: &State<WindowPolicy>,
) -> Result<Json<CheckInResponse>, ApiError> {
    ctx.user
        .require_permission(Permission::SelfCheckIn)
        .validate_custom()?;

    let validated = request.validate_custom()?;
    let check_in = check_in_by_scan(
        db,
        codec,
        &ctx,
        validated.class_id,
        &validated.payload,
        clock.now(),
        policy,
    )
    .await
    .validate_custom()?;

    Ok(Json(CheckInResponse::from(check_in)))
}

// History

#[get("/classes/<id>/history?<date>&<from>&<to>")]
pub async fn api_class_history(
    id: i64,
    date: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ClassHistory>, ApiError> {
    ctx.user
        .require_permission(Permission::ViewClassHistory)
        .validate_custom()?;

    let filter = HistoryFilter {
        date: parse_query_date("date", date)?,
        from: parse_query_date("from", from)?,
        to: parse_query_date("to", to)?,
    };

    let history = class_history(db, &ctx, id, &filter)
        .await
        .validate_custom()?;

    Ok(Json(history))
}

#[get("/student/attendance")]
pub async fn api_student_attendance(
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<StudentHistory>, ApiError> {
    ctx.user
        .require_permission(Permission::ViewOwnAttendance)
        .validate_custom()?;

    let history = student_history(db, &ctx, None).await.validate_custom()?;

    Ok(Json(history))
}

#[get("/student/attendance/<class_id>")]
pub async fn api_student_class_attendance(
    class_id: i64,
    ctx: RequestContext,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<StudentHistory>, ApiError> {
    ctx.user
        .require_permission(Permission::ViewOwnAttendance)
        .validate_custom()?;

    let history = student_history(db, &ctx, Some(class_id))
        .await
        .validate_custom()?;

    Ok(Json(history))
}

#[derive(Serialize, Deserialize)]
pub struct QrCodeResponse {
    pub student_id: i64,
    pub token: String,
}

#[get("/student/qr")]
pub async fn api_student_qr(ctx: RequestContext) -> Result<Json<QrCodeResponse>, ApiError> {
    ctx.user
        .require_permission(Permission::ViewOwnQrCode)
        .validate_custom()?;

    let student = ctx.student().validate_custom()?;

    Ok(Json(QrCodeResponse {
        student_id: student.id,
        token: student.qr_token.clone(),
    }))
}

#[get("/students?<include_archived>")]
pub async fn api_get_students(
    include_archived: Option<bool>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<StudentProfile>>, ApiError> {
    user.require_permission(Permission::ViewAllStudents)
        .validate_custom()?;

    let students = get_all_students(db, include_archived.unwrap_or(false))
        .await
        .validate_custom()?;

    Ok(Json(students))
}

// Administration

#[derive(Deserialize, Validate, Clone)]
pub struct UserRegistrationRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username must be between 3 and 50 characters"
    ))]
    username: String,
    #[serde(default)]
    display_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: String,
    role: Role,
    first_name: Option<String>,
    middle_name: Option<String>,
    last_name: Option<String>,
    employee_number: Option<String>,
    student_number: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<UserRegistrationRequest> for NewAccount {
    fn from(request: UserRegistrationRequest) -> Self {
        let external_id = match request.role {
            Role::Teacher => non_blank(request.employee_number),
            Role::Student => non_blank(request.student_number),
            Role::Admin => None,
        };

        Self {
            username: request.username.trim().to_string(),
            password: request.password,
            display_name: request.display_name.trim().to_string(),
            role: request.role,
            first_name: non_blank(request.first_name),
            middle_name: non_blank(request.middle_name),
            last_name: non_blank(request.last_name),
            external_id,
        }
    }
}

#[get("/admin/users")]
pub async fn api_get_all_users(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UserData>>, ApiError> {
    user.require_permission(Permission::EditUsers)
        .validate_custom()?;

    let users = get_all_users(db).await.validate_custom()?;

    Ok(Json(users.into_iter().map(UserData::from).collect()))
}

#[post("/admin/users", data = "<registration>")]
pub async fn api_register_user(
    registration: Json<UserRegistrationRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    codec: &State<QrCodec>,
) -> Result<Custom<Json<UserData>>, ApiError> {
    user.require_permission(Permission::RegisterUsers)
        .validate_custom()?;

    let validated = registration.validate_custom()?;

    let user_id = provision_user(db, codec, &NewAccount::from(validated))
        .await
        .validate_custom()?;

    let created = db::get_user(db, user_id).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(UserData::from(created))))
}

#[derive(Deserialize, Validate)]
pub struct UserUpdateRequest {
    #[validate(length(max = 100, message = "Display name is too long"))]
    display_name: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    password: Option<String>,
    archived: Option<bool>,
}

#[put("/admin/users/<id>", data = "<update>")]
pub async fn api_update_user(
    id: i64,
    update: Json<UserUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, ApiError> {
    user.require_permission(Permission::EditUsers)
        .validate_custom()?;

    let validated = update.validate_custom()?;

    let target = db::get_user(db, id).await.validate_custom()?;

    if validated.archived == Some(true) && target.id == user.id {
        return Err(Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::with_error(
                "archived",
                "You cannot deactivate your own account",
            )),
        ));
    }

    if let Some(display_name) = &validated.display_name {
        update_user_display_name(db, target.id, display_name.trim())
            .await
            .validate_custom()?;
    }

    if let Some(password) = &validated.password {
        update_user_password(db, target.id, password)
            .await
            .validate_custom()?;
    }

    if let Some(archived) = validated.archived {
        set_user_archived(db, target.id, archived)
            .await
            .validate_custom()?;
    }

    let updated = db::get_user(db, id).await.validate_custom()?;

    Ok(Json(UserData::from(updated)))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
