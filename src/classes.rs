use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::RequestContext;
use crate::db;
use crate::error::AppError;
use crate::models::{Class, Enrollment, StudentProfile, TeacherProfile};
use crate::schedule::ClassSchedule;

/// Editable fields of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDraft {
    pub name: String,
    pub description: Option<String>,
    pub schedule: ClassSchedule,
}

/// Returns the acting teacher when they own `class`.
pub fn owned_by<'a>(ctx: &'a RequestContext, class: &Class) -> Result<&'a TeacherProfile, AppError> {
    let teacher = ctx.teacher()?;

    if teacher.id != class.teacher_id {
        return Err(AppError::UnauthorizedActor(format!(
            "{} does not own class {}",
            ctx.user.username, class.id
        )));
    }

    Ok(teacher)
}

#[instrument(skip(pool, ctx), fields(actor = %ctx.user.username))]
pub async fn get_owned_class(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    class_id: i64,
) -> Result<Class, AppError> {
    let class = db::get_class(pool, class_id).await?;
    owned_by(ctx, &class)?;
    Ok(class)
}

#[instrument(skip(pool, ctx, draft), fields(actor = %ctx.user.username, name = %draft.name))]
pub async fn create_class(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    draft: &ClassDraft,
) -> Result<Class, AppError> {
    let teacher = ctx.teacher()?;

    let class_id = db::insert_class(pool, teacher.id, draft).await?;
    info!(class_id, "Class created");

    db::get_class(pool, class_id).await
}

#[instrument(skip(pool, ctx, draft), fields(actor = %ctx.user.username))]
pub async fn update_class(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    class_id: i64,
    draft: &ClassDraft,
) -> Result<Class, AppError> {
    get_owned_class(pool, ctx, class_id).await?;

    db::update_class_row(pool, class_id, draft).await?;

    db::get_class(pool, class_id).await
}

#[instrument(skip(pool, ctx), fields(actor = %ctx.user.username))]
pub async fn list_classes(pool: &Pool<Sqlite>, ctx: &RequestContext) -> Result<Vec<Class>, AppError> {
    let teacher = ctx.teacher()?;
    db::get_classes_for_teacher(pool, teacher.id).await
}

#[instrument(skip(pool, ctx), fields(actor = %ctx.user.username))]
pub async fn enroll(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    class_id: i64,
    student_id: i64,
) -> Result<Enrollment, AppError> {
    get_owned_class(pool, ctx, class_id).await?;

    let student = db::find_student_profile(pool, student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student {} not found", student_id)))?;

    if student.archived {
        return Err(AppError::Validation(format!(
            "Student {} is deactivated",
            student.username
        )));
    }

    db::insert_enrollment(pool, student_id, class_id).await
}

/// Removes the enrollment. Past attendance records are kept.
#[instrument(skip(pool, ctx), fields(actor = %ctx.user.username))]
pub async fn unenroll(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    class_id: i64,
    student_id: i64,
) -> Result<(), AppError> {
    get_owned_class(pool, ctx, class_id).await?;

    if db::delete_enrollment(pool, student_id, class_id).await? == 0 {
        return Err(AppError::NotEnrolled {
            student_id,
            class_id,
        });
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentOverview {
    pub class: Class,
    pub enrolled: Vec<StudentProfile>,
    pub available: Vec<StudentProfile>,
}

#[instrument(skip(pool, ctx), fields(actor = %ctx.user.username))]
pub async fn enrollment_overview(
    pool: &Pool<Sqlite>,
    ctx: &RequestContext,
    class_id: i64,
) -> Result<EnrollmentOverview, AppError> {
    let class = get_owned_class(pool, ctx, class_id).await?;

    let enrolled = db::get_enrolled_students(pool, class_id).await?;
    let available = db::get_unenrolled_students(pool, class_id).await?;

    Ok(EnrollmentOverview {
        class,
        enrolled,
        available,
    })
}
