use rocket::Request;
use rocket::http::Status;
use rocket::outcome::try_outcome;
use rocket::request::{FromRequest, Outcome};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::db::{find_student_profile_by_user, find_teacher_profile_by_user};
use crate::error::AppError;
use crate::models::{StudentProfile, TeacherProfile};

use super::User;

/// The side of the application an account belongs to.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "profile", rename_all = "lowercase")]
pub enum Profile {
    Teacher(TeacherProfile),
    Student(StudentProfile),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dashboard {
    TeacherDashboard,
    StudentDashboard,
}

impl Dashboard {
    pub fn path(&self) -> &'static str {
        match self {
            Dashboard::TeacherDashboard => "/api/teacher/dashboard",
            Dashboard::StudentDashboard => "/api/student/dashboard",
        }
    }
}

pub fn resolve_dashboard(profile: &Profile) -> Dashboard {
    match profile {
        Profile::Teacher(_) => Dashboard::TeacherDashboard,
        Profile::Student(_) => Dashboard::StudentDashboard,
    }
}

#[instrument(skip(pool, user), fields(username = %user.username))]
pub async fn resolve_profile(pool: &Pool<Sqlite>, user: &User) -> Result<Profile, AppError> {
    if let Some(teacher) = find_teacher_profile_by_user(pool, user.id).await? {
        return Ok(Profile::Teacher(teacher));
    }

    if let Some(student) = find_student_profile_by_user(pool, user.id).await? {
        return Ok(Profile::Student(student));
    }

    Err(AppError::NoProfile(user.username.clone()))
}

/// Everything a handler needs to know about who is acting.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: User,
    pub profile: Profile,
}

impl RequestContext {
    pub fn teacher(&self) -> Result<&TeacherProfile, AppError> {
        match &self.profile {
            Profile::Teacher(teacher) => Ok(teacher),
            Profile::Student(_) => Err(AppError::UnauthorizedActor(format!(
                "{} is not a teacher",
                self.user.username
            ))),
        }
    }

    pub fn student(&self) -> Result<&StudentProfile, AppError> {
        match &self.profile {
            Profile::Student(student) => Ok(student),
            Profile::Teacher(_) => Err(AppError::UnauthorizedActor(format!(
                "{} is not a student",
                self.user.username
            ))),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestContext {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let user = try_outcome!(request.guard::<User>().await);

        let Some(pool) = request.rocket().state::<Pool<Sqlite>>() else {
            tracing::error!("Database pool not found in managed state");
            return Outcome::Error((Status::InternalServerError, ()));
        };

        match resolve_profile(pool, &user).await {
            Ok(profile) => Outcome::Success(RequestContext { user, profile }),
            Err(err) => {
                let status = err.to_status_with_log("Resolving request profile");
                Outcome::Error((status, ()))
            }
        }
    }
}
