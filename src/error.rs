use chrono::{DateTime, FixedOffset, NaiveDate};
use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use thiserror::Error;
use tracing::{Span, error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not allowed to act on this class: {0}")]
    UnauthorizedActor(String),

    #[error("Student {student_id} is not enrolled in class {class_id}")]
    NotEnrolled { student_id: i64, class_id: i64 },

    #[error("Student {student_id} is already enrolled in class {class_id}")]
    AlreadyEnrolled { student_id: i64, class_id: i64 },

    #[error(
        "Attendance can only be marked between {} and {}",
        .start.format("%Y-%m-%d %H:%M"),
        .end.format("%H:%M")
    )]
    OutsideWindow {
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },

    #[error("Class {class_id} does not meet on {date}")]
    InvalidSessionDate { class_id: i64, date: NaiveDate },

    #[error("Unreadable QR code: {0}")]
    Decode(String),

    #[error("Account {0} is not linked to a teacher or student profile")]
    NoProfile(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Authentication(_) => "authentication_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Validation(_) => "validation_error",
            AppError::UnauthorizedActor(_) => "unauthorized_actor_error",
            AppError::NotEnrolled { .. } => "not_enrolled_error",
            AppError::AlreadyEnrolled { .. } => "already_enrolled_error",
            AppError::OutsideWindow { .. } => "outside_window_error",
            AppError::InvalidSessionDate { .. } => "invalid_session_date_error",
            AppError::Decode(_) => "decode_error",
            AppError::NoProfile(_) => "no_profile_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = self.kind();

        match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Database error");
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal server error");
            }
            AppError::NoProfile(username) => {
                error!(username = %username, context = %ctx, "Account provisioning error");
            }
            _ => {
                warn!(message = %message, context = %ctx, kind = error_kind, "Request rejected");
            }
        }

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            if self.is_server_error() {
                current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
            }
        }
    }

    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Internal(_) | AppError::NoProfile(_)
        )
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::InternalServerError,
            AppError::Authentication(_) => Status::Unauthorized,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Validation(_) => Status::UnprocessableEntity,
            AppError::UnauthorizedActor(_) => Status::Forbidden,
            AppError::NotEnrolled { .. } => Status::BadRequest,
            AppError::AlreadyEnrolled { .. } => Status::Conflict,
            AppError::OutsideWindow { .. } => Status::BadRequest,
            AppError::InvalidSessionDate { .. } => Status::BadRequest,
            AppError::Decode(_) => Status::BadRequest,
            AppError::NoProfile(_) => Status::Forbidden,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        use crate::validation::ToValidationResponse;

        self.log_and_record(&format!("Request to {} {}", req.method(), req.uri()));
        self.into_validation_response().respond_to(req)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.to_status_with_log("Error conversion into Status")
    }
}
