use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::clock::SharedClock;
use crate::db::{get_session_by_token, get_user};
use crate::validation::{ToValidationResponse, ValidationResponse};

use super::User;

pub const SESSION_COOKIE: &str = "session_token";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate(request)
            .instrument(tracing::info_span!("user_auth_guard"))
            .await
    }
}

async fn authenticate(request: &Request<'_>) -> Outcome<User, ()> {
    let Some(token) = request
        .cookies()
        .get_private(SESSION_COOKIE)
        .map(|c| c.value().to_string())
    else {
        return Outcome::Error((Status::Unauthorized, ()));
    };

    let Some(db) = request.rocket().state::<SqlitePool>() else {
        tracing::error!("Database pool not found in managed state");
        return Outcome::Error((Status::InternalServerError, ()));
    };

    let session = match get_session_by_token(db, &token).await {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(error = ?err, "Invalid session token");
            return Outcome::Error((Status::Unauthorized, ()));
        }
    };

    let now = match request.rocket().state::<SharedClock>() {
        Some(clock) => clock.now(),
        None => chrono::Utc::now(),
    };

    if !session.is_valid(now) {
        tracing::warn!(user_id = session.user_id, "Session token expired");
        return Outcome::Error((Status::Unauthorized, ()));
    }

    match get_user(db, session.user_id).await {
        Ok(user) if user.archived => {
            tracing::warn!(username = %user.username, "Archived user presented a session");
            Outcome::Error((Status::Unauthorized, ()))
        }
        Ok(user) => {
            tracing::debug!(username = %user.username, role = %user.role.as_str(), "User authenticated via session token");
            Outcome::Success(user)
        }
        Err(err) => {
            tracing::error!(user_id = %session.user_id, error = ?err, "Failed to fetch user for valid session");
            Outcome::Error((Status::InternalServerError, ()))
        }
    }
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<ValidationResponse>> {
    Status::Unauthorized.into_validation_response()
}

#[catch(403)]
pub fn forbidden_api(_req: &Request) -> Custom<Json<ValidationResponse>> {
    tracing::warn!("Forbidden access attempt");
    Status::Forbidden.into_validation_response()
}
