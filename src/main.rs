#[macro_use]
extern crate rocket;

mod api;
mod attendance;
mod auth;
mod classes;
mod clock;
mod config;
mod db;
mod env;
mod error;
mod models;
mod qr;
mod schedule;
mod stats;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::sync::Arc;

use api::{
    api_change_password, api_class_history, api_create_class, api_dashboard, api_enroll_student,
    api_get_all_users, api_get_class, api_get_enrollments, api_get_roster, api_get_students,
    api_list_classes, api_login, api_logout, api_mark_student, api_me, api_register_user,
    api_scan, api_student_attendance, api_student_check_in, api_student_class_attendance,
    api_student_dashboard, api_student_qr, api_submit_roster, api_teacher_dashboard,
    api_unenroll_student, api_update_class, api_update_profile, api_update_user, health,
};
use auth::{forbidden_api, unauthorized_api};
use clock::{SharedClock, SystemClock};
use config::AppConfig;
use error::AppError;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;
use telemetry::{TelemetryFairing, init_tracing};
use thiserror::Error;
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://attendme.db";

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("{0}")]
    Figment(#[from] rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
    #[error("{0}")]
    Launch(#[from] rocket::Error),
}

#[rocket::main]
async fn main() -> Result<(), Error> {
    let env_files = env::load_environment()?;
    let config = AppConfig::load()?;

    let _telemetry_guard = init_tracing(&config);
    info!(files = ?env_files, "Loaded environment");

    config.validate(env::is_production())?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    let clock: SharedClock = Arc::new(SystemClock);

    init_rocket(pool, config, clock)?.launch().await?;

    Ok(())
}

pub fn init_rocket(
    pool: SqlitePool,
    config: AppConfig,
    clock: SharedClock,
) -> Result<Rocket<Build>, AppError> {
    info!("Starting AttendMe");

    let policy = config.window_policy()?;
    let codec = config.qr_codec();

    Ok(rocket::build()
        .manage(pool)
        .manage(clock)
        .manage(policy)
        .manage(codec)
        .manage(config)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_me,
                api_update_profile,
                api_change_password,
                api_dashboard,
                api_teacher_dashboard,
                api_student_dashboard,
                api_list_classes,
                api_create_class,
                api_get_class,
                api_update_class,
                api_get_enrollments,
                api_enroll_student,
                api_unenroll_student,
                api_get_roster,
                api_submit_roster,
                api_mark_student,
                api_scan,
                api_student_check_in,
                api_class_history,
                api_student_attendance,
                api_student_class_attendance,
                api_student_qr,
                api_get_students,
                api_get_all_users,
                api_register_user,
                api_update_user,
                health,
            ],
        )
        .register("/api", catchers![unauthorized_api, forbidden_api])
        .attach(TelemetryFairing))
}
