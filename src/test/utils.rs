use std::collections::HashMap;
use std::sync::{Arc, Once};

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tracing_subscriber::EnvFilter;

use crate::api::LoginResponse;
use crate::attendance::WindowPolicy;
use crate::auth::{RequestContext, Role, resolve_profile};
use crate::classes::ClassDraft;
use crate::clock::{FixedClock, SharedClock};
use crate::config::AppConfig;
use crate::db::{self, NewAccount, insert_class, insert_enrollment, provision_user};
use crate::error::AppError;
use crate::init_rocket;
use crate::qr::QrCodec;
use crate::schedule::{ClassSchedule, Recurrence};

static INIT: Once = Once::new();
pub static STANDARD_PASSWORD: &str = "password123";

/// 2024-05-01, a Wednesday.
pub fn session_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug,sqlx=warn"))
            .with_test_writer()
            .try_init();
    });
}

pub async fn memory_pool() -> Result<Pool<Sqlite>, AppError> {
    // Every connection to :memory: is its own database, so keep exactly one.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

struct TestUser {
    username: String,
    role: Role,
    first_name: Option<String>,
    last_name: Option<String>,
}

struct TestClass {
    name: String,
    teacher: String,
    start: NaiveTime,
    end: NaiveTime,
    recurrence: Recurrence,
}

#[derive(Default)]
pub struct TestDbBuilder {
    users: Vec<TestUser>,
    classes: Vec<TestClass>,
    enrollments: Vec<(String, String)>,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn user(mut self, username: &str, role: Role, first: Option<&str>, last: Option<&str>) -> Self {
        self.users.push(TestUser {
            username: username.to_string(),
            role,
            first_name: first.map(String::from),
            last_name: last.map(String::from),
        });
        self
    }

    pub fn admin(self, username: &str) -> Self {
        self.user(username, Role::Admin, None, None)
    }

    pub fn teacher(self, username: &str, first: &str, last: &str) -> Self {
        self.user(username, Role::Teacher, Some(first), Some(last))
    }

    pub fn student(self, username: &str, first: &str, last: &str) -> Self {
        self.user(username, Role::Student, Some(first), Some(last))
    }

    pub fn class(
        mut self,
        name: &str,
        teacher: &str,
        start: NaiveTime,
        end: NaiveTime,
        recurrence: Recurrence,
    ) -> Self {
        self.classes.push(TestClass {
            name: name.to_string(),
            teacher: teacher.to_string(),
            start,
            end,
            recurrence,
        });
        self
    }

    pub fn enroll(mut self, student: &str, class: &str) -> Self {
        self.enrollments
            .push((student.to_string(), class.to_string()));
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        init_test_logging();

        let pool = memory_pool().await?;
        let config = AppConfig::default();
        let codec = config.qr_codec();

        let mut user_ids = HashMap::new();
        let mut teacher_ids = HashMap::new();
        let mut student_ids = HashMap::new();
        let mut class_ids = HashMap::new();

        for user in &self.users {
            let account = NewAccount {
                username: user.username.clone(),
                password: STANDARD_PASSWORD.to_string(),
                display_name: String::new(),
                role: user.role,
                first_name: user.first_name.clone(),
                middle_name: None,
                last_name: user.last_name.clone(),
                external_id: None,
            };
            let user_id = provision_user(&pool, &codec, &account).await?;
            user_ids.insert(user.username.clone(), user_id);

            match user.role {
                Role::Teacher => {
                    if let Some(profile) = db::find_teacher_profile_by_user(&pool, user_id).await? {
                        teacher_ids.insert(user.username.clone(), profile.id);
                    }
                }
                Role::Student => {
                    if let Some(profile) = db::find_student_profile_by_user(&pool, user_id).await? {
                        student_ids.insert(user.username.clone(), profile.id);
                    }
                }
                Role::Admin => {}
            }
        }

        for class in &self.classes {
            let teacher_id = teacher_ids
                .get(&class.teacher)
                .copied()
                .ok_or_else(|| AppError::NotFound(class.teacher.clone()))?;

            let draft = ClassDraft {
                name: class.name.clone(),
                description: None,
                schedule: ClassSchedule::new(class.start, class.end, class.recurrence.clone())?,
            };
            let class_id = insert_class(&pool, teacher_id, &draft).await?;
            class_ids.insert(class.name.clone(), class_id);
        }

        for (student, class) in &self.enrollments {
            let student_id = student_ids
                .get(student)
                .copied()
                .ok_or_else(|| AppError::NotFound(student.clone()))?;
            let class_id = class_ids
                .get(class)
                .copied()
                .ok_or_else(|| AppError::NotFound(class.clone()))?;
            insert_enrollment(&pool, student_id, class_id).await?;
        }

        Ok(TestDb {
            pool,
            codec,
            user_ids,
            teacher_ids,
            student_ids,
            class_ids,
        })
    }
}

#[derive(Clone)]
pub struct TestDb {
    pub pool: Pool<Sqlite>,
    pub codec: QrCodec,
    pub user_ids: HashMap<String, i64>,
    pub teacher_ids: HashMap<String, i64>,
    pub student_ids: HashMap<String, i64>,
    pub class_ids: HashMap<String, i64>,
}

impl TestDb {
    pub fn user_id(&self, username: &str) -> i64 {
        self.user_ids[username]
    }

    pub fn teacher_id(&self, username: &str) -> i64 {
        self.teacher_ids[username]
    }

    pub fn student_id(&self, username: &str) -> i64 {
        self.student_ids[username]
    }

    pub fn class_id(&self, name: &str) -> i64 {
        self.class_ids[name]
    }

    /// The request context a logged-in `username` would get.
    pub async fn context(&self, username: &str) -> RequestContext {
        let user = db::get_user(&self.pool, self.user_id(username))
            .await
            .expect("test user exists");
        let profile = resolve_profile(&self.pool, &user)
            .await
            .expect("test user has a profile");
        RequestContext { user, profile }
    }

    pub async fn token_for(&self, username: &str) -> String {
        db::find_student_profile(&self.pool, self.student_id(username))
            .await
            .expect("query student")
            .expect("student exists")
            .qr_token
    }
}

/// Two teachers and three students. ms_smith's "Math101" meets 09:00 to 09:50
/// on 2024-05-01 only and her "Art" every Wednesday 13:00 to 14:00; carol is
/// not enrolled anywhere.
pub async fn create_standard_test_db() -> TestDb {
    TestDbBuilder::new()
        .admin("admin")
        .teacher("ms_smith", "Jane", "Smith")
        .teacher("mr_jones", "Tom", "Jones")
        .student("alice", "Alice", "Anders")
        .student("bob", "Bob", "Brown")
        .student("carol", "Carol", "Clark")
        .class(
            "Math101",
            "ms_smith",
            time(9, 0),
            time(9, 50),
            Recurrence::Once {
                date: session_day(),
            },
        )
        .class(
            "Art",
            "ms_smith",
            time(13, 0),
            time(14, 0),
            Recurrence::Weekly {
                days: vec![chrono::Weekday::Wed],
            },
        )
        .class("History", "mr_jones", time(10, 0), time(11, 0), Recurrence::Daily)
        .enroll("alice", "Math101")
        .enroll("bob", "Math101")
        .enroll("alice", "Art")
        .build()
        .await
        .expect("Failed to build test database")
}

pub async fn setup_test_client(test_db: TestDb, now: DateTime<Utc>) -> (Client, TestDb) {
    let clock: SharedClock = Arc::new(FixedClock(now));
    let rocket = init_rocket(test_db.pool.clone(), AppConfig::default(), clock)
        .expect("Failed to configure rocket");

    let client = Client::tracked(rocket)
        .await
        .expect("Failed to build test client");

    (client, test_db)
}

pub async fn login_test_user(client: &Client, username: &str) -> LoginResponse {
    let response = client
        .post("/api/login")
        .header(ContentType::JSON)
        .body(
            json!({
                "username": username,
                "password": STANDARD_PASSWORD
            })
            .to_string(),
        )
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::Ok);

    let body = response.into_string().await.expect("login body");
    let login: LoginResponse = serde_json::from_str(&body).expect("login response");
    assert!(login.success, "login failed for {}", username);
    login
}

pub fn default_policy() -> WindowPolicy {
    WindowPolicy::default()
}
