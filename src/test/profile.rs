#[cfg(test)]
mod tests {
    use rocket::tokio;

    use crate::auth::{Dashboard, Profile, Role, resolve_dashboard, resolve_profile};
    use crate::db::{self, NewAccount, provision_user};
    use crate::error::AppError;
    use crate::models::compose_full_name;
    use crate::test::utils::{TestDbBuilder, create_standard_test_db};

    fn account(username: &str, role: Role, external_id: Option<&str>) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            password: "correct horse battery".to_string(),
            display_name: String::new(),
            role,
            first_name: Some("Pat".to_string()),
            middle_name: Some("quinn".to_string()),
            last_name: Some("Reyes".to_string()),
            external_id: external_id.map(String::from),
        }
    }

    #[test]
    fn test_compose_full_name() {
        assert_eq!(
            compose_full_name(Some("Pat"), Some("quinn"), Some("Reyes")),
            Some("Pat q Reyes".to_string())
        );
        assert_eq!(
            compose_full_name(Some("Pat"), Some("  "), Some("Reyes")),
            Some("Pat Reyes".to_string())
        );
        assert_eq!(compose_full_name(None, None, Some("Reyes")), Some("Reyes".to_string()));
        assert_eq!(compose_full_name(None, None, None), None);
    }

    #[tokio::test]
    async fn test_resolve_profile_by_role() {
        let test_db = create_standard_test_db().await;

        let teacher = db::get_user(&test_db.pool, test_db.user_id("ms_smith"))
            .await
            .unwrap();
        let profile = resolve_profile(&test_db.pool, &teacher).await.unwrap();
        assert!(matches!(&profile, Profile::Teacher(t) if t.name == "Jane Smith"));
        assert_eq!(resolve_dashboard(&profile), Dashboard::TeacherDashboard);

        let student = db::get_user(&test_db.pool, test_db.user_id("alice"))
            .await
            .unwrap();
        let profile = resolve_profile(&test_db.pool, &student).await.unwrap();
        assert!(matches!(&profile, Profile::Student(s) if s.username == "alice"));
        assert_eq!(resolve_dashboard(&profile), Dashboard::StudentDashboard);
        assert_eq!(resolve_dashboard(&profile).path(), "/api/student/dashboard");
    }

    #[tokio::test]
    async fn test_user_without_profile() {
        let test_db = create_standard_test_db().await;

        let admin = db::get_user(&test_db.pool, test_db.user_id("admin"))
            .await
            .unwrap();
        let result = resolve_profile(&test_db.pool, &admin).await;
        assert!(matches!(result, Err(AppError::NoProfile(name)) if name == "admin"));
    }

    #[tokio::test]
    async fn test_request_context_role_accessors() {
        let test_db = create_standard_test_db().await;

        let teacher = test_db.context("ms_smith").await;
        assert!(teacher.teacher().is_ok());
        assert!(matches!(teacher.student(), Err(AppError::UnauthorizedActor(_))));

        let student = test_db.context("alice").await;
        assert!(student.student().is_ok());
        assert!(matches!(student.teacher(), Err(AppError::UnauthorizedActor(_))));
    }

    #[tokio::test]
    async fn test_provisioning_creates_profiles() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        let teacher_id = provision_user(
            &test_db.pool,
            &test_db.codec,
            &account("preyes", Role::Teacher, Some("T-100")),
        )
        .await
        .unwrap();
        let teacher = db::find_teacher_profile_by_user(&test_db.pool, teacher_id)
            .await
            .unwrap()
            .expect("teacher profile");
        assert_eq!(teacher.name, "Pat q Reyes");
        assert_eq!(teacher.employee_number.as_deref(), Some("T-100"));

        let student_user = provision_user(
            &test_db.pool,
            &test_db.codec,
            &account("sreyes", Role::Student, Some("S-200")),
        )
        .await
        .unwrap();
        let student = db::find_student_profile_by_user(&test_db.pool, student_user)
            .await
            .unwrap()
            .expect("student profile");
        assert_eq!(student.student_number.as_deref(), Some("S-200"));
        assert_eq!(student.qr_token, test_db.codec.encode(student.id));

        let admin_id = provision_user(
            &test_db.pool,
            &test_db.codec,
            &account("root", Role::Admin, None),
        )
        .await
        .unwrap();
        assert!(
            db::find_teacher_profile_by_user(&test_db.pool, admin_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_provisioning_rejects_duplicates_atomically() {
        let test_db = TestDbBuilder::new().build().await.unwrap();

        provision_user(
            &test_db.pool,
            &test_db.codec,
            &account("first", Role::Student, Some("S-1")),
        )
        .await
        .unwrap();

        let same_username = provision_user(
            &test_db.pool,
            &test_db.codec,
            &account("first", Role::Student, Some("S-2")),
        )
        .await;
        assert!(matches!(same_username, Err(AppError::Validation(_))));

        let same_number = provision_user(
            &test_db.pool,
            &test_db.codec,
            &account("second", Role::Student, Some("S-1")),
        )
        .await;
        assert!(matches!(same_number, Err(AppError::Validation(_))));

        // The failed profile insert rolled back its user row.
        assert!(
            db::find_user_by_username(&test_db.pool, "second")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_concurrent_registration_of_one_username() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let first = account("twin", Role::Student, Some("S-10"));
        let second = account("twin", Role::Teacher, Some("T-10"));

        let (a, b) = tokio::join!(
            provision_user(&test_db.pool, &test_db.codec, &first),
            provision_user(&test_db.pool, &test_db.codec, &second),
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(AppError::Validation(msg)) if msg.contains("twin")))
        );

        let users = db::get_all_users(&test_db.pool).await.unwrap();
        assert_eq!(users.iter().filter(|u| u.username == "twin").count(), 1);
    }
}
