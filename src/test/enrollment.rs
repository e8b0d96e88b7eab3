#[cfg(test)]
mod tests {
    use rocket::tokio;

    use crate::classes::{
        ClassDraft, create_class, enroll, enrollment_overview, list_classes, unenroll,
        update_class,
    };
    use crate::db::{is_enrolled, set_user_archived};
    use crate::error::AppError;
    use crate::schedule::{ClassSchedule, Recurrence};
    use crate::test::utils::{create_standard_test_db, time};

    fn draft(name: &str) -> ClassDraft {
        ClassDraft {
            name: name.to_string(),
            description: Some("Weekly lab".to_string()),
            schedule: ClassSchedule::new(
                time(14, 0),
                time(15, 30),
                Recurrence::Weekly {
                    days: vec![chrono::Weekday::Mon, chrono::Weekday::Thu],
                },
            )
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_and_update_class() {
        let test_db = create_standard_test_db().await;
        let teacher = test_db.context("ms_smith").await;

        let created = create_class(&test_db.pool, &teacher, &draft("Physics"))
            .await
            .expect("create class");
        assert_eq!(created.name, "Physics");
        assert_eq!(created.teacher_id, test_db.teacher_id("ms_smith"));
        assert_eq!(created.schedule, draft("Physics").schedule);

        let mut changed = draft("Physics II");
        changed.description = None;
        changed.schedule = ClassSchedule::new(time(8, 0), time(8, 45), Recurrence::Daily).unwrap();

        let updated = update_class(&test_db.pool, &teacher, created.id, &changed)
            .await
            .expect("update class");
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Physics II");
        assert_eq!(updated.description, "");
        assert_eq!(updated.schedule.recurrence, Recurrence::Daily);
    }

    #[tokio::test]
    async fn test_students_cannot_create_classes() {
        let test_db = create_standard_test_db().await;
        let student = test_db.context("alice").await;

        let result = create_class(&test_db.pool, &student, &draft("Sneaky")).await;
        assert!(matches!(result, Err(AppError::UnauthorizedActor(_))));
    }

    #[tokio::test]
    async fn test_only_owner_updates_class() {
        let test_db = create_standard_test_db().await;
        let other = test_db.context("mr_jones").await;

        let result = update_class(
            &test_db.pool,
            &other,
            test_db.class_id("Math101"),
            &draft("Hijacked"),
        )
        .await;
        assert!(matches!(result, Err(AppError::UnauthorizedActor(_))));
    }

    #[tokio::test]
    async fn test_list_classes_ordered_by_start_time() {
        let test_db = create_standard_test_db().await;
        let teacher = test_db.context("ms_smith").await;

        let classes = list_classes(&test_db.pool, &teacher).await.unwrap();
        let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Math101", "Art"]);
    }

    #[tokio::test]
    async fn test_enroll_and_duplicate() {
        let test_db = create_standard_test_db().await;
        let teacher = test_db.context("ms_smith").await;
        let math = test_db.class_id("Math101");
        let carol = test_db.student_id("carol");

        let enrollment = enroll(&test_db.pool, &teacher, math, carol)
            .await
            .expect("enroll carol");
        assert_eq!(enrollment.student_id, carol);
        assert_eq!(enrollment.class_id, math);
        assert!(is_enrolled(&test_db.pool, carol, math).await.unwrap());

        let again = enroll(&test_db.pool, &teacher, math, carol).await;
        assert!(matches!(again, Err(AppError::AlreadyEnrolled { .. })));
    }

    #[tokio::test]
    async fn test_enroll_unknown_or_archived_student() {
        let test_db = create_standard_test_db().await;
        let teacher = test_db.context("ms_smith").await;
        let math = test_db.class_id("Math101");

        let unknown = enroll(&test_db.pool, &teacher, math, 9_999).await;
        assert!(matches!(unknown, Err(AppError::NotFound(_))));

        set_user_archived(&test_db.pool, test_db.user_id("carol"), true)
            .await
            .unwrap();
        let archived = enroll(&test_db.pool, &teacher, math, test_db.student_id("carol")).await;
        assert!(matches!(archived, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_enroll_requires_owner() {
        let test_db = create_standard_test_db().await;
        let other = test_db.context("mr_jones").await;

        let result = enroll(
            &test_db.pool,
            &other,
            test_db.class_id("Math101"),
            test_db.student_id("carol"),
        )
        .await;
        assert!(matches!(result, Err(AppError::UnauthorizedActor(_))));
    }

    #[tokio::test]
    async fn test_unenroll_missing_pair() {
        let test_db = create_standard_test_db().await;
        let teacher = test_db.context("ms_smith").await;

        let result = unenroll(
            &test_db.pool,
            &teacher,
            test_db.class_id("Math101"),
            test_db.student_id("carol"),
        )
        .await;
        assert!(matches!(result, Err(AppError::NotEnrolled { .. })));
    }

    #[tokio::test]
    async fn test_enrollment_overview_splits_students() {
        let test_db = create_standard_test_db().await;
        let teacher = test_db.context("ms_smith").await;

        let overview = enrollment_overview(&test_db.pool, &teacher, test_db.class_id("Math101"))
            .await
            .unwrap();

        let enrolled: Vec<&str> = overview.enrolled.iter().map(|s| s.username.as_str()).collect();
        let available: Vec<&str> = overview.available.iter().map(|s| s.username.as_str()).collect();

        assert_eq!(enrolled, vec!["alice", "bob"]);
        assert_eq!(available, vec!["carol"]);
    }
}
