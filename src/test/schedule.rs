#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc, Weekday};

    use crate::attendance::{WindowPolicy, check_window};
    use crate::error::AppError;
    use crate::models::{AttendanceStatus, MarkSource};
    use crate::schedule::{ClassSchedule, Recurrence, local_date, parse_weekdays};
    use crate::test::utils::{at, session_day, time};

    fn math101() -> ClassSchedule {
        ClassSchedule::new(
            time(9, 0),
            time(9, 50),
            Recurrence::Once {
                date: session_day(),
            },
        )
        .unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn test_end_must_follow_start() {
        let same = ClassSchedule::new(time(9, 0), time(9, 0), Recurrence::Daily);
        assert!(matches!(same, Err(AppError::Validation(_))));

        let reversed = ClassSchedule::new(time(10, 0), time(9, 0), Recurrence::Daily);
        assert!(matches!(reversed, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_weekly_needs_days() {
        let result = ClassSchedule::new(
            time(9, 0),
            time(10, 0),
            Recurrence::Weekly { days: vec![] },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_parse_weekdays_dedups_and_orders() {
        let days = parse_weekdays(&["fri", "Mon", "monday", "wed"]).unwrap();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);

        assert!(matches!(
            parse_weekdays(&["someday"]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_recurrence_columns_round_trip() {
        let weekly = Recurrence::Weekly {
            days: vec![Weekday::Tue, Weekday::Thu],
        };
        assert_eq!(weekly.meeting_days_column(), "tue,thu");
        assert_eq!(
            Recurrence::from_columns(&weekly.meeting_days_column(), None).unwrap(),
            weekly
        );

        let once = Recurrence::Once {
            date: session_day(),
        };
        assert_eq!(
            Recurrence::from_columns("", once.session_date_column()).unwrap(),
            once
        );

        assert_eq!(Recurrence::from_columns("", None).unwrap(), Recurrence::Daily);
    }

    #[test]
    fn test_meets_on() {
        let wednesday = session_day();
        let thursday = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();

        assert!(math101().meets_on(wednesday));
        assert!(!math101().meets_on(thursday));

        let weekly = Recurrence::Weekly {
            days: vec![Weekday::Wed],
        };
        assert!(weekly.meets_on(wednesday));
        assert!(weekly.meets_on(NaiveDate::from_ymd_opt(2024, 5, 8).unwrap()));
        assert!(!weekly.meets_on(thursday));

        assert!(Recurrence::Daily.meets_on(thursday));
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = math101().window_for(session_day(), utc()).unwrap();

        assert!(!window.contains(at(8, 59)));
        assert!(window.contains(at(9, 0)));
        assert!(window.contains(at(9, 10)));
        assert!(window.contains(at(9, 50)));
        assert!(!window.contains(at(9, 51)));

        assert!(window.not_started(at(8, 59)));
        assert!(window.has_ended(at(10, 0)));
    }

    #[test]
    fn test_window_absent_on_other_days() {
        let thursday = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert!(math101().window_for(thursday, utc()).is_none());
    }

    #[test]
    fn test_window_uses_local_time() {
        // UTC+2: 09:00 local is 07:00 UTC.
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let window = math101().window_for(session_day(), plus_two).unwrap();

        assert!(window.contains(at(7, 10)));
        assert!(!window.contains(at(9, 10)));
    }

    #[test]
    fn test_local_date_crosses_midnight() {
        let late_evening = Utc.with_ymd_and_hms(2024, 4, 30, 23, 30, 0).unwrap();
        let plus_one = FixedOffset::east_opt(3600).unwrap();

        assert_eq!(local_date(late_evening, utc()), NaiveDate::from_ymd_opt(2024, 4, 30).unwrap());
        assert_eq!(local_date(late_evening, plus_one), session_day());
    }

    #[test]
    fn test_check_window_qr_is_strict() {
        let window = math101().window_for(session_day(), utc()).unwrap();
        let policy = WindowPolicy::default();

        for now in [at(8, 59), at(10, 0)] {
            let result = check_window(
                &window,
                AttendanceStatus::Present,
                MarkSource::Qr,
                now,
                &policy,
            );
            assert!(matches!(result, Err(AppError::OutsideWindow { .. })));
        }

        assert!(
            check_window(
                &window,
                AttendanceStatus::Present,
                MarkSource::Qr,
                at(9, 10),
                &policy
            )
            .is_ok()
        );
    }

    #[test]
    fn test_check_window_manual_backdate() {
        let window = math101().window_for(session_day(), utc()).unwrap();
        let policy = WindowPolicy::default();

        // Absent or Late after the window, same day.
        for status in [AttendanceStatus::Absent, AttendanceStatus::Late] {
            assert!(check_window(&window, status, MarkSource::Manual, at(15, 0), &policy).is_ok());
        }

        // Present still needs the live window.
        assert!(matches!(
            check_window(
                &window,
                AttendanceStatus::Present,
                MarkSource::Manual,
                at(15, 0),
                &policy
            ),
            Err(AppError::OutsideWindow { .. })
        ));

        // Never before the window opens.
        assert!(
            check_window(
                &window,
                AttendanceStatus::Absent,
                MarkSource::Manual,
                at(8, 0),
                &policy
            )
            .is_err()
        );

        // Not on a later day.
        let next_day = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        assert!(
            check_window(
                &window,
                AttendanceStatus::Absent,
                MarkSource::Manual,
                next_day,
                &policy
            )
            .is_err()
        );

        let strict = WindowPolicy {
            allow_manual_backdate: false,
            ..policy
        };
        assert!(
            check_window(
                &window,
                AttendanceStatus::Late,
                MarkSource::Manual,
                at(15, 0),
                &strict
            )
            .is_err()
        );
    }

    #[test]
    fn test_outside_window_message_names_the_window() {
        let window = math101().window_for(session_day(), utc()).unwrap();
        let message = window.outside_error().to_string();
        assert_eq!(
            message,
            "Attendance can only be marked between 2024-05-01 09:00 and 09:50"
        );
    }
}
