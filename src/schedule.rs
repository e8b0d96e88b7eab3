//! Class meeting times and the attendance window they open.
//!
//! Times on a class are wall-clock times in the school's timezone. A window is
//! the concrete `[start, end]` instant range for one session date.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Recurrence {
    /// Meets on a single calendar date.
    Once { date: NaiveDate },
    Weekly {
        #[serde(serialize_with = "serialize_days")]
        days: Vec<Weekday>,
    },
    Daily,
}

fn serialize_days<S: serde::Serializer>(days: &[Weekday], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(days.iter().map(|d| weekday_code(*d)))
}

pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

pub fn parse_weekdays<S: AsRef<str>>(values: &[S]) -> Result<Vec<Weekday>, AppError> {
    let mut days = Vec::with_capacity(values.len());
    for value in values {
        let value = value.as_ref().trim();
        let day = value
            .parse::<Weekday>()
            .map_err(|_| AppError::Validation(format!("Unknown weekday: {}", value)))?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    days.sort_by_key(|d| d.num_days_from_monday());
    Ok(days)
}

impl Recurrence {
    /// Builds a recurrence from the stored `meeting_days`/`session_date` pair.
    pub fn from_columns(
        meeting_days: &str,
        session_date: Option<NaiveDate>,
    ) -> Result<Self, AppError> {
        if let Some(date) = session_date {
            return Ok(Recurrence::Once { date });
        }

        let codes: Vec<&str> = meeting_days
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .collect();

        if codes.is_empty() {
            Ok(Recurrence::Daily)
        } else {
            Ok(Recurrence::Weekly {
                days: parse_weekdays(&codes)?,
            })
        }
    }

    pub fn meeting_days_column(&self) -> String {
        match self {
            Recurrence::Weekly { days } => days
                .iter()
                .map(|d| weekday_code(*d))
                .collect::<Vec<_>>()
                .join(","),
            _ => String::new(),
        }
    }

    pub fn session_date_column(&self) -> Option<NaiveDate> {
        match self {
            Recurrence::Once { date } => Some(*date),
            _ => None,
        }
    }

    pub fn meets_on(&self, date: NaiveDate) -> bool {
        match self {
            Recurrence::Once { date: once } => *once == date,
            Recurrence::Weekly { days } => days.contains(&date.weekday()),
            Recurrence::Daily => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassSchedule {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub recurrence: Recurrence,
}

impl ClassSchedule {
    pub fn new(
        start_time: NaiveTime,
        end_time: NaiveTime,
        recurrence: Recurrence,
    ) -> Result<Self, AppError> {
        if end_time <= start_time {
            return Err(AppError::Validation(
                "Class end time must be after its start time".to_string(),
            ));
        }

        if let Recurrence::Weekly { days } = &recurrence {
            if days.is_empty() {
                return Err(AppError::Validation(
                    "A weekly class needs at least one meeting day".to_string(),
                ));
            }
        }

        Ok(Self {
            start_time,
            end_time,
            recurrence,
        })
    }

    pub fn meets_on(&self, date: NaiveDate) -> bool {
        self.recurrence.meets_on(date)
    }

    /// The window for `date`, or `None` when the class does not meet that day.
    pub fn window_for(&self, date: NaiveDate, timezone: FixedOffset) -> Option<SessionWindow> {
        if !self.meets_on(date) {
            return None;
        }

        let start = date
            .and_time(self.start_time)
            .and_local_timezone(timezone)
            .single()?;
        let end = date
            .and_time(self.end_time)
            .and_local_timezone(timezone)
            .single()?;

        Some(SessionWindow {
            session_date: date,
            start,
            end,
        })
    }

    /// The window of today's session, if the class meets on the local date of `now`.
    pub fn window_around(&self, now: DateTime<Utc>, timezone: FixedOffset) -> Option<SessionWindow> {
        self.window_for(local_date(now, timezone), timezone)
    }
}

pub fn local_date(now: DateTime<Utc>, timezone: FixedOffset) -> NaiveDate {
    now.with_timezone(&timezone).date_naive()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionWindow {
    pub session_date: NaiveDate,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl SessionWindow {
    /// Both bounds are inclusive.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.end
    }

    pub fn not_started(&self, now: DateTime<Utc>) -> bool {
        now < self.start
    }

    /// True when `now` falls on the session's own local calendar day.
    pub fn same_local_day(&self, now: DateTime<Utc>) -> bool {
        local_date(now, *self.start.offset()) == self.session_date
    }

    pub fn outside_error(&self) -> AppError {
        AppError::OutsideWindow {
            start: self.start,
            end: self.end,
        }
    }
}
