use crate::models::Task;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};

pub fn format_date_time(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%Y/%m/%d %H:%M")
        .to_string()
}

pub fn format_time(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%H:%M").to_string()
}

// "2h 30m", "45m", "3h"
pub fn format_duration(minutes: Option<i64>) -> String {
    let minutes = match minutes {
        Some(m) if m > 0 => m,
        _ => return "0m".to_string(),
    };

    let hours = minutes / 60;
    let mins = minutes % 60;
    match (hours, mins) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

pub fn format_relative(instant: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - instant).num_minutes();
    match minutes {
        m if m < 1 => "just now".to_string(),
        m if m < 60 => format!("{}m ago", m),
        m if m < 1440 => format!("{}h ago", m / 60),
        m if m < 2880 => "yesterday".to_string(),
        m => format!("{}d ago", m / 1440),
    }
}

/// The Sunday-first week containing `date`.
pub fn week_of(date: NaiveDate) -> Vec<NaiveDate> {
    let start = date - Duration::days(i64::from(date.weekday().num_days_from_sunday()));
    (0..7).map(|offset| start + Duration::days(offset)).collect()
}

/// Whether the task was created on `date`, by the UTC calendar day the
/// service stamps it with.
pub fn created_on(task: &Task, date: NaiveDate) -> bool {
    task.created_at.date_naive() == date
}
