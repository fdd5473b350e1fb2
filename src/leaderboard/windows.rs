use chrono::{DateTime, Datelike, Duration, Utc};

use crate::db::errors::{DatabaseError, Result};

/// Ranking partitions. Weekly and monthly buckets expire; global and
/// per-author buckets persist indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Global,
    Weekly,
    Monthly,
    Author,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Global => "global",
            Window::Weekly => "weekly",
            Window::Monthly => "monthly",
            Window::Author => "author",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(Window::Global),
            "weekly" => Ok(Window::Weekly),
            "monthly" => Ok(Window::Monthly),
            "author" => Ok(Window::Author),
            other => Err(DatabaseError::InvalidData(format!(
                "Unknown leaderboard window '{}'",
                other
            ))),
        }
    }

    /// TTL for the cached ranking set, where one applies.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Window::Weekly => Some(Duration::days(35)),
            Window::Monthly => Some(Duration::days(120)),
            Window::Global | Window::Author => None,
        }
    }
}

/// Deterministic bucket id for a window at an instant. The author window
/// keys on the author, the time windows on ISO week / calendar month.
pub fn bucket_id(window: Window, mode: &str, author_key: Option<&str>, now: DateTime<Utc>) -> String {
    match window {
        Window::Global => format!("global:{}", mode),
        Window::Weekly => {
            let iso = now.iso_week();
            format!("weekly:{:04}-W{:02}:{}", iso.year(), iso.week(), mode)
        }
        Window::Monthly => format!("monthly:{:04}-{:02}:{}", now.year(), now.month(), mode),
        Window::Author => format!("author:{}:{}", author_key.unwrap_or("unknown"), mode),
    }
}

/// Start of the current weekly/monthly bucket, used by the raw-aggregation
/// fallback to bound which score rows count. None for unbounded windows.
pub fn window_start(window: Window, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match window {
        Window::Weekly => {
            let date = now.date_naive();
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            monday.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
        }
        Window::Monthly => now
            .date_naive()
            .with_day(1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc()),
        Window::Global | Window::Author => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bucket_ids_are_deterministic() {
        // 2025-01-01 falls in ISO week 2025-W01.
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(bucket_id(Window::Global, "standard", None, now), "global:standard");
        assert_eq!(
            bucket_id(Window::Weekly, "standard", None, now),
            "weekly:2025-W01:standard"
        );
        assert_eq!(
            bucket_id(Window::Monthly, "standard", None, now),
            "monthly:2025-01:standard"
        );
        assert_eq!(
            bucket_id(Window::Author, "standard", Some("author-7"), now),
            "author:author-7:standard"
        );
    }

    #[test]
    fn iso_week_crosses_year_boundary() {
        // 2024-12-30 is a Monday belonging to ISO week 2025-W01.
        let now = Utc.with_ymd_and_hms(2024, 12, 30, 0, 0, 0).unwrap();
        assert_eq!(
            bucket_id(Window::Weekly, "standard", None, now),
            "weekly:2025-W01:standard"
        );
    }

    #[test]
    fn window_starts_align_to_monday_and_first_of_month() {
        // Wednesday 2025-06-11.
        let now = Utc.with_ymd_and_hms(2025, 6, 11, 15, 30, 0).unwrap();
        assert_eq!(
            window_start(Window::Weekly, now),
            Some(Utc.with_ymd_and_hms(2025, 6, 9, 0, 0, 0).unwrap())
        );
        assert_eq!(
            window_start(Window::Monthly, now),
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(window_start(Window::Global, now), None);
    }

    #[test]
    fn only_time_windows_expire() {
        assert!(Window::Weekly.ttl().is_some());
        assert!(Window::Monthly.ttl().is_some());
        assert!(Window::Global.ttl().is_none());
        assert!(Window::Author.ttl().is_none());
    }
}
