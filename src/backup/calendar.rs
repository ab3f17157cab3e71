//! # Calendar predicates and schedule math.
//!
//! Pure functions over naive local time, so the scheduled-pass logic is
//! testable with explicit dates instead of a mocked clock.

use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::archive::BackupCategory;

/// Categories evaluated by a scheduled pass, in pass order.
pub(crate) const SCHEDULED: [BackupCategory; 3] = [
    BackupCategory::Daily,
    BackupCategory::Weekly,
    BackupCategory::Monthly,
];

/// Whether a category's calendar predicate matches the given date.
///
/// Daily always matches, weekly only on ISO Sunday, monthly only on
/// day-of-month 1. Manual backups are never scheduled.
pub(crate) fn is_due(category: BackupCategory, date: NaiveDate) -> bool {
    match category {
        BackupCategory::Manual => false,
        BackupCategory::Daily => true,
        BackupCategory::Weekly => date.weekday() == Weekday::Sun,
        BackupCategory::Monthly => date.day() == 1,
    }
}

/// Delay from `now` until the next occurrence of `time_of_day`: today if that
/// instant is still ahead, otherwise tomorrow.
pub(crate) fn delay_until(now: NaiveDateTime, time_of_day: NaiveTime) -> Duration {
    let today = now.date().and_time(time_of_day);
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_is_always_due() {
        assert!(is_due(BackupCategory::Daily, date(2024, 1, 1)));
        assert!(is_due(BackupCategory::Daily, date(2024, 6, 15)));
    }

    #[test]
    fn weekly_is_due_only_on_sunday() {
        // 2024-01-07 was a Sunday, 2024-01-01 a Monday.
        assert!(is_due(BackupCategory::Weekly, date(2024, 1, 7)));
        assert!(!is_due(BackupCategory::Weekly, date(2024, 1, 1)));
        assert!(!is_due(BackupCategory::Weekly, date(2024, 1, 6)));
    }

    #[test]
    fn monthly_is_due_only_on_the_first() {
        assert!(is_due(BackupCategory::Monthly, date(2024, 1, 1)));
        assert!(is_due(BackupCategory::Monthly, date(2024, 2, 1)));
        assert!(!is_due(BackupCategory::Monthly, date(2024, 1, 2)));
        assert!(!is_due(BackupCategory::Monthly, date(2024, 1, 31)));
    }

    #[test]
    fn manual_is_never_scheduled() {
        assert!(!is_due(BackupCategory::Manual, date(2024, 1, 1)));
        assert!(!is_due(BackupCategory::Manual, date(2024, 1, 7)));
    }

    #[test]
    fn delay_targets_today_when_still_ahead() {
        let now = date(2024, 6, 15).and_hms_opt(10, 0, 0).unwrap();
        let tod = NaiveTime::from_hms_opt(12, 30, 0).unwrap();
        assert_eq!(
            delay_until(now, tod),
            Duration::from_secs(2 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn delay_rolls_to_tomorrow_when_passed() {
        let now = date(2024, 6, 15).and_hms_opt(10, 0, 0).unwrap();
        let tod = NaiveTime::from_hms_opt(4, 0, 0).unwrap();
        assert_eq!(delay_until(now, tod), Duration::from_secs(18 * 3600));
    }
}
