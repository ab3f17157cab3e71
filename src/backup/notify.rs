//! # Pre-maintenance notification planning.
//!
//! Pure planning of the one-shot notification timers: given "now", the
//! maintenance target, and the configured offsets, compute which offsets can
//! still fire and after what delay. The orchestrator arms one timer per
//! planned entry; arming and cancellation of the whole batch happen there.

use std::time::Duration;

use chrono::NaiveDateTime;

use crate::config::NoticeOffset;

/// Computes the armable notifications for a maintenance target.
///
/// For each offset, the fire instant is `target - offset`; offsets whose fire
/// instant is not strictly in the future are skipped. Returns `(offset,
/// delay-from-now)` pairs in the input order.
pub(crate) fn plan(
    now: NaiveDateTime,
    target: NaiveDateTime,
    offsets: &[NoticeOffset],
) -> Vec<(NoticeOffset, Duration)> {
    let mut planned = Vec::new();
    for offset in offsets {
        let Ok(ahead) = chrono::Duration::from_std(offset.duration) else {
            continue;
        };
        let fire_at = target - ahead;
        if fire_at <= now {
            continue;
        }
        if let Ok(delay) = (fire_at - now).to_std() {
            planned.push((offset.clone(), delay));
        }
    }
    planned
}

/// Substitutes the offset label into the message template.
pub(crate) fn render(template: &str, label: &str) -> String {
    template.replace("{time}", label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn offsets(specs: &[&str]) -> Vec<NoticeOffset> {
        specs.iter().map(|s| NoticeOffset::parse(s).unwrap()).collect()
    }

    #[test]
    fn arms_only_offsets_that_fit_before_the_target() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let target = now + chrono::Duration::hours(2);

        let planned = plan(now, target, &offsets(&["3h", "1h", "30m"]));
        let delays: Vec<_> = planned
            .iter()
            .map(|(o, d)| (o.label.as_str(), *d))
            .collect();
        assert_eq!(
            delays,
            vec![
                ("1h", Duration::from_secs(3600)),
                ("30m", Duration::from_secs(5400)),
            ]
        );
    }

    #[test]
    fn offset_landing_exactly_now_is_skipped() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let target = now + chrono::Duration::hours(1);
        assert!(plan(now, target, &offsets(&["1h"])).is_empty());
    }

    #[test]
    fn template_substitution() {
        assert_eq!(
            render("Server restarts in {time}!", "30m"),
            "Server restarts in 30m!"
        );
        assert_eq!(render("no placeholder", "30m"), "no placeholder");
    }
}
