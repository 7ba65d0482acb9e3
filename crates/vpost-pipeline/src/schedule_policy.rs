//! Optimal-day scheduling policy.
//!
//! Publication dates step through a fixed weekday preference (top four days
//! considered "optimal") and a preferred-hour list. Defaults match the
//! audience-analytics lists the schedule stage has always used; operators
//! can override them process-wide through the environment.

use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Day/hour preference used by the schedule stage.
#[derive(Debug, Clone)]
pub struct SchedulePolicy {
    /// Preferred hours, best first ("18:00", "19:00", ...)
    pub hours: Vec<String>,
    /// Weekdays ordered by preference; the first four count as optimal
    pub days: Vec<Weekday>,
    /// Fixed off-hour for the unlisted classroom variant
    pub classroom_hour: String,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            hours: ["18:00", "19:00", "20:00", "17:00", "12:00", "13:00"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            days: vec![
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Sat,
                Weekday::Mon,
                Weekday::Fri,
                Weekday::Sun,
            ],
            classroom_hour: "10:00".to_string(),
        }
    }
}

impl SchedulePolicy {
    /// Create policy from environment variables (comma-separated lists).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let hours = std::env::var("SCHEDULE_HOURS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.hours);
        let days = std::env::var("SCHEDULE_DAYS")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|s| parse_weekday(s.trim()))
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.days);
        Self {
            hours,
            days,
            classroom_hour: std::env::var("SCHEDULE_CLASSROOM_HOUR")
                .unwrap_or(defaults.classroom_hour),
        }
    }

    /// Next optimal (date, hour) at `offset_days` publications out.
    ///
    /// Starts tomorrow plus the offset and walks forward up to two weeks for
    /// a top-four day; the hour steps through the preference list so
    /// consecutive publications spread across the evening slots.
    pub fn next_optimal(&self, from: NaiveDate, offset_days: u32) -> (String, String) {
        let optimal: &[Weekday] = &self.days[..self.days.len().min(4)];
        let mut target = from + Duration::days(1 + offset_days as i64);

        for _ in 0..14 {
            if optimal.contains(&target.weekday()) {
                break;
            }
            target += Duration::days(1);
        }

        let hour = self.hours[offset_days as usize % self.hours.len()].clone();
        (target.format("%Y-%m-%d").to_string(), hour)
    }
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lands_on_an_optimal_day() {
        let policy = SchedulePolicy::default();
        // 2026-08-01 is a Saturday; tomorrow is Sunday, first optimal day
        // walking forward is Tuesday the 4th.
        let from = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let (date, hour) = policy.next_optimal(from, 0);
        assert_eq!(date, "2026-08-04");
        assert_eq!(hour, "18:00");
    }

    #[test]
    fn offsets_step_through_hours_and_days() {
        let policy = SchedulePolicy::default();
        let from = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let (d0, h0) = policy.next_optimal(from, 0);
        let (d1, h1) = policy.next_optimal(from, 1);
        let (d2, h2) = policy.next_optimal(from, 2);

        assert_eq!(h0, "18:00");
        assert_eq!(h1, "19:00");
        assert_eq!(h2, "20:00");
        // Later offsets never schedule earlier.
        assert!(d1 >= d0);
        assert!(d2 >= d1);
    }

    #[test]
    fn hour_list_wraps() {
        let policy = SchedulePolicy::default();
        let from = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let (_, hour) = policy.next_optimal(from, 6);
        assert_eq!(hour, "18:00");
    }

    #[test]
    fn weekday_parsing() {
        assert_eq!(parse_weekday("tue"), Some(Weekday::Tue));
        assert_eq!(parse_weekday("Sunday"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("noday"), None);
    }
}
