//! Five-field cron expressions: `minute hour day month day_of_week`.
//!
//! Parsing and next-occurrence search are done by `croner`. Each field accepts
//! `*`, `N`, `A-B`, `*/S`, `A-B/S`, `N/S` and comma lists of those. Months and
//! weekdays also accept three-letter names. Weekday `7` is Sunday, same as `0`.
//!
//! When both day-of-month and day-of-week are restricted, a day matches if
//! **either** matches (classic Vixie cron behaviour, croner's default).

use chrono::{FixedOffset, Utc};
use croner::Cron;

use crate::error::ScheduleError;
use crate::time::Timestamp;

/// A parsed cron expression.
#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    cron: Cron,
}

impl CronSchedule {
    /// Parse a five-field expression.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidScheduleFormat`] when the field count
    /// is not five or any field is outside the cron grammar.
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::invalid(
                expression,
                format!(
                    "expected 5 fields (minute hour day month day_of_week), got {}",
                    fields.len()
                ),
            ));
        }

        let expression = fields.join(" ");
        let cron = Cron::new(&expression)
            .parse()
            .map_err(|err| ScheduleError::invalid(&expression, err.to_string()))?;
        Ok(Self { expression, cron })
    }

    /// The normalised expression (single spaces between fields).
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First matching minute strictly after `after`, evaluated in `offset`.
    ///
    /// Returns `None` when nothing ever matches, e.g. `0 0 31 2 *`.
    #[must_use]
    pub fn next_after(&self, after: Timestamp, offset: FixedOffset) -> Option<Timestamp> {
        self.cron
            .find_next_occurrence(&after.with_timezone(&offset), false)
            .ok()
            .map(|next| next.with_timezone(&Utc))
    }
}

impl PartialEq for CronSchedule {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for CronSchedule {}

impl std::fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expression).finish()
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}

impl std::str::FromStr for CronSchedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn should_accept_common_five_field_expressions() {
        for expr in [
            "* * * * *",
            "0 8 * * *",
            "*/15 * * * *",
            "30 7 * * 1-5",
            "0 0 1,15 * *",
            "0 22 * jan-mar sun",
            "5-50/5 9-17 * * MON-FRI",
            "0 12 * * 7",
            "10/20 * * * *",
        ] {
            assert!(CronSchedule::parse(expr).is_ok(), "{expr} should parse");
        }
    }

    #[test]
    fn should_reject_wrong_field_count() {
        for expr in ["", "* * * *", "0 8 * * * *", "bad"] {
            let err = CronSchedule::parse(expr).unwrap_err();
            assert!(matches!(err, ScheduleError::InvalidScheduleFormat { .. }));
        }
    }

    #[test]
    fn should_reject_out_of_range_and_malformed_fields() {
        for expr in [
            "60 * * * *",
            "* 24 * * *",
            "* * 0 * *",
            "* * * 13 *",
            "* * * * 8",
            "x * * * *",
        ] {
            assert!(CronSchedule::parse(expr).is_err(), "{expr} should fail");
        }
    }

    #[test]
    fn should_find_next_hour_boundary() {
        let cron = CronSchedule::parse("0 * * * *").unwrap();
        let next = cron.next_after(at(2026, 2, 22, 10, 30), utc()).unwrap();
        assert_eq!(next, at(2026, 2, 22, 11, 0));
    }

    #[test]
    fn should_be_strictly_after_reference_time() {
        let cron = CronSchedule::parse("0 8 * * *").unwrap();
        let next = cron.next_after(at(2026, 2, 22, 8, 0), utc()).unwrap();
        assert_eq!(next, at(2026, 2, 23, 8, 0));
    }

    #[test]
    fn should_skip_weekend_for_weekday_range() {
        let cron = CronSchedule::parse("30 7 * * 1-5").unwrap();
        // 2024-01-06 is a Saturday.
        let next = cron.next_after(at(2024, 1, 6, 12, 0), utc()).unwrap();
        assert_eq!(next, at(2024, 1, 8, 7, 30));
    }

    #[test]
    fn should_treat_seven_as_sunday() {
        let cron = CronSchedule::parse("0 9 * * 7").unwrap();
        // 2024-01-01 is a Monday; next Sunday is the 7th.
        let next = cron.next_after(at(2024, 1, 1, 0, 0), utc()).unwrap();
        assert_eq!(next, at(2024, 1, 7, 9, 0));
    }

    #[test]
    fn should_match_either_day_or_weekday_when_both_restricted() {
        let cron = CronSchedule::parse("0 0 15 * fri").unwrap();
        // 2024-01-05 is a Friday, before the 15th.
        let next = cron.next_after(at(2024, 1, 1, 0, 0), utc()).unwrap();
        assert_eq!(next, at(2024, 1, 5, 0, 0));
    }

    #[test]
    fn should_roll_over_year_end() {
        let cron = CronSchedule::parse("0 0 1 jan *").unwrap();
        let next = cron.next_after(at(2024, 12, 31, 23, 59), utc()).unwrap();
        assert_eq!(next, at(2025, 1, 1, 0, 0));
    }

    #[test]
    fn should_find_leap_day() {
        let cron = CronSchedule::parse("0 0 29 2 *").unwrap();
        let next = cron.next_after(at(2025, 3, 1, 0, 0), utc()).unwrap();
        assert_eq!(next, at(2028, 2, 29, 0, 0));
    }

    #[test]
    fn should_return_none_for_impossible_date() {
        let cron = CronSchedule::parse("0 0 31 2 *").unwrap();
        assert!(cron.next_after(at(2024, 1, 1, 0, 0), utc()).is_none());
    }

    #[test]
    fn should_evaluate_in_configured_offset() {
        let cron = CronSchedule::parse("0 8 * * *").unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let next = cron.next_after(at(2024, 1, 1, 0, 0), plus_two).unwrap();
        assert_eq!(next, at(2024, 1, 1, 6, 0));
    }

    #[test]
    fn should_normalise_whitespace_in_expression() {
        let cron = CronSchedule::parse("  0   8 * *  * ").unwrap();
        assert_eq!(cron.expression(), "0 8 * * *");
    }
}
