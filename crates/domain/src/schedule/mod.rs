//! Schedule interpretation: action kind + schedule string → [`Trigger`].
//!
//! Everything here is pure. Callers pass in "now" and the wall-clock offset
//! so the same inputs always resolve to the same trigger.
//!
//! | kind        | grammar                   | trigger                 |
//! |-------------|---------------------------|-------------------------|
//! | `timer`     | 5-field cron              | [`Trigger::Cron`]       |
//! | `countdown` | `<n>m`, `<n>h`, `<n>d`    | [`Trigger::At`] now + n |
//! | `interval`  | `<n>s`, `<n>m`, `<n>h`    | [`Trigger::Every`]      |

mod cron;

pub use cron::CronSchedule;

use chrono::{Duration, FixedOffset};

use crate::action::ActionKind;
use crate::error::ScheduleError;
use crate::time::Timestamp;

/// When an action fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Recurring, on every minute matching the expression.
    Cron(CronSchedule),
    /// Once, at an absolute instant.
    At(Timestamp),
    /// Recurring, with a fixed period.
    Every(Duration),
}

impl Trigger {
    /// First due time for a job armed at `now`.
    #[must_use]
    pub fn first_fire(&self, now: Timestamp, offset: FixedOffset) -> Option<Timestamp> {
        match self {
            Self::Cron(cron) => cron.next_after(now, offset),
            Self::At(at) => Some(*at),
            Self::Every(period) => now.checked_add_signed(*period),
        }
    }

    /// Due time after the firing that was due at `due`.
    ///
    /// Intervals advance from the previous due time so they do not drift.
    /// Cron never returns a minute at or before `now`, even after a late firing.
    /// `None` once the trigger is exhausted or runs past the end of time.
    #[must_use]
    pub fn following(
        &self,
        due: Timestamp,
        now: Timestamp,
        offset: FixedOffset,
    ) -> Option<Timestamp> {
        match self {
            Self::Cron(cron) => cron.next_after(due.max(now), offset),
            Self::At(_) => None,
            Self::Every(period) => due.checked_add_signed(*period),
        }
    }

    /// Whether the trigger is consumed by its first firing.
    #[must_use]
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Self::At(_))
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cron(cron) => write!(f, "cron[{cron}]"),
            Self::At(at) => write!(f, "date[{}]", crate::time::to_storage_string(*at)),
            Self::Every(period) => write!(f, "interval[{}s]", period.num_seconds()),
        }
    }
}

/// Interpret `schedule` for an action of the given `kind`.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidScheduleFormat`] when the string does not
/// follow the grammar of `kind`.
pub fn resolve(
    kind: ActionKind,
    schedule: &str,
    now: Timestamp,
) -> Result<Trigger, ScheduleError> {
    let trimmed = schedule.trim();
    if trimmed.is_empty() {
        return Err(ScheduleError::invalid(schedule, "schedule is empty"));
    }
    match kind {
        ActionKind::Timer => CronSchedule::parse(trimmed).map(Trigger::Cron),
        ActionKind::Countdown => {
            let (magnitude, unit) = split_quantity(trimmed)?;
            let offset = match unit {
                'm' => Duration::try_minutes(magnitude),
                'h' => Duration::try_hours(magnitude),
                'd' => Duration::try_days(magnitude),
                other => {
                    return Err(ScheduleError::invalid(
                        trimmed,
                        format!("unknown countdown unit `{other}` (expected m, h or d)"),
                    ));
                }
            };
            offset
                .and_then(|offset| now.checked_add_signed(offset))
                .map(Trigger::At)
                .ok_or_else(|| ScheduleError::invalid(trimmed, "countdown is out of range"))
        }
        ActionKind::Interval => {
            let (magnitude, unit) = split_quantity(trimmed)?;
            if magnitude == 0 {
                return Err(ScheduleError::invalid(trimmed, "interval must be positive"));
            }
            let period = match unit {
                's' => Duration::try_seconds(magnitude),
                'm' => Duration::try_minutes(magnitude),
                'h' => Duration::try_hours(magnitude),
                other => {
                    return Err(ScheduleError::invalid(
                        trimmed,
                        format!("unknown interval unit `{other}` (expected s, m or h)"),
                    ));
                }
            };
            // the first firing must be representable, or the job could never arm
            match period.filter(|period| now.checked_add_signed(*period).is_some()) {
                Some(period) => Ok(Trigger::Every(period)),
                None => Err(ScheduleError::invalid(trimmed, "interval is out of range")),
            }
        }
    }
}

/// Whether a firing due at `due` may still run at `now`.
#[must_use]
pub fn within_grace(due: Timestamp, now: Timestamp, grace: Duration) -> bool {
    now - due <= grace
}

/// Split `"90m"` into `(90, 'm')`.
fn split_quantity(text: &str) -> Result<(i64, char), ScheduleError> {
    let Some(unit) = text.chars().last() else {
        return Err(ScheduleError::invalid(text, "schedule is empty"));
    };
    let digits = &text[..text.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScheduleError::invalid(
            text,
            format!("magnitude {digits:?} is not a non-negative integer"),
        ));
    }
    let magnitude: u32 = digits
        .parse()
        .map_err(|_| ScheduleError::invalid(text, format!("magnitude {digits:?} is too large")))?;
    Ok((i64::from(magnitude), unit))
}
