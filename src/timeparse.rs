use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;
use regex::Regex;
use thiserror::Error;

use crate::reminder::{ReminderKind, SECONDS_PER_DAY};

/// Expected, user-correctable parse failures. Callers match on the
/// variant to render a specific corrective message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("Invalid time format")]
    InvalidTimeFormat,

    #[error("A daily reminder can not be used with a full date")]
    InvalidReminderType,

    #[error("The specified time is in the past")]
    TimeInPast,

    #[error("The specified time is too far in the future")]
    ExcessiveFutureTime,
}

/// Validation bounds for a parse. Creation flows keep the default
/// one-minute lead; edit flows pass a larger one to avoid racing the
/// dispatch loop between validation and persistence.
#[derive(Debug, Clone, Copy)]
pub struct ParseLimits {
    pub lead_minutes: i64,
    pub horizon_years: u32,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            lead_minutes: 1,
            horizon_years: 2,
        }
    }
}

static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]?[0-9]|2[0-3]):([0-5][0-9])$").expect("Pattern is valid.")
});

static FULL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2})\.(\d{2})(?:\.(\d{4}))? (\d{2}):(\d{2})$").expect("Pattern is valid.")
});

// Each duration unit accepts a Latin and a Cyrillic single-letter alias.
static DURATION_UNITS: LazyLock<[(DurationUnit, Regex); 5]> = LazyLock::new(|| {
    let unit = |pattern| Regex::new(pattern).expect("Pattern is valid.");
    [
        (DurationUnit::Weeks, unit(r"(?i)(\d+)[wн]")),
        (DurationUnit::Days, unit(r"(?i)(\d+)[dд]")),
        (DurationUnit::Hours, unit(r"(?i)(\d+)[hч]")),
        (DurationUnit::Minutes, unit(r"(?i)(\d+)[mм]")),
        (DurationUnit::Seconds, unit(r"(?i)(\d+)[sс]")),
    ]
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationUnit {
    Weeks,
    Days,
    Hours,
    Minutes,
    Seconds,
}

/// A user-supplied time expression resolved to an UTC instant, together
/// with the reminder kind it was parsed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderTime {
    time: DateTime<Utc>,
    kind: ReminderKind,
}

impl ReminderTime {
    /// Parses `input` against "now", interpreting wall-clock expressions
    /// in `timezone`. Grammars are tried in a fixed order: clock time
    /// (`HH:MM`), duration tokens (`1d2h30m`), full date
    /// (`DD.MM[.YYYY] HH:MM`, one-shot only).
    pub fn parse(
        input: &str,
        timezone: Tz,
        kind: ReminderKind,
        limits: ParseLimits,
    ) -> Result<Self, TimeParseError> {
        Self::parse_at(input, timezone, kind, limits, Utc::now())
    }

    /// Same as [`ReminderTime::parse`] with an explicit evaluation
    /// instant, so tests never depend on the real clock.
    pub fn parse_at(
        input: &str,
        timezone: Tz,
        kind: ReminderKind,
        limits: ParseLimits,
        now: DateTime<Utc>,
    ) -> Result<Self, TimeParseError> {
        let input = input.trim();

        if let Some(captures) = CLOCK_TIME.captures(input) {
            let time = parse_clock_time(&captures, timezone, now)?;
            return Ok(Self { time, kind });
        }

        if DURATION_UNITS.iter().any(|(_, pattern)| pattern.is_match(input)) {
            let time = parse_duration(input, timezone, now)?;
            validate(time, now, limits)?;
            return Ok(Self { time, kind });
        }

        if let Some(captures) = FULL_DATE.captures(input) {
            if kind == ReminderKind::Daily {
                return Err(TimeParseError::InvalidReminderType);
            }
            let time = parse_full_date(&captures, timezone, now)?;
            validate(time, now, limits)?;
            return Ok(Self { time, kind });
        }

        Err(TimeParseError::InvalidTimeFormat)
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Persisted integer form: UTC epoch seconds for one-shot reminders,
    /// UTC second-of-day for daily ones. The timezone offset is
    /// deliberately not retained for daily reminders.
    pub fn schedule_value(&self) -> i64 {
        match self.kind {
            ReminderKind::OneShot => self.time.timestamp(),
            ReminderKind::Daily => i64::from(self.time.time().num_seconds_from_midnight()),
        }
    }
}

/// Reconstructs a displayable instant from a persisted schedule value.
/// For daily reminders the value is projected onto today's UTC date.
pub fn display_time(value: i64, kind: ReminderKind, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match kind {
        ReminderKind::OneShot => DateTime::from_timestamp(value, 0),
        ReminderKind::Daily => {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(
                u32::try_from(value.rem_euclid(SECONDS_PER_DAY)).ok()?,
                0,
            )?;
            now.date_naive().and_time(time).and_utc().into()
        }
    }
}

fn parse_clock_time(
    captures: &regex::Captures,
    timezone: Tz,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimeParseError> {
    let hours: u32 = captures[1].parse().expect("Matched by the pattern.");
    let minutes: u32 = captures[2].parse().expect("Matched by the pattern.");
    let wall_clock =
        NaiveTime::from_hms_opt(hours, minutes, 0).expect("The pattern bounds both fields.");

    let today = now.with_timezone(&timezone).date_naive();
    if let Some(candidate) = resolve_in_zone(timezone, today, wall_clock) {
        if candidate >= now + TimeDelta::minutes(1) {
            return Ok(candidate);
        }
    }

    // Already passed today (or fell into a DST gap): same wall clock,
    // next calendar day.
    let tomorrow = today.succ_opt().ok_or(TimeParseError::InvalidTimeFormat)?;
    resolve_in_zone(timezone, tomorrow, wall_clock).ok_or(TimeParseError::InvalidTimeFormat)
}

fn parse_duration(
    input: &str,
    timezone: Tz,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimeParseError> {
    let mut weeks: i64 = 0;
    let mut days: i64 = 0;
    let mut sub_day_seconds: i64 = 0;

    for (unit, pattern) in DURATION_UNITS.iter() {
        for captures in pattern.captures_iter(input) {
            let amount: i64 = captures[1]
                .parse()
                .map_err(|_| TimeParseError::ExcessiveFutureTime)?;
            let accumulated = match unit {
                DurationUnit::Weeks => &mut weeks,
                DurationUnit::Days => &mut days,
                DurationUnit::Hours => {
                    sub_day_seconds = checked_accumulate(sub_day_seconds, amount, 3600)?;
                    continue;
                }
                DurationUnit::Minutes => {
                    sub_day_seconds = checked_accumulate(sub_day_seconds, amount, 60)?;
                    continue;
                }
                DurationUnit::Seconds => {
                    sub_day_seconds = checked_accumulate(sub_day_seconds, amount, 1)?;
                    continue;
                }
            };
            *accumulated = accumulated
                .checked_add(amount)
                .ok_or(TimeParseError::ExcessiveFutureTime)?;
        }
    }

    let total_days = weeks
        .checked_mul(7)
        .and_then(|w| w.checked_add(days))
        .and_then(|d| u64::try_from(d).ok())
        .ok_or(TimeParseError::ExcessiveFutureTime)?;

    // Day addition is calendar arithmetic in the target zone so that a
    // "1d" reminder lands on the same wall clock across a DST change.
    let local = now.with_timezone(&timezone);
    let shifted = local
        .checked_add_days(Days::new(total_days))
        .and_then(|t| t.checked_add_signed(TimeDelta::seconds(sub_day_seconds)))
        .ok_or(TimeParseError::ExcessiveFutureTime)?;

    Ok(shifted.with_timezone(&Utc))
}

fn checked_accumulate(current: i64, amount: i64, scale: i64) -> Result<i64, TimeParseError> {
    amount
        .checked_mul(scale)
        .and_then(|seconds| current.checked_add(seconds))
        .ok_or(TimeParseError::ExcessiveFutureTime)
}

fn parse_full_date(
    captures: &regex::Captures,
    timezone: Tz,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimeParseError> {
    let day: u32 = captures[1].parse().expect("Matched by the pattern.");
    let month: u32 = captures[2].parse().expect("Matched by the pattern.");
    let year: i32 = match captures.get(3) {
        Some(year) => year.as_str().parse().expect("Matched by the pattern."),
        None => now.with_timezone(&timezone).year(),
    };
    let hours: u32 = captures[4].parse().expect("Matched by the pattern.");
    let minutes: u32 = captures[5].parse().expect("Matched by the pattern.");

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(TimeParseError::InvalidTimeFormat)?;
    let time = NaiveTime::from_hms_opt(hours, minutes, 0).ok_or(TimeParseError::InvalidTimeFormat)?;

    resolve_in_zone(timezone, date, time).ok_or(TimeParseError::InvalidTimeFormat)
}

fn resolve_in_zone(timezone: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    use chrono::TimeZone;

    timezone
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|resolved| resolved.with_timezone(&Utc))
}

fn validate(
    time: DateTime<Utc>,
    now: DateTime<Utc>,
    limits: ParseLimits,
) -> Result<(), TimeParseError> {
    let horizon = now
        .checked_add_months(Months::new(12 * limits.horizon_years))
        .ok_or(TimeParseError::ExcessiveFutureTime)?;
    if time > horizon {
        return Err(TimeParseError::ExcessiveFutureTime);
    }

    if time <= now + TimeDelta::minutes(limits.lead_minutes) {
        return Err(TimeParseError::TimeInPast);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDateTime;
    use proptest::prelude::*;

    const UTC_TZ: Tz = Tz::Etc__UTC;
    const MOSCOW: Tz = Tz::Europe__Moscow;

    fn at(date: (i32, u32, u32), time: (u32, u32, u32)) -> DateTime<Utc> {
        let naive = NaiveDateTime::new(
            NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            NaiveTime::from_hms_opt(time.0, time.1, time.2).unwrap(),
        );
        DateTime::from_naive_utc_and_offset(naive, Utc)
    }

    fn parse(input: &str, tz: Tz, kind: ReminderKind, now: DateTime<Utc>) -> Result<ReminderTime, TimeParseError> {
        ReminderTime::parse_at(input, tz, kind, ParseLimits::default(), now)
    }

    #[test]
    fn clock_time_resolves_to_same_day_when_still_ahead() {
        let now = at((2024, 1, 1), (10, 0, 0));
        let parsed = parse("15:30", UTC_TZ, ReminderKind::OneShot, now).unwrap();

        assert_eq!(parsed.time(), at((2024, 1, 1), (15, 30, 0)));
    }

    #[test]
    fn clock_time_rolls_to_next_day_when_already_passed() {
        let now = at((2024, 1, 1), (10, 0, 0));
        let parsed = parse("09:00", UTC_TZ, ReminderKind::Daily, now).unwrap();

        assert_eq!(parsed.time(), at((2024, 1, 2), (9, 0, 0)));
    }

    #[test]
    fn clock_time_less_than_a_minute_ahead_rolls_to_next_day() {
        let now = at((2024, 1, 1), (9, 59, 30));
        let parsed = parse("10:00", UTC_TZ, ReminderKind::OneShot, now).unwrap();

        assert_eq!(parsed.time(), at((2024, 1, 2), (10, 0, 0)));
    }

    #[test]
    fn clock_time_is_interpreted_in_the_target_zone() {
        // 08:00 Moscow (UTC+3) is 05:00 UTC.
        let now = at((2024, 1, 1), (0, 0, 0));
        let parsed = parse("08:00", MOSCOW, ReminderKind::Daily, now).unwrap();

        assert_eq!(parsed.time(), at((2024, 1, 1), (5, 0, 0)));
    }

    #[test]
    fn duration_tokens_accumulate_per_unit() {
        let now = at((2024, 1, 1), (0, 0, 0));
        let parsed = parse("1h1h", UTC_TZ, ReminderKind::OneShot, now).unwrap();
        let reference = parse("2h", UTC_TZ, ReminderKind::OneShot, now).unwrap();

        assert_eq!(parsed.time(), reference.time());
    }

    #[test]
    fn duration_mixes_units_and_aliases() {
        let now = at((2024, 1, 1), (0, 0, 0));
        let parsed = parse("1w2д3H30м", UTC_TZ, ReminderKind::OneShot, now).unwrap();

        assert_eq!(parsed.time(), at((2024, 1, 10), (3, 30, 0)));
    }

    #[test]
    fn ten_minute_timer_from_known_now() {
        let now = at((2024, 1, 1), (0, 0, 0));
        let parsed = parse("10m", UTC_TZ, ReminderKind::OneShot, now).unwrap();

        assert_eq!(parsed.time(), at((2024, 1, 1), (0, 10, 0)));
        assert_eq!(parsed.schedule_value(), now.timestamp() + 600);
    }

    #[test]
    fn full_date_parses_for_one_shot() {
        let now = at((2024, 1, 1), (0, 0, 0));
        let parsed = parse("21.07.2025 10:00", UTC_TZ, ReminderKind::OneShot, now).unwrap();

        assert_eq!(parsed.time(), at((2025, 7, 21), (10, 0, 0)));
    }

    #[test]
    fn full_date_year_defaults_to_current_year() {
        let now = at((2024, 1, 1), (0, 0, 0));
        let parsed = parse("21.07 10:00", UTC_TZ, ReminderKind::OneShot, now).unwrap();

        assert_eq!(parsed.time(), at((2024, 7, 21), (10, 0, 0)));
    }

    #[test]
    fn full_date_rejects_daily_kind() {
        let now = at((2024, 1, 1), (0, 0, 0));
        let result = parse("21.07.2025 10:00", UTC_TZ, ReminderKind::Daily, now);

        assert_eq!(result, Err(TimeParseError::InvalidReminderType));
    }

    #[test]
    fn nonsense_input_is_an_invalid_format() {
        let now = at((2024, 1, 1), (0, 0, 0));

        assert_eq!(
            parse("tomorrow at noon", UTC_TZ, ReminderKind::OneShot, now),
            Err(TimeParseError::InvalidTimeFormat)
        );
        assert_eq!(
            parse("32.01.2024 10:00", UTC_TZ, ReminderKind::OneShot, now),
            Err(TimeParseError::InvalidTimeFormat)
        );
    }

    #[test]
    fn instant_exactly_at_horizon_is_accepted() {
        let now = at((2024, 1, 1), (10, 0, 0));
        let result = parse("01.01.2026 10:00", UTC_TZ, ReminderKind::OneShot, now);

        assert_eq!(result.unwrap().time(), at((2026, 1, 1), (10, 0, 0)));
    }

    #[test]
    fn instant_past_horizon_is_rejected() {
        let now = at((2024, 1, 1), (10, 0, 0));
        let result = parse("01.01.2026 10:01", UTC_TZ, ReminderKind::OneShot, now);

        assert_eq!(result, Err(TimeParseError::ExcessiveFutureTime));
    }

    #[test]
    fn instant_exactly_at_lead_is_rejected() {
        let now = at((2024, 1, 1), (9, 59, 0));
        let result = parse("01.01.2024 10:00", UTC_TZ, ReminderKind::OneShot, now);

        assert_eq!(result, Err(TimeParseError::TimeInPast));
    }

    #[test]
    fn edit_lead_is_wider_than_creation_lead() {
        let now = at((2024, 1, 1), (9, 55, 0));
        let limits = ParseLimits {
            lead_minutes: 10,
            ..ParseLimits::default()
        };
        let result =
            ReminderTime::parse_at("01.01.2024 10:00", UTC_TZ, ReminderKind::OneShot, limits, now);

        assert_eq!(result, Err(TimeParseError::TimeInPast));
    }

    #[test]
    fn one_shot_schedule_value_round_trips_through_epoch() {
        let now = at((2024, 1, 1), (0, 0, 0));
        let parsed = parse("21.07.2024 10:00", UTC_TZ, ReminderKind::OneShot, now).unwrap();
        let value = parsed.schedule_value();

        assert_eq!(DateTime::from_timestamp(value, 0).unwrap(), parsed.time());
    }

    #[test]
    fn daily_schedule_value_is_utc_second_of_day() {
        // 08:30 Moscow is 05:30 UTC.
        let now = at((2024, 1, 1), (0, 0, 0));
        let parsed = parse("08:30", MOSCOW, ReminderKind::Daily, now).unwrap();

        assert_eq!(parsed.schedule_value(), 5 * 3600 + 30 * 60);
    }

    #[test]
    fn display_time_projects_daily_value_onto_today() {
        let now = at((2024, 3, 5), (12, 0, 0));
        let displayed = display_time(5 * 3600, ReminderKind::Daily, now).unwrap();

        assert_eq!(displayed, at((2024, 3, 5), (5, 0, 0)));
    }

    proptest! {
        #[test]
        fn clock_time_keeps_wall_clock_and_stays_ahead(
            hours in 0u32..24,
            minutes in 0u32..60,
            now_epoch in 0i64..4_000_000_000,
        ) {
            let now = DateTime::from_timestamp(now_epoch, 0).unwrap();
            let input = format!("{hours:02}:{minutes:02}");
            let parsed = parse(&input, UTC_TZ, ReminderKind::Daily, now).unwrap();

            prop_assert_eq!(parsed.time().time().hour(), hours);
            prop_assert_eq!(parsed.time().time().minute(), minutes);
            prop_assert!(parsed.time() >= now + TimeDelta::minutes(1));
            prop_assert!(parsed.time() - now <= TimeDelta::days(1) + TimeDelta::minutes(1));
        }

        #[test]
        fn split_duration_tokens_parse_like_their_sum(
            first in 1i64..500,
            second in 1i64..500,
        ) {
            let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
            let split = format!("{first}h{second}h");
            let merged = format!("{}h", first + second);

            let split = parse(&split, UTC_TZ, ReminderKind::OneShot, now);
            let merged = parse(&merged, UTC_TZ, ReminderKind::OneShot, now);
            prop_assert_eq!(split, merged);
        }
    }
}
