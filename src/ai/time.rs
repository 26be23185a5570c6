//! Natural language time expressions to absolute instants.
//!
//! The LLM passes along whatever the user typed ("tomorrow at 10 PM",
//! "next friday 3pm", "2026-11-02 14:00") so this needs to turn those
//! phrases into a UTC instant, reading them in a fixed source
//! timezone. The grammar is small on purpose and anything outside of it
//! is rejected rather than guessed at.
//!
//! Defaulting rules when a phrase leaves something out:
//!
//! - A time with no day is the nearest future occurrence: today if that
//!   time hasn't passed yet, otherwise tomorrow.
//! - A relative day ("today", "tomorrow") with no time keeps the current
//!   time of day. "tonight" with no time is 21:00.
//! - A calendar date or weekday with no time is local midnight.
//! - A month and day with no year is this year, or next year if the date
//!   already passed.
//! - A bare weekday (or "this <weekday>") is today when today matches,
//!   otherwise the next one. "next <weekday>" is always after today.
//! - Times without am/pm are 24-hour, except after "tonight" where
//!   hours before 12 are read as pm.
//! - A trailing `ist`, `utc`, `gmt` or `z` overrides the source timezone.
//! - The end of a span given as a bare time ("11 PM") is placed on the
//!   start's day, or the day after when it would not follow the start.

use chrono::{
    DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use winnow::ModalResult;
use winnow::ascii::{digit1, space0, space1};
use winnow::combinator::{alt, eof, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::token::take_while;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TimeParseError {
    #[error("could not understand the time \"{0}\"")]
    Unrecognized(String),
    #[error("\"{0}\" is not a valid date or time")]
    InvalidDate(String),
    #[error("{0} does not exist in the local timezone")]
    NonexistentLocalTime(NaiveDateTime),
}

/// Converts free-form time phrases into UTC instants, reading them in
/// `source_tz` unless the phrase names its own zone.
#[derive(Clone, Copy, Debug)]
pub struct TimeNormalizer {
    source_tz: Tz,
}

impl TimeNormalizer {
    pub fn new(source_tz: Tz) -> Self {
        Self { source_tz }
    }

    pub fn source_timezone(&self) -> Tz {
        self.source_tz
    }

    pub fn normalize(&self, raw: &str) -> Result<DateTime<Utc>, TimeParseError> {
        self.normalize_at(raw, Utc::now())
    }

    /// Same as `normalize` but relative phrases are resolved against
    /// `now` instead of the wall clock.
    pub fn normalize_at(
        &self,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, TimeParseError> {
        match self.parse(raw)? {
            Parsed::Absolute(dt) => Ok(dt),
            Parsed::Phrase(expr, tz) => resolve(expr, tz, now).map_err(|e| with_raw(e, raw)),
        }
    }

    /// Resolve the end of a span that begins at `start`. A time of day
    /// with no day lands on the start's local date and only moves to the
    /// next day when it isn't after the start. Anything else resolves
    /// like `normalize_at`.
    pub fn normalize_end_at(
        &self,
        raw: &str,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, TimeParseError> {
        match self.parse(raw)? {
            Parsed::Absolute(dt) => Ok(dt),
            Parsed::Phrase(
                Expression::Moment {
                    day: None,
                    time: Some(time),
                },
                tz,
            ) => next_occurrence(time, tz, start).map_err(|e| with_raw(e, raw)),
            Parsed::Phrase(expr, tz) => resolve(expr, tz, now).map_err(|e| with_raw(e, raw)),
        }
    }

    fn parse(&self, raw: &str) -> Result<Parsed, TimeParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TimeParseError::Unrecognized(raw.to_string()));
        }

        // Fully qualified timestamps don't need any interpretation
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Parsed::Absolute(dt.with_timezone(&Utc)));
        }

        let cleaned = trimmed
            .to_lowercase()
            .replace(',', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let (phrase, zone) = split_zone(&cleaned);
        let tz = zone.unwrap_or(self.source_tz);

        let expr = expression
            .parse(phrase)
            .map_err(|_| TimeParseError::Unrecognized(raw.to_string()))?;

        Ok(Parsed::Phrase(expr, tz))
    }
}

enum Parsed {
    Absolute(DateTime<Utc>),
    Phrase(Expression, Tz),
}

fn with_raw(e: TimeParseError, raw: &str) -> TimeParseError {
    match e {
        TimeParseError::InvalidDate(_) => TimeParseError::InvalidDate(raw.to_string()),
        other => other,
    }
}

fn split_zone(text: &str) -> (&str, Option<Tz>) {
    match text.rsplit_once(' ') {
        Some((rest, "ist")) => (rest, Some(chrono_tz::Asia::Kolkata)),
        Some((rest, "utc" | "gmt" | "z")) => (rest, Some(chrono_tz::UTC)),
        _ => (text, None),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Expression {
    Now,
    Offset { amount: i64, unit: Unit },
    Moment {
        day: Option<DaySpec>,
        time: Option<ClockTime>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Unit {
    Minute,
    Hour,
    Day,
    Week,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum DaySpec {
    Today,
    Tonight,
    Tomorrow,
    DayAfterTomorrow,
    Yesterday,
    Weekday { day: Weekday, strictly_next: bool },
    Calendar { year: Option<i32>, month: u32, day: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Meridiem {
    Am,
    Pm,
}

/// Wall clock time as written, hour already in 24h form when a
/// meridiem was given.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ClockTime {
    hour: u32,
    minute: u32,
    second: u32,
    meridiem: Option<Meridiem>,
}

impl ClockTime {
    const fn at(hour: u32) -> Self {
        Self {
            hour,
            minute: 0,
            second: 0,
            meridiem: None,
        }
    }

    fn new(hour: u32, minute: u32, second: u32, meridiem: Option<Meridiem>) -> Option<Self> {
        if minute > 59 || second > 59 {
            return None;
        }
        let hour = match meridiem {
            Some(_) if !(1..=12).contains(&hour) => return None,
            Some(Meridiem::Am) => hour % 12,
            Some(Meridiem::Pm) => hour % 12 + 12,
            None if hour > 23 => return None,
            None => hour,
        };
        Some(Self {
            hour,
            minute,
            second,
            meridiem,
        })
    }

    fn naive(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, self.second)
    }
}

// Grammar

fn expression(input: &mut &str) -> ModalResult<Expression> {
    alt((
        terminated("now", eof).value(Expression::Now),
        terminated(offset, eof),
        terminated(day_then_time, eof),
        terminated(time_then_day, eof),
    ))
    .parse_next(input)
}

fn offset(input: &mut &str) -> ModalResult<Expression> {
    alt((
        preceded(("in", space1), amount_and_unit),
        terminated(amount_and_unit, (space1, "from", space1, "now")),
        terminated(amount_and_unit, (space1, "later")),
    ))
    .parse_next(input)
}

fn amount_and_unit(input: &mut &str) -> ModalResult<Expression> {
    (amount, space1, unit)
        .map(|(amount, _, unit)| Expression::Offset { amount, unit })
        .parse_next(input)
}

fn amount(input: &mut &str) -> ModalResult<i64> {
    alt((
        digit1.verify_map(|s: &str| s.parse::<i64>().ok()),
        "an".value(1),
        "a".value(1),
    ))
    .parse_next(input)
}

fn unit(input: &mut &str) -> ModalResult<Unit> {
    alt((
        alt(("minutes", "minute", "mins", "min")).value(Unit::Minute),
        alt(("hours", "hour", "hrs", "hr")).value(Unit::Hour),
        alt(("days", "day")).value(Unit::Day),
        alt(("weeks", "week")).value(Unit::Week),
    ))
    .parse_next(input)
}

fn day_then_time(input: &mut &str) -> ModalResult<Expression> {
    (day_part, opt(preceded(day_time_separator, time_part)))
        .map(|(day, time)| Expression::Moment {
            day: Some(day),
            time,
        })
        .parse_next(input)
}

fn time_then_day(input: &mut &str) -> ModalResult<Expression> {
    (
        preceded(opt(("at", space1)), time_part),
        opt(preceded(time_day_separator, day_part)),
    )
        .map(|(time, day)| Expression::Moment {
            day,
            time: Some(time),
        })
        .parse_next(input)
}

fn day_time_separator(input: &mut &str) -> ModalResult<()> {
    alt(((space1, "at", space1).void(), space1.void(), "t".void()))
        .parse_next(input)
}

fn time_day_separator(input: &mut &str) -> ModalResult<()> {
    alt(((space1, "on", space1).void(), space1.void())).parse_next(input)
}

fn day_part(input: &mut &str) -> ModalResult<DaySpec> {
    alt((
        "today".value(DaySpec::Today),
        "tonight".value(DaySpec::Tonight),
        "tomorrow".value(DaySpec::Tomorrow),
        "day after tomorrow".value(DaySpec::DayAfterTomorrow),
        "yesterday".value(DaySpec::Yesterday),
        relative_weekday,
        iso_date,
        month_first_date,
        day_first_date,
        slash_date,
    ))
    .parse_next(input)
}

fn relative_weekday(input: &mut &str) -> ModalResult<DaySpec> {
    alt((
        preceded(("next", space1), weekday).map(|day| DaySpec::Weekday {
            day,
            strictly_next: true,
        }),
        preceded(opt(("this", space1)), weekday).map(|day| DaySpec::Weekday {
            day,
            strictly_next: false,
        }),
    ))
    .parse_next(input)
}

fn weekday(input: &mut &str) -> ModalResult<Weekday> {
    alt((
        alt(("monday", "mon")).value(Weekday::Mon),
        alt(("tuesday", "tues", "tue")).value(Weekday::Tue),
        alt(("wednesday", "wed")).value(Weekday::Wed),
        alt(("thursday", "thurs", "thu")).value(Weekday::Thu),
        alt(("friday", "fri")).value(Weekday::Fri),
        alt(("saturday", "sat")).value(Weekday::Sat),
        alt(("sunday", "sun")).value(Weekday::Sun),
    ))
    .parse_next(input)
}

fn month_name(input: &mut &str) -> ModalResult<u32> {
    alt((
        alt(("january", "jan")).value(1),
        alt(("february", "feb")).value(2),
        alt(("march", "mar")).value(3),
        alt(("april", "apr")).value(4),
        "may".value(5),
        alt(("june", "jun")).value(6),
        alt(("july", "jul")).value(7),
        alt(("august", "aug")).value(8),
        alt(("september", "sept", "sep")).value(9),
        alt(("october", "oct")).value(10),
        alt(("november", "nov")).value(11),
        alt(("december", "dec")).value(12),
    ))
    .parse_next(input)
}

fn one_or_two_digits(input: &mut &str) -> ModalResult<u32> {
    take_while(1..=2, |c: char| c.is_ascii_digit())
        .verify_map(|s: &str| s.parse::<u32>().ok())
        .parse_next(input)
}

fn two_digits(input: &mut &str) -> ModalResult<u32> {
    take_while(2, |c: char| c.is_ascii_digit())
        .verify_map(|s: &str| s.parse::<u32>().ok())
        .parse_next(input)
}

fn four_digit_year(input: &mut &str) -> ModalResult<i32> {
    take_while(4, |c: char| c.is_ascii_digit())
        .verify_map(|s: &str| s.parse::<i32>().ok())
        .parse_next(input)
}

fn ordinal_suffix(input: &mut &str) -> ModalResult<()> {
    alt(("st", "nd", "rd", "th")).void().parse_next(input)
}

fn iso_date(input: &mut &str) -> ModalResult<DaySpec> {
    (four_digit_year, "-", one_or_two_digits, "-", one_or_two_digits)
        .map(|(year, _, month, _, day)| DaySpec::Calendar {
            year: Some(year),
            month,
            day,
        })
        .parse_next(input)
}

fn month_first_date(input: &mut &str) -> ModalResult<DaySpec> {
    (
        month_name,
        space1,
        one_or_two_digits,
        opt(ordinal_suffix),
        opt(preceded(space1, four_digit_year)),
    )
        .map(|(month, _, day, _, year)| DaySpec::Calendar { year, month, day })
        .parse_next(input)
}

fn day_first_date(input: &mut &str) -> ModalResult<DaySpec> {
    (
        one_or_two_digits,
        opt(ordinal_suffix),
        space1,
        opt(("of", space1)),
        month_name,
        opt(preceded(space1, four_digit_year)),
    )
        .map(|(day, _, _, _, month, year)| DaySpec::Calendar { year, month, day })
        .parse_next(input)
}

// Month first, the way US-style dates are usually typed
fn slash_date(input: &mut &str) -> ModalResult<DaySpec> {
    (
        one_or_two_digits,
        "/",
        one_or_two_digits,
        opt(preceded(
            "/",
            alt((four_digit_year, two_digits.map(|y| 2000 + y as i32))),
        )),
    )
        .map(|(month, _, day, year)| DaySpec::Calendar { year, month, day })
        .parse_next(input)
}

fn time_part(input: &mut &str) -> ModalResult<ClockTime> {
    alt((
        "noon".value(ClockTime::at(12)),
        "midnight".value(ClockTime::at(0)),
        "morning".value(ClockTime::at(9)),
        "afternoon".value(ClockTime::at(14)),
        "evening".value(ClockTime::at(18)),
        "night".value(ClockTime::at(21)),
        clock,
    ))
    .parse_next(input)
}

fn clock(input: &mut &str) -> ModalResult<ClockTime> {
    (
        one_or_two_digits,
        opt(preceded(alt((":", ".")), two_digits)),
        opt(preceded(":", two_digits)),
        opt(preceded(space0, meridiem)),
    )
        .verify_map(
            |(hour, minute, second, meridiem): (u32, Option<u32>, Option<u32>, Option<Meridiem>)| {
                ClockTime::new(hour, minute.unwrap_or(0), second.unwrap_or(0), meridiem)
            },
        )
        .parse_next(input)
}

fn meridiem(input: &mut &str) -> ModalResult<Meridiem> {
    alt((
        alt(("a.m.", "am")).value(Meridiem::Am),
        alt(("p.m.", "pm")).value(Meridiem::Pm),
    ))
    .parse_next(input)
}

// Resolution

fn resolve(
    expr: Expression,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimeParseError> {
    let invalid = || TimeParseError::InvalidDate(String::new());

    match expr {
        Expression::Now => Ok(now),
        Expression::Offset { amount, unit } => {
            let delta = match unit {
                Unit::Minute => TimeDelta::try_minutes(amount),
                Unit::Hour => TimeDelta::try_hours(amount),
                Unit::Day => TimeDelta::try_days(amount),
                Unit::Week => TimeDelta::try_weeks(amount),
            }
            .ok_or_else(invalid)?;
            now.checked_add_signed(delta).ok_or_else(invalid)
        }
        Expression::Moment { day: None, time } => {
            next_occurrence(time.ok_or_else(invalid)?, tz, now)
        }
        Expression::Moment {
            day: Some(day),
            time,
        } => {
            let local_now = now.with_timezone(&tz);
            let date = resolve_day(day, local_now.date_naive()).ok_or_else(invalid)?;
            let time = match (day, time) {
                (DaySpec::Tonight, Some(t)) if t.meridiem.is_none() && t.hour < 12 => {
                    ClockTime { hour: t.hour + 12, ..t }.naive()
                }
                (_, Some(t)) => t.naive(),
                (DaySpec::Tonight, None) => ClockTime::at(21).naive(),
                (
                    DaySpec::Today
                    | DaySpec::Tomorrow
                    | DaySpec::DayAfterTomorrow
                    | DaySpec::Yesterday,
                    None,
                ) => Some(local_now.time()),
                (_, None) => ClockTime::at(0).naive(),
            }
            .ok_or_else(invalid)?;
            localize(&tz, date.and_time(time))
        }
    }
}

/// First instant at `time` (local to `tz`) strictly after `after`,
/// trying the local date of `after` and then the day following it.
fn next_occurrence(
    time: ClockTime,
    tz: Tz,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, TimeParseError> {
    let invalid = || TimeParseError::InvalidDate(String::new());
    let time = time.naive().ok_or_else(invalid)?;
    let day = after.with_timezone(&tz).date_naive();
    let candidate = localize(&tz, day.and_time(time))?;
    if candidate > after {
        return Ok(candidate);
    }
    let next_day = day.succ_opt().ok_or_else(invalid)?;
    localize(&tz, next_day.and_time(time))
}

fn resolve_day(day: DaySpec, today: NaiveDate) -> Option<NaiveDate> {
    match day {
        DaySpec::Today | DaySpec::Tonight => Some(today),
        DaySpec::Tomorrow => today.succ_opt(),
        DaySpec::DayAfterTomorrow => today.succ_opt()?.succ_opt(),
        DaySpec::Yesterday => today.pred_opt(),
        DaySpec::Weekday { day, strictly_next } => {
            let mut ahead = (day.num_days_from_monday() as i64
                - today.weekday().num_days_from_monday() as i64)
                .rem_euclid(7);
            if ahead == 0 && strictly_next {
                ahead = 7;
            }
            today.checked_add_signed(TimeDelta::days(ahead))
        }
        DaySpec::Calendar {
            year: Some(year),
            month,
            day,
        } => NaiveDate::from_ymd_opt(year, month, day),
        DaySpec::Calendar {
            year: None,
            month,
            day,
        } => match NaiveDate::from_ymd_opt(today.year(), month, day) {
            Some(date) if date >= today => Some(date),
            _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
        },
    }
}

fn localize(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Utc>, TimeParseError> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(TimeParseError::NonexistentLocalTime(naive))
}
