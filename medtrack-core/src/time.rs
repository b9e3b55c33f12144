//! Time arithmetic: durations, instants and validated intervals.
//!
//! All calendar math is proleptic Gregorian in UTC (via chrono), so component
//! accessors never depend on the host timezone. Rendering in a local zone is
//! left to callers.

use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Timelike, Utc};
use regex::Regex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::TimeError;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
/// 365-day approximation; not a calendar year.
const YEAR: i64 = 365 * DAY;

// ---------------------------------------------------------------------------
// Duration
// ---------------------------------------------------------------------------

/// Signed span of whole seconds.
///
/// Component accessors (`minutes()` .. `years()`) use floor division, so a
/// negative duration has well-defined components (`-1s` is `-1` minutes).
/// Formatting always renders the magnitude and prefixes `-` when negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    seconds: i64,
}

/// Remainder decomposition of a duration's magnitude.
///
/// `years * 365d + weeks * 7d + days * 1d + hours * 1h + minutes * 1m + seconds`
/// always equals the magnitude.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Components {
    pub years: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Duration {
    pub const ZERO: Duration = Duration { seconds: 0 };

    pub const fn from_seconds(seconds: i64) -> Self {
        Self { seconds }
    }

    pub const fn from_minutes(minutes: i64) -> Self {
        Self::from_seconds(minutes.saturating_mul(MINUTE))
    }

    pub const fn from_hours(hours: i64) -> Self {
        Self::from_seconds(hours.saturating_mul(HOUR))
    }

    pub const fn from_days(days: i64) -> Self {
        Self::from_seconds(days.saturating_mul(DAY))
    }

    pub const fn from_weeks(weeks: i64) -> Self {
        Self::from_seconds(weeks.saturating_mul(WEEK))
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn minutes(&self) -> i64 {
        self.seconds.div_euclid(MINUTE)
    }

    pub fn hours(&self) -> i64 {
        self.minutes().div_euclid(60)
    }

    pub fn days(&self) -> i64 {
        self.hours().div_euclid(24)
    }

    pub fn weeks(&self) -> i64 {
        self.days().div_euclid(7)
    }

    /// Whole 365-day years. Leap days are not accounted for.
    pub fn years(&self) -> i64 {
        self.days().div_euclid(365)
    }

    pub fn is_negative(&self) -> bool {
        self.seconds < 0
    }

    pub fn is_zero(&self) -> bool {
        self.seconds == 0
    }

    pub fn abs(&self) -> Self {
        Self::from_seconds(self.seconds.saturating_abs())
    }

    pub fn components(&self) -> Components {
        let total = self.seconds.saturating_abs();
        let whole_days = total / DAY;
        let rest_days = whole_days % 365;
        Components {
            years: whole_days / 365,
            weeks: rest_days / 7,
            days: rest_days % 7,
            hours: (total / HOUR) % 24,
            minutes: (total / MINUTE) % 60,
            seconds: total % MINUTE,
        }
    }

    /// Render with a pattern of `{y} {w} {d} {H} {M} {S}` placeholders.
    ///
    /// `y w d H` are whole magnitudes (`{H}` of 26h is `26`); `M` and `S` are
    /// taken modulo 60. A placeholder may request zero padding, e.g. `{M:02}`.
    /// `{{` and `}}` produce literal braces.
    ///
    /// ```
    /// use medtrack_core::time::Duration;
    ///
    /// let d = Duration::from_hours(26) + Duration::from_minutes(5);
    /// assert_eq!(d.format_with("{H}:{M:02}").unwrap(), "26:05");
    /// ```
    pub fn format_with(&self, pattern: &str) -> Result<String, TimeError> {
        let magnitude = self.abs();
        let unbalanced = || TimeError::UnbalancedPattern(pattern.to_string());

        let mut out = String::with_capacity(pattern.len() + 8);
        if self.is_negative() {
            out.push('-');
        }

        let mut chars = pattern.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => return Err(unbalanced()),
                            Some(c) => field.push(c),
                        }
                    }
                    out.push_str(&magnitude.render_placeholder(&field)?);
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '}' => return Err(unbalanced()),
                c => out.push(c),
            }
        }

        Ok(out)
    }

    fn render_placeholder(&self, field: &str) -> Result<String, TimeError> {
        let unknown = || TimeError::UnknownPlaceholder(field.to_string());
        let (name, width) = match field.split_once(':') {
            Some((name, fmt)) => {
                let width = fmt
                    .strip_prefix('0')
                    .filter(|w| !w.is_empty())
                    .and_then(|w| w.parse::<usize>().ok())
                    .ok_or_else(unknown)?;
                (name, width)
            }
            None => (field, 0),
        };

        let value = match name {
            "y" => self.years(),
            "w" => self.weeks(),
            "d" => self.days(),
            "H" => self.hours(),
            "M" => self.minutes().rem_euclid(60),
            "S" => self.seconds.rem_euclid(60),
            _ => return Err(unknown()),
        };

        Ok(format!("{value:0width$}"))
    }
}

/// Comma-joined non-zero components, largest first (`1 day, 2 hours`).
/// Zero renders as the empty string.
impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.components();
        let parts: Vec<String> = [
            (c.years, "year"),
            (c.weeks, "week"),
            (c.days, "day"),
            (c.hours, "hour"),
            (c.minutes, "minute"),
            (c.seconds, "second"),
        ]
        .into_iter()
        .filter(|(n, _)| *n != 0)
        .map(|(n, unit)| {
            if n == 1 {
                format!("1 {unit}")
            } else {
                format!("{n} {unit}s")
            }
        })
        .collect();

        if parts.is_empty() {
            return Ok(());
        }
        if self.is_negative() {
            f.write_str("-")?;
        }
        f.write_str(&parts.join(", "))
    }
}

static DURATION_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*([A-Za-z]+)").expect("duration term regex"));

fn unit_seconds(unit: &str) -> Option<i64> {
    let secs = match unit.to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "wk" | "wks" | "week" | "weeks" => WEEK,
        "y" | "yr" | "yrs" | "year" | "years" => YEAR,
        _ => return None,
    };
    Some(secs)
}

/// Parses `"6h"`, `"1d 12h"`, `"1 day, 2 hours"`, `"-15m"` or a bare number of
/// seconds.
impl FromStr for Duration {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TimeError::InvalidDuration(s.to_string());

        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        if body.is_empty() {
            return Err(invalid());
        }

        let total = if let Ok(secs) = body.parse::<i64>() {
            secs
        } else {
            let is_separator = |gap: &str| gap.chars().all(|c| c.is_whitespace() || c == ',');

            let mut total: i64 = 0;
            let mut cursor = 0;
            let mut terms = 0;
            for caps in DURATION_TERM.captures_iter(body) {
                let (Some(whole), Some(amount), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2))
                else {
                    return Err(invalid());
                };
                if !is_separator(&body[cursor..whole.start()]) {
                    return Err(invalid());
                }
                let amount: i64 = amount.as_str().parse().map_err(|_| invalid())?;
                let unit = unit_seconds(unit.as_str()).ok_or_else(invalid)?;
                total = amount
                    .checked_mul(unit)
                    .and_then(|secs| total.checked_add(secs))
                    .ok_or_else(invalid)?;
                cursor = whole.end();
                terms += 1;
            }
            if terms == 0 || !is_separator(&body[cursor..]) {
                return Err(invalid());
            }
            total
        };

        Ok(Self::from_seconds(if negative { -total } else { total }))
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.seconds)
    }
}

/// Accepts whole seconds or a duration string.
impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DurationVisitor;

        impl Visitor<'_> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("whole seconds or a duration string like \"6h\"")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
                Ok(Duration::from_seconds(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
                i64::try_from(v)
                    .map(Duration::from_seconds)
                    .map_err(|_| E::custom("duration out of range"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration::from_seconds(self.seconds.saturating_add(rhs.seconds))
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration::from_seconds(self.seconds.saturating_sub(rhs.seconds))
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration::from_seconds(self.seconds.saturating_neg())
    }
}

impl Mul<i64> for Duration {
    type Output = Duration;

    fn mul(self, rhs: i64) -> Duration {
        Duration::from_seconds(self.seconds.saturating_mul(rhs))
    }
}

// ---------------------------------------------------------------------------
// Instant
// ---------------------------------------------------------------------------

/// Point in time: whole seconds since 1970-01-01T00:00:00Z.
///
/// `Instant::NEVER` sorts after every other instant and marks a recurrence
/// with no further iterations. It prints as `never` but is never parsed back:
/// text and serde input only accept RFC 3339.
///
/// Arithmetic saturates at the ends of the `i64` range, so `(a - b) + b == a`
/// holds only while `a - b` fits in an `i64` second count. Every instant chrono
/// can represent (years -262143..=262142) is well inside that range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    offset: i64,
}

impl Instant {
    pub const EPOCH: Instant = Instant { offset: 0 };
    pub const NEVER: Instant = Instant { offset: i64::MAX };

    pub fn now() -> Self {
        Utc::now().into()
    }

    pub const fn from_offset(offset: i64) -> Self {
        Self { offset }
    }

    /// Build from UTC calendar components. Out-of-range values (month 13,
    /// 2023-02-29, 24:00:00) are rejected.
    pub fn from_components(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self, TimeError> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .map(Self::from)
            .ok_or(TimeError::InvalidCalendar {
                year,
                month,
                day,
                hour,
                minute,
                second,
            })
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn is_never(&self) -> bool {
        *self == Self::NEVER
    }

    /// Calendar view in UTC. Offsets beyond chrono's range clamp to its bounds.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.offset, 0).unwrap_or(if self.offset < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
    }

    pub fn year(&self) -> i32 {
        self.to_datetime().year()
    }

    pub fn month(&self) -> u32 {
        self.to_datetime().month()
    }

    pub fn day(&self) -> u32 {
        self.to_datetime().day()
    }

    pub fn hour(&self) -> u32 {
        self.to_datetime().hour()
    }

    pub fn minute(&self) -> u32 {
        self.to_datetime().minute()
    }

    pub fn second(&self) -> u32 {
        self.to_datetime().second()
    }

    /// UTC midnight of the calendar day containing this instant.
    pub fn start_of_day(&self) -> Instant {
        Instant::from_offset(self.offset - self.offset.rem_euclid(DAY))
    }
}

impl From<DateTime<Utc>> for Instant {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_offset(dt.timestamp())
    }
}

/// RFC 3339 in UTC, or `never` for the sentinel (display only).
impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            return f.write_str("never");
        }
        f.write_str(&self.to_datetime().to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl FromStr for Instant {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc).into())
            .map_err(|_| TimeError::InvalidInstant(s.to_string()))
    }
}

impl Serialize for Instant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Instant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl Sub for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_seconds(self.offset.saturating_sub(rhs.offset))
    }
}

impl Add<Instant> for Duration {
    type Output = Instant;

    fn add(self, rhs: Instant) -> Instant {
        rhs + self
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_offset(self.offset.saturating_add(rhs.seconds()))
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_offset(self.offset.saturating_sub(rhs.seconds()))
    }
}

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// Closed range `[start, end]` with `start <= end` enforced on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interval {
    start: Instant,
    end: Instant,
}

impl Interval {
    pub fn new(start: Instant, end: Instant) -> Result<Self, TimeError> {
        if start > end {
            return Err(TimeError::InvertedInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// The UTC calendar day containing `instant`, midnight to 23:59:59.
    pub fn day_of(instant: Instant) -> Self {
        let start = instant.start_of_day();
        let end = Instant::from_offset(start.offset().saturating_add(DAY - 1));
        Self { start, end }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    /// Move the start; on error the interval is left unchanged.
    pub fn set_start(&mut self, start: Instant) -> Result<(), TimeError> {
        if start > self.end {
            return Err(TimeError::InvertedInterval {
                start,
                end: self.end,
            });
        }
        self.start = start;
        Ok(())
    }

    /// Move the end; on error the interval is left unchanged.
    pub fn set_end(&mut self, end: Instant) -> Result<(), TimeError> {
        if end < self.start {
            return Err(TimeError::InvertedInterval {
                start: self.start,
                end,
            });
        }
        self.end = end;
        Ok(())
    }

    pub fn contains(&self, instant: Instant) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}
