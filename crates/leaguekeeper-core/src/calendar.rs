// Calendar arithmetic: month lengths and day offsets used to pace fixtures.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Supported years. Stored kickoffs are compared as `YYYY-MM-DD` text, so
/// dates stay within four-digit years.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("day {day} is not valid for {year}-{month:02}")]
    InvalidDay { year: i32, month: u32, day: u32 },

    #[error("negative day offsets are not supported, got {0}")]
    NegativeOffset(i64),

    #[error("year {0} is outside the supported range 1-9999")]
    YearOutOfRange(i32),

    #[error("cannot parse `{0}` as a YYYY-MM-DD date")]
    Unparseable(String),
}

fn check_year(year: i32) -> Result<(), CalendarError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(CalendarError::YearOutOfRange(year))
    }
}

/// Gregorian leap year: divisible by 4 and (not by 100, or by 400).
pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Number of days in `month` (1-12) of `year`.
pub fn days_in_month(month: u32, year: i32) -> Result<u32, CalendarError> {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => Ok(31),
        4 | 6 | 9 | 11 => Ok(30),
        2 if is_leap_year(year) => Ok(29),
        2 => Ok(28),
        other => Err(CalendarError::InvalidMonth(other)),
    }
}

/// Add `offset` days to `(year, month, day)` and return the normalized date.
///
/// The offset is added to the day of month, then whole months are peeled off
/// until the day fits, rolling December into January of the following year.
pub fn add_days(year: i32, month: u32, day: u32, offset: i64) -> Result<(i32, u32, u32), CalendarError> {
    if offset < 0 {
        return Err(CalendarError::NegativeOffset(offset));
    }
    check_year(year)?;
    let first_len = days_in_month(month, year)?;
    if day == 0 || day > first_len {
        return Err(CalendarError::InvalidDay { year, month, day });
    }

    let (mut year, mut month) = (year, month);
    let mut day = u64::from(day) + offset as u64;
    loop {
        let len = u64::from(days_in_month(month, year)?);
        if day <= len {
            break;
        }
        day -= len;
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
            check_year(year)?;
        }
    }

    Ok((year, month, day as u32))
}

/// A validated calendar day within `MIN_YEAR..=MAX_YEAR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, CalendarError> {
        check_year(year)?;
        let len = days_in_month(month, year)?;
        if day == 0 || day > len {
            return Err(CalendarError::InvalidDay { year, month, day });
        }
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or(CalendarError::InvalidDay { year, month, day })
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    pub fn day(self) -> u32 {
        self.0.day()
    }

    pub fn plus_days(self, offset: u32) -> Result<Self, CalendarError> {
        let offset = i64::from(offset);
        let (year, month, day) = add_days(self.year(), self.month(), self.day(), offset)?;
        Self::new(year, month, day)
    }

    pub fn to_naive(self) -> NaiveDate {
        self.0
    }
}

impl TryFrom<NaiveDate> for CalendarDate {
    type Error = CalendarError;

    fn try_from(date: NaiveDate) -> Result<Self, Self::Error> {
        check_year(date.year())?;
        Ok(Self(date))
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for CalendarDate {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unparseable = || CalendarError::Unparseable(s.to_string());
        let mut parts = s.trim().splitn(3, '-');
        let year = parts.next().and_then(|p| p.parse().ok()).ok_or_else(unparseable)?;
        let month = parts.next().and_then(|p| p.parse().ok()).ok_or_else(unparseable)?;
        let day = parts.next().and_then(|p| p.parse().ok()).ok_or_else(unparseable)?;
        Self::new(year, month, day)
    }
}
