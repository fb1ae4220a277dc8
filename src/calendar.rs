//! Calendar primitives: dates, year ranges, calendar offsets, serialization formats.
//!
//! Validity is always decided on the Gregorian year. An offset (e.g. the
//! Buddhist era, +543) only changes the year that gets written out.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Earliest Gregorian year accepted in a [`YearRange`].
pub const MIN_YEAR: i32 = 1900;
/// Latest Gregorian year accepted in a [`YearRange`].
pub const MAX_YEAR: i32 = 2100;

/// Standard Gregorian leap rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`. Returns 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Leap years in `1..=year` (valid for non-negative years).
fn leaps_through(year: i64) -> i64 {
    year / 4 - year / 100 + year / 400
}

/// Count valid dates in `start..=end` without enumerating them.
///
/// Returns 0 when `start > end`.
pub fn count_valid_dates(start: i32, end: i32) -> u64 {
    if start > end {
        return 0;
    }
    let (start, end) = (start as i64, end as i64);
    let years = end - start + 1;
    let leaps = leaps_through(end) - leaps_through(start - 1);
    (years * 365 + leaps) as u64
}

/// A validated calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateSpec {
    year: i32,
    month: u32,
    day: u32,
}

impl DateSpec {
    /// Returns `None` unless the triple is a real Gregorian date.
    pub fn new(day: u32, month: u32, year: i32) -> Option<Self> {
        if day == 0 || day > days_in_month(year, month) {
            return None;
        }
        Some(Self { year, month, day })
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// The following calendar day.
    pub fn succ(&self) -> Self {
        if self.day < days_in_month(self.year, self.month) {
            Self { day: self.day + 1, ..*self }
        } else if self.month < 12 {
            Self { month: self.month + 1, day: 1, ..*self }
        } else {
            Self { year: self.year + 1, month: 1, day: 1 }
        }
    }
}

impl fmt::Display for DateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{:04}", self.day, self.month, self.year)
    }
}

/// Inclusive range of Gregorian years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Result<Self> {
        if start > end {
            return Err(Error::invalid(format!(
                "start year {} is after end year {}",
                start, end
            )));
        }
        if start < MIN_YEAR || end > MAX_YEAR {
            return Err(Error::invalid(format!(
                "years must be between {} and {} (got {}-{})",
                MIN_YEAR, MAX_YEAR, start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(year: i32) -> Result<Self> {
        Self::new(year, year)
    }

    /// `years_back` years before `today` up to five years after it.
    pub fn years_back(years_back: u32, today: NaiveDate) -> Result<Self> {
        let current = today.year();
        let start = current.saturating_sub(years_back.min(i32::MAX as u32) as i32);
        Self::new(start, current.min(MAX_YEAR - 5) + 5)
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    /// Number of years in the range, never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u32 {
        (self.end - self.start + 1) as u32
    }

    /// Number of valid dates in the range.
    pub fn day_count(&self) -> u64 {
        count_valid_dates(self.start, self.end)
    }

    pub fn years(&self) -> std::ops::RangeInclusive<i32> {
        self.start..=self.end
    }
}

/// Fixed year delta applied when serializing under another calendar era.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarOffset(i32);

impl CalendarOffset {
    pub const GREGORIAN: CalendarOffset = CalendarOffset(0);
    /// Thai solar / Buddhist era.
    pub const BUDDHIST: CalendarOffset = CalendarOffset(543);

    pub fn new(years: i32) -> Self {
        Self(years)
    }

    pub fn years(&self) -> i32 {
        self.0
    }

    pub fn apply(&self, gregorian_year: i32) -> i32 {
        gregorian_year + self.0
    }

    pub fn label(&self) -> String {
        match *self {
            Self::GREGORIAN => "Gregorian".to_string(),
            Self::BUDDHIST => "Buddhist".to_string(),
            Self(years) => format!("{:+}", years),
        }
    }
}

impl Default for CalendarOffset {
    fn default() -> Self {
        Self::GREGORIAN
    }
}

/// Token ordering used to turn a date into a fixed-width digit string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializationFormat {
    /// `DDMMYYYY`
    DayMonthYear,
    /// `DDMMYY`
    DayMonthShortYear,
    /// `MMDDYYYY`
    MonthDayYear,
    /// `MMDDYY`
    MonthDayShortYear,
    /// `YYYYMMDD`
    YearMonthDay,
    /// `YYMMDD`
    ShortYearMonthDay,
}

impl SerializationFormat {
    pub const ALL: [SerializationFormat; 6] = [
        SerializationFormat::DayMonthYear,
        SerializationFormat::DayMonthShortYear,
        SerializationFormat::MonthDayYear,
        SerializationFormat::MonthDayShortYear,
        SerializationFormat::YearMonthDay,
        SerializationFormat::ShortYearMonthDay,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SerializationFormat::DayMonthYear => "DDMMYYYY",
            SerializationFormat::DayMonthShortYear => "DDMMYY",
            SerializationFormat::MonthDayYear => "MMDDYYYY",
            SerializationFormat::MonthDayShortYear => "MMDDYY",
            SerializationFormat::YearMonthDay => "YYYYMMDD",
            SerializationFormat::ShortYearMonthDay => "YYMMDD",
        }
    }

    /// Output width in characters (newline excluded).
    pub fn width(&self) -> usize {
        if self.has_short_year() {
            6
        } else {
            8
        }
    }

    pub fn has_short_year(&self) -> bool {
        matches!(
            self,
            SerializationFormat::DayMonthShortYear
                | SerializationFormat::MonthDayShortYear
                | SerializationFormat::ShortYearMonthDay
        )
    }

    /// Append the serialized date to `buf`. The offset is applied to the year only.
    pub fn write_into(&self, date: &DateSpec, offset: CalendarOffset, buf: &mut String) {
        let year = offset.apply(date.year());
        let (d, m) = (date.day(), date.month());
        let yy = year.rem_euclid(100);

        // Writing into a String cannot fail.
        let _ = match self {
            SerializationFormat::DayMonthYear => write!(buf, "{:02}{:02}{:04}", d, m, year),
            SerializationFormat::DayMonthShortYear => write!(buf, "{:02}{:02}{:02}", d, m, yy),
            SerializationFormat::MonthDayYear => write!(buf, "{:02}{:02}{:04}", m, d, year),
            SerializationFormat::MonthDayShortYear => write!(buf, "{:02}{:02}{:02}", m, d, yy),
            SerializationFormat::YearMonthDay => write!(buf, "{:04}{:02}{:02}", year, m, d),
            SerializationFormat::ShortYearMonthDay => write!(buf, "{:02}{:02}{:02}", yy, m, d),
        };
    }

    pub fn serialize(&self, date: &DateSpec, offset: CalendarOffset) -> String {
        let mut buf = String::with_capacity(self.width());
        self.write_into(date, offset, &mut buf);
        buf
    }
}

impl FromStr for SerializationFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        SerializationFormat::ALL
            .into_iter()
            .find(|f| f.name() == upper)
            .ok_or_else(|| {
                Error::invalid(format!(
                    "unsupported format: {}. Valid: DDMMYYYY, DDMMYY, MMDDYYYY, MMDDYY, YYYYMMDD, YYMMDD",
                    s
                ))
            })
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leap_rule() {
        assert!(is_leap_year(2024));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
        assert!(!is_leap_year(2100));
    }

    #[test]
    fn days_in_month_agrees_with_chrono() {
        for year in [1900, 1999, 2000, 2023, 2024, 2100] {
            for month in 1..=12u32 {
                let days = days_in_month(year, month);
                assert!(NaiveDate::from_ymd_opt(year, month, days).is_some());
                assert!(NaiveDate::from_ymd_opt(year, month, days + 1).is_none());
            }
        }
        assert_eq!(days_in_month(2023, 13), 0);
    }

    #[test]
    fn count_valid_dates_matches_per_year_sum() {
        for (start, end) in [(1900, 1900), (1900, 2100), (1999, 2001), (2023, 2024), (2096, 2100)] {
            let expected: u64 = (start..=end)
                .map(|y| if is_leap_year(y) { 366 } else { 365 })
                .sum();
            assert_eq!(count_valid_dates(start, end), expected, "{}-{}", start, end);
        }
        assert_eq!(count_valid_dates(2024, 2023), 0);
    }

    #[test]
    fn date_spec_rejects_impossible_dates() {
        assert!(DateSpec::new(29, 2, 2023).is_none());
        assert!(DateSpec::new(29, 2, 2024).is_some());
        assert!(DateSpec::new(31, 4, 2024).is_none());
        assert!(DateSpec::new(0, 1, 2024).is_none());
        assert!(DateSpec::new(1, 0, 2024).is_none());
    }

    #[test]
    fn succ_rolls_over_month_and_year() {
        let feb28 = DateSpec::new(28, 2, 2023).unwrap();
        assert_eq!(feb28.succ(), DateSpec::new(1, 3, 2023).unwrap());

        let leap = DateSpec::new(28, 2, 2024).unwrap();
        assert_eq!(leap.succ(), DateSpec::new(29, 2, 2024).unwrap());

        let eve = DateSpec::new(31, 12, 2023).unwrap();
        assert_eq!(eve.succ(), DateSpec::new(1, 1, 2024).unwrap());
    }

    #[test]
    fn year_range_validation() {
        assert!(YearRange::new(2000, 2030).is_ok());
        assert!(YearRange::new(2031, 2030).is_err());
        assert!(YearRange::new(1899, 2000).is_err());
        assert!(YearRange::new(2000, 2101).is_err());

        let err = YearRange::new(2030, 2000).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidParameters);

        assert_eq!(YearRange::single(2023).unwrap().len(), 1);
        assert_eq!(YearRange::new(MIN_YEAR, MAX_YEAR).unwrap().len(), 201);
    }

    #[test]
    fn years_back_window() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let range = YearRange::years_back(80, today).unwrap();
        assert_eq!(range.start(), 1945);
        assert_eq!(range.end(), 2030);
    }

    #[test]
    fn serialize_every_format() {
        let date = DateSpec::new(7, 3, 2023).unwrap();
        let g = CalendarOffset::GREGORIAN;

        assert_eq!(SerializationFormat::DayMonthYear.serialize(&date, g), "07032023");
        assert_eq!(SerializationFormat::DayMonthShortYear.serialize(&date, g), "070323");
        assert_eq!(SerializationFormat::MonthDayYear.serialize(&date, g), "03072023");
        assert_eq!(SerializationFormat::MonthDayShortYear.serialize(&date, g), "030723");
        assert_eq!(SerializationFormat::YearMonthDay.serialize(&date, g), "20230307");
        assert_eq!(SerializationFormat::ShortYearMonthDay.serialize(&date, g), "230307");
    }

    #[test]
    fn offset_changes_year_only() {
        let date = DateSpec::new(1, 1, 2023).unwrap();
        let b = CalendarOffset::BUDDHIST;

        assert_eq!(SerializationFormat::DayMonthYear.serialize(&date, b), "01012566");
        assert_eq!(SerializationFormat::DayMonthShortYear.serialize(&date, b), "010166");
        assert_eq!(SerializationFormat::YearMonthDay.serialize(&date, b), "25660101");
    }

    #[test]
    fn widths_match_serialized_length() {
        let date = DateSpec::new(31, 12, 2099).unwrap();
        for format in SerializationFormat::ALL {
            assert_eq!(format.serialize(&date, CalendarOffset::BUDDHIST).len(), format.width());
        }
    }

    #[test]
    fn parse_format_names() {
        assert_eq!("ddmmyyyy".parse::<SerializationFormat>().unwrap(), SerializationFormat::DayMonthYear);
        assert_eq!("YYMMDD".parse::<SerializationFormat>().unwrap(), SerializationFormat::ShortYearMonthDay);

        let err = "DD-MM-YYYY".parse::<SerializationFormat>().unwrap_err();
        assert!(err.to_string().contains("unsupported format"));
    }

    #[test]
    fn offset_labels() {
        assert_eq!(CalendarOffset::GREGORIAN.label(), "Gregorian");
        assert_eq!(CalendarOffset::BUDDHIST.label(), "Buddhist");
        assert_eq!(CalendarOffset::new(-622).label(), "-622");
    }
}
