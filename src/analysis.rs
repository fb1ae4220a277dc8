//! Classify a recovered secret as a date in one of the known layouts.

use std::fmt;

use crate::calendar::{CalendarOffset, DateSpec, SerializationFormat, MAX_YEAR, MIN_YEAR};

/// Eight-digit layouts tried, most common first.
const FULL_YEAR_FORMATS: [SerializationFormat; 3] = [
    SerializationFormat::YearMonthDay,
    SerializationFormat::DayMonthYear,
    SerializationFormat::MonthDayYear,
];

const CALENDARS: [CalendarOffset; 2] = [CalendarOffset::GREGORIAN, CalendarOffset::BUDDHIST];

/// One plausible reading of a secret as a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateReading {
    pub format: SerializationFormat,
    pub calendar: CalendarOffset,
    /// Gregorian date the secret encodes.
    pub date: DateSpec,
}

impl fmt::Display for DateReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.calendar == CalendarOffset::GREGORIAN {
            write!(f, "{} {}", self.format, self.date)
        } else {
            write!(
                f,
                "{} {:02}/{:02}/{:04} ({}) = {} (Gregorian)",
                self.format,
                self.date.day(),
                self.date.month(),
                self.calendar.apply(self.date.year()),
                self.calendar.label(),
                self.date
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretShape {
    /// Valid date in at least one layout; never empty.
    Date(Vec<DateReading>),
    Numeric { digits: usize },
    Other { chars: usize },
}

impl fmt::Display for SecretShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretShape::Date(readings) => {
                write!(f, "date")?;
                for reading in readings {
                    write!(f, "\n  {}", reading)?;
                }
                Ok(())
            }
            SecretShape::Numeric { digits } => write!(f, "{}-digit number", digits),
            SecretShape::Other { chars } => write!(f, "non-numeric, {} characters", chars),
        }
    }
}

pub fn describe(secret: &str) -> SecretShape {
    let digits = secret.len();
    if digits == 0 || !secret.bytes().all(|b| b.is_ascii_digit()) {
        return SecretShape::Other { chars: secret.chars().count() };
    }
    if digits != 8 {
        return SecretShape::Numeric { digits };
    }

    let readings: Vec<DateReading> = FULL_YEAR_FORMATS
        .iter()
        .flat_map(|&format| CALENDARS.iter().filter_map(move |&calendar| read(secret, format, calendar)))
        .collect();

    if readings.is_empty() {
        SecretShape::Numeric { digits }
    } else {
        SecretShape::Date(readings)
    }
}

fn read(secret: &str, format: SerializationFormat, calendar: CalendarOffset) -> Option<DateReading> {
    let num = |range: std::ops::Range<usize>| secret.get(range)?.parse::<u32>().ok();
    let (day, month, year) = match format {
        SerializationFormat::YearMonthDay => (num(6..8)?, num(4..6)?, num(0..4)?),
        SerializationFormat::DayMonthYear => (num(0..2)?, num(2..4)?, num(4..8)?),
        SerializationFormat::MonthDayYear => (num(2..4)?, num(0..2)?, num(4..8)?),
        _ => return None,
    };

    let gregorian = year as i32 - calendar.years();
    if !(MIN_YEAR..=MAX_YEAR).contains(&gregorian) {
        return None;
    }
    let date = DateSpec::new(day, month, gregorian)?;
    Some(DateReading { format, calendar, date })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(secret: &str) -> Vec<DateReading> {
        match describe(secret) {
            SecretShape::Date(r) => r,
            other => panic!("{} read as {:?}", secret, other),
        }
    }

    #[test]
    fn gregorian_day_month_year() {
        let r = readings("15081990");
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].format, SerializationFormat::DayMonthYear);
        assert_eq!(r[0].calendar, CalendarOffset::GREGORIAN);
        assert_eq!(r[0].date, DateSpec::new(15, 8, 1990).unwrap());
    }

    #[test]
    fn buddhist_year_maps_back() {
        let r = readings("25330815");
        assert_eq!(r[0].format, SerializationFormat::YearMonthDay);
        assert_eq!(r[0].calendar, CalendarOffset::BUDDHIST);
        assert_eq!(r[0].date.year(), 1990);
        assert!(r[0].to_string().contains("15/08/2533 (Buddhist) = 15/08/1990"));
    }

    #[test]
    fn ambiguous_layouts_are_all_listed() {
        // 01/02/2000 reads as both day-month and month-day.
        let r = readings("01022000");
        let formats: Vec<_> = r.iter().map(|r| r.format).collect();
        assert!(formats.contains(&SerializationFormat::DayMonthYear));
        assert!(formats.contains(&SerializationFormat::MonthDayYear));
    }

    #[test]
    fn invalid_dates_are_plain_numbers() {
        assert_eq!(describe("99999999"), SecretShape::Numeric { digits: 8 });
        assert_eq!(describe("30022001"), SecretShape::Numeric { digits: 8 });
        assert_eq!(describe("150890"), SecretShape::Numeric { digits: 6 });
    }

    #[test]
    fn non_numeric() {
        assert_eq!(describe("hunter2"), SecretShape::Other { chars: 7 });
        assert_eq!(describe(""), SecretShape::Other { chars: 0 });
    }
}
