//! Date source - every valid calendar date in a year range, in one format.

use tracing::debug;

use super::{Sink, Source};
use crate::calendar::{CalendarOffset, DateSpec, SerializationFormat, YearRange};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::progress::Progress;

/// Enumerate dates of a year range serialized with one format and offset.
#[derive(Debug, Clone)]
pub struct DateSource {
    range: YearRange,
    format: SerializationFormat,
    offset: CalendarOffset,
}

impl DateSource {
    pub fn new(range: YearRange, format: SerializationFormat, offset: CalendarOffset) -> Result<Self> {
        let first = offset.apply(range.start());
        let last = offset.apply(range.end());
        if first < 0 || last > 9999 {
            return Err(Error::invalid(format!(
                "offset {} moves years {}-{} outside four digits",
                offset.years(),
                range.start(),
                range.end()
            )));
        }
        Ok(Self { range, format, offset })
    }

    pub fn gregorian(range: YearRange, format: SerializationFormat) -> Self {
        Self { range, format, offset: CalendarOffset::GREGORIAN }
    }

    pub fn buddhist(range: YearRange, format: SerializationFormat) -> Self {
        Self { range, format, offset: CalendarOffset::BUDDHIST }
    }

    /// Build from raw parameters, validating the range before the format.
    pub fn parse(start_year: i32, end_year: i32, format: &str, offset: CalendarOffset) -> Result<Self> {
        let range = YearRange::new(start_year, end_year)?;
        let format = format.parse()?;
        Self::new(range, format, offset)
    }

    pub fn range(&self) -> YearRange {
        self.range
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    pub fn offset(&self) -> CalendarOffset {
        self.offset
    }

    /// Fresh iterator over the serialized dates. Each call starts over.
    pub fn iter(&self) -> DateIter {
        DateIter {
            next: DateSpec::new(1, 1, self.range.start()),
            end_year: self.range.end(),
            format: self.format,
            offset: self.offset,
            remaining: self.range.day_count(),
        }
    }
}

impl<'a> IntoIterator for &'a DateSource {
    type Item = String;
    type IntoIter = DateIter;

    fn into_iter(self) -> DateIter {
        self.iter()
    }
}

/// Lazy chronological iterator over serialized dates.
#[derive(Debug, Clone)]
pub struct DateIter {
    next: Option<DateSpec>,
    end_year: i32,
    format: SerializationFormat,
    offset: CalendarOffset,
    remaining: u64,
}

impl DateIter {
    /// Next date without serializing it.
    pub fn next_date(&mut self) -> Option<DateSpec> {
        let date = self.next.filter(|d| d.year() <= self.end_year)?;
        let succ = date.succ();
        self.next = (succ.year() <= self.end_year).then_some(succ);
        self.remaining = self.remaining.saturating_sub(1);
        Some(date)
    }
}

impl Iterator for DateIter {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.next_date()
            .map(|date| self.format.serialize(&date, self.offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for DateIter {}

impl Source for DateSource {
    fn name(&self) -> String {
        format!(
            "{} {} {}-{}",
            self.format,
            self.offset.label(),
            self.range.start(),
            self.range.end()
        )
    }

    fn width(&self) -> usize {
        self.format.width()
    }

    fn count(&self) -> u64 {
        self.range.day_count()
    }

    fn emit(&self, sink: &mut Sink<'_>, progress: &dyn Progress, _cancel: &CancelToken) -> Result<u64> {
        let total_years = self.range.len() as f64;
        let mut iter = self.iter();
        let mut buf = String::with_capacity(self.width());
        let mut written = 0u64;

        for (done, year) in self.range.years().enumerate() {
            while let Some(date) = iter.next.filter(|d| d.year() == year) {
                iter.next_date();
                buf.clear();
                self.format.write_into(&date, self.offset, &mut buf);
                sink(&buf)?;
                written += 1;
            }

            let label = match self.offset {
                CalendarOffset::GREGORIAN => format!("Generated year {}", year),
                offset => format!("Generated {} year {}", offset.label(), offset.apply(year)),
            };
            progress.update((done + 1) as f64 / total_years * 100.0, &label);
        }

        debug!(source = %self.name(), written, "date source finished");
        progress.update(100.0, &format!("Date generation complete - {} passwords", written));
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::count_valid_dates;
    use crate::progress::NoProgress;
    use std::sync::Mutex;

    fn collect(source: &DateSource) -> Vec<String> {
        let mut out = Vec::new();
        source
            .emit(&mut |s: &str| { out.push(s.to_string()); Ok(()) }, &NoProgress, &CancelToken::new())
            .unwrap();
        out
    }

    #[test]
    fn single_year_day_month_year() {
        let source = DateSource::gregorian(YearRange::single(2023).unwrap(), SerializationFormat::DayMonthYear);
        let dates: Vec<String> = source.iter().collect();

        assert_eq!(dates.len(), 365);
        assert_eq!(dates.first().unwrap(), "01012023");
        assert_eq!(dates.last().unwrap(), "31122023");
    }

    #[test]
    fn every_format_spans_the_year() {
        for format in SerializationFormat::ALL {
            let (first, last) = match format {
                SerializationFormat::DayMonthYear => ("01012023", "31122023"),
                SerializationFormat::DayMonthShortYear => ("010123", "311223"),
                SerializationFormat::MonthDayYear => ("01012023", "12312023"),
                SerializationFormat::MonthDayShortYear => ("010123", "123123"),
                SerializationFormat::YearMonthDay => ("20230101", "20231231"),
                SerializationFormat::ShortYearMonthDay => ("230101", "231231"),
            };
            let dates: Vec<String> = DateSource::gregorian(YearRange::single(2023).unwrap(), format)
                .iter()
                .collect();

            assert_eq!(dates.len(), 365, "{}", format);
            assert_eq!(dates.first().map(String::as_str), Some(first), "{}", format);
            assert_eq!(dates.last().map(String::as_str), Some(last), "{}", format);
        }
    }

    #[test]
    fn year_month_day_first_entry() {
        let source = DateSource::gregorian(YearRange::single(2023).unwrap(), SerializationFormat::YearMonthDay);
        let mut iter = source.iter();
        assert_eq!(iter.next().unwrap(), "20230101");
        assert_eq!(iter.last().unwrap(), "20231231");
    }

    #[test]
    fn buddhist_offset_serializes_offset_year() {
        let source = DateSource::buddhist(YearRange::single(2023).unwrap(), SerializationFormat::DayMonthYear);
        let dates: Vec<String> = source.iter().collect();

        assert_eq!(dates.first().unwrap(), "01012566");
        assert_eq!(dates.last().unwrap(), "31122566");
        // 2566 would be a non-leap year either way; validity follows Gregorian 2023.
        assert!(!dates.contains(&"29022566".to_string()));
        assert_eq!(dates.len(), 365);
    }

    #[test]
    fn leap_day_follows_unoffset_year() {
        // Gregorian 2024 is leap, 2024 + 1 = 2025 is not; Feb 29 must still appear.
        let range = YearRange::single(2024).unwrap();
        let source = DateSource::new(range, SerializationFormat::DayMonthYear, CalendarOffset::new(1)).unwrap();
        let dates: Vec<String> = source.iter().collect();

        assert!(dates.contains(&"29022025".to_string()));
        assert_eq!(dates.len(), 366);
    }

    #[test]
    fn count_matches_enumeration() {
        for (start, end) in [(1999, 2001), (2000, 2000), (2096, 2100)] {
            let source = DateSource::gregorian(YearRange::new(start, end).unwrap(), SerializationFormat::DayMonthShortYear);
            let enumerated = source.iter().count() as u64;
            assert_eq!(enumerated, source.count());
            assert_eq!(enumerated, count_valid_dates(start, end));
        }
    }

    #[test]
    fn iterator_is_restartable() {
        let source = DateSource::gregorian(YearRange::new(2019, 2020).unwrap(), SerializationFormat::MonthDayYear);
        let first: Vec<String> = source.iter().collect();
        let second: Vec<String> = (&source).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn emit_matches_iterator() {
        let source = DateSource::buddhist(YearRange::new(2000, 2002).unwrap(), SerializationFormat::ShortYearMonthDay);
        let from_iter: Vec<String> = source.iter().collect();
        assert_eq!(collect(&source), from_iter);
    }

    #[test]
    fn entries_are_chronological_and_unique() {
        let source = DateSource::gregorian(YearRange::new(2000, 2003).unwrap(), SerializationFormat::YearMonthDay);
        let dates: Vec<String> = source.iter().collect();
        let mut sorted = dates.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn size_hint_is_exact() {
        let source = DateSource::gregorian(YearRange::single(2024).unwrap(), SerializationFormat::DayMonthYear);
        let mut iter = source.iter();
        assert_eq!(iter.len(), 366);
        iter.next();
        assert_eq!(iter.len(), 365);
    }

    #[test]
    fn progress_per_year_ends_at_100() {
        let source = DateSource::gregorian(YearRange::new(2020, 2023).unwrap(), SerializationFormat::DayMonthYear);
        let reports = Mutex::new(Vec::new());
        let observer = |p: f64, m: &str| reports.lock().unwrap().push((p, m.to_string()));

        source.emit(&mut |_s: &str| Ok(()), &observer, &CancelToken::new()).unwrap();

        let reports = reports.into_inner().unwrap();
        assert_eq!(reports.len(), 5);
        assert_eq!(reports[0].0, 25.0);
        assert_eq!(reports[0].1, "Generated year 2020");
        assert!(reports.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(reports.last().unwrap().0, 100.0);
    }

    #[test]
    fn parse_rejects_bad_input() {
        let err = DateSource::parse(2030, 2000, "DDMMYYYY", CalendarOffset::GREGORIAN).unwrap_err();
        assert!(err.to_string().contains("after end year"));

        let err = DateSource::parse(2000, 2030, "YYYYDDMM", CalendarOffset::GREGORIAN).unwrap_err();
        assert!(err.to_string().contains("unsupported format"));
    }

    #[test]
    fn rejects_offsets_beyond_four_digits() {
        let range = YearRange::new(2000, 2001).unwrap();
        assert!(DateSource::new(range, SerializationFormat::DayMonthYear, CalendarOffset::new(8000)).is_err());
        assert!(DateSource::new(range, SerializationFormat::DayMonthYear, CalendarOffset::new(-2001)).is_err());
    }

    #[test]
    fn sink_errors_stop_emission() {
        let source = DateSource::gregorian(YearRange::single(2023).unwrap(), SerializationFormat::DayMonthYear);
        let mut seen = 0;
        let result = source.emit(
            &mut |_s: &str| {
                seen += 1;
                if seen == 10 { Err(Error::Cancelled) } else { Ok(()) }
            },
            &NoProgress,
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(seen, 10);
    }
}
