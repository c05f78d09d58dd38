//! Transaction date extraction.

use chrono::{Months, NaiveDate};
use regex::Captures;

use super::patterns::DatePatterns;
use super::{ExtractionMatch, FieldExtractor};

/// Finds calendar dates inside a window around "today".
///
/// Numeric `A/B/YYYY` dates are read month-first, then day-first when the
/// month-first reading is not a real calendar date or falls outside the window.
pub struct DateExtractor<'a> {
    patterns: &'a DatePatterns,
    earliest: NaiveDate,
    latest: NaiveDate,
}

impl<'a> DateExtractor<'a> {
    pub fn new(patterns: &'a DatePatterns, today: NaiveDate, window_months: u32) -> Self {
        let months = Months::new(window_months);
        Self {
            patterns,
            earliest: today.checked_sub_months(months).unwrap_or(NaiveDate::MIN),
            latest: today.checked_add_months(months).unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn in_window(&self, date: NaiveDate) -> bool {
        date >= self.earliest && date <= self.latest
    }

    fn accept(&self, candidates: &[Option<NaiveDate>]) -> Option<NaiveDate> {
        candidates
            .iter()
            .flatten()
            .copied()
            .find(|date| self.in_window(*date))
    }

    fn numeric(&self, caps: &Captures) -> Option<NaiveDate> {
        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[2].parse().ok()?;
        let year = parse_year(&caps[3])?;

        self.accept(&[
            NaiveDate::from_ymd_opt(year, first, second),
            NaiveDate::from_ymd_opt(year, second, first),
        ])
    }

    fn textual(&self, caps: &Captures) -> Option<NaiveDate> {
        let month = caps
            .name("m1")
            .or_else(|| caps.name("m2"))
            .and_then(|m| month_to_number(m.as_str()))?;
        let day: u32 = caps
            .name("d1")
            .or_else(|| caps.name("d2"))?
            .as_str()
            .parse()
            .ok()?;
        let year: i32 = caps.name("y")?.as_str().parse().ok()?;

        self.accept(&[NaiveDate::from_ymd_opt(year, month, day)])
    }

    fn iso(&self, caps: &Captures) -> Option<NaiveDate> {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;

        self.accept(&[NaiveDate::from_ymd_opt(year, month, day)])
    }
}

impl FieldExtractor for DateExtractor<'_> {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        for caps in self.patterns.numeric.captures_iter(text) {
            if let Some(date) = self.numeric(&caps) {
                results.push(ExtractionMatch::from_match(date, caps.get(0)));
            }
        }

        for caps in self.patterns.textual.captures_iter(text) {
            if let Some(date) = self.textual(&caps) {
                results.push(ExtractionMatch::from_match(date, caps.get(0)));
            }
        }

        for caps in self.patterns.iso.captures_iter(text) {
            if let Some(date) = self.iso(&caps) {
                results.push(ExtractionMatch::from_match(date, caps.get(0)));
            }
        }

        results
    }
}

fn parse_year(s: &str) -> Option<i32> {
    let year: i32 = s.parse().ok()?;
    // Two-digit years on receipts are always this century
    Some(if year < 100 { 2000 + year } else { year })
}

fn month_to_number(month: &str) -> Option<u32> {
    let prefix: String = month.chars().take(3).collect::<String>().to_lowercase();
    let number = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::rules::PatternTables;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_numeric_month_first() {
        let tables = PatternTables::default();
        let extractor = DateExtractor::new(&tables.dates, today(), 12);

        let result = extractor.extract("04/12/2025 14:02").unwrap();
        assert_eq!(result.value, NaiveDate::from_ymd_opt(2025, 4, 12).unwrap());
        assert_eq!(result.source, "04/12/2025");
        assert_eq!(result.position, Some((0, 10)));

        let result = extractor.extract("Date: 04/12/2025").unwrap();
        assert_eq!(result.position, Some((6, 16)));
    }

    #[test]
    fn test_numeric_falls_back_to_day_first() {
        let tables = PatternTables::default();
        let extractor = DateExtractor::new(&tables.dates, today(), 12);

        let result = extractor.extract("25.03.2025").unwrap();
        assert_eq!(result.value, NaiveDate::from_ymd_opt(2025, 3, 25).unwrap());
    }

    #[test]
    fn test_textual_and_iso() {
        let tables = PatternTables::default();
        let extractor = DateExtractor::new(&tables.dates, today(), 12);

        let result = extractor.extract("Mar 7th, 2025").unwrap();
        assert_eq!(result.value, NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());

        let result = extractor.extract("7 March 2025").unwrap();
        assert_eq!(result.value, NaiveDate::from_ymd_opt(2025, 3, 7).unwrap());

        let result = extractor.extract("2025-01-15 10:00").unwrap();
        assert_eq!(result.value, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
    }

    #[test]
    fn test_window_boundaries() {
        let tables = PatternTables::default();
        let extractor = DateExtractor::new(&tables.dates, today(), 12);

        // 366 days before 2025-06-01
        assert!(extractor.extract("2024-05-31").is_none());
        // 300 days before
        assert!(extractor.extract("2024-08-05").is_some());
        assert!(extractor.extract("2026-06-01").is_some());
        assert!(extractor.extract("2026-06-02").is_none());
    }

    #[test]
    fn test_invalid_calendar_values() {
        let tables = PatternTables::default();
        let extractor = DateExtractor::new(&tables.dates, today(), 12);

        assert!(extractor.extract("13/13/2025").is_none());
        assert!(extractor.extract("2025-02-30").is_none());
    }

    #[test]
    fn test_two_digit_year() {
        let tables = PatternTables::default();
        let extractor = DateExtractor::new(&tables.dates, today(), 12);

        let result = extractor.extract("05/20/25").unwrap();
        assert_eq!(result.value, NaiveDate::from_ymd_opt(2025, 5, 20).unwrap());
    }
}
