use anyhow::{anyhow, Result};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr};

/// A calendar month, ordered chronologically and displayed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Move by `delta` months (negative goes back in time).
    pub fn shift(self, delta: i32) -> Self {
        let idx = self.year * 12 + (self.month as i32 - 1) + delta;
        Self {
            year: idx.div_euclid(12),
            month: idx.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("month key is always valid")
    }

    pub fn last_day(&self) -> NaiveDate {
        self.shift(1).first_day() - Duration::days(1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    /// Display label such as `Mar 2025`.
    pub fn label(&self) -> String {
        self.first_day().format("%b %Y").to_string()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| anyhow!("month key `{}` is not YYYY-MM", s))?;
        let year: i32 = y
            .parse()
            .map_err(|_| anyhow!("bad year in month key `{}`", s))?;
        let month: u32 = m
            .parse()
            .map_err(|_| anyhow!("bad month in month key `{}`", s))?;
        MonthKey::new(year, month).ok_or_else(|| anyhow!("month out of range in `{}`", s))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A span of calendar days with an exclusive start and inclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayRange {
    pub after: NaiveDate,
    pub through: NaiveDate,
}

impl DayRange {
    /// The `days` calendar days ending on `as_of`: (as_of - days, as_of].
    pub fn trailing_days(as_of: NaiveDate, days: i64) -> Self {
        Self {
            after: as_of - Duration::days(days),
            through: as_of,
        }
    }

    /// The `months` full calendar months before the month of `as_of`.
    pub fn previous_months(as_of: NaiveDate, months: u32) -> Self {
        let current = MonthKey::of(as_of);
        let first = current.shift(-(months as i32)).first_day();
        Self {
            after: first - Duration::days(1),
            through: current.first_day() - Duration::days(1),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date > self.after && date <= self.through
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn shift_crosses_year_boundaries() {
        let mar = MonthKey::new(2025, 3).unwrap();
        assert_eq!(mar.shift(-3).to_string(), "2024-12");
        assert_eq!(mar.shift(-15).to_string(), "2023-12");
        assert_eq!(mar.shift(10).to_string(), "2026-01");
        assert_eq!(mar.shift(0), mar);
    }

    #[test]
    fn parse_and_display_round_trip() {
        let key: MonthKey = "2024-02".parse().unwrap();
        assert_eq!(key, MonthKey::new(2024, 2).unwrap());
        assert_eq!(key.last_day(), ymd(2024, 2, 29));
        assert_eq!(key.label(), "Feb 2024");
        assert!("2024-13".parse::<MonthKey>().is_err());
        assert!("202402".parse::<MonthKey>().is_err());
    }

    #[test]
    fn trailing_ninety_days_excludes_start() {
        let r = DayRange::trailing_days(ymd(2025, 3, 31), 90);
        assert_eq!(r.after, ymd(2024, 12, 31));
        assert!(!r.contains(ymd(2024, 12, 31)));
        assert!(r.contains(ymd(2025, 1, 1)));
        assert!(r.contains(ymd(2025, 3, 31)));
        assert!(!r.contains(ymd(2025, 4, 1)));
    }

    #[test]
    fn previous_quarter_is_three_full_months() {
        let r = DayRange::previous_months(ymd(2025, 3, 31), 3);
        assert!(r.contains(ymd(2024, 12, 1)));
        assert!(r.contains(ymd(2025, 2, 28)));
        assert!(!r.contains(ymd(2024, 11, 30)));
        assert!(!r.contains(ymd(2025, 3, 1)));
    }

    #[test]
    fn serializes_as_plain_string() {
        let key = MonthKey::new(2020, 6).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2020-06\"");
    }
}
