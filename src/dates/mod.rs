// src/dates/mod.rs
pub mod month;

pub use month::{DayRange, MonthKey};

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::record::Value;

/// String layouts accepted for text dates, in priority order.
/// `%m` and `%d` also take single digits, so `3/5/2024` is covered.
pub const TEXT_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

/// `YYYY-MM-DDThh:mm...` or `YYYY-MM-DD hh:mm...`, as produced by serialized date objects.
static ISO_DATETIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})[T ]\d{2}:\d{2}").expect("static regex"));

/// Day zero of the spreadsheet serial calendar.
pub fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("1899-12-30 is a valid date")
}

/// Spreadsheet serial → calendar day. The time-of-day fraction is dropped.
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor();
    if days.abs() > 3_000_000.0 {
        return None;
    }
    serial_epoch().checked_add_signed(Duration::days(days as i64))
}

/// Calendar day → spreadsheet serial (whole days since 1899-12-30).
pub fn date_to_serial(date: NaiveDate) -> f64 {
    (date - serial_epoch()).num_days() as f64
}

/// Parse a text date against [`TEXT_DATE_FORMATS`], then ISO date-time text.
pub fn parse_text_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_matches('"');
    if s.is_empty() {
        return None;
    }
    for fmt in TEXT_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    let caps = ISO_DATETIME.captures(s)?;
    NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()
}

/// Normalize any cell encoding into a canonical calendar date.
/// Returns `None` for absent or unparseable input.
pub fn normalize(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(d) => Some(*d),
        Value::DateTime(dt) => Some(dt.date()),
        Value::Number(n) => serial_to_date(*n),
        Value::Text(s) => parse_text_date(s),
        Value::Empty | Value::Bool(_) => None,
    }
}

/// Signed whole days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn every_encoding_of_the_same_day_agrees() {
        let expected = ymd(2024, 3, 5);
        let encodings = vec![
            Value::Date(expected),
            Value::DateTime(expected.and_hms_opt(17, 45, 0).unwrap()),
            Value::Number(date_to_serial(expected)),
            Value::Number(date_to_serial(expected) + 0.75),
            Value::Text("2024-03-05".into()),
            Value::Text("03/05/2024".into()),
            Value::Text("3/5/2024".into()),
            Value::Text(" 2024-03-05T09:30:00.000Z ".into()),
            Value::Text("2024-03-05 09:30:00".into()),
        ];
        for v in encodings {
            assert_eq!(normalize(&v), Some(expected), "encoding {:?}", v);
        }
    }

    #[test]
    fn us_layout_wins_over_eu_when_both_fit() {
        assert_eq!(parse_text_date("04/05/2024"), Some(ymd(2024, 4, 5)));
        // month 25 rules out the US layout
        assert_eq!(parse_text_date("25/05/2024"), Some(ymd(2024, 5, 25)));
    }

    #[test]
    fn serial_44000_is_mid_june_2020() {
        assert_eq!(serial_to_date(44000.0), Some(ymd(2020, 6, 18)));
        assert_eq!(date_to_serial(ymd(2020, 6, 18)), 44000.0);
    }

    #[test]
    fn serial_fraction_is_floored_not_rounded() {
        // 18:00 on 2020-06-18 is still that day
        assert_eq!(serial_to_date(44000.75), Some(ymd(2020, 6, 18)));
        assert_eq!(serial_to_date(44000.5), Some(ymd(2020, 6, 18)));
        assert_eq!(serial_to_date(43999.999), Some(ymd(2020, 6, 17)));
        assert_eq!(serial_to_date(-0.5), Some(ymd(1899, 12, 29)));
    }

    #[test]
    fn single_digit_us_layout() {
        assert_eq!(parse_text_date("3/5/2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_text_date("12/1/2024"), Some(ymd(2024, 12, 1)));
        assert_eq!(parse_text_date("1/31/2024"), Some(ymd(2024, 1, 31)));
    }

    #[test]
    fn garbage_is_none() {
        for v in [
            Value::Empty,
            Value::Bool(true),
            Value::Text("".into()),
            Value::Text("next tuesday".into()),
            Value::Text("13/13/2024".into()),
            Value::Text("2024-02-30".into()),
            Value::Number(f64::NAN),
            Value::Number(f64::INFINITY),
            Value::Number(1e12),
        ] {
            assert_eq!(normalize(&v), None, "value {:?}", v);
        }
    }

    #[test]
    fn days_between_is_signed() {
        assert_eq!(days_between(ymd(2025, 1, 1), ymd(2025, 3, 1)), 59);
        assert_eq!(days_between(ymd(2025, 3, 1), ymd(2025, 1, 1)), -59);
    }
}
