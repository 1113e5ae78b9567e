// src/window/mod.rs
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::trace;

use crate::dates::MonthKey;
use crate::record::{fields, Outcome, Record, StageRule};

/// Consecutive calendar months ending with the as-of month, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthWindow {
    months: Vec<MonthKey>,
}

impl MonthWindow {
    pub fn trailing(as_of: NaiveDate, len: usize) -> Self {
        let latest = MonthKey::of(as_of);
        let months = (0..len as i32)
            .rev()
            .map(|back| latest.shift(-back))
            .collect();
        Self { months }
    }

    pub fn months(&self) -> &[MonthKey] {
        &self.months
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn latest(&self) -> Option<MonthKey> {
        self.months.last().copied()
    }

    pub fn contains(&self, month: MonthKey) -> bool {
        match (self.months.first(), self.months.last()) {
            (Some(first), Some(last)) => *first <= month && month <= *last,
            _ => false,
        }
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.contains(MonthKey::of(date))
    }
}

/// One accumulator per window month, pre-filled so empty months still show up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySeries<T> {
    buckets: BTreeMap<MonthKey, T>,
}

impl<T: Default> MonthlySeries<T> {
    pub fn new(window: &MonthWindow) -> Self {
        Self {
            buckets: window.months().iter().map(|m| (*m, T::default())).collect(),
        }
    }

    /// Bucket for `date`, or `None` if the date falls outside the window.
    pub fn bucket_mut(&mut self, date: NaiveDate) -> Option<&mut T> {
        self.buckets.get_mut(&MonthKey::of(date))
    }

    pub fn get(&self, month: MonthKey) -> Option<&T> {
        self.buckets.get(&month)
    }

    /// Ascending by month.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (MonthKey, &T)> {
        self.buckets.iter().map(|(k, v)| (*k, v))
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.buckets.values()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Project each bucket to a number, oldest first.
    pub fn project<F: Fn(&T) -> f64>(&self, f: F) -> Vec<f64> {
        self.buckets.values().map(f).collect()
    }
}

/// Assign each record to the bucket of its `date_field`. Records whose date is
/// missing, unparseable, or outside the window are dropped from this aggregate.
pub fn bucket_records<'a, T, I, F>(
    records: I,
    window: &MonthWindow,
    date_field: &str,
    mut apply: F,
) -> MonthlySeries<T>
where
    T: Default,
    I: IntoIterator<Item = &'a Record>,
    F: FnMut(&mut T, &'a Record, NaiveDate),
{
    let mut series = MonthlySeries::new(window);
    let mut dropped = 0usize;
    for record in records {
        let Some(date) = record.date(date_field) else {
            dropped += 1;
            continue;
        };
        match series.bucket_mut(date) {
            Some(bucket) => apply(bucket, record, date),
            None => dropped += 1,
        }
    }
    trace!(date_field, dropped, "bucketed records");
    series
}

/// Won/lost/open counts and ARR sums for one month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OutcomeTally {
    pub won: u32,
    pub lost: u32,
    pub open: u32,
    pub won_arr: f64,
    pub lost_arr: f64,
    pub open_arr: f64,
}

impl OutcomeTally {
    pub fn add(&mut self, outcome: Outcome, arr: f64) {
        match outcome {
            Outcome::Won => {
                self.won += 1;
                self.won_arr += arr;
            }
            Outcome::Lost => {
                self.lost += 1;
                self.lost_arr += arr;
            }
            Outcome::Open => {
                self.open += 1;
                self.open_arr += arr;
            }
        }
    }

    pub fn total(&self) -> u32 {
        self.won + self.lost + self.open
    }
}

/// Categorize each eligible record by `rule` into the bucket of its `date_field`.
pub fn tally_outcomes<'a, I>(
    records: I,
    window: &MonthWindow,
    date_field: &str,
    rule: StageRule,
) -> MonthlySeries<OutcomeTally>
where
    I: IntoIterator<Item = &'a Record>,
{
    bucket_records(records, window, date_field, |tally: &mut OutcomeTally, r, _| {
        let outcome = rule.classify(r.stage().as_deref());
        tally.add(outcome, r.amount(fields::ARR));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::date_to_serial;
    use crate::record::stage::{CLOSED_LOST, CUSTOMER, WARM};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_is_ascending_and_ends_at_as_of() {
        let w = MonthWindow::trailing(ymd(2025, 3, 31), 13);
        assert_eq!(w.len(), 13);
        assert_eq!(w.months()[0].to_string(), "2024-03");
        assert_eq!(w.latest().unwrap().to_string(), "2025-03");
        assert!(w.contains_date(ymd(2024, 3, 1)));
        assert!(!w.contains_date(ymd(2024, 2, 29)));
        assert!(!w.contains_date(ymd(2025, 4, 1)));
    }

    #[test]
    fn empty_months_still_have_buckets() {
        let w = MonthWindow::trailing(ymd(2025, 3, 31), 6);
        let series = bucket_records(Vec::<&Record>::new(), &w, fields::QUALIFIED_DATE, |n: &mut u32, _, _| {
            *n += 1
        });
        assert_eq!(series.len(), 6);
        assert!(series.values().all(|n| *n == 0));
    }

    #[test]
    fn bucket_sums_match_records_inside_window() {
        let as_of = ymd(2025, 3, 31);
        let w = MonthWindow::trailing(as_of, 6);
        let records = vec![
            Record::new().with(fields::QUALIFIED_DATE, "2025-03-02"),
            Record::new().with(fields::QUALIFIED_DATE, "03/15/2025"),
            Record::new().with(fields::QUALIFIED_DATE, date_to_serial(ymd(2024, 10, 1))),
            Record::new().with(fields::QUALIFIED_DATE, ymd(2024, 12, 24)),
            // outside the window
            Record::new().with(fields::QUALIFIED_DATE, "2024-09-30"),
            Record::new().with(fields::QUALIFIED_DATE, "2025-04-01"),
            // no usable date
            Record::new().with(fields::QUALIFIED_DATE, "soon"),
            Record::new(),
        ];
        let series = bucket_records(&records, &w, fields::QUALIFIED_DATE, |n: &mut u32, _, _| *n += 1);
        let total: u32 = series.values().sum();
        assert_eq!(total, 4);
        assert_eq!(series.get(MonthKey::new(2025, 3).unwrap()), Some(&2));
        assert_eq!(series.get(MonthKey::new(2024, 10).unwrap()), Some(&1));
        assert_eq!(series.get(MonthKey::new(2024, 12).unwrap()), Some(&1));
    }

    #[test]
    fn serial_44000_customer_is_won_in_june_2020() {
        let w = MonthWindow::trailing(ymd(2020, 8, 15), 3);
        let records = vec![Record::new()
            .with(fields::CLOSED_DATE, 44000.0)
            .with(fields::STAGE, CUSTOMER)
            .with(fields::ARR, 1200.0)];
        let series = tally_outcomes(&records, &w, fields::CLOSED_DATE, StageRule::CUSTOMER_ONLY);
        let june = series.get(MonthKey::new(2020, 6).unwrap()).unwrap();
        assert_eq!(june.won, 1);
        assert_eq!(june.won_arr, 1200.0);
        assert_eq!(june.total(), 1);
    }

    #[test]
    fn outcomes_split_by_rule() {
        let w = MonthWindow::trailing(ymd(2025, 3, 31), 1);
        let records = vec![
            Record::new().with(fields::CLOSED_DATE, "2025-03-03").with(fields::STAGE, CUSTOMER),
            Record::new().with(fields::CLOSED_DATE, "2025-03-04").with(fields::STAGE, CLOSED_LOST),
            Record::new().with(fields::CLOSED_DATE, "2025-03-05").with(fields::STAGE, WARM),
            Record::new().with(fields::CLOSED_DATE, "2025-03-06"),
        ];
        let series = tally_outcomes(&records, &w, fields::CLOSED_DATE, StageRule::CUSTOMER_ONLY);
        let t = series.values().next().unwrap();
        assert_eq!((t.won, t.lost, t.open), (1, 1, 2));
    }
}
