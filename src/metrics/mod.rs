// src/metrics/mod.rs
use serde::Serialize;

/// Months projected forward by the forecast panels.
pub const FORECAST_HORIZON_MONTHS: f64 = 3.0;

/// A named numeric result, as shown on a summary tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetric {
    pub name: String,
    pub value: f64,
}

impl DerivedMetric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// `num / den`, or 0 when `den` is 0.
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// `num / den` in percent, or 0 when `den` is 0.
pub fn percentage(num: f64, den: f64) -> f64 {
    ratio(num, den) * 100.0
}

/// won / (won + lost) in percent; 0 when nothing closed.
pub fn win_rate(won: u32, lost: u32) -> f64 {
    percentage(won as f64, (won + lost) as f64)
}

/// Arithmetic mean, 0 for an empty input.
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    ratio(sum, n as f64)
}

/// Mean of the `n` values ending at index `at` (inclusive), oldest first.
/// 0 when fewer than `n` values are available at that position.
pub fn rolling_average(values: &[f64], at: usize, n: usize) -> f64 {
    if n == 0 || at >= values.len() || at + 1 < n {
        return 0.0;
    }
    mean(values[at + 1 - n..=at].iter().copied())
}

/// Rolling average at the newest position of `values`.
pub fn trailing_average(values: &[f64], n: usize) -> f64 {
    match values.len() {
        0 => 0.0,
        len => rolling_average(values, len - 1, n),
    }
}

/// Change from `previous` to `current` in percent; 0 when `previous` is 0.
pub fn month_over_month(current: f64, previous: f64) -> f64 {
    percentage(current - previous, previous)
}

/// Round half away from zero to `step` (e.g. 1000 for ARR charts).
pub fn round_to(value: f64, step: f64) -> f64 {
    if step == 0.0 {
        value
    } else {
        (value / step).round() * step
    }
}

/// Blended forward projection of a monthly count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountForecast {
    pub avg_3m: f64,
    pub avg_12m: f64,
    /// round(((avg_3m + avg_12m) / 2) × horizon)
    pub projected: f64,
}

impl CountForecast {
    /// `monthly` is oldest first and should cover at least twelve months.
    pub fn from_monthly(monthly: &[f64]) -> Self {
        let avg_3m = trailing_average(monthly, 3);
        let avg_12m = trailing_average(monthly, 12);
        Self {
            avg_3m,
            avg_12m,
            projected: (((avg_3m + avg_12m) / 2.0) * FORECAST_HORIZON_MONTHS).round(),
        }
    }

    /// Dollar forecast at `avg_deal_value` per projected deal.
    pub fn value_at(&self, avg_deal_value: f64) -> f64 {
        self.projected * avg_deal_value
    }
}
