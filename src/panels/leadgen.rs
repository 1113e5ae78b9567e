//! Lead generation panels: qualification volume, forecasts and conversion flow.
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::{FlowBuilder, FlowGraph};
use crate::dates::{days_between, MonthKey};
use crate::metrics::{
    self, month_over_month, percentage, rolling_average, round_to, CountForecast,
};
use crate::record::stage::{self, IDENTIFIED, PROSPECTING, WARM};
use crate::record::{fields, Dataset, Record, StageRule};
use crate::window::{bucket_records, tally_outcomes, MonthWindow, MonthlySeries};

/// Months shown by the trend charts and tables.
pub const TREND_MONTHS: usize = 13;
/// History used for the 12-month qualification average.
pub const FORECAST_HISTORY_MONTHS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCount {
    pub month: MonthKey,
    pub label: String,
    pub count: u32,
}

/// Qualified accounts per month, bucketed by Qualified Date.
pub fn qualified_series(accounts: &[Record], as_of: NaiveDate, months: usize) -> MonthlySeries<u32> {
    let window = MonthWindow::trailing(as_of, months);
    bucket_records(accounts, &window, fields::QUALIFIED_DATE, |n: &mut u32, _, _| *n += 1)
}

/// Projected qualifications for the coming quarter.
pub fn qualification_forecast(accounts: &[Record], as_of: NaiveDate) -> CountForecast {
    let series = qualified_series(accounts, as_of, FORECAST_HISTORY_MONTHS);
    CountForecast::from_monthly(&series.project(|n| *n as f64))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualificationsForecast {
    pub monthly: Vec<MonthCount>,
    pub forecast: CountForecast,
}

pub fn qualifications_forecast(data: &Dataset, as_of: NaiveDate) -> Result<QualificationsForecast> {
    let accounts = data.accounts()?;
    let series = qualified_series(accounts, as_of, FORECAST_HISTORY_MONTHS);
    let forecast = CountForecast::from_monthly(&series.project(|n| *n as f64));
    let monthly = series
        .iter()
        .map(|(month, n)| MonthCount {
            month,
            label: month.label(),
            count: *n,
        })
        .collect();
    Ok(QualificationsForecast { monthly, forecast })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedQualifiedArr {
    pub projected_qualifications: f64,
    /// Accounts qualified in the current and two previous months.
    pub recent_qualified: usize,
    pub avg_qualified_arr: f64,
    pub projected_arr: f64,
}

/// Next-quarter ARR from projected qualifications at the recent mean qualified ARR.
pub fn projected_qualified_arr(data: &Dataset, as_of: NaiveDate) -> Result<ProjectedQualifiedArr> {
    let accounts = data.accounts()?;
    let forecast = qualification_forecast(accounts, as_of);
    let recent = MonthWindow::trailing(as_of, 3);
    let arrs: Vec<f64> = accounts
        .iter()
        .filter(|r| r.date(fields::QUALIFIED_DATE).map_or(false, |d| recent.contains_date(d)))
        .map(|r| r.amount(fields::ARR))
        .collect();
    let avg_qualified_arr = metrics::mean(arrs.iter().copied());
    Ok(ProjectedQualifiedArr {
        projected_qualifications: forecast.projected,
        recent_qualified: arrs.len(),
        avg_qualified_arr,
        projected_arr: forecast.value_at(avg_qualified_arr).round(),
    })
}

/// Accounts still early in the funnel, by stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InProcess {
    pub identified: u32,
    pub prospecting: u32,
    pub warm: u32,
}

impl InProcess {
    pub fn total(&self) -> u32 {
        self.identified + self.prospecting + self.warm
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualificationMonth {
    pub month: MonthKey,
    pub label: String,
    pub qualified: u32,
    pub disqualified: u32,
    /// qualified / (qualified + disqualified), percent.
    pub rate: f64,
    /// Mean of this and the two previous months' rates.
    pub trailing_rate: Option<f64>,
    /// Only set on the most recent month.
    pub in_process: Option<InProcess>,
}

pub fn monthly_qualifications(data: &Dataset, as_of: NaiveDate) -> Result<Vec<QualificationMonth>> {
    let accounts = data.accounts()?;
    let window = MonthWindow::trailing(as_of, TREND_MONTHS);
    let qualified = bucket_records(accounts, &window, fields::QUALIFIED_DATE, |n: &mut u32, _, _| {
        *n += 1
    });
    let disqualified =
        bucket_records(accounts, &window, fields::DISQUALIFIED_DATE, |n: &mut u32, _, _| *n += 1);

    let in_window = |r: &Record, field: &str| r.date(field).map_or(false, |d| window.contains_date(d));
    let mut in_process = InProcess::default();
    for r in accounts {
        if in_window(r, fields::QUALIFIED_DATE) || in_window(r, fields::DISQUALIFIED_DATE) {
            continue;
        }
        let Some(s) = r.stage() else { continue };
        if stage::stage_eq(&s, IDENTIFIED) {
            in_process.identified += 1;
        } else if stage::stage_eq(&s, PROSPECTING) {
            in_process.prospecting += 1;
        } else if stage::stage_eq(&s, WARM) {
            in_process.warm += 1;
        }
    }

    let rates: Vec<f64> = qualified
        .values()
        .zip(disqualified.values())
        .map(|(q, d)| percentage(*q as f64, (*q + *d) as f64))
        .collect();
    let latest = window.latest();

    let months = qualified
        .iter()
        .zip(disqualified.values())
        .enumerate()
        .map(|(i, ((month, q), d))| QualificationMonth {
            month,
            label: month.label(),
            qualified: *q,
            disqualified: *d,
            rate: rates[i],
            trailing_rate: (i >= 2).then(|| rolling_average(&rates, i, 3)),
            in_process: (Some(month) == latest).then_some(in_process),
        })
        .collect();
    Ok(months)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualifiedRow {
    pub month: MonthKey,
    pub label: String,
    pub qualified: u32,
    /// Won (Customer or Churned) with a Closed Date in the qualified month.
    pub won_same_month: u32,
    pub mom_change_pct: f64,
    pub avg_3m: f64,
    pub avg_12m: f64,
    pub avg_won_arr: f64,
}

#[derive(Debug, Default)]
struct QualifiedBucket {
    qualified: u32,
    won_arrs: Vec<f64>,
}

/// Thirteen months of qualification volume, most recent first.
pub fn qualified_accounts_table(data: &Dataset, as_of: NaiveDate) -> Result<Vec<QualifiedRow>> {
    let accounts = data.accounts()?;
    let window = MonthWindow::trailing(as_of, TREND_MONTHS);
    let rule = StageRule::INCLUDING_CHURNED;
    let series = bucket_records(
        accounts,
        &window,
        fields::QUALIFIED_DATE,
        |b: &mut QualifiedBucket, r, qualified_on| {
            b.qualified += 1;
            let closed_same_month = r
                .date(fields::CLOSED_DATE)
                .map_or(false, |c| MonthKey::of(c) == MonthKey::of(qualified_on));
            if closed_same_month && rule.classify(r.stage().as_deref()) == stage::Outcome::Won {
                b.won_arrs.push(r.amount(fields::ARR));
            }
        },
    );

    let counts = series.project(|b| b.qualified as f64);
    let mut rows: Vec<QualifiedRow> = series
        .iter()
        .enumerate()
        .map(|(i, (month, b))| QualifiedRow {
            month,
            label: month.label(),
            qualified: b.qualified,
            won_same_month: b.won_arrs.len() as u32,
            mom_change_pct: match i {
                0 => 0.0,
                _ => month_over_month(counts[i], counts[i - 1]),
            },
            avg_3m: rolling_average(&counts, i, 3),
            avg_12m: rolling_average(&counts, i, 12),
            avg_won_arr: metrics::mean(b.won_arrs.iter().copied()),
        })
        .collect();
    rows.reverse();
    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrByOutcome {
    pub month: MonthKey,
    pub label: String,
    pub won: f64,
    pub lost: f64,
    pub open: f64,
}

/// ARR of accounts by qualified month and eventual outcome, rounded to the nearest 1000.
pub fn arr_by_outcome(data: &Dataset, as_of: NaiveDate) -> Result<Vec<ArrByOutcome>> {
    let accounts = data.accounts()?;
    let window = MonthWindow::trailing(as_of, TREND_MONTHS);
    let series = tally_outcomes(accounts, &window, fields::QUALIFIED_DATE, StageRule::INCLUDING_CHURNED);
    Ok(series
        .iter()
        .map(|(month, t)| ArrByOutcome {
            month,
            label: month.label(),
            won: round_to(t.won_arr, 1000.0),
            lost: round_to(t.lost_arr, 1000.0),
            open: round_to(t.open_arr, 1000.0),
        })
        .collect())
}

/// Elapsed-time band between two funnel milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedBand {
    UnderTwoWeeks,
    TwoToFourWeeks,
    OverThirtyDays,
}

impl SpeedBand {
    pub const ALL: [SpeedBand; 3] = [
        SpeedBand::UnderTwoWeeks,
        SpeedBand::TwoToFourWeeks,
        SpeedBand::OverThirtyDays,
    ];

    /// Negative spans (dates out of order) land in the last band.
    pub fn of_days(days: i64) -> Self {
        match days {
            0..=13 => SpeedBand::UnderTwoWeeks,
            14..=29 => SpeedBand::TwoToFourWeeks,
            _ => SpeedBand::OverThirtyDays,
        }
    }

    fn span(&self) -> &'static str {
        match self {
            SpeedBand::UnderTwoWeeks => "< 14 Days",
            SpeedBand::TwoToFourWeeks => "14-30 Days",
            SpeedBand::OverThirtyDays => "30+ Days",
        }
    }

    pub fn warmed_label(&self) -> String {
        format!("Warmed in {}", self.span())
    }

    pub fn qualified_label(&self) -> String {
        format!("Qualified in {}", self.span())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionSpeed {
    pub flow: FlowGraph,
    /// Accounts missing Created, Warmed or Qualified Date.
    pub skipped: usize,
}

/// Created → Warmed band → Qualified band flow for accounts with all three dates.
pub fn conversion_speed(data: &Dataset) -> Result<ConversionSpeed> {
    let accounts = data.accounts()?;
    let mut flow = FlowBuilder::new();
    let mut skipped = 0;
    for r in accounts {
        let (Some(created), Some(warmed), Some(qualified)) = (
            r.date(fields::CREATED_DATE),
            r.date(fields::WARMED_DATE),
            r.date(fields::QUALIFIED_DATE),
        ) else {
            skipped += 1;
            continue;
        };
        let to_warm = SpeedBand::of_days(days_between(created, warmed));
        let to_qualify = SpeedBand::of_days(days_between(warmed, qualified));
        flow.add(to_warm.warmed_label(), to_qualify.qualified_label());
    }

    let fixed: Vec<String> = SpeedBand::ALL
        .iter()
        .map(SpeedBand::warmed_label)
        .chain(SpeedBand::ALL.iter().map(SpeedBand::qualified_label))
        .collect();
    let fixed: Vec<&str> = fixed.iter().map(String::as_str).collect();
    debug!(skipped, "conversion speed computed");
    Ok(ConversionSpeed {
        flow: flow.finish(&fixed),
        skipped,
    })
}

pub const WARMED: &str = "Warmed";
pub const QUALIFIED: &str = "Qualified";
pub const DISQUALIFIED: &str = "Disqualified";
pub const IN_PROGRESS: &str = "In-Progress";
pub const OPEN: &str = "Open";

/// Contacts by created month into Warmed, Disqualified or In-Progress, then
/// Warmed into Qualified, Disqualified or Open. Covers every dated contact.
pub fn conversion_flow(data: &Dataset) -> Result<FlowGraph> {
    let contacts = data.contacts()?;
    let mut flow = FlowBuilder::new();
    for c in contacts {
        let Some(created) = c.date(fields::CREATED_DATE) else {
            continue;
        };
        let created_month = MonthKey::of(created).to_string();
        let warmed = c.date(fields::WARMED_DATE).is_some();
        let qualified = c.date(fields::QUALIFIED_DATE).is_some();
        let disqualified = c.date(fields::DISQUALIFIED_DATE).is_some();

        if warmed {
            flow.add(created_month, WARMED);
            let next = if qualified {
                QUALIFIED
            } else if disqualified {
                DISQUALIFIED
            } else {
                OPEN
            };
            flow.add(WARMED, next);
        } else if disqualified {
            flow.add(created_month, DISQUALIFIED);
        } else {
            flow.add(created_month, IN_PROGRESS);
        }
    }
    Ok(flow.finish(&[]))
}
