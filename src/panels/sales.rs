//! Sales panels: win rates, cycle times, breakdowns and the summary tiles.
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::leadgen::{qualification_forecast, TREND_MONTHS};
use crate::dates::{days_between, DayRange, MonthKey};
use crate::metrics::{self, mean, win_rate, DerivedMetric};
use crate::record::{fields, Dataset, Outcome, Record, StageRule};
use crate::window::{bucket_records, MonthWindow};

/// Months covered by the segment and territory tables.
pub const BREAKDOWN_MONTHS: usize = 6;
/// Trailing days used by the "last 90 days" tiles and the segment ARR chart.
pub const RECENT_DAYS: i64 = 90;
/// Share of projected qualifications expected to close.
pub const EXPECTED_CLOSE_RATE: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinRateMonth {
    pub month: MonthKey,
    pub label: String,
    pub wins: u32,
    pub losses: u32,
    /// Whole percent.
    pub win_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AccountTotals {
    pub total: usize,
    pub qualified: usize,
    pub open: usize,
    pub wins: usize,
    pub losses: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinRateByMonth {
    pub months: Vec<WinRateMonth>,
    pub totals: AccountTotals,
}

/// Win rate of qualified accounts by closed month. Won means a current customer.
pub fn win_rate_by_month(data: &Dataset, as_of: NaiveDate) -> Result<WinRateByMonth> {
    let accounts = data.accounts()?;
    let window = MonthWindow::trailing(as_of, TREND_MONTHS);
    let rule = StageRule::CUSTOMER_ONLY;

    let qualified: Vec<&Record> = accounts
        .iter()
        .filter(|r| r.date(fields::QUALIFIED_DATE).is_some())
        .collect();
    let mut totals = AccountTotals {
        total: accounts.len(),
        qualified: qualified.len(),
        ..Default::default()
    };

    let series = bucket_records(
        qualified.iter().copied().filter(|r| rule.classify(r.stage().as_deref()) != Outcome::Open),
        &window,
        fields::CLOSED_DATE,
        |(wins, losses): &mut (u32, u32), r, _| match rule.classify(r.stage().as_deref()) {
            Outcome::Won => *wins += 1,
            _ => *losses += 1,
        },
    );
    totals.open = qualified
        .iter()
        .filter(|r| rule.classify(r.stage().as_deref()) == Outcome::Open)
        .count();

    let months: Vec<WinRateMonth> = series
        .iter()
        .map(|(month, (wins, losses))| WinRateMonth {
            month,
            label: month.label(),
            wins: *wins,
            losses: *losses,
            win_rate: win_rate(*wins, *losses).round(),
        })
        .collect();
    totals.wins = months.iter().map(|m| m.wins as usize).sum();
    totals.losses = months.iter().map(|m| m.losses as usize).sum();

    Ok(WinRateByMonth { months, totals })
}

#[derive(Debug, Default)]
struct DaysAcc {
    sum: i64,
    n: u32,
}

impl DaysAcc {
    fn push(&mut self, days: i64) {
        self.sum += days;
        self.n += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.n > 0).then(|| (self.sum as f64 / self.n as f64).round())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleTimeMonth {
    pub month: MonthKey,
    pub label: String,
    /// Mean Qualified → Closed days of deals qualified this month.
    pub by_qualified_month: Option<f64>,
    pub qualified_deals: u32,
    /// Same measure for deals closed this month.
    pub by_closed_month: Option<f64>,
    pub closed_deals: u32,
}

pub fn cycle_time_trend(data: &Dataset, as_of: NaiveDate) -> Result<Vec<CycleTimeMonth>> {
    let accounts = data.accounts()?;
    let window = MonthWindow::trailing(as_of, TREND_MONTHS);
    let closed: Vec<&Record> = accounts
        .iter()
        .filter(|r| r.date(fields::QUALIFIED_DATE).is_some() && r.date(fields::CLOSED_DATE).is_some())
        .collect();

    let cycle = |r: &Record| -> i64 {
        match (r.date(fields::QUALIFIED_DATE), r.date(fields::CLOSED_DATE)) {
            (Some(q), Some(c)) => days_between(q, c),
            _ => 0,
        }
    };
    let by_qualified = bucket_records(closed.iter().copied(), &window, fields::QUALIFIED_DATE, |acc: &mut DaysAcc, r, _| {
        acc.push(cycle(r))
    });
    let by_closed = bucket_records(closed.iter().copied(), &window, fields::CLOSED_DATE, |acc: &mut DaysAcc, r, _| {
        acc.push(cycle(r))
    });

    Ok(by_qualified
        .iter()
        .zip(by_closed.values())
        .map(|((month, q), c)| CycleTimeMonth {
            month,
            label: month.label(),
            by_qualified_month: q.mean(),
            qualified_deals: q.n,
            by_closed_month: c.mean(),
            closed_deals: c.n,
        })
        .collect())
}

/// Categorical column a breakdown table groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Dimension {
    Segment,
    Territory,
}

impl Dimension {
    pub fn field(&self) -> &'static str {
        match self {
            Dimension::Segment => fields::SEGMENT,
            Dimension::Territory => fields::TERRITORY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BreakdownCell {
    pub qualified: u32,
    pub won: u32,
    pub lost: u32,
    pub win_rate: f64,
    /// Mean Created → Closed days over won deals, whole days.
    pub avg_cycle_days: f64,
    /// Mean Qualified → Closed days over won deals, whole days.
    pub avg_close_days: f64,
    #[serde(skip)]
    cycle: Vec<i64>,
    #[serde(skip)]
    close: Vec<i64>,
}

impl BreakdownCell {
    fn add(&mut self, r: &Record, qualified_on: NaiveDate) {
        self.qualified += 1;
        let Some(closed) = r.date(fields::CLOSED_DATE) else {
            return;
        };
        match StageRule::CUSTOMER_ONLY.classify(r.stage().as_deref()) {
            Outcome::Won => {
                self.won += 1;
                if let Some(created) = r.date(fields::CREATED_DATE) {
                    self.cycle.push(days_between(created, closed));
                }
                self.close.push(days_between(qualified_on, closed));
            }
            Outcome::Lost => self.lost += 1,
            Outcome::Open => {}
        }
    }

    fn finish(&mut self) {
        let positive_mean = |days: &[i64]| {
            mean(days.iter().filter(|d| **d > 0).map(|d| *d as f64)).round()
        };
        self.win_rate = win_rate(self.won, self.lost);
        self.avg_cycle_days = positive_mean(&self.cycle);
        self.avg_close_days = positive_mean(&self.close);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownMonth {
    pub month: MonthKey,
    pub label: String,
    pub cells: BTreeMap<String, BreakdownCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub dimension: Dimension,
    /// Every value seen on a qualified account, sorted, `Unknown` for blanks.
    pub values: Vec<String>,
    pub months: Vec<BreakdownMonth>,
}

impl Breakdown {
    pub fn cell(&self, month: MonthKey, value: &str) -> Option<&BreakdownCell> {
        self.months
            .iter()
            .find(|m| m.month == month)
            .and_then(|m| m.cells.get(value))
    }
}

/// Qualified accounts of the last six months grouped by `dimension`, keyed by qualified month.
pub fn breakdown(data: &Dataset, as_of: NaiveDate, dimension: Dimension) -> Result<Breakdown> {
    let accounts = data.accounts()?;
    let window = MonthWindow::trailing(as_of, BREAKDOWN_MONTHS);
    let field = dimension.field();

    let qualified: Vec<&Record> = accounts
        .iter()
        .filter(|r| r.date(fields::QUALIFIED_DATE).is_some())
        .collect();
    let values: BTreeSet<String> = qualified.iter().map(|r| r.category(field)).collect();

    let series = bucket_records(
        qualified.iter().copied(),
        &window,
        fields::QUALIFIED_DATE,
        |cells: &mut BTreeMap<String, BreakdownCell>, r, qualified_on| {
            cells.entry(r.category(field)).or_default().add(r, qualified_on)
        },
    );

    let months = series
        .iter()
        .map(|(month, cells)| {
            let mut cells = cells.clone();
            cells.values_mut().for_each(BreakdownCell::finish);
            BreakdownMonth {
                month,
                label: month.label(),
                cells,
            }
        })
        .collect();

    Ok(Breakdown {
        dimension,
        values: values.into_iter().collect(),
        months,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentArrRow {
    pub segment: String,
    pub won_arr: f64,
    pub lost_arr: f64,
    pub net_arr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentArr {
    pub range: DayRange,
    /// Sorted by net ARR, largest first.
    pub segments: Vec<SegmentArrRow>,
    pub won_arr: f64,
    pub lost_arr: f64,
    pub net_arr: f64,
}

/// Won and lost ARR per segment for deals closed in the last 90 days.
pub fn segment_arr(data: &Dataset, as_of: NaiveDate) -> Result<SegmentArr> {
    let accounts = data.accounts()?;
    let range = DayRange::trailing_days(as_of, RECENT_DAYS);
    let mut by_segment: BTreeMap<String, (f64, f64)> = BTreeMap::new();

    for r in accounts {
        if !r.date(fields::CLOSED_DATE).map_or(false, |d| range.contains(d)) {
            continue;
        }
        let arr = r.amount(fields::ARR);
        match StageRule::CUSTOMER_ONLY.classify(r.stage().as_deref()) {
            Outcome::Won => by_segment.entry(r.category(fields::SEGMENT)).or_default().0 += arr,
            Outcome::Lost => by_segment.entry(r.category(fields::SEGMENT)).or_default().1 += arr,
            Outcome::Open => {}
        }
    }

    let mut segments: Vec<SegmentArrRow> = by_segment
        .into_iter()
        .map(|(segment, (won, lost))| SegmentArrRow {
            segment,
            won_arr: won,
            lost_arr: lost,
            net_arr: won - lost,
        })
        .collect();
    segments.sort_by(|a, b| b.net_arr.total_cmp(&a.net_arr));

    let won_arr: f64 = segments.iter().map(|s| s.won_arr).sum();
    let lost_arr: f64 = segments.iter().map(|s| s.lost_arr).sum();
    Ok(SegmentArr {
        range,
        segments,
        won_arr,
        lost_arr,
        net_arr: won_arr - lost_arr,
    })
}

/// Tile names, in display order.
pub mod tiles {
    pub const AVG_WON_ARR_L90: &str = "avg_won_arr_l90";
    pub const AVG_OPEN_PIPELINE_ARR: &str = "avg_open_pipeline_arr";
    pub const WON_ARR_LAST_QUARTER: &str = "won_arr_last_quarter";
    pub const AVG_SALES_CYCLE_DAYS_L90: &str = "avg_sales_cycle_days_l90";
    pub const EXPECTED_CLOSED_ARR: &str = "expected_closed_arr";
}

/// Headline numbers shown above the sales charts.
pub fn summary_tiles(data: &Dataset, as_of: NaiveDate) -> Result<Vec<DerivedMetric>> {
    let accounts = data.accounts()?;
    let recent = DayRange::trailing_days(as_of, RECENT_DAYS);
    let last_quarter = DayRange::previous_months(as_of, 3);
    let rule = StageRule::CUSTOMER_ONLY;
    let is_won = |r: &Record| rule.classify(r.stage().as_deref()) == Outcome::Won;
    let closed_in = |r: &Record, range: &DayRange| {
        r.date(fields::CLOSED_DATE).map_or(false, |d| range.contains(d))
    };

    let avg_won_arr_l90 = mean(
        accounts
            .iter()
            .filter(|r| is_won(r) && closed_in(r, &recent))
            .filter_map(|r| r.number(fields::ARR)),
    );

    let avg_open_pipeline_arr = mean(
        accounts
            .iter()
            .filter(|r| !r.has(fields::CLOSED_DATE))
            .filter_map(|r| r.number(fields::ARR)),
    );

    let won_arr_last_quarter: f64 = accounts
        .iter()
        .filter(|r| is_won(r) && closed_in(r, &last_quarter))
        .filter_map(|r| r.number(fields::ARR))
        .sum();

    let avg_sales_cycle_days_l90 = mean(accounts.iter().filter_map(|r| {
        let closed = r.date(fields::CLOSED_DATE).filter(|d| recent.contains(*d))?;
        let created = r.date(fields::CREATED_DATE)?;
        Some(days_between(created, closed) as f64)
    }))
    .round();

    let recent_months = MonthWindow::trailing(as_of, 3);
    let avg_recent_won_arr = mean(
        accounts
            .iter()
            .filter(|r| is_won(r))
            .filter(|r| r.date(fields::CLOSED_DATE).map_or(false, |d| recent_months.contains_date(d)))
            .map(|r| r.amount(fields::ARR)),
    );
    let forecast = qualification_forecast(accounts, as_of);
    let expected_closed_arr =
        metrics::round_to(forecast.value_at(avg_recent_won_arr) * EXPECTED_CLOSE_RATE, 1.0);

    Ok(vec![
        DerivedMetric::new(tiles::AVG_WON_ARR_L90, avg_won_arr_l90),
        DerivedMetric::new(tiles::AVG_OPEN_PIPELINE_ARR, avg_open_pipeline_arr),
        DerivedMetric::new(tiles::WON_ARR_LAST_QUARTER, won_arr_last_quarter),
        DerivedMetric::new(tiles::AVG_SALES_CYCLE_DAYS_L90, avg_sales_cycle_days_l90),
        DerivedMetric::new(tiles::EXPECTED_CLOSED_ARR, expected_closed_arr),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sheets;
    use crate::record::stage::{CHURNED, CLOSED_LOST, CUSTOMER, WARM};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn as_of() -> NaiveDate {
        ymd(2025, 3, 31)
    }

    fn accounts(rows: Vec<Record>) -> Dataset {
        Dataset::new().with_sheet(sheets::ACCOUNTS, rows)
    }

    fn deal(stage: &str, qualified: &str, closed: &str) -> Record {
        Record::new()
            .with(fields::STAGE, stage)
            .with(fields::QUALIFIED_DATE, qualified)
            .with(fields::CLOSED_DATE, closed)
    }

    fn tile(tiles: &[DerivedMetric], name: &str) -> f64 {
        tiles
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value)
            .unwrap_or(f64::NAN)
    }

    #[test]
    fn win_rate_counts_closed_qualified_accounts() -> Result<()> {
        let data = accounts(vec![
            deal(CUSTOMER, "2025-01-02", "2025-03-03"),
            deal(CUSTOMER, "2025-01-02", "2025-03-09"),
            deal(CLOSED_LOST, "2025-01-02", "2025-03-10"),
            deal(CUSTOMER, "2024-11-02", "2025-02-10"),
            // churned is neither won nor lost here
            deal(CHURNED, "2024-11-02", "2025-02-11"),
            // no qualified date: ignored entirely
            Record::new().with(fields::STAGE, CUSTOMER).with(fields::CLOSED_DATE, "2025-03-01"),
            // won but closed before the window
            deal(CUSTOMER, "2023-01-02", "2023-02-02"),
        ]);
        let w = win_rate_by_month(&data, as_of())?;
        assert_eq!(w.months.len(), TREND_MONTHS);
        let march = w.months.last().unwrap();
        assert_eq!((march.wins, march.losses), (2, 1));
        assert_eq!(march.win_rate, 67.0);
        let feb = &w.months[11];
        assert_eq!((feb.wins, feb.losses, feb.win_rate), (1, 0, 100.0));
        assert_eq!(w.months[0].win_rate, 0.0);

        assert_eq!(w.totals.total, 7);
        assert_eq!(w.totals.qualified, 6);
        assert_eq!(w.totals.open, 1);
        assert_eq!((w.totals.wins, w.totals.losses), (3, 1));
        Ok(())
    }

    #[test]
    fn cycle_time_by_qualified_and_closed_month() -> Result<()> {
        let data = accounts(vec![
            deal(CUSTOMER, "2025-01-01", "2025-01-11"),
            deal(CLOSED_LOST, "2025-01-10", "2025-03-01"),
            deal(CUSTOMER, "2025-03-01", "2025-03-04"),
            Record::new().with(fields::QUALIFIED_DATE, "2025-01-05"),
        ]);
        let trend = cycle_time_trend(&data, as_of())?;
        assert_eq!(trend.len(), TREND_MONTHS);
        let jan = &trend[10];
        assert_eq!(jan.label, "Jan 2025");
        // (10 + 50) / 2
        assert_eq!(jan.by_qualified_month, Some(30.0));
        assert_eq!(jan.qualified_deals, 2);
        assert_eq!(jan.by_closed_month, Some(10.0));
        let feb = &trend[11];
        assert_eq!((feb.by_qualified_month, feb.by_closed_month), (None, None));
        let march = &trend[12];
        assert_eq!(march.by_qualified_month, Some(3.0));
        // (50 + 3) / 2 = 26.5
        assert_eq!(march.by_closed_month, Some(27.0));
        Ok(())
    }

    #[test]
    fn segment_breakdown() -> Result<()> {
        let data = accounts(vec![
            deal(CUSTOMER, "2025-03-01", "2025-03-21")
                .with(fields::CREATED_DATE, "2025-01-20")
                .with(fields::SEGMENT, "SMB"),
            deal(CUSTOMER, "2025-03-05", "2025-03-15")
                .with(fields::CREATED_DATE, "2025-03-05")
                .with(fields::SEGMENT, "SMB"),
            deal(CLOSED_LOST, "2025-03-07", "2025-03-20").with(fields::SEGMENT, "SMB"),
            deal(WARM, "2025-03-08", "").with(fields::SEGMENT, "SMB"),
            // lost without a closed date is not counted as lost
            Record::new()
                .with(fields::STAGE, CLOSED_LOST)
                .with(fields::QUALIFIED_DATE, "2025-02-01"),
            // outside the six months but still lists its segment
            deal(CUSTOMER, "2024-01-01", "2024-02-01").with(fields::SEGMENT, "Enterprise"),
        ]);
        let b = breakdown(&data, as_of(), Dimension::Segment)?;
        assert_eq!(b.months.len(), BREAKDOWN_MONTHS);
        assert_eq!(b.values, vec!["Enterprise", "SMB", "Unknown"]);

        let march = MonthKey::new(2025, 3).unwrap();
        let smb = b.cell(march, "SMB").unwrap();
        assert_eq!((smb.qualified, smb.won, smb.lost), (4, 2, 1));
        assert!((smb.win_rate - 66.666_666).abs() < 1e-3);
        // created→closed: 60 and 10
        assert_eq!(smb.avg_cycle_days, 35.0);
        // qualified→closed: 20 and 10
        assert_eq!(smb.avg_close_days, 15.0);

        let feb = MonthKey::new(2025, 2).unwrap();
        let unknown = b.cell(feb, "Unknown").unwrap();
        assert_eq!((unknown.qualified, unknown.lost, unknown.win_rate), (1, 0, 0.0));
        assert!(b.cell(feb, "SMB").is_none());
        Ok(())
    }

    #[test]
    fn territory_breakdown_reads_territory_column() -> Result<()> {
        let data = accounts(vec![deal(CUSTOMER, "2025-03-01", "2025-03-02")
            .with(fields::TERRITORY, "EMEA")
            .with(fields::SEGMENT, "SMB")]);
        let b = breakdown(&data, as_of(), Dimension::Territory)?;
        assert_eq!(b.values, vec!["EMEA"]);
        let cell = b.cell(MonthKey::new(2025, 3).unwrap(), "EMEA").unwrap();
        assert_eq!((cell.won, cell.avg_close_days, cell.avg_cycle_days), (1, 1.0, 0.0));
        Ok(())
    }

    #[test]
    fn segment_arr_sorted_by_net() -> Result<()> {
        let data = accounts(vec![
            deal(CUSTOMER, "", "2025-03-01").with(fields::SEGMENT, "SMB").with(fields::ARR, 10_000.0),
            deal(CLOSED_LOST, "", "2025-02-01").with(fields::SEGMENT, "SMB").with(fields::ARR, 15_000.0),
            deal(CUSTOMER, "", "2025-01-15").with(fields::SEGMENT, "Enterprise").with(fields::ARR, 50_000.0),
            deal(CUSTOMER, "", "2025-01-10").with(fields::ARR, 1_000.0),
            // 2024-12-31 is exactly 90 days back and excluded
            deal(CUSTOMER, "", "2024-12-31").with(fields::SEGMENT, "Enterprise").with(fields::ARR, 9e6),
        ]);
        let s = segment_arr(&data, as_of())?;
        let order: Vec<&str> = s.segments.iter().map(|r| r.segment.as_str()).collect();
        assert_eq!(order, vec!["Enterprise", "Unknown", "SMB"]);
        assert_eq!(s.segments[2].net_arr, -5_000.0);
        assert_eq!((s.won_arr, s.lost_arr, s.net_arr), (61_000.0, 15_000.0, 46_000.0));
        Ok(())
    }

    #[test]
    fn summary_tiles_cover_recent_activity() -> Result<()> {
        let mut rows = vec![
            // won in the last 90 days
            deal(CUSTOMER, "2025-01-02", "2025-03-10")
                .with(fields::CREATED_DATE, "2025-01-09")
                .with(fields::ARR, 30_000.0),
            deal(CUSTOMER, "2025-01-02", "2025-02-10")
                .with(fields::CREATED_DATE, "2024-12-10")
                .with(fields::ARR, 10_000.0),
            // lost in the last 90 days: only counts towards cycle time
            deal(CLOSED_LOST, "2025-01-02", "2025-01-31")
                .with(fields::CREATED_DATE, "2025-01-01")
                .with(fields::ARR, 99_000.0),
            // open pipeline
            Record::new().with(fields::STAGE, WARM).with(fields::ARR, 4_000.0),
            Record::new().with(fields::STAGE, WARM).with(fields::ARR, "6,000"),
            Record::new().with(fields::STAGE, WARM),
        ];
        // 12 qualifications in each of Jan..Mar 2025
        for m in 1..=3 {
            for d in 1..=12 {
                rows.push(Record::new().with(fields::QUALIFIED_DATE, format!("2025-{:02}-{:02}", m, d)));
            }
        }
        let tiles = summary_tiles(&accounts(rows), as_of())?;
        assert_eq!(tiles.len(), 5);
        assert_eq!(tile(&tiles, tiles::AVG_WON_ARR_L90), 20_000.0);
        assert_eq!(tile(&tiles, tiles::AVG_OPEN_PIPELINE_ARR), 5_000.0);
        // Dec 2024 through Feb 2025
        assert_eq!(tile(&tiles, tiles::WON_ARR_LAST_QUARTER), 10_000.0);
        // (60 + 62 + 30) / 3
        assert_eq!(tile(&tiles, tiles::AVG_SALES_CYCLE_DAYS_L90), 51.0);
        // qualifications: 39 in Jan..Mar (36 + 3 deals), avg3 = 13, avg12 = 3.25 → round(24.375) = 24
        // 24 × 20 000 × 0.4
        assert_eq!(tile(&tiles, tiles::EXPECTED_CLOSED_ARR), 192_000.0);
        Ok(())
    }

    #[test]
    fn panels_need_the_accounts_sheet() {
        let empty = Dataset::new();
        assert!(win_rate_by_month(&empty, as_of()).is_err());
        assert!(summary_tiles(&empty, as_of()).is_err());
        assert!(breakdown(&empty, as_of(), Dimension::Segment).is_err());
    }
}
