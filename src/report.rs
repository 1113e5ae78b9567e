// src/report.rs
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info};

use crate::metrics::DerivedMetric;
use crate::panels::leadgen::{self, ArrByOutcome, ConversionSpeed, ProjectedQualifiedArr};
use crate::panels::leadgen::{QualificationMonth, QualificationsForecast, QualifiedRow};
use crate::panels::sales::{self, Breakdown, CycleTimeMonth, Dimension, SegmentArr, WinRateByMonth};
use crate::panels::{run_panel, FlowGraph, PanelOutcome};
use crate::record::join::join_crm;
use crate::record::Dataset;
use crate::source::RecordSource;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadGenPanels {
    pub qualifications_forecast: PanelOutcome<QualificationsForecast>,
    pub projected_qualified_arr: PanelOutcome<ProjectedQualifiedArr>,
    pub monthly_qualifications: PanelOutcome<Vec<QualificationMonth>>,
    pub qualified_accounts: PanelOutcome<Vec<QualifiedRow>>,
    pub arr_by_outcome: PanelOutcome<Vec<ArrByOutcome>>,
    pub conversion_speed: PanelOutcome<ConversionSpeed>,
    pub conversion_flow: PanelOutcome<FlowGraph>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesPanels {
    pub summary: PanelOutcome<Vec<DerivedMetric>>,
    pub win_rate: PanelOutcome<WinRateByMonth>,
    pub cycle_time: PanelOutcome<Vec<CycleTimeMonth>>,
    pub segments: PanelOutcome<Breakdown>,
    pub territories: PanelOutcome<Breakdown>,
    pub segment_arr: PanelOutcome<SegmentArr>,
}

/// How well the CRM sheets link up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CrmOverview {
    pub accounts: usize,
    pub contacts: usize,
    pub contacts_with_account: usize,
    pub campaigns: usize,
    pub campaigns_with_contact: usize,
}

pub fn crm_overview(data: &Dataset) -> Result<CrmOverview> {
    let joined = join_crm(data)?;
    Ok(CrmOverview {
        accounts: joined.accounts.len(),
        contacts: joined.contacts.len(),
        contacts_with_account: joined.contacts.iter().filter(|c| c.account.is_some()).count(),
        campaigns: joined.campaigns.len(),
        campaigns_with_contact: joined.campaigns.iter().filter(|c| c.contact.is_some()).count(),
    })
}

/// Every panel of the dashboard, computed against one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub as_of: NaiveDate,
    pub source: String,
    pub rows_loaded: usize,
    pub lead_generation: LeadGenPanels,
    pub sales: SalesPanels,
    pub crm: PanelOutcome<CrmOverview>,
}

impl DashboardReport {
    /// Compute every panel. A panel that fails is marked unavailable on its own.
    pub fn from_dataset(data: &Dataset, as_of: NaiveDate, source: impl Into<String>) -> Self {
        let lead_generation = LeadGenPanels {
            qualifications_forecast: run_panel("qualifications_forecast", || {
                leadgen::qualifications_forecast(data, as_of)
            }),
            projected_qualified_arr: run_panel("projected_qualified_arr", || {
                leadgen::projected_qualified_arr(data, as_of)
            }),
            monthly_qualifications: run_panel("monthly_qualifications", || {
                leadgen::monthly_qualifications(data, as_of)
            }),
            qualified_accounts: run_panel("qualified_accounts", || {
                leadgen::qualified_accounts_table(data, as_of)
            }),
            arr_by_outcome: run_panel("arr_by_outcome", || leadgen::arr_by_outcome(data, as_of)),
            conversion_speed: run_panel("conversion_speed", || leadgen::conversion_speed(data)),
            conversion_flow: run_panel("conversion_flow", || leadgen::conversion_flow(data)),
        };
        let sales = SalesPanels {
            summary: run_panel("summary", || sales::summary_tiles(data, as_of)),
            win_rate: run_panel("win_rate", || sales::win_rate_by_month(data, as_of)),
            cycle_time: run_panel("cycle_time", || sales::cycle_time_trend(data, as_of)),
            segments: run_panel("segments", || {
                sales::breakdown(data, as_of, Dimension::Segment)
            }),
            territories: run_panel("territories", || {
                sales::breakdown(data, as_of, Dimension::Territory)
            }),
            segment_arr: run_panel("segment_arr", || sales::segment_arr(data, as_of)),
        };
        Self {
            as_of,
            source: source.into(),
            rows_loaded: data.total_rows(),
            lead_generation,
            sales,
            crm: run_panel("crm", || crm_overview(data)),
        }
    }

    /// A report whose panels all carry the same failure.
    pub fn unavailable(as_of: NaiveDate, source: impl Into<String>, reason: &str) -> Self {
        Self {
            as_of,
            source: source.into(),
            rows_loaded: 0,
            lead_generation: LeadGenPanels {
                qualifications_forecast: PanelOutcome::unavailable(reason),
                projected_qualified_arr: PanelOutcome::unavailable(reason),
                monthly_qualifications: PanelOutcome::unavailable(reason),
                qualified_accounts: PanelOutcome::unavailable(reason),
                arr_by_outcome: PanelOutcome::unavailable(reason),
                conversion_speed: PanelOutcome::unavailable(reason),
                conversion_flow: PanelOutcome::unavailable(reason),
            },
            sales: SalesPanels {
                summary: PanelOutcome::unavailable(reason),
                win_rate: PanelOutcome::unavailable(reason),
                cycle_time: PanelOutcome::unavailable(reason),
                segments: PanelOutcome::unavailable(reason),
                territories: PanelOutcome::unavailable(reason),
                segment_arr: PanelOutcome::unavailable(reason),
            },
            crm: PanelOutcome::unavailable(reason),
        }
    }

    /// Names of panels that could not be computed.
    pub fn unavailable_panels(&self) -> Vec<&'static str> {
        let lg = &self.lead_generation;
        let s = &self.sales;
        [
            ("qualifications_forecast", lg.qualifications_forecast.is_ready()),
            ("projected_qualified_arr", lg.projected_qualified_arr.is_ready()),
            ("monthly_qualifications", lg.monthly_qualifications.is_ready()),
            ("qualified_accounts", lg.qualified_accounts.is_ready()),
            ("arr_by_outcome", lg.arr_by_outcome.is_ready()),
            ("conversion_speed", lg.conversion_speed.is_ready()),
            ("conversion_flow", lg.conversion_flow.is_ready()),
            ("summary", s.summary.is_ready()),
            ("win_rate", s.win_rate.is_ready()),
            ("cycle_time", s.cycle_time.is_ready()),
            ("segments", s.segments.is_ready()),
            ("territories", s.territories.is_ready()),
            ("segment_arr", s.segment_arr.is_ready()),
            ("crm", self.crm.is_ready()),
        ]
        .into_iter()
        .filter(|(_, ready)| !ready)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Load `source` once and build the full report from it.
#[tracing::instrument(level = "info", skip(source), fields(source = %source.describe()))]
pub fn build_report<S: RecordSource + ?Sized>(source: &S, as_of: NaiveDate) -> DashboardReport {
    let start = Instant::now();
    let report = match source.load() {
        Ok(data) => DashboardReport::from_dataset(&data, as_of, source.describe()),
        Err(e) => {
            let reason = format!("{:#}", e);
            error!(error = %reason, "failed to load dataset");
            DashboardReport::unavailable(as_of, source.describe(), &reason)
        }
    };
    info!(
        rows = report.rows_loaded,
        unavailable = report.unavailable_panels().len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "dashboard built"
    );
    report
}
