use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use super::RecordSource;
use crate::dates::{date_to_serial, serial_to_date};
use crate::record::{sheets, Dataset, Record, Value};

/// A CRM workbook on disk (xlsx, xls, xlsb or ods).
#[derive(Debug, Clone)]
pub struct WorkbookSource {
    path: PathBuf,
}

impl WorkbookSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for WorkbookSource {
    fn describe(&self) -> String {
        format!("workbook {}", self.path.display())
    }

    #[tracing::instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Dataset> {
        load_workbook(&self.path)
    }
}

/// Open `path` and turn each known sheet into records keyed by the header row.
/// Sheets missing from the file are left out of the dataset.
pub fn load_workbook(path: &Path) -> Result<Dataset> {
    if !path.is_file() {
        return Err(anyhow!("workbook not found: {}", path.display()));
    }
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| anyhow!("failed to open workbook {}: {}", path.display(), e))?;
    let available: HashSet<String> = workbook.sheet_names().into_iter().collect();

    let mut data = Dataset::new();
    for name in sheets::ALL {
        if !available.contains(name) {
            warn!(sheet = name, "sheet missing from workbook");
            continue;
        }
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| anyhow!("failed to read sheet `{}`: {}", name, e))?;

        let mut rows = range.rows();
        let headers: Vec<Option<String>> = match rows.next() {
            Some(header_row) => header_row.iter().map(header_text).collect(),
            None => Vec::new(),
        };

        let mut records = Vec::new();
        for row in rows {
            let record: Record = headers
                .iter()
                .zip(row.iter())
                .filter_map(|(h, cell)| Some((h.clone()?, cell_value(cell)?)))
                .collect();
            if !record.is_empty() {
                records.push(record);
            }
        }
        debug!(sheet = name, columns = headers.len(), rows = records.len(), "sheet decoded");
        data.insert_sheet(name, records);
    }

    info!(rows = data.total_rows(), "workbook loaded");
    Ok(data)
}

fn header_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::String(s) | Data::DateTimeIso(s) => s.trim().to_string(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => String::new(),
    };
    (!text.is_empty()).then_some(text)
}

/// Map one calamine cell to a loose value. Date-formatted cells become native dates.
fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(Value::Text(s.clone())),
        Data::Int(n) => Some(Value::Number(*n as f64)),
        Data::Float(f) => Some(Value::Number(*f)),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            Some(serial_to_date(serial).map_or(Value::Number(serial), Value::Date))
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::Text(s.clone())),
        Data::Error(e) => {
            debug!(error = ?e, "skipping error cell");
            None
        }
    }
}

/// Column order for a sheet: headers in order of first appearance.
fn collect_headers(rows: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for r in rows {
        for h in r.headers() {
            if seen.insert(h.to_string()) {
                out.push(h.to_string());
            }
        }
    }
    out
}

/// Write every sheet of `data` to an xlsx file. Dates are stored as serial numbers.
pub fn write_workbook(data: &Dataset, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    for name in data.sheet_names() {
        let rows = data.sheet(name)?;
        let headers = collect_headers(rows);
        let sheet = workbook.add_worksheet();
        sheet
            .set_name(name)
            .with_context(|| format!("naming sheet `{}`", name))?;

        for (c, h) in headers.iter().enumerate() {
            sheet.write_string(0, c as u16, h.as_str())?;
        }
        for (r, record) in rows.iter().enumerate() {
            let row = r as u32 + 1;
            for (c, h) in headers.iter().enumerate() {
                let col = c as u16;
                match record.get(h) {
                    Some(Value::Text(s)) => {
                        sheet.write_string(row, col, s.as_str())?;
                    }
                    Some(Value::Number(n)) => {
                        sheet.write_number(row, col, *n)?;
                    }
                    Some(Value::Bool(b)) => {
                        sheet.write_boolean(row, col, *b)?;
                    }
                    Some(Value::Date(d)) => {
                        sheet.write_number(row, col, date_to_serial(*d))?;
                    }
                    Some(Value::DateTime(dt)) => {
                        let fraction =
                            dt.time().signed_duration_since(chrono::NaiveTime::MIN).num_seconds()
                                as f64
                                / 86_400.0;
                        sheet.write_number(row, col, date_to_serial(dt.date()) + fraction)?;
                    }
                    Some(Value::Empty) | None => {}
                }
            }
        }
    }
    workbook
        .save(path)
        .with_context(|| format!("writing workbook {}", path.display()))?;
    info!(path = %path.display(), rows = data.total_rows(), "workbook written");
    Ok(())
}
