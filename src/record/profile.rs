use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{Dataset, Value};
use crate::dates;

/// How the cells of one column are encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    pub present: usize,
    pub text: usize,
    pub number: usize,
    pub date: usize,
    pub other: usize,
    /// Cells that normalize to a calendar date; only tracked for date columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_dates: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetProfile {
    pub rows: usize,
    pub columns: BTreeMap<String, ColumnProfile>,
}

/// Columns named like "... Date" are expected to hold dates.
pub fn is_date_column(header: &str) -> bool {
    header.trim().to_ascii_lowercase().ends_with("date")
}

/// Per-sheet column encodings and date parse coverage.
pub fn profile(data: &Dataset) -> BTreeMap<String, SheetProfile> {
    let mut out = BTreeMap::new();
    for name in data.sheet_names() {
        let Ok(rows) = data.sheet(name) else { continue };
        let mut columns: BTreeMap<String, ColumnProfile> = BTreeMap::new();
        for row in rows {
            for (header, value) in row.iter() {
                let col = columns.entry(header.to_string()).or_default();
                col.present += 1;
                match value {
                    Value::Text(_) => col.text += 1,
                    Value::Number(_) => col.number += 1,
                    Value::Date(_) | Value::DateTime(_) => col.date += 1,
                    Value::Empty | Value::Bool(_) => col.other += 1,
                }
                if is_date_column(header) {
                    let parsed = col.parsed_dates.get_or_insert(0);
                    if dates::normalize(value).is_some() {
                        *parsed += 1;
                    }
                }
            }
        }
        for (header, col) in &columns {
            if let Some(parsed) = col.parsed_dates {
                if parsed < col.present {
                    warn!(sheet = name, column = %header, unparsed = col.present - parsed, "unparseable dates");
                }
            }
        }
        debug!(sheet = name, rows = rows.len(), columns = columns.len(), "profiled sheet");
        out.insert(
            name.to_string(),
            SheetProfile {
                rows: rows.len(),
                columns,
            },
        );
    }
    out
}
