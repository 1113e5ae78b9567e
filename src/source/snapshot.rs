use anyhow::{Context, Result};
use serde_json::Map;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use super::RecordSource;
use crate::record::{Dataset, Record, Value};

type RawSheets = BTreeMap<String, Vec<Map<String, serde_json::Value>>>;

/// A JSON snapshot: `{ "Accounts": [ { "Stage": "4 - Customer", ... } ], ... }`.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for SnapshotSource {
    fn describe(&self) -> String {
        format!("snapshot {}", self.path.display())
    }

    #[tracing::instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<Dataset> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("reading snapshot {}", self.path.display()))?;
        let data = parse_snapshot(&text)
            .with_context(|| format!("parsing snapshot {}", self.path.display()))?;
        info!(rows = data.total_rows(), "snapshot loaded");
        Ok(data)
    }
}

pub fn parse_snapshot(text: &str) -> Result<Dataset> {
    let raw: RawSheets = serde_json::from_str(text)?;
    let mut data = Dataset::new();
    for (name, rows) in raw {
        let records: Vec<Record> = rows
            .into_iter()
            .map(|row| row.into_iter().map(|(k, v)| (k, Value::from(v))).collect::<Record>())
            .filter(|r| !r.is_empty())
            .collect();
        debug!(sheet = %name, rows = records.len(), "snapshot sheet");
        data.insert_sheet(&name, records);
    }
    Ok(data)
}

/// Dump a dataset as a pretty JSON snapshot. Dates are written as `YYYY-MM-DD`.
pub fn write_snapshot(data: &Dataset, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("serializing snapshot")?;
    fs::write(path, json).with_context(|| format!("writing snapshot {}", path.display()))?;
    Ok(())
}
