// src/record/mod.rs
pub mod join;
pub mod profile;
pub mod stage;

pub use stage::{Outcome, StageRule};

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::dates;

/// Column headers the funnel logic reads.
pub mod fields {
    pub const ACCOUNT_ID: &str = "Account ID";
    pub const ACCOUNT_NAME: &str = "Account Name";
    pub const CONTACT_NAME: &str = "Contact Name";
    pub const CAMPAIGN_NAME: &str = "Campaign Name";
    pub const CREATED_DATE: &str = "Created Date";
    pub const WARMED_DATE: &str = "Warmed Date";
    pub const QUALIFIED_DATE: &str = "Qualified Date";
    pub const DISQUALIFIED_DATE: &str = "Disqualified Date";
    pub const CLOSED_DATE: &str = "Closed Date";
    pub const STAGE: &str = "Stage";
    pub const ARR: &str = "ARR";
    pub const SEGMENT: &str = "Segment";
    pub const TERRITORY: &str = "Territory";
}

/// Sheet names of the CRM workbook.
pub mod sheets {
    pub const ACCOUNTS: &str = "Accounts";
    pub const CONTACTS: &str = "Contacts";
    pub const CAMPAIGNS: &str = "Campaigns";

    pub const ALL: [&str; 3] = [ACCOUNTS, CONTACTS, CAMPAIGNS];
}

/// Bucket label for a missing categorical value.
pub const UNKNOWN: &str = "Unknown";

/// One loosely-typed cell.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Empty,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or_default(),
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

/// One spreadsheet row: column header → cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used by generators and tests.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Trimmed, non-empty text. Numbers are rendered so IDs stored as numbers still match.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Numeric cell, or text that reads as a plain/currency number.
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.get(field)? {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| *c != ',' && *c != '$')
                    .collect();
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    /// Monetary field with the dashboard's "missing means zero" rule.
    pub fn amount(&self, field: &str) -> f64 {
        self.number(field).unwrap_or(0.0)
    }

    /// Canonical calendar date of a field.
    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        self.get(field).and_then(dates::normalize)
    }

    /// True when the field holds anything at all (even an unparseable date).
    pub fn has(&self, field: &str) -> bool {
        self.get(field).map_or(false, |v| !v.is_empty())
    }

    /// Categorical value, defaulting to [`UNKNOWN`].
    pub fn category(&self, field: &str) -> String {
        self.text(field).unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn stage(&self) -> Option<String> {
        self.text(fields::STAGE)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().filter(|(_, v)| !v.is_empty()).collect(),
        }
    }
}

/// A snapshot of named sheets. An absent sheet differs from an empty one.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Dataset {
    sheets: BTreeMap<String, Vec<Record>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, name: &str, rows: Vec<Record>) -> Self {
        self.insert_sheet(name, rows);
        self
    }

    pub fn insert_sheet(&mut self, name: &str, rows: Vec<Record>) {
        self.sheets.insert(name.to_string(), rows);
    }

    /// Rows of `name`, or an error if the source had no such sheet.
    pub fn sheet(&self, name: &str) -> Result<&[Record]> {
        self.sheets
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("sheet `{}` not present in dataset", name))
    }

    pub fn accounts(&self) -> Result<&[Record]> {
        self.sheet(sheets::ACCOUNTS)
    }

    pub fn contacts(&self) -> Result<&[Record]> {
        self.sheet(sheets::CONTACTS)
    }

    pub fn campaigns(&self) -> Result<&[Record]> {
        self.sheet(sheets::CAMPAIGNS)
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    pub fn total_rows(&self) -> usize {
        self.sheets.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_follow_loose_typing() {
        let r = Record::new()
            .with(fields::ARR, "$12,500")
            .with(fields::STAGE, "  4 - Customer ")
            .with(fields::SEGMENT, "   ")
            .with(fields::QUALIFIED_DATE, 45000.0)
            .with(fields::ACCOUNT_ID, 1017.0);

        assert_eq!(r.number(fields::ARR), Some(12_500.0));
        assert_eq!(r.amount(fields::TERRITORY), 0.0);
        assert_eq!(r.stage().as_deref(), Some("4 - Customer"));
        assert_eq!(r.category(fields::SEGMENT), UNKNOWN);
        assert_eq!(r.category(fields::TERRITORY), UNKNOWN);
        assert_eq!(r.text(fields::ACCOUNT_ID).as_deref(), Some("1017"));
        assert_eq!(
            r.date(fields::QUALIFIED_DATE),
            NaiveDate::from_ymd_opt(2023, 3, 15)
        );
        assert!(!r.has(fields::SEGMENT));
    }

    #[test]
    fn collecting_drops_empty_cells() {
        let r: Record = vec![
            ("A".to_string(), Value::Empty),
            ("B".to_string(), Value::Text(" ".into())),
            ("C".to_string(), Value::Number(1.0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(r.len(), 1);
        assert_eq!(r.headers().collect::<Vec<_>>(), vec!["C"]);
    }

    #[test]
    fn missing_sheet_is_an_error_but_empty_sheet_is_not() {
        let ds = Dataset::new().with_sheet(sheets::ACCOUNTS, Vec::new());
        assert!(ds.accounts().unwrap().is_empty());
        let err = ds.contacts().unwrap_err();
        assert!(err.to_string().contains("Contacts"));
    }

    #[test]
    fn json_values_convert() {
        assert_eq!(Value::from(serde_json::json!(null)), Value::Empty);
        assert_eq!(Value::from(serde_json::json!(3)), Value::Number(3.0));
        assert_eq!(
            Value::from(serde_json::json!("2025-01-01")),
            Value::Text("2025-01-01".into())
        );
    }
}
