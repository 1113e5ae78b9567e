// src/config.rs
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::source::{RecordSource, SnapshotSource, SyntheticSource, WorkbookSource};

pub const DEFAULT_WORKBOOK: &str = "data/crm_data.xlsx";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyntheticConfig {
    pub accounts: usize,
    #[serde(default)]
    pub seed: u64,
}

/// Dashboard settings, read from YAML and then overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub workbook: PathBuf,
    /// Takes precedence over `workbook`.
    pub snapshot: Option<PathBuf>,
    /// Takes precedence over both files.
    pub synthetic: Option<SyntheticConfig>,
    /// Reference date for every panel; today when unset.
    pub as_of: Option<NaiveDate>,
    pub log_filter: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            workbook: PathBuf::from(DEFAULT_WORKBOOK),
            snapshot: None,
            synthetic: None,
            as_of: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        // an empty document means "all defaults"
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("invalid dashboard config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// File named by `--config` (if any) with the remaining flags applied on top.
    pub fn resolve(args: &CliArgs) -> Result<Self> {
        let mut cfg = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        cfg.apply(args);
        debug!(?cfg, "resolved config");
        Ok(cfg)
    }

    pub fn apply(&mut self, args: &CliArgs) {
        if let Some(d) = args.as_of {
            self.as_of = Some(d);
        }
        if let Some(p) = &args.workbook {
            self.workbook = p.clone();
        }
        if let Some(p) = &args.snapshot {
            self.snapshot = Some(p.clone());
        }
        if let Some(n) = args.synthetic {
            let seed = args
                .seed
                .or(self.synthetic.map(|s| s.seed))
                .unwrap_or_default();
            self.synthetic = Some(SyntheticConfig { accounts: n, seed });
        } else if let (Some(seed), Some(s)) = (args.seed, self.synthetic.as_mut()) {
            s.seed = seed;
        }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Synthetic beats snapshot beats workbook.
    pub fn source(&self) -> Box<dyn RecordSource> {
        if let Some(s) = self.synthetic {
            Box::new(SyntheticSource::new(s.accounts, s.seed, self.as_of()))
        } else if let Some(p) = &self.snapshot {
            Box::new(SnapshotSource::new(p))
        } else {
            Box::new(WorkbookSource::new(&self.workbook))
        }
    }
}

/// Flags shared by the binaries. Every flag is optional.
#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(version, about = "Sales funnel dashboard over a CRM snapshot")]
pub struct CliArgs {
    /// YAML config file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Reference date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub as_of: Option<NaiveDate>,

    /// Spreadsheet with Accounts, Contacts and Campaigns sheets
    #[arg(long)]
    pub workbook: Option<PathBuf>,

    /// JSON snapshot; takes precedence over --workbook
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Generate this many synthetic accounts instead of reading a file
    #[arg(long)]
    pub synthetic: Option<usize>,

    /// Seed for --synthetic
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output path
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Bare arguments, in order
    pub positional: Vec<String>,
}
