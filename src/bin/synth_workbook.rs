use anyhow::{Context, Result};
use clap::Parser;
use funnelcast::{
    config::{CliArgs, DashboardConfig},
    logging,
    source::{snapshot::write_snapshot, workbook::write_workbook, SyntheticSource},
};
use std::{fs, path::PathBuf};
use tracing::info;

const DEFAULT_ACCOUNTS: usize = 500;

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let cfg = DashboardConfig::resolve(&args)?;
    logging::init(&cfg.log_filter);

    let out: PathBuf = args
        .out
        .clone()
        .or_else(|| args.positional.first().map(PathBuf::from))
        .unwrap_or_else(|| cfg.workbook.clone());
    let synthetic = cfg.synthetic.map_or((DEFAULT_ACCOUNTS, 0), |s| (s.accounts, s.seed));
    let source = SyntheticSource::new(synthetic.0, synthetic.1, cfg.as_of());
    let data = source.generate();

    if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    match out.extension().and_then(|e| e.to_str()) {
        Some("json") => write_snapshot(&data, &out)?,
        _ => write_workbook(&data, &out)?,
    }
    info!(
        path = %out.display(),
        accounts = source.accounts,
        seed = source.seed,
        as_of = %source.as_of,
        "synthetic dataset written"
    );
    Ok(())
}
