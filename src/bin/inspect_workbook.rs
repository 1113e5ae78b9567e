use anyhow::{Context, Result};
use clap::Parser;
use funnelcast::{
    config::{CliArgs, DashboardConfig},
    logging,
    record::profile::profile,
    source::{RecordSource, SnapshotSource, WorkbookSource},
};
use std::path::PathBuf;
use tracing::info;

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let cfg = DashboardConfig::resolve(&args)?;
    logging::init(&cfg.log_filter);

    // an explicit path wins; otherwise whatever the config points at
    let source: Box<dyn RecordSource> = match args.positional.first().map(PathBuf::from) {
        Some(p) if p.extension().map_or(false, |e| e == "json") => Box::new(SnapshotSource::new(p)),
        Some(p) => Box::new(WorkbookSource::new(p)),
        None => cfg.source(),
    };
    info!(source = %source.describe(), "inspecting");

    let data = source.load()?;
    let report = profile(&data);
    let yaml = serde_yaml::to_string(&report).context("serializing profile")?;
    print!("{}", yaml);
    Ok(())
}
