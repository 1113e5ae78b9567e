use anyhow::{Context, Result};
use clap::Parser;
use funnelcast::{
    build_report,
    config::{CliArgs, DashboardConfig},
    logging,
};
use std::{fs, io::Write};
use tracing::{info, warn};

fn main() -> Result<()> {
    // ─── 1) config + logging ─────────────────────────────────────────
    let args = CliArgs::parse();
    let cfg = DashboardConfig::resolve(&args)?;
    logging::init(&cfg.log_filter);
    let as_of = cfg.as_of();
    info!(%as_of, "startup");

    // ─── 2) load once, compute every panel ───────────────────────────
    let source = cfg.source();
    let report = build_report(&source, as_of);
    let missing = report.unavailable_panels();
    if !missing.is_empty() {
        warn!(?missing, "some panels are unavailable");
    }

    // ─── 3) emit ─────────────────────────────────────────────────────
    let json = serde_json::to_string_pretty(&report).context("serializing report")?;
    match &args.out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
