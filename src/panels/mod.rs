// src/panels/mod.rs
pub mod leadgen;
pub mod sales;

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Result of computing one dashboard panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum PanelOutcome<T> {
    Ready(T),
    Unavailable { reason: String },
}

impl<T> PanelOutcome<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        PanelOutcome::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PanelOutcome::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            PanelOutcome::Ready(v) => Some(v),
            PanelOutcome::Unavailable { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            PanelOutcome::Ready(_) => None,
            PanelOutcome::Unavailable { reason } => Some(reason),
        }
    }
}

/// Run one panel, turning its error into an `Unavailable` outcome.
pub fn run_panel<T, F>(name: &str, compute: F) -> PanelOutcome<T>
where
    F: FnOnce() -> Result<T>,
{
    match compute() {
        Ok(v) => {
            debug!(panel = name, "panel ready");
            PanelOutcome::Ready(v)
        }
        Err(e) => {
            let reason = format!("{:#}", e);
            warn!(panel = name, error = %reason, "panel unavailable");
            PanelOutcome::unavailable(reason)
        }
    }
}

/// Weighted edge of a flow (sankey) diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowLink {
    pub source: String,
    pub target: String,
    pub value: u32,
}

/// Nodes and links of a flow diagram. Links are sorted by (source, target).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowGraph {
    pub nodes: Vec<String>,
    pub links: Vec<FlowLink>,
}

impl FlowGraph {
    pub fn link(&self, source: &str, target: &str) -> u32 {
        self.links
            .iter()
            .find(|l| l.source == source && l.target == target)
            .map_or(0, |l| l.value)
    }

    pub fn total(&self) -> u32 {
        self.links.iter().map(|l| l.value).sum()
    }
}

/// Counts transitions, then freezes them into a [`FlowGraph`].
#[derive(Debug, Default)]
pub struct FlowBuilder {
    counts: BTreeMap<(String, String), u32>,
}

impl FlowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: impl Into<String>, target: impl Into<String>) {
        *self.counts.entry((source.into(), target.into())).or_default() += 1;
    }

    /// `fixed_nodes` are listed first even when no link touches them.
    pub fn finish(self, fixed_nodes: &[&str]) -> FlowGraph {
        let mut nodes: Vec<String> = fixed_nodes.iter().map(|n| n.to_string()).collect();
        let mut links = Vec::with_capacity(self.counts.len());
        for ((source, target), value) in self.counts {
            for n in [&source, &target] {
                if !nodes.contains(n) {
                    nodes.push(n.clone());
                }
            }
            links.push(FlowLink {
                source,
                target,
                value,
            });
        }
        FlowGraph { nodes, links }
    }
}
