//! Stats command: audit store row counts and accumulated import counters.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial stats command

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::db::store::StoreCounts;
use crate::output::OutputControls;

#[derive(Debug, Serialize)]
struct Stats {
    store: String,
    counts: StoreCounts,
    metrics: BTreeMap<String, i64>,
}

pub fn run(config: &EngineConfig, output: &OutputControls) -> Result<()> {
    let store = super::open_store(config)?;
    let stats = Stats {
        store: config.store.display().to_string(),
        counts: store.counts().context("Failed to count rows")?,
        metrics: store.metrics().context("Failed to read import metrics")?,
    };

    if output.json {
        output.print(&stats);
        return Ok(());
    }

    println!("Audit store: {}", stats.store);
    println!("{}", "-".repeat(50));
    println!("Messages:    {}", stats.counts.messages);
    println!("Attachments: {}", stats.counts.attachments);
    println!("Threads:     {}", stats.counts.threads);
    if !stats.metrics.is_empty() {
        println!();
        println!("Import counters:");
        for (name, value) in &stats.metrics {
            println!("  {:<22} {}", name, value);
        }
    }
    Ok(())
}
