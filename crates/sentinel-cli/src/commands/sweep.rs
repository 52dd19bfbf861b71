//! `sentinel sweep <file> --from <rfc3339> --to <rfc3339> --step <duration>`
//! (C10, §4.10 stepped sweep).

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use sentinel_simulator::SweepConfig;

use super::load_definition;
use crate::simulator_setup::build_simulator;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Path to a YAML or JSON signal definition.
    pub file: PathBuf,
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
    /// Step between sample points (Sentinel duration grammar, e.g. `1h`).
    #[arg(long)]
    pub step: String,
    #[arg(long, env = "SENTINEL_EVENT_INDEX_URL", default_value = "http://127.0.0.1:8090/v1/graphql")]
    pub event_index_url: String,
}

pub async fn run(args: &SweepArgs) -> Result<()> {
    let def = load_definition(&args.file)?;
    let compiled = sentinel_rules::compile(&def.scope, def.window.as_deref(), def.logic, &def.dsl)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let start: DateTime<Utc> = args.from.parse().with_context(|| format!("parsing `--from {}`", args.from))?;
    let end: DateTime<Utc> = args.to.parse().with_context(|| format!("parsing `--to {}`", args.to))?;
    let step_ms = sentinel_core::parse_duration(&args.step).map_err(|e| anyhow::anyhow!("{e}"))?;

    let simulator = build_simulator(&args.event_index_url);
    let result = simulator
        .sweep(
            &compiled.ast,
            &compiled.scope,
            compiled.window.as_deref(),
            start,
            end,
            step_ms,
            SweepConfig::default(),
        )
        .await;

    if result.truncated {
        eprintln!(
            "warning: sweep truncated at {} points (--step too fine for the requested range)",
            result.points.len()
        );
    }
    for point in &result.points {
        println!(
            "{}\ttriggered={}\tconclusive={}",
            point.evaluated_at.to_rfc3339(),
            point.triggered,
            point.conclusive
        );
    }
    Ok(())
}
