//! `sentinel simulate <file> --at <rfc3339>` (C10, §4.10 point evaluation).

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use super::load_definition;
use crate::simulator_setup::build_simulator;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Path to a YAML or JSON signal definition.
    pub file: PathBuf,
    /// Timestamp to evaluate as if it were "now" (RFC 3339).
    #[arg(long)]
    pub at: String,
    /// Event-index GraphQL endpoint.
    #[arg(long, env = "SENTINEL_EVENT_INDEX_URL", default_value = "http://127.0.0.1:8090/v1/graphql")]
    pub event_index_url: String,
}

pub async fn run(args: &SimulateArgs) -> Result<()> {
    let def = load_definition(&args.file)?;
    let compiled = sentinel_rules::compile(&def.scope, def.window.as_deref(), def.logic, &def.dsl)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let at: DateTime<Utc> = args.at.parse().with_context(|| format!("parsing `--at {}`", args.at))?;

    let simulator = build_simulator(&args.event_index_url);
    let result = simulator.evaluate_point(&compiled.ast, &compiled.scope, compiled.window.as_deref(), at).await;

    println!("{}", serde_json::to_string_pretty(&SimulateOutput::from(result))?);
    Ok(())
}

#[derive(serde::Serialize)]
struct SimulateOutput {
    triggered: bool,
    conclusive: bool,
    error: Option<String>,
    evaluated_at: DateTime<Utc>,
    current_block: u64,
    window_start_block: u64,
    left: Option<f64>,
    right: Option<f64>,
}

impl From<sentinel_simulator::PointResult> for SimulateOutput {
    fn from(r: sentinel_simulator::PointResult) -> Self {
        Self {
            triggered: r.triggered,
            conclusive: r.conclusive,
            error: r.error,
            evaluated_at: r.evaluated_at,
            current_block: r.current_block,
            window_start_block: r.window_start_block,
            left: r.diagnostic.map(|d| d.left),
            right: r.diagnostic.map(|d| d.right),
        }
    }
}
