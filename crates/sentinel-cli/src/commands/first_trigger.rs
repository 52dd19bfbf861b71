//! `sentinel first-trigger <file> --from <rfc3339> --to <rfc3339>` (C10,
//! §4.10 binary search).

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use super::load_definition;
use crate::simulator_setup::build_simulator;

const DEFAULT_PRECISION_MS: i64 = 60_000;

#[derive(Args, Debug)]
pub struct FirstTriggerArgs {
    /// Path to a YAML or JSON signal definition.
    pub file: PathBuf,
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
    /// Narrow the search until the window is at most this many milliseconds.
    #[arg(long, default_value_t = DEFAULT_PRECISION_MS)]
    pub precision_ms: i64,
    #[arg(long, env = "SENTINEL_EVENT_INDEX_URL", default_value = "http://127.0.0.1:8090/v1/graphql")]
    pub event_index_url: String,
}

pub async fn run(args: &FirstTriggerArgs) -> Result<()> {
    let def = load_definition(&args.file)?;
    let compiled = sentinel_rules::compile(&def.scope, def.window.as_deref(), def.logic, &def.dsl)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let start: DateTime<Utc> = args.from.parse().with_context(|| format!("parsing `--from {}`", args.from))?;
    let end: DateTime<Utc> = args.to.parse().with_context(|| format!("parsing `--to {}`", args.to))?;

    let simulator = build_simulator(&args.event_index_url);
    let result = simulator
        .first_trigger(&compiled.ast, &compiled.scope, compiled.window.as_deref(), start, end, args.precision_ms)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    match result {
        Some(at) => println!("{}", at.to_rfc3339()),
        None => {
            println!("no conclusive trigger found in [{}, {}]", args.from, args.to);
            std::process::exit(1);
        }
    }
    Ok(())
}
