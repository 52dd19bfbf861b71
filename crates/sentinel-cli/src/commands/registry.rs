//! `sentinel registry list` (C1, §6.6).

use anyhow::Result;
use clap::{Args, Subcommand};
use sentinel_core::METRIC_REGISTRY;

#[derive(Args, Debug)]
pub struct RegistryArgs {
    #[command(subcommand)]
    pub command: RegistryCommand,
}

#[derive(Subcommand, Debug)]
pub enum RegistryCommand {
    /// List known metric names, optionally filtered.
    List {
        /// Restrict to metrics under this protocol prefix (e.g. `Morpho`).
        #[arg(long)]
        protocol: Option<String>,
        /// Restrict to metrics of this kind (`state`, `computed`, `event`, `chained_event`).
        #[arg(long)]
        kind: Option<String>,
    },
}

pub fn run(args: &RegistryArgs) -> Result<()> {
    let RegistryCommand::List { protocol, kind } = &args.command;

    const KINDS: [&str; 4] = ["state", "computed", "event", "chained_event"];

    let mut names: Vec<&'static str> = match (protocol.as_deref(), kind.as_deref()) {
        (Some(protocol), Some(kind)) => METRIC_REGISTRY
            .list_by_protocol(protocol)
            .into_iter()
            .filter(|name| METRIC_REGISTRY.list_by_kind(kind).contains(name))
            .collect(),
        (Some(protocol), None) => METRIC_REGISTRY.list_by_protocol(protocol),
        (None, Some(kind)) => METRIC_REGISTRY.list_by_kind(kind),
        (None, None) => KINDS.iter().flat_map(|k| METRIC_REGISTRY.list_by_kind(k)).collect(),
    };

    names.sort_unstable();
    for name in names {
        println!("{name}");
    }
    Ok(())
}
