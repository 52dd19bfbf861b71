//! `sentinel compile <file>` (C4, §6.6).

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::load_definition;

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Path to a YAML or JSON signal definition.
    pub file: PathBuf,
}

pub fn run(args: &CompileArgs) -> Result<()> {
    let def = load_definition(&args.file)?;

    match sentinel_rules::compile(&def.scope, def.window.as_deref(), def.logic, &def.dsl) {
        Ok(compiled) => {
            println!("{}", serde_json::to_string_pretty(&compiled.ast)?);
            Ok(())
        }
        Err(e) => {
            match e.field_path() {
                Some(path) => eprintln!("validation error at `{path}`: {e}"),
                None => eprintln!("validation error: {e}"),
            }
            std::process::exit(1);
        }
    }
}
