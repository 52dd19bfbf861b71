pub mod compile;
pub mod first_trigger;
pub mod registry;
pub mod simulate;
pub mod sweep;

use std::path::Path;

use anyhow::{Context, Result};
use sentinel_core::BareDefinition;

/// Load a signal definition from a YAML (default) or JSON file, detected by
/// extension.
pub fn load_definition(path: &Path) -> Result<BareDefinition> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&contents).with_context(|| format!("parsing {} as JSON", path.display()))
    } else {
        serde_yaml_ng::from_str(&contents).with_context(|| format!("parsing {} as YAML", path.display()))
    }
}
