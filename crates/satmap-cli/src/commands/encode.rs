//! Encode command implementation.

use std::fs;

use anyhow::{Context, Result};
use console::style;

use satmap_compile::wcnf;

use super::common::{build_mapper, load_circuit, load_config};
use crate::TargetArgs;

/// Execute the encode command.
pub fn execute(input: &str, target: &TargetArgs, output: Option<&str>) -> Result<()> {
    let circuit = load_circuit(input)?;
    let config = load_config(target)?;
    let (mapper, _) = build_mapper(target, config, "builtin", "builtin")?;

    let instance = mapper
        .encode_single(&circuit)
        .context("Encoding failed")?;
    let text = wcnf::render(&instance);

    match output {
        Some(path) => {
            fs::write(path, &text).with_context(|| format!("Failed to write file: {path}"))?;
            eprintln!(
                "{} {} variables, {} hard and {} soft clauses written to {}",
                style("✓").green().bold(),
                instance.num_vars(),
                instance.hard.len(),
                instance.soft.len(),
                style(path).green()
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}
