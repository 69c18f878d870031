//! Map command implementation.

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use console::style;
use serde_json::json;

use super::common::{build_mapper, default_output, load_circuit, load_config, save_circuit};
use crate::TargetArgs;

/// Execute the map command.
pub async fn execute(
    input: &str,
    target: &TargetArgs,
    oracle: &str,
    router: &str,
    output: Option<&str>,
    report: Option<&str>,
) -> Result<()> {
    println!(
        "{} Mapping {} onto {}",
        style("→").cyan().bold(),
        style(input).green(),
        style(&target.topology).yellow()
    );

    let circuit = load_circuit(input)?;
    println!(
        "  Loaded: {} qubits, {} two-qubit gates",
        circuit.num_qubits(),
        circuit.two_qubit_ops().count()
    );

    let config = load_config(target)?;
    let (mapper, calibration) = build_mapper(target, config, oracle, router)?;
    println!(
        "  Device: {} qubits, {} edges, {:?} routing",
        mapper.topology().num_qubits(),
        mapper.topology().edges().len(),
        mapper.config().routing
    );

    let started = Instant::now();
    let result = mapper.map(&circuit).await.context("Mapping failed")?;

    println!(
        "{} Mapping complete in {:.2?}",
        style("✓").green().bold(),
        started.elapsed()
    );
    println!(
        "  Swaps: {}, chunks: {}, cost: {}",
        style(result.swap_count()).yellow(),
        result.chunks.len(),
        result.cost
    );
    if let Some(cal) = &calibration {
        println!("  Estimated fidelity: {:.6}", result.fidelity(cal)?);
    }

    let output_path = output.map_or_else(|| default_output(input), str::to_string);
    save_circuit(&result.circuit, &output_path)?;
    println!("  Output: {}", style(&output_path).green());

    if let Some(path) = report {
        let doc = json!({
            "swaps": result.swap_count(),
            "cost": result.cost,
            "initial_layout": result.initial_layout,
            "final_layout": result.final_layout,
            "swap_slots": result.swaps,
            "chunks": result.chunks,
        });
        let text = serde_json::to_string_pretty(&doc)?;
        fs::write(path, text).with_context(|| format!("Failed to write report: {path}"))?;
        println!("  Report: {}", style(path).green());
    }

    Ok(())
}
