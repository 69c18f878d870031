//! Shared helpers for CLI commands.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use satmap_compile::{
    Calibration, Config, Mapper, MapperConfig, OracleConfig, ProcessOracle, ProcessRouter,
    RouterConfig, Topology,
};
use satmap_ir::Circuit;
use satmap_qasm::{emit, parse};

use crate::TargetArgs;

/// Load a circuit from an OpenQASM 2 file.
pub fn load_circuit(path: &str) -> Result<Circuit> {
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }
    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?;
    parse(&source).map_err(|e| anyhow::anyhow!("Parse error in {path}: {e}"))
}

/// Write a circuit as OpenQASM 2.
pub fn save_circuit(circuit: &Circuit, path: &str) -> Result<()> {
    let content = emit(circuit).map_err(|e| anyhow::anyhow!("Emit error: {e}"))?;
    fs::write(path, content).with_context(|| format!("Failed to write file: {path}"))
}

/// `<stem>_mapped.qasm` next to the input.
pub fn default_output(input: &str) -> String {
    let p = Path::new(input);
    let stem = p.file_stem().unwrap_or_default().to_string_lossy();
    let name = format!("{stem}_mapped.qasm");
    match p.parent().filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => dir.join(name).to_string_lossy().into_owned(),
        None => name,
    }
}

/// A named topology (`ring:5`) or a JSON adjacency matrix / edge list file.
pub fn load_topology(spec: &str) -> Result<Topology> {
    let path = Path::new(spec);
    if path.extension().is_some_and(|e| e == "json") || path.is_file() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read topology file: {spec}"))?;
        return Topology::from_json(&text).with_context(|| format!("Invalid topology file: {spec}"));
    }
    spec.parse::<Topology>()
        .with_context(|| format!("Invalid topology: '{spec}'"))
}

/// Per-edge error rates for `topology`.
pub fn load_calibration(path: &str, topology: &Topology) -> Result<Calibration> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read calibration file: {path}"))?;
    Calibration::from_json(topology, &text)
        .with_context(|| format!("Invalid calibration file: {path}"))
}

/// The configuration file (if any) with command-line overrides applied.
pub fn load_config(args: &TargetArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_path(Path::new(path))
            .with_context(|| format!("Failed to load config: {path}"))?,
        None => Config::default(),
    };
    let mapper = &mut config.mapper;
    if let Some(n) = args.slice_size {
        mapper.slice_size = n;
    }
    if let Some(n) = args.swaps {
        mapper.swaps_per_layer = n;
    }
    if let Some(secs) = args.timeout {
        mapper.time_budget = Duration::from_secs(secs);
    }
    if let Some(mode) = args.mode {
        mapper.routing = mode.into();
    }
    if let Some(layering) = args.layering {
        mapper.layering = layering.into();
    }
    if args.cyclic {
        mapper.cyclic = true;
    }
    mapper.validate()?;
    Ok(config)
}

/// Build a mapper for the target, choosing oracle and router.
///
/// `builtin` selects the in-process implementation unless the config file
/// names an external program; any other value is a program path.
pub fn build_mapper(
    args: &TargetArgs,
    config: Config,
    oracle: &str,
    router: &str,
) -> Result<(Mapper, Option<Calibration>)> {
    let topology = load_topology(&args.topology)?;
    let calibration = args
        .calibration
        .as_deref()
        .map(|path| load_calibration(path, &topology))
        .transpose()?;

    let mut mapper = Mapper::new(topology, config.mapper)?;
    if let Some(cal) = &calibration {
        mapper = mapper.with_calibration(cal.clone())?;
    }

    let oracle_config = match oracle {
        "builtin" => config.oracle,
        program => Some(OracleConfig::new(program)),
    };
    if let Some(oc) = oracle_config {
        mapper = mapper.with_oracle(ProcessOracle::new(oc));
    }

    let router_config = match router {
        "builtin" => config.router,
        program => Some(RouterConfig {
            program: program.into(),
            work_dir: None,
        }),
    };
    if let Some(rc) = router_config {
        mapper = mapper.with_router(ProcessRouter::new(rc));
    }

    Ok((mapper, calibration))
}
