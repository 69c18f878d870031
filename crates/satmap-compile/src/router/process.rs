//! External router program.
//!
//! The request file has three lines: the initial `(logical, physical)`
//! pairs, the target pairs, and `((i, j), distance)` for every connected
//! pair of physical qubits. The program prints `cost <float>` followed by
//! `mappings: [fromList [(q,p),...],...]`, the intermediate placements
//! between the two layouts.

use std::fmt::Write as _;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{RouteRequest, RouteResponse, Router, swaps_from_mappings};
use crate::config::RouterConfig;
use crate::error::{MapError, MapResult};
use crate::layout::Layout;
use crate::topology::Topology;

#[derive(Debug, Clone)]
pub struct ProcessRouter {
    config: RouterConfig,
}

impl ProcessRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }
}

fn pairs(layout: &Layout) -> Vec<(u32, u32)> {
    layout.iter().map(|(q, p)| (q.0, p)).collect()
}

fn pair_list(pairs: &[(u32, u32)]) -> String {
    let items: Vec<String> = pairs.iter().map(|(a, b)| format!("({a},{b})")).collect();
    format!("[{}]", items.join(","))
}

fn render_request(topology: &Topology, initial: &Layout, target: &Layout) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", pair_list(&pairs(initial)));
    let _ = writeln!(out, "{}", pair_list(&pairs(target)));
    let n = topology.num_qubits();
    let distances: Vec<String> = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .filter_map(|(i, j)| topology.distance(i, j).map(|d| format!("(({i},{j}),{d})")))
        .collect();
    let _ = writeln!(out, "[{}]", distances.join(","));
    out
}

/// Parse `[fromList [(q,p),...], ...]` into placement lists.
fn parse_mappings(text: &str) -> MapResult<Vec<Vec<(u32, u32)>>> {
    let bad = || MapError::RouterOutput(format!("bad mapping list '{text}'"));
    let body = text.replace("fromList", "");
    let mut mappings = Vec::new();
    let mut current: Option<Vec<(u32, u32)>> = None;
    let mut tuple: Option<Vec<u32>> = None;
    let mut number = String::new();
    let mut depth = 0usize;

    for ch in body.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        if !number.is_empty() {
            let value = number.parse().map_err(|_| bad())?;
            tuple.as_mut().ok_or_else(bad)?.push(value);
            number.clear();
        }
        match ch {
            '[' => {
                depth += 1;
                if depth == 2 {
                    current = Some(Vec::new());
                }
            }
            ']' => {
                if depth == 2 {
                    mappings.push(current.take().ok_or_else(bad)?);
                }
                depth = depth.checked_sub(1).ok_or_else(bad)?;
            }
            '(' => tuple = Some(Vec::new()),
            ')' => match tuple.take().as_deref() {
                Some(&[q, p]) => current.as_mut().ok_or_else(bad)?.push((q, p)),
                _ => return Err(bad()),
            },
            ',' | ' ' | '\t' => {}
            _ => return Err(bad()),
        }
    }
    if depth != 0 {
        return Err(bad());
    }
    Ok(mappings)
}

fn parse_response(stdout: &str, initial: &Layout, target: &Layout) -> MapResult<RouteResponse> {
    let mut lines = stdout.lines();
    let cost = lines
        .next()
        .and_then(|l| l.trim().strip_prefix("cost"))
        .and_then(|c| c.trim().parse::<f64>().ok())
        .ok_or_else(|| MapError::RouterOutput("missing 'cost <value>' line".into()))?;
    let mapping_line = lines
        .next()
        .and_then(|l| l.trim().strip_prefix("mappings:"))
        .ok_or_else(|| MapError::RouterOutput("missing 'mappings:' line".into()))?;

    let mut mappings = vec![pairs(initial)];
    mappings.extend(parse_mappings(mapping_line.trim())?);
    mappings.push(pairs(target));
    Ok(RouteResponse {
        cost,
        swaps: swaps_from_mappings(&mappings),
    })
}

#[async_trait]
impl Router for ProcessRouter {
    fn name(&self) -> &str {
        "external"
    }

    async fn route(&self, request: RouteRequest<'_>) -> MapResult<RouteResponse> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("satmap-route-");
        let dir = match &self.config.work_dir {
            Some(dir) => builder.tempdir_in(dir).map_err(|e| MapError::io(dir, e))?,
            None => builder
                .tempdir()
                .map_err(|e| MapError::io(std::env::temp_dir(), e))?,
        };
        let file = dir.path().join("request.txt");
        let body = render_request(request.topology, request.initial, request.target);
        tokio::fs::write(&file, body)
            .await
            .map_err(|e| MapError::io(&file, e))?;

        let program = self.config.program.display().to_string();
        let output = Command::new(&self.config.program)
            .arg(&file)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MapError::RouterUnavailable {
                program: program.clone(),
                source,
            })?;
        debug!(router = %program, status = %output.status, "router finished");

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_response(&stdout, request.initial, request.target)
    }
}
