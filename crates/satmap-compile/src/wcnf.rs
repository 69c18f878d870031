//! WCNF serialization and MaxSAT result-stream parsing.

use std::fmt::Write as _;

use crate::encoder::Instance;
use crate::error::{MapError, MapResult};
use crate::oracle::{Model, OracleOutcome};

/// Render an instance in the weighted DIMACS format.
///
/// Hard clauses carry the `top` weight from the header, which exceeds the
/// total weight of all soft clauses.
pub fn render(instance: &Instance) -> String {
    let top = instance.top();
    let clauses = instance.hard.len() + instance.soft.len();
    let mut out = String::with_capacity(clauses * 16);
    let _ = writeln!(out, "p wcnf {} {} {}", instance.num_vars(), clauses, top);
    for clause in &instance.hard {
        write_clause(&mut out, top, clause);
    }
    for clause in &instance.soft {
        write_clause(&mut out, clause.weight, &clause.lits);
    }
    out
}

fn write_clause(out: &mut String, weight: u64, lits: &[i64]) {
    let _ = write!(out, "{weight}");
    for lit in lits {
        let _ = write!(out, " {lit}");
    }
    out.push_str(" 0\n");
}

/// Parse a MaxSAT solver's output.
///
/// `o` lines report the cost of improving models; the last one wins. `v`
/// lines are concatenated into one assignment, either as signed literals or,
/// when a single token of `num_vars` binary digits is given, as a bit string.
/// Output with no `v` line, or an explicit `s UNSATISFIABLE`, means there is
/// no model.
pub fn parse_result_stream(text: &str, num_vars: usize) -> MapResult<OracleOutcome> {
    let mut cost = None;
    let mut unsat = false;
    let mut assignment: Option<Vec<i64>> = None;

    for line in text.lines() {
        let line = line.trim();
        let (tag, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match tag {
            "o" => {
                let value = rest
                    .parse::<u64>()
                    .map_err(|_| MapError::OracleOutput(format!("bad cost line '{line}'")))?;
                cost = Some(value);
            }
            "s" => unsat |= rest == "UNSATISFIABLE",
            "v" => {
                let lits = assignment.get_or_insert_with(Vec::new);
                parse_values(rest, num_vars, lits)?;
            }
            _ => {}
        }
    }

    match assignment {
        Some(assignment) if !unsat => Ok(OracleOutcome::Model(Model { cost, assignment })),
        _ => Ok(OracleOutcome::Unsatisfiable),
    }
}

fn parse_values(rest: &str, num_vars: usize, lits: &mut Vec<i64>) -> MapResult<()> {
    let is_bits = rest.len() == num_vars
        && num_vars > 1
        && rest.bytes().all(|b| b == b'0' || b == b'1');
    if is_bits {
        lits.extend(rest.bytes().enumerate().map(|(i, b)| {
            let id = i as i64 + 1;
            if b == b'1' { id } else { -id }
        }));
        return Ok(());
    }
    for token in rest.split_whitespace() {
        let lit = token
            .parse::<i64>()
            .map_err(|_| MapError::OracleOutput(format!("bad literal '{token}'")))?;
        if lit != 0 {
            lits.push(lit);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Dims;
    use crate::encoder::SoftClause;

    fn tiny() -> Instance {
        Instance {
            dims: Dims {
                phys: 1,
                log: 1,
                slots: 1,
                swaps: 0,
                edge_options: 1,
            },
            hard: vec![vec![3], vec![-1, 2]],
            soft: vec![
                SoftClause { weight: 4, lits: vec![-1] },
                SoftClause { weight: 2, lits: vec![-2] },
            ],
            structural: 2,
            swap_slots: vec![],
        }
    }

    #[test]
    fn test_render_header_and_weights() {
        let text = render(&tiny());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], format!("p wcnf {} 4 7", tiny().num_vars()));
        assert_eq!(lines[1], "7 3 0");
        assert_eq!(lines[2], "7 -1 2 0");
        assert_eq!(lines[3], "4 -1 0");
        assert_eq!(lines[4], "2 -2 0");
    }

    #[test]
    fn test_last_cost_wins() {
        let out = "c comment\no 10\no 3\ns OPTIMUM FOUND\nv 1 -2\nv 3 0\n";
        let OracleOutcome::Model(model) = parse_result_stream(out, 3).unwrap() else {
            panic!("expected a model");
        };
        assert_eq!(model.cost, Some(3));
        assert_eq!(model.assignment, vec![1, -2, 3]);
    }

    #[test]
    fn test_binary_values() {
        let OracleOutcome::Model(model) = parse_result_stream("v 101\n", 3).unwrap() else {
            panic!("expected a model");
        };
        assert_eq!(model.assignment, vec![1, -2, 3]);
        assert_eq!(model.cost, None);
    }

    #[test]
    fn test_unsatisfiable() {
        assert_eq!(
            parse_result_stream("s UNSATISFIABLE\n", 3).unwrap(),
            OracleOutcome::Unsatisfiable
        );
        assert_eq!(parse_result_stream("o 4\n", 3).unwrap(), OracleOutcome::Unsatisfiable);
        assert_eq!(parse_result_stream("", 3).unwrap(), OracleOutcome::Unsatisfiable);
    }

    #[test]
    fn test_garbage_literal() {
        assert!(matches!(
            parse_result_stream("v 1 x 0\n", 3),
            Err(MapError::OracleOutput(_))
        ));
    }
}
