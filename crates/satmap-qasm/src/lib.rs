//! `OpenQASM` 2 front and back end for satmap.
//!
//! The mapper consumes circuits written in OpenQASM 2.0 and writes the
//! routed circuit back in the same dialect.
//!
//! | Feature | Example |
//! |---------|---------|
//! | Registers | `qreg q[5];`, `creg c[5];` (several registers are flattened) |
//! | Gates | `h q[0];`, `cx q[0],q[1];`, `u3(pi/2,0,pi) q[1];` |
//! | Broadcast | `h q;`, `measure q -> c;` |
//! | Barrier / reset | `barrier q;`, `reset q[0];` |
//! | Gate definitions | `gate g a,b { ... }` (body skipped, calls kept opaque) |
//!
//! Gate parameters are stored as source text, so expressions such as
//! `pi/2` are emitted exactly as they were read.
//!
//! # Example
//!
//! ```rust
//! use satmap_qasm::{emit, parse};
//!
//! let source = r#"
//! OPENQASM 2.0;
//! include "qelib1.inc";
//! qreg q[3];
//! h q[0];
//! cx q[0],q[1];
//! cx q[1],q[2];
//! "#;
//!
//! let circuit = parse(source).unwrap();
//! assert_eq!(circuit.two_qubit_ops().count(), 2);
//!
//! let emitted = emit(&circuit).unwrap();
//! let reparsed = parse(&emitted).unwrap();
//! assert_eq!(circuit.instructions(), reparsed.instructions());
//! ```

mod emitter;
mod error;
mod lexer;
mod parser;

pub use emitter::emit;
pub use error::{ParseError, ParseResult};
pub use parser::parse;
