//! Circuit data model for satmap.
//!
//! The mapper only needs a flat, ordered view of a circuit: which operation
//! touches which qubits, in program order. This crate provides that view
//! without committing to a particular gate algebra, so that gates unknown
//! to the mapper (custom or parameterised ones) pass through untouched.
//!
//! # Core Components
//!
//! - [`QubitId`], [`ClbitId`]: flat indices into the circuit's registers
//! - [`Instruction`]: an operation with its qubit and classical operands
//! - [`Circuit`]: declared registers plus the instruction sequence
//!
//! # Example
//!
//! ```rust
//! use satmap_ir::{Circuit, QubitId};
//!
//! let mut circuit = Circuit::with_size("bell", 2, 2);
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//! circuit.measure_all().unwrap();
//!
//! assert_eq!(circuit.num_qubits(), 2);
//! assert_eq!(circuit.two_qubit_ops().count(), 1);
//! ```

pub mod circuit;
pub mod error;
pub mod instruction;
pub mod qubit;

pub use circuit::{Circuit, Register};
pub use error::{IrError, IrResult};
pub use instruction::{Instruction, InstructionKind};
pub use qubit::{ClbitId, QubitId};
