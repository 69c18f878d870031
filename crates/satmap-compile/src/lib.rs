//! MaxSAT-based qubit mapping and routing
//!
//! This crate maps a logical circuit onto a device with restricted qubit
//! connectivity. Placement, routing and the choice of inserted swaps are
//! encoded as a weighted partial MaxSAT instance and handed to an
//! optimisation oracle, so the result minimises swap count (or, with
//! calibration data, maximises estimated fidelity) over each chunk.
//!
//! # Overview
//!
//! A run goes through the following stages:
//! 1. **Extraction**: collect the two-qubit interactions in program order
//! 2. **Ordering**: arrange them into slots, grouped into layers
//! 3. **Encoding**: per chunk of slots, build a MaxSAT instance over
//!    placement, interaction and swap variables
//! 4. **Solving**: run the oracle with a share of the remaining time budget
//! 5. **Verification**: decode the model and check that every slot mapping
//!    is a bijection explained by the decoded swaps
//! 6. **Reconstruction**: emit the physical circuit with swaps inserted
//!
//! Chunks that cannot be solved trigger backtracking: an unsatisfiable core
//! over the previous chunk's boundary is learned as a blocking clause, or
//! the chunk's swap budget grows.
//!
//! # Architecture
//!
//! ```text
//! Circuit ──► extract ──► ordering ──► chunk windows
//!                                          │
//!                    ┌─────────────────────┘
//!                    ▼
//!              ┌──────────┐   Instance   ┌────────┐
//!              │ encoder  │ ───────────► │ Oracle │ (varisat / external)
//!              └──────────┘              └────────┘
//!                    ▲                        │ Model
//!                    │ learned clauses        ▼
//!              ┌──────────┐   failure    ┌────────┐
//!              │  driver  │ ◄─────────── │ verify │ ◄── Router (unrouted modes)
//!              └──────────┘              └────────┘
//!                    │
//!                    ▼
//!              reconstruct ──► mapped Circuit
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use satmap_compile::{Mapper, MapperConfig, Topology};
//! use satmap_ir::{Circuit, QubitId};
//!
//! # async fn run() -> satmap_compile::MapResult<()> {
//! let mut circuit = Circuit::with_size("ghz", 3, 0);
//! circuit.h(QubitId(0))?;
//! circuit.cx(QubitId(0), QubitId(1))?;
//! circuit.cx(QubitId(0), QubitId(2))?;
//!
//! let mapper = Mapper::new(Topology::linear(3), MapperConfig::default())?;
//! let result = mapper.map(&circuit).await?;
//! println!("{} swaps, initial layout {:?}", result.swap_count(), result.initial_layout);
//! # Ok(())
//! # }
//! ```
//!
//! # Routing Modes
//!
//! | Mode | Swaps chosen by | Objective |
//! |------|-----------------|-----------|
//! | `Routed` | the oracle | swap count, or gate and swap fidelity |
//! | `Weighted` | the router | total distance travelled |
//! | `BoundedDisplacement` | the router | qubits moved, with a hard cap |
//! | `Deferred` | the router | qubits moved |

pub mod calibration;
pub mod codec;
pub mod config;
pub mod core;
pub mod driver;
pub mod encoder;
pub mod error;
pub mod extract;
pub mod interrupt;
pub mod layout;
pub mod oracle;
pub mod ordering;
pub mod reconstruct;
pub mod router;
pub mod score;
pub mod topology;
pub mod verify;
pub mod wcnf;

pub use calibration::Calibration;
pub use codec::{Dims, Lit, LiteralCodec, Var};
pub use config::{Config, MapperConfig, OracleConfig, RouterConfig, RoutingMode};
pub use driver::{ChunkStats, Mapper, MappingResult};
pub use encoder::{EncodeRequest, Instance, SoftClause, encode};
pub use error::{MapError, MapResult};
pub use extract::{Interaction, Interactions, extract};
pub use interrupt::Interrupt;
pub use layout::Layout;
pub use oracle::{Model, Oracle, OracleOutcome, ProcessOracle, VarisatOracle};
pub use ordering::{Layering, Schedule, chunk_windows, schedule};
pub use router::{ProcessRouter, RouteRequest, RouteResponse, Router, SpanningTreeRouter};
pub use topology::Topology;
