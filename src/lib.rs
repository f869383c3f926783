//! Deterministic cellular fluid simulation on a 2D grid.
//!
//! Every cell is a wall, a gas pocket or water, carrying a scalar pressure
//! and four directional velocity slots. A tick applies gravity, converts
//! pressure gradients into velocity, resolves conservative flow with a
//! recursive augmenting search, turns unspent momentum back into pressure,
//! and finishes with a stochastic particle pass that visibly moves the
//! fluid. Runs are bit-reproducible for a fixed seed and worker count.
//!
//! # Architecture
//!
//! - `numeric`: the scalar abstraction (floats and Q-format fixed point)
//! - `compute`: grids, simulation state, the tick engine and its worker pool
//! - `schema`: configuration, scalar type names, field generation
//! - `checkpoint`: save and restore of complete tick state
//! - `dispatch`: runtime mapping from type names to compiled engines
//!
//! # Example
//!
//! ```rust,no_run
//! use cellflow::Simulator;
//! use cellflow::dispatch::build_engine;
//! use cellflow::schema::{ScalarType, SimConfig};
//!
//! let config = SimConfig {
//!     p_type: ScalarType::Fixed { bits: 32, frac: 16 },
//!     v_type: ScalarType::Fixed { bits: 32, frac: 16 },
//!     vf_type: ScalarType::Fixed { bits: 32, frac: 16 },
//!     field_path: "field.txt".into(),
//!     num_threads: 2,
//! };
//!
//! let mut sim = build_engine(&config).unwrap();
//! for _ in 0..100 {
//!     let stats = sim.tick();
//!     if stats.moved {
//!         println!("Tick {}:", stats.tick);
//!         print!("{}", sim.render());
//!     }
//! }
//! ```

pub mod checkpoint;
pub mod compute;
pub mod dispatch;
pub mod error;
pub mod numeric;
pub mod schema;

// Re-export commonly used types
pub use compute::{Cell, FluidEngine, FluidState, Simulator, TickStats};
pub use dispatch::{build_engine, load_checkpoint};
pub use error::SimError;
pub use numeric::{Fixed, Scalar, convert};
pub use schema::{ScalarTriple, ScalarType, SimConfig, random_field};
