//! Compute module - grids, simulation state and the tick engine.

mod engine;
mod flow;
mod grid;
mod movement;
mod partition;
mod state;

pub use engine::*;
pub use grid::*;
pub use state::*;
