//! The tick engine.
//!
//! A tick runs five phases in fixed order: gravity, pressure-driven
//! velocity, conservative mass flow, kinetic-energy recovery, and the
//! stochastic particle pass. Only the flow phase is parallel; it fans out
//! over the worker pool in vertical strips and drains the cross-border
//! queue serially afterwards.

use std::cell::UnsafeCell;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use log::{debug, info};

use crate::checkpoint::{self, CheckpointHeader, CheckpointPayload};
use crate::error::SimError;
use crate::numeric::{Scalar, convert};
use crate::schema::{ConfigError, ScalarTriple};

use super::flow::{FlowPass, FlowPtrs, PassColors};
use super::grid::{Dynamic, Grid2, GridLayout};
use super::partition::FlowPool;
use super::state::{Cell, DELTAS, FluidState, opposite_slot, slot_of, step};

/// Water gives back only part of its unspent momentum as pressure.
const WATER_DISSIPATION: f64 = 0.8;

/// Result of one completed tick.
#[derive(Debug, Clone, Copy)]
pub struct TickStats {
    /// Completed tick count including this one.
    pub tick: u64,
    /// Whether the particle pass moved any fluid.
    pub moved: bool,
    /// Cross-border points deferred during the flow phase.
    pub deferred: usize,
}

/// Type-erased engine handle used by the driver.
pub trait Simulator {
    fn tick(&mut self) -> TickStats;
    fn render(&self) -> String;
    fn write_checkpoint(&self, writer: &mut dyn Write) -> io::Result<()>;
    fn tick_count(&self) -> u64;
    fn dimensions(&self) -> (usize, usize);
}

/// Interior-mutable holder for the simulation state.
///
/// Phase 3 workers reach the grids through raw pointers derived from this
/// cell while the driver is parked at a barrier; everywhere else the driver
/// is the sole accessor.
struct StateCell<P: Scalar, V: Scalar, Vf: Scalar, L: GridLayout>(
    UnsafeCell<FluidState<P, V, Vf, L>>,
);

/// Simulation engine generic over the three scalar types and grid layout.
///
/// Declaration order matters for drop: the pool joins its workers before
/// the state they point into goes away.
pub struct FluidEngine<P: Scalar, V: Scalar, Vf: Scalar, L: GridLayout = Dynamic> {
    pool: FlowPool<V, Vf>,
    state: Box<StateCell<P, V, Vf, L>>,
    types: ScalarTriple,
}

impl<P: Scalar, V: Scalar, Vf: Scalar, L: GridLayout> std::fmt::Debug for FluidEngine<P, V, Vf, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluidEngine")
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}

impl<P: Scalar, V: Scalar, Vf: Scalar, L: GridLayout> FluidEngine<P, V, Vf, L> {
    /// Build an engine from the text form of a field.
    pub fn from_field_str(
        text: &str,
        types: ScalarTriple,
        workers: usize,
    ) -> Result<Self, SimError> {
        let state = FluidState::from_field_str(text)?;
        Self::from_state(state, types, workers)
    }

    /// Build an engine from a field file on disk.
    pub fn from_field_file(
        path: &Path,
        types: ScalarTriple,
        workers: usize,
    ) -> Result<Self, SimError> {
        let text = fs::read_to_string(path)?;
        Self::from_field_str(&text, types, workers)
    }

    /// Rebuild an engine mid-run from a parsed checkpoint.
    pub fn from_checkpoint(
        header: &CheckpointHeader,
        payload: &CheckpointPayload,
        workers: usize,
    ) -> Result<Self, SimError> {
        let mut state = FluidState::blank(header.rows, header.cols);
        payload.apply(&mut state)?;
        let engine = Self::from_state(state, header.types, workers)?;
        info!("restored checkpoint at tick {}", payload.tick);
        Ok(engine)
    }

    pub(crate) fn from_state(
        state: FluidState<P, V, Vf, L>,
        types: ScalarTriple,
        workers: usize,
    ) -> Result<Self, SimError> {
        if workers == 0 || state.cols / workers < 2 {
            return Err(ConfigError::InvalidWorkerCount { workers, cols: state.cols }.into());
        }
        let (rows, cols) = (state.rows, state.cols);
        let mut cell = Box::new(StateCell(UnsafeCell::new(state)));
        let ptrs = {
            let state = cell.0.get_mut();
            FlowPtrs {
                kinds: state.kinds.as_slice().as_ptr(),
                velocity: state.velocity.v.as_mut_slice().as_mut_ptr(),
                velocity_flow: state.velocity_flow.v.as_mut_slice().as_mut_ptr(),
                last_use: state.last_use.as_mut_slice().as_mut_ptr(),
                rows,
                cols,
            }
        };
        let pool = FlowPool::new(ptrs, workers);
        info!(
            "engine up: {rows}x{cols} field, {workers} workers, types {} {} {}",
            types.p, types.v, types.vf
        );
        Ok(Self { pool, state: cell, types })
    }

    /// Shared view of the state. The workers only touch grids while the
    /// driver waits inside the flow phase, so access is exclusive here.
    pub(crate) fn state(&self) -> &FluidState<P, V, Vf, L> {
        unsafe { &*self.state.0.get() }
    }

    /// Mutable view of the state; see [`Self::state`] for why this is safe.
    pub(crate) fn state_mut(&mut self) -> &mut FluidState<P, V, Vf, L> {
        unsafe { &mut *self.state.0.get() }
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    pub fn scalar_types(&self) -> ScalarTriple {
        self.types
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self) -> TickStats {
        self.apply_gravity();
        self.apply_pressure_forces();
        let deferred = self.make_flow();
        self.recalculate_pressure();
        let moved = self.state_mut().particle_pass();
        let state = self.state_mut();
        state.tick += 1;
        debug!(
            "tick {} done (moved: {moved}, deferred points: {deferred})",
            state.tick
        );
        TickStats { tick: state.tick, moved, deferred }
    }

    /// Phase 1: add the body force to every southern velocity slot whose
    /// neighbour can receive it. This is the only source of new momentum.
    pub(crate) fn apply_gravity(&mut self) {
        let state = self.state_mut();
        let south = slot_of(1, 0);
        let g = state.gravity;
        for x in 0..state.rows {
            for y in 0..state.cols {
                if state.kind(x, y).is_wall() {
                    continue;
                }
                if !state.kind(x + 1, y).is_wall() {
                    state.velocity.add(x, y, south, g);
                }
            }
        }
    }

    /// Phase 2: push velocity along pressure gradients.
    ///
    /// A cell under higher pressure first cancels the neighbour's opposing
    /// velocity; whatever force remains becomes outgoing velocity, paid for
    /// out of the cell's own pressure.
    pub(crate) fn apply_pressure_forces(&mut self) {
        let state = self.state_mut();
        {
            let (old_p, p) = (&mut state.old_p, &state.p);
            old_p.as_mut_slice().copy_from_slice(p.as_slice());
        }
        for x in 0..state.rows {
            for y in 0..state.cols {
                if state.kind(x, y).is_wall() {
                    continue;
                }
                for (slot, &(dx, dy)) in DELTAS.iter().enumerate() {
                    let (nx, ny) = step(x, y, dx, dy);
                    if state.kind(nx, ny).is_wall()
                        || !(state.old_p.get(nx, ny) < state.old_p.get(x, y))
                    {
                        continue;
                    }
                    let mut force = state.old_p.get(x, y) - state.old_p.get(nx, ny);
                    let rho_n = state.density(nx, ny);
                    let back = opposite_slot(slot);
                    let contr: P = convert(state.velocity.get(nx, ny, back));
                    if contr * rho_n >= force {
                        let debit: V = convert(force / rho_n);
                        state.velocity.add(nx, ny, back, -debit);
                        continue;
                    }
                    force -= contr * rho_n;
                    state.velocity.set(nx, ny, back, V::zero());
                    let push: V = convert(force / state.density(x, y));
                    state.velocity.add(x, y, slot, push);
                    let share = force / state.dirs_of(x, y);
                    let p = state.p.get_mut(x, y);
                    *p = *p - share;
                }
            }
        }
    }

    /// Phase 3: resolve conservative flow along the velocity channels.
    ///
    /// Repeats sub-passes until nothing moves. Each sub-pass advances the
    /// epoch by 4, scans every strip in parallel, then drains the deferred
    /// cross-border points serially. Returns how many points were deferred.
    pub(crate) fn make_flow(&mut self) -> usize {
        self.state_mut().velocity_flow.clear();
        let mut deferred_total = 0;
        loop {
            let ut = {
                let state = self.state_mut();
                state.ut += 4;
                state.ut
            };
            self.pool.interior_pass(ut);
            let mut progress = self.pool.progress();

            let colors = PassColors::edges(ut);
            // Workers are parked at the start barrier again, so the grids
            // are exclusively the driver's until the next sub-pass.
            let mut pass = unsafe { FlowPass::edges(self.pool.ptrs(), colors) };
            let one = V::one();
            deferred_total += self.pool.drain_deferred(|x, y| {
                if !pass.kind(x, y).is_wall() && pass.last_use(x, y) != colors.done {
                    let (moved, _, _) = pass.propagate(x, y, one);
                    if moved > V::zero() {
                        progress = true;
                    }
                }
            });

            if !progress {
                break;
            }
        }
        deferred_total
    }

    /// Phase 4: convert unspent velocity back into pressure.
    ///
    /// Only positive slots are settled; the opposing slot of each pair is
    /// updated from the other side.
    pub(crate) fn recalculate_pressure(&mut self) {
        let state = self.state_mut();
        for x in 0..state.rows {
            for y in 0..state.cols {
                if state.kind(x, y).is_wall() {
                    continue;
                }
                for (slot, &(dx, dy)) in DELTAS.iter().enumerate() {
                    let old_v = state.velocity.get(x, y, slot);
                    if !(old_v > V::zero()) {
                        continue;
                    }
                    let new_v: V = convert(state.velocity_flow.get(x, y, slot));
                    assert!(
                        new_v <= old_v,
                        "committed flow {new_v} exceeds velocity {old_v} at ({x}, {y}) slot {slot}"
                    );
                    state.velocity.set(x, y, slot, new_v);
                    let mut force: P = convert::<V, P>(old_v - new_v) * state.density(x, y);
                    if state.kind(x, y) == Cell::Water {
                        force = force * P::from_f64(WATER_DISSIPATION);
                    }
                    let (nx, ny) = step(x, y, dx, dy);
                    if state.kind(nx, ny).is_wall() {
                        let share = force / state.dirs_of(x, y);
                        let p = state.p.get_mut(x, y);
                        *p = *p + share;
                    } else {
                        let share = force / state.dirs_of(nx, ny);
                        let p = state.p.get_mut(nx, ny);
                        *p = *p + share;
                    }
                }
            }
        }
    }
}

impl<P: Scalar, V: Scalar, Vf: Scalar, L: GridLayout> Simulator for FluidEngine<P, V, Vf, L> {
    fn tick(&mut self) -> TickStats {
        FluidEngine::tick(self)
    }

    fn render(&self) -> String {
        self.state().render()
    }

    fn write_checkpoint(&self, writer: &mut dyn Write) -> io::Result<()> {
        let state = self.state();
        let header = CheckpointHeader {
            types: self.types,
            rows: state.rows,
            cols: state.cols,
        };
        let payload = CheckpointPayload::capture(state);
        checkpoint::write(&mut *writer, &header, &payload)
    }

    fn tick_count(&self) -> u64 {
        self.state().tick
    }

    fn dimensions(&self) -> (usize, usize) {
        let state = self.state();
        (state.rows, state.cols)
    }
}
