//! Stochastic particle movement, the final phase of a tick.
//!
//! Each unvisited cell rolls against the sum of its outgoing velocities.
//! Winners start a move chain that walks velocity-weighted random steps
//! until it closes back onto its origin or reaches a cell with no outgoing
//! momentum; the chain then swaps fluid one cell along itself while
//! unwinding. Losers propagate a stop wave through cells whose momentum
//! only points inward.

use crate::numeric::Scalar;

use super::grid::{Grid2, GridLayout};
use super::state::{DELTAS, FluidState, step};

impl<P: Scalar, V: Scalar, Vf: Scalar, L: GridLayout> FluidState<P, V, Vf, L> {
    /// Run the particle phase over the whole grid. Returns whether any cell
    /// moved.
    pub(crate) fn particle_pass(&mut self) -> bool {
        self.ut += 2;
        let mut moved = false;
        for x in 0..self.rows {
            for y in 0..self.cols {
                if self.kind(x, y).is_wall() || self.last_use.get(x, y) == self.ut {
                    continue;
                }
                let chance = self.move_chance(x, y);
                if V::random01(self.next_bits()) < chance {
                    moved = true;
                    self.propagate_move(x, y, true);
                } else {
                    self.propagate_stop(x, y, true);
                }
            }
        }
        moved
    }

    /// Sum of eligible outgoing velocities, used as the move probability.
    fn move_chance(&self, x: usize, y: usize) -> V {
        let mut sum = V::zero();
        for (slot, &(dx, dy)) in DELTAS.iter().enumerate() {
            let (nx, ny) = step(x, y, dx, dy);
            if self.kind(nx, ny).is_wall() || self.last_use.get(nx, ny) == self.ut {
                continue;
            }
            let v = self.velocity.get(x, y, slot);
            if v < V::zero() {
                continue;
            }
            sum += v;
        }
        sum
    }

    fn propagate_move(&mut self, x: usize, y: usize, is_first: bool) -> bool {
        // The chain origin keeps the reserved colour until it finalises, so
        // a step back onto it is recognised as closing the chain.
        let reserve = if is_first { self.ut - 1 } else { self.ut };
        self.last_use.set(x, y, reserve);
        let mut moved = false;
        let mut target = (0usize, 0usize);
        loop {
            let mut tres = [V::zero(); 4];
            let mut sum = V::zero();
            for (slot, &(dx, dy)) in DELTAS.iter().enumerate() {
                let (nx, ny) = step(x, y, dx, dy);
                if self.kind(nx, ny).is_wall() || self.last_use.get(nx, ny) == self.ut {
                    tres[slot] = sum;
                    continue;
                }
                let v = self.velocity.get(x, y, slot);
                if v < V::zero() {
                    tres[slot] = sum;
                    continue;
                }
                sum += v;
                tres[slot] = sum;
            }

            if sum == V::zero() {
                break;
            }

            let draw = V::random01(self.next_bits()) * sum;
            let slot = tres
                .iter()
                .position(|bound| *bound > draw)
                .expect("random draw landed past the velocity prefix sums");
            let (dx, dy) = DELTAS[slot];
            let (nx, ny) = step(x, y, dx, dy);
            assert!(
                self.velocity.get(x, y, slot) > V::zero()
                    && !self.kind(nx, ny).is_wall()
                    && self.last_use.get(nx, ny) < self.ut,
                "picked an ineligible move target at ({nx}, {ny})"
            );

            moved = self.last_use.get(nx, ny) == self.ut - 1
                || self.propagate_move(nx, ny, false);
            target = (nx, ny);
            if moved {
                break;
            }
        }
        self.last_use.set(x, y, self.ut);
        for (slot, &(dx, dy)) in DELTAS.iter().enumerate() {
            let (nx, ny) = step(x, y, dx, dy);
            if !self.kind(nx, ny).is_wall()
                && self.last_use.get(nx, ny) < self.ut - 1
                && self.velocity.get(x, y, slot) < V::zero()
            {
                self.propagate_stop(nx, ny, false);
            }
        }
        if moved && !is_first {
            self.swap_cells((x, y), target);
        }
        moved
    }

    fn propagate_stop(&mut self, x: usize, y: usize, force: bool) {
        if !force {
            let mut stop = true;
            for (slot, &(dx, dy)) in DELTAS.iter().enumerate() {
                let (nx, ny) = step(x, y, dx, dy);
                if !self.kind(nx, ny).is_wall()
                    && self.last_use.get(nx, ny) < self.ut - 1
                    && self.velocity.get(x, y, slot) > V::zero()
                {
                    stop = false;
                    break;
                }
            }
            if !stop {
                return;
            }
        }
        self.last_use.set(x, y, self.ut);
        for (slot, &(dx, dy)) in DELTAS.iter().enumerate() {
            let (nx, ny) = step(x, y, dx, dy);
            if self.kind(nx, ny).is_wall()
                || self.last_use.get(nx, ny) == self.ut
                || self.velocity.get(x, y, slot) > V::zero()
            {
                continue;
            }
            self.propagate_stop(nx, ny, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::state::{Cell, slot_of};

    type TestState = FluidState<f64, f64, f64>;

    #[test]
    fn still_field_never_moves() {
        let mut state = TestState::from_field_str("#####\n# . #\n#####").unwrap();
        state.ut += 4;
        assert!(!state.particle_pass());
        assert_eq!(state.kind(1, 2), Cell::Water);
        // Every non-wall cell is finalised for this epoch.
        assert_eq!(state.last_use.get(1, 1), state.ut);
        assert_eq!(state.last_use.get(1, 2), state.ut);
        assert_eq!(state.last_use.get(1, 3), state.ut);
    }

    #[test]
    fn saturated_velocity_forces_a_move() {
        // With velocity far above 1 the unit draw always loses, so the cell
        // must enter a move chain. The opposing velocities form a two-cell
        // loop, the only chain that can close here.
        let mut state = TestState::from_field_str("####\n#. #\n####").unwrap();
        let east = slot_of(0, 1);
        let west = slot_of(0, -1);
        state.velocity.set(1, 1, east, 10.0);
        state.velocity.set(1, 2, west, 10.0);
        state.ut += 4;
        assert!(state.particle_pass());
        // The swap carried the water one step along the chain, velocity row
        // included.
        assert_eq!(state.kind(1, 1), Cell::Gas);
        assert_eq!(state.kind(1, 2), Cell::Water);
        assert_eq!(state.velocity.get(1, 2, east), 10.0);
        assert_eq!(state.velocity.get(1, 1, west), 10.0);
    }

    #[test]
    fn stop_wave_spreads_through_inward_momentum() {
        let mut state = TestState::from_field_str("#####\n#   #\n#####").unwrap();
        let east = slot_of(0, 1);
        // (1, 2) points at (1, 3) with negative (incoming) velocity, so a
        // forced stop at (1, 1) must sweep both neighbours.
        state.velocity.set(1, 2, east, -0.5);
        state.ut += 2;
        state.propagate_stop(1, 1, true);
        assert_eq!(state.last_use.get(1, 1), state.ut);
        assert_eq!(state.last_use.get(1, 2), state.ut);
        assert_eq!(state.last_use.get(1, 3), state.ut);
    }

    #[test]
    fn stop_wave_respects_outgoing_momentum() {
        let mut state = TestState::from_field_str("#####\n#   #\n#####").unwrap();
        let east = slot_of(0, 1);
        state.velocity.set(1, 2, east, 0.5);
        state.ut += 2;
        state.propagate_stop(1, 1, true);
        // (1, 2) still has somewhere to go, so the wave stops before it.
        assert_eq!(state.last_use.get(1, 1), state.ut);
        assert!(state.last_use.get(1, 2) < state.ut);
    }
}
