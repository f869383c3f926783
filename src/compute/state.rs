//! Field and directional state for the fluid simulation.
//!
//! Wraps the cell-kind grid, both pressure buffers, the two directional
//! fields, the visitation-epoch grid and the neighbour-count cache, plus the
//! density table, gravity, and the seeded random stream.

use std::fmt;
use std::io;

use log::debug;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::numeric::Scalar;

use super::grid::{Dynamic, Grid2, GridLayout};

/// Seed for the engine's random stream. Fixed so runs are reproducible.
pub const RNG_SEED: u64 = 1337;

/// Default downward body force.
pub const DEFAULT_GRAVITY: f64 = 0.01;

/// Default density of a gas cell.
pub const DEFAULT_RHO_GAS: f64 = 0.01;

/// Default density of a water cell.
pub const DEFAULT_RHO_WATER: i64 = 1000;

/// The four cardinal direction deltas as `(dx, dy)` with `dx` the row step.
///
/// Slot order is load-bearing: the direction index of every velocity row
/// follows this list, and traversals visit neighbours in this order.
pub const DELTAS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Slot of the direction pointing back at the sender.
///
/// Deltas are laid out in opposing pairs, so the opposite slot is the pair
/// sibling.
#[inline]
pub fn opposite_slot(slot: usize) -> usize {
    slot ^ 1
}

/// Slot index of a delta in the canonical list.
pub fn slot_of(dx: i32, dy: i32) -> usize {
    DELTAS
        .iter()
        .position(|&d| d == (dx, dy))
        .unwrap_or_else(|| panic!("({dx}, {dy}) is not a cardinal delta"))
}

/// Neighbour coordinate after stepping one delta. Walls on the border ring
/// guarantee the result stays on the grid for non-wall starting cells.
#[inline]
pub(crate) fn step(x: usize, y: usize, dx: i32, dy: i32) -> (usize, usize) {
    ((x as i32 + dx) as usize, (y as i32 + dy) as usize)
}

/// Kind of a single cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Cell {
    #[default]
    Wall = b'#',
    Gas = b' ',
    Water = b'.',
}

impl Cell {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'#' => Some(Cell::Wall),
            b' ' => Some(Cell::Gas),
            b'.' => Some(Cell::Water),
            _ => None,
        }
    }

    #[inline]
    pub fn as_char(self) -> char {
        self as u8 as char
    }

    #[inline]
    pub fn is_wall(self) -> bool {
        self == Cell::Wall
    }
}

/// Density per movable cell kind.
#[derive(Debug, Clone, Copy)]
pub struct Densities<P: Scalar> {
    pub gas: P,
    pub water: P,
}

impl<P: Scalar> Densities<P> {
    pub fn standard() -> Self {
        Self {
            gas: P::from_f64(DEFAULT_RHO_GAS),
            water: P::from_int(DEFAULT_RHO_WATER),
        }
    }

    #[inline]
    pub fn of(&self, kind: Cell) -> P {
        match kind {
            Cell::Gas => self.gas,
            Cell::Water => self.water,
            Cell::Wall => P::zero(),
        }
    }
}

/// Four directional slots per cell, one per delta.
pub struct VectorField<V: Scalar, L: GridLayout = Dynamic> {
    pub v: L::Grid<[V; 4]>,
}

impl<V: Scalar, L: GridLayout> VectorField<V, L> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { v: Grid2::new(rows, cols) }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, slot: usize) -> V {
        self.v.get(x, y)[slot]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, slot: usize, value: V) {
        self.v.get_mut(x, y)[slot] = value;
    }

    #[inline]
    pub fn add(&mut self, x: usize, y: usize, slot: usize, dv: V) {
        let slot = &mut self.v.get_mut(x, y)[slot];
        *slot = *slot + dv;
    }

    #[inline]
    pub fn row(&self, x: usize, y: usize) -> [V; 4] {
        self.v.get(x, y)
    }

    #[inline]
    pub fn set_row(&mut self, x: usize, y: usize, row: [V; 4]) {
        self.v.set(x, y, row);
    }

    pub fn clear(&mut self) {
        self.v.clear();
    }
}

/// Complete per-tick simulation state.
///
/// All grids are allocated once at construction and mutated in place for
/// the engine's whole lifetime.
pub struct FluidState<P: Scalar, V: Scalar, Vf: Scalar, L: GridLayout = Dynamic> {
    pub rows: usize,
    pub cols: usize,
    pub kinds: L::Grid<Cell>,
    pub p: L::Grid<P>,
    pub old_p: L::Grid<P>,
    pub velocity: VectorField<V, L>,
    pub velocity_flow: VectorField<Vf, L>,
    pub last_use: L::Grid<u32>,
    pub dirs: L::Grid<u8>,
    pub densities: Densities<P>,
    pub gravity: V,
    pub ut: u32,
    pub tick: u64,
    rng: StdRng,
    rng_draws: u64,
}

impl<P: Scalar, V: Scalar, Vf: Scalar, L: GridLayout> fmt::Debug for FluidState<P, V, Vf, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FluidState")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("gravity", &self.gravity)
            .field("ut", &self.ut)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl<P: Scalar, V: Scalar, Vf: Scalar, L: GridLayout> FluidState<P, V, Vf, L> {
    /// Allocate a blank all-wall state. Used by checkpoint restore, which
    /// then fills every grid in place.
    pub fn blank(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            kinds: Grid2::new(rows, cols),
            p: Grid2::new(rows, cols),
            old_p: Grid2::new(rows, cols),
            velocity: VectorField::new(rows, cols),
            velocity_flow: VectorField::new(rows, cols),
            last_use: Grid2::new(rows, cols),
            dirs: Grid2::new(rows, cols),
            densities: Densities::standard(),
            gravity: V::from_f64(DEFAULT_GRAVITY),
            ut: 0,
            tick: 0,
            rng: StdRng::seed_from_u64(RNG_SEED),
            rng_draws: 0,
        }
    }

    /// Parse a field from its text form and build the initial state.
    ///
    /// The field must be rectangular, at least 3x3, contain only the three
    /// cell bytes, and carry walls on the whole outer ring.
    pub fn from_field_str(text: &str) -> io::Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let rows = lines.len();
        if rows < 3 {
            return Err(invalid_field("field needs at least 3 rows"));
        }
        let cols = lines[0].len();
        if cols < 3 {
            return Err(invalid_field("field needs at least 3 columns"));
        }

        let mut state = Self::blank(rows, cols);
        for (x, line) in lines.iter().enumerate() {
            if line.len() != cols {
                return Err(invalid_field(&format!(
                    "row {x} has {} columns, expected {cols}",
                    line.len()
                )));
            }
            for (y, byte) in line.bytes().enumerate() {
                let kind = Cell::from_byte(byte).ok_or_else(|| {
                    invalid_field(&format!("unknown cell byte {byte:#04x} at ({x}, {y})"))
                })?;
                let border = x == 0 || x == rows - 1 || y == 0 || y == cols - 1;
                if border && kind != Cell::Wall {
                    return Err(invalid_field(&format!(
                        "border cell ({x}, {y}) must be a wall"
                    )));
                }
                state.kinds.set(x, y, kind);
            }
        }

        state.rebuild_dirs();
        debug!("loaded {rows}x{cols} field");
        Ok(state)
    }

    /// Recount the non-wall neighbours of every non-wall cell.
    pub fn rebuild_dirs(&mut self) {
        for x in 0..self.rows {
            for y in 0..self.cols {
                if self.kinds.get(x, y).is_wall() {
                    self.dirs.set(x, y, 0);
                    continue;
                }
                let mut count = 0u8;
                for &(dx, dy) in &DELTAS {
                    let (nx, ny) = step(x, y, dx, dy);
                    if !self.kinds.get(nx, ny).is_wall() {
                        count += 1;
                    }
                }
                self.dirs.set(x, y, count);
            }
        }
    }

    #[inline]
    pub fn kind(&self, x: usize, y: usize) -> Cell {
        self.kinds.get(x, y)
    }

    #[inline]
    pub fn density(&self, x: usize, y: usize) -> P {
        self.densities.of(self.kinds.get(x, y))
    }

    /// Pressure share divisor for a cell.
    #[inline]
    pub fn dirs_of(&self, x: usize, y: usize) -> P {
        P::from_int(self.dirs.get(x, y) as i64)
    }

    /// Next raw 32-bit draw from the seeded stream.
    ///
    /// The draw counter lets a restored run replay to the same stream
    /// position.
    #[inline]
    pub fn next_bits(&mut self) -> u32 {
        self.rng_draws += 1;
        self.rng.next_u32()
    }

    pub fn rng_draws(&self) -> u64 {
        self.rng_draws
    }

    /// Reset the random stream and replay `draws` values.
    pub fn reseed_and_replay(&mut self, draws: u64) {
        self.rng = StdRng::seed_from_u64(RNG_SEED);
        self.rng_draws = 0;
        for _ in 0..draws {
            self.next_bits();
        }
    }

    /// Exchange kind, pressure and the whole velocity row of two cells.
    ///
    /// Flow, epochs and the neighbour cache stay put; a swap moves the
    /// fluid, not the bookkeeping.
    pub(crate) fn swap_cells(&mut self, a: (usize, usize), b: (usize, usize)) {
        let ka = self.kinds.get(a.0, a.1);
        self.kinds.set(a.0, a.1, self.kinds.get(b.0, b.1));
        self.kinds.set(b.0, b.1, ka);

        let pa = self.p.get(a.0, a.1);
        self.p.set(a.0, a.1, self.p.get(b.0, b.1));
        self.p.set(b.0, b.1, pa);

        let va = self.velocity.row(a.0, a.1);
        let vb = self.velocity.row(b.0, b.1);
        self.velocity.set_row(a.0, a.1, vb);
        self.velocity.set_row(b.0, b.1, va);
    }

    pub fn count_non_wall(&self) -> usize {
        self.kinds
            .as_slice()
            .iter()
            .filter(|kind| !kind.is_wall())
            .count()
    }

    /// Text rendering of the field, one row per line.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((self.cols + 1) * self.rows);
        for x in 0..self.rows {
            for y in 0..self.cols {
                out.push(self.kinds.get(x, y).as_char());
            }
            out.push('\n');
        }
        out
    }
}

fn invalid_field(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("invalid field: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::grid::Static;

    type TestState = FluidState<f64, f64, f64>;

    #[test]
    fn delta_slots_are_stable_and_bijective() {
        for (slot, &(dx, dy)) in DELTAS.iter().enumerate() {
            assert_eq!(slot_of(dx, dy), slot);
            assert_eq!(DELTAS[opposite_slot(slot)], (-dx, -dy));
        }
    }

    #[test]
    fn loads_a_valid_field() {
        let state = TestState::from_field_str("#####\n# . #\n#   #\n#####\n").unwrap();
        assert_eq!(state.rows, 4);
        assert_eq!(state.cols, 5);
        assert_eq!(state.kind(1, 2), Cell::Water);
        assert_eq!(state.kind(2, 2), Cell::Gas);
        assert_eq!(state.count_non_wall(), 6);
    }

    #[test]
    fn render_round_trips_the_field() {
        let text = "#####\n#.  #\n# ..#\n#####\n";
        let state = TestState::from_field_str(text).unwrap();
        assert_eq!(state.render(), text);
    }

    #[test]
    fn rejects_non_rectangular_fields() {
        let err = TestState::from_field_str("####\n#  #\n###\n####").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_open_borders() {
        let err = TestState::from_field_str("####\n#  #\n## #\n## #").unwrap_err();
        assert!(err.to_string().contains("wall"));
    }

    #[test]
    fn rejects_unknown_bytes() {
        let err = TestState::from_field_str("###\n#x#\n###").unwrap_err();
        assert!(err.to_string().contains("unknown cell byte"));
    }

    #[test]
    fn dirs_counts_non_wall_neighbours() {
        let state = TestState::from_field_str("#####\n#   #\n# # #\n#####").unwrap();
        assert_eq!(state.dirs.get(1, 2), 2); // east + west, south is wall
        assert_eq!(state.dirs.get(1, 1), 2);
        assert_eq!(state.dirs.get(2, 1), 1); // only north
    }

    #[test]
    fn swap_exchanges_kind_pressure_and_velocity() {
        let mut state = TestState::from_field_str("####\n#. #\n####").unwrap();
        state.p.set(1, 1, 5.0);
        state.velocity.set(1, 1, 1, 0.25);
        state.swap_cells((1, 1), (1, 2));
        assert_eq!(state.kind(1, 1), Cell::Gas);
        assert_eq!(state.kind(1, 2), Cell::Water);
        assert_eq!(state.p.get(1, 2), 5.0);
        assert_eq!(state.velocity.get(1, 2, 1), 0.25);
        assert_eq!(state.velocity.get(1, 1, 1), 0.0);
    }

    #[test]
    fn replayed_stream_matches_original() {
        let mut a = TestState::blank(3, 3);
        let first: Vec<u32> = (0..10).map(|_| a.next_bits()).collect();

        let mut b = TestState::blank(3, 3);
        b.reseed_and_replay(4);
        let rest: Vec<u32> = (0..6).map(|_| b.next_bits()).collect();
        assert_eq!(&first[4..], &rest[..]);
    }

    #[test]
    fn static_layout_loads_like_dynamic() {
        let text = "####\n#. #\n####\n";
        let dynamic = TestState::from_field_str(text).unwrap();
        let fixed: FluidState<f64, f64, f64, Static<3, 4>> =
            FluidState::from_field_str(text).unwrap();
        assert_eq!(dynamic.render(), fixed.render());
        assert_eq!(dynamic.dirs.as_slice(), fixed.dirs.as_slice());
    }
}
