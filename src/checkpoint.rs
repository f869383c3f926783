//! Tick checkpoint serialisation.
//!
//! A checkpoint is a one-line header naming the three scalar types and the
//! grid shape, followed by a JSON payload holding every grid. Scalars
//! serialise as their raw bit patterns (fixed point as the signed integer
//! bits, floats via `to_bits`), so a restore is bit-exact regardless of the
//! numeric type in play.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::compute::{Cell, FluidState, Grid2, GridLayout};
use crate::error::SimError;
use crate::numeric::Scalar;
use crate::schema::{ScalarTriple, ScalarType};

/// The first line of a checkpoint file:
/// `p_type v_type vf_type rows cols`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointHeader {
    pub types: ScalarTriple,
    pub rows: usize,
    pub cols: usize,
}

impl CheckpointHeader {
    pub fn line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.types.p, self.types.v, self.types.vf, self.rows, self.cols
        )
    }

    pub fn parse(line: &str) -> Result<Self, SimError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let &[p, v, vf, rows, cols] = &tokens[..] else {
            return Err(invalid(&format!(
                "checkpoint header has {} tokens, expected 5",
                tokens.len()
            )));
        };
        let types = ScalarTriple::new(
            p.parse::<ScalarType>()?,
            v.parse::<ScalarType>()?,
            vf.parse::<ScalarType>()?,
        );
        let rows = rows
            .parse()
            .map_err(|_| invalid(&format!("bad row count {rows}")))?;
        let cols = cols
            .parse()
            .map_err(|_| invalid(&format!("bad column count {cols}")))?;
        Ok(Self { types, rows, cols })
    }
}

/// Everything needed to resume a run mid-stream.
///
/// Besides the grids this carries the epoch counter and the position of the
/// random stream; both must survive a restore for the continuation to match
/// an uninterrupted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload {
    pub tick: u64,
    pub ut: u32,
    pub rng_draws: u64,
    pub g: u64,
    pub rho: [u64; 2],
    pub p: Vec<u64>,
    pub old_p: Vec<u64>,
    pub field: Vec<String>,
    pub velocity: Vec<[u64; 4]>,
    pub velocity_flow: Vec<[u64; 4]>,
    pub last_use: Vec<u32>,
    pub dirs: Vec<u8>,
}

impl CheckpointPayload {
    pub fn capture<P, V, Vf, L>(state: &FluidState<P, V, Vf, L>) -> Self
    where
        P: Scalar,
        V: Scalar,
        Vf: Scalar,
        L: GridLayout,
    {
        let field = (0..state.rows)
            .map(|x| {
                (0..state.cols)
                    .map(|y| state.kinds.get(x, y).as_char())
                    .collect()
            })
            .collect();
        Self {
            tick: state.tick,
            ut: state.ut,
            rng_draws: state.rng_draws(),
            g: state.gravity.to_bits(),
            rho: [state.densities.gas.to_bits(), state.densities.water.to_bits()],
            p: state.p.as_slice().iter().map(|s| s.to_bits()).collect(),
            old_p: state.old_p.as_slice().iter().map(|s| s.to_bits()).collect(),
            field,
            velocity: state
                .velocity
                .v
                .as_slice()
                .iter()
                .map(|row| row.map(Scalar::to_bits))
                .collect(),
            velocity_flow: state
                .velocity_flow
                .v
                .as_slice()
                .iter()
                .map(|row| row.map(Scalar::to_bits))
                .collect(),
            last_use: state.last_use.as_slice().to_vec(),
            dirs: state.dirs.as_slice().to_vec(),
        }
    }

    /// Populate `state` in place. Grid shapes must already match.
    pub fn apply<P, V, Vf, L>(&self, state: &mut FluidState<P, V, Vf, L>) -> io::Result<()>
    where
        P: Scalar,
        V: Scalar,
        Vf: Scalar,
        L: GridLayout,
    {
        let cells = state.rows * state.cols;
        if self.field.len() != state.rows
            || self.p.len() != cells
            || self.old_p.len() != cells
            || self.velocity.len() != cells
            || self.velocity_flow.len() != cells
            || self.last_use.len() != cells
            || self.dirs.len() != cells
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "checkpoint payload does not match the header dimensions",
            ));
        }

        for (x, row) in self.field.iter().enumerate() {
            if row.len() != state.cols {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("checkpoint field row {x} has width {}", row.len()),
                ));
            }
            for (y, byte) in row.bytes().enumerate() {
                let kind = Cell::from_byte(byte).ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unknown cell byte {byte:#04x} in checkpoint"),
                    )
                })?;
                state.kinds.set(x, y, kind);
            }
        }

        for (dst, &bits) in state.p.as_mut_slice().iter_mut().zip(&self.p) {
            *dst = P::from_bits(bits);
        }
        for (dst, &bits) in state.old_p.as_mut_slice().iter_mut().zip(&self.old_p) {
            *dst = P::from_bits(bits);
        }
        for (dst, bits) in state
            .velocity
            .v
            .as_mut_slice()
            .iter_mut()
            .zip(&self.velocity)
        {
            *dst = bits.map(V::from_bits);
        }
        for (dst, bits) in state
            .velocity_flow
            .v
            .as_mut_slice()
            .iter_mut()
            .zip(&self.velocity_flow)
        {
            *dst = bits.map(Vf::from_bits);
        }
        state.last_use.as_mut_slice().copy_from_slice(&self.last_use);
        state.dirs.as_mut_slice().copy_from_slice(&self.dirs);

        state.densities.gas = P::from_bits(self.rho[0]);
        state.densities.water = P::from_bits(self.rho[1]);
        state.gravity = V::from_bits(self.g);
        state.tick = self.tick;
        state.ut = self.ut;
        state.reseed_and_replay(self.rng_draws);
        Ok(())
    }
}

/// Write a complete checkpoint file.
pub fn write<W: Write + ?Sized>(
    writer: &mut W,
    header: &CheckpointHeader,
    payload: &CheckpointPayload,
) -> io::Result<()> {
    writeln!(writer, "{}", header.line())?;
    serde_json::to_writer(&mut *writer, payload)?;
    Ok(())
}

/// Split a checkpoint file into its header and payload.
pub fn parse(text: &str) -> Result<(CheckpointHeader, CheckpointPayload), SimError> {
    let (head, body) = text
        .split_once('\n')
        .ok_or_else(|| invalid("checkpoint is missing its header line"))?;
    let header = CheckpointHeader::parse(head)?;
    let payload = serde_json::from_str(body)
        .map_err(|e| invalid(&format!("bad checkpoint payload: {e}")))?;
    Ok((header, payload))
}

fn invalid(message: &str) -> SimError {
    SimError::Io(io::Error::new(io::ErrorKind::InvalidData, message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::Fixed32;

    #[test]
    fn header_line_round_trips() {
        let header = CheckpointHeader {
            types: ScalarTriple::new(
                ScalarType::Fixed { bits: 32, frac: 16 },
                ScalarType::Double,
                ScalarType::FastFixed { bits: 40, frac: 8 },
            ),
            rows: 12,
            cols: 34,
        };
        assert_eq!(header.line(), "FIXED(32,16) DOUBLE FAST_FIXED(40,8) 12 34");
        assert_eq!(CheckpointHeader::parse(&header.line()).unwrap(), header);
    }

    #[test]
    fn header_rejects_bad_token_counts() {
        assert!(CheckpointHeader::parse("DOUBLE DOUBLE 4 4").is_err());
        assert!(CheckpointHeader::parse("DOUBLE DOUBLE DOUBLE x 4").is_err());
    }

    #[test]
    fn payload_round_trips_through_state() {
        let mut state: FluidState<Fixed32<16>, f64, f32> =
            FluidState::from_field_str("####\n#. #\n####").unwrap();
        state.p.set(1, 1, Fixed32::<16>::from_f64(3.25));
        state.velocity.set(1, 1, 3, 0.5);
        state.velocity_flow.set(1, 2, 2, 0.25);
        state.last_use.set(1, 2, 9);
        state.ut = 10;
        state.tick = 42;
        let _ = state.next_bits();

        let payload = CheckpointPayload::capture(&state);
        let mut restored: FluidState<Fixed32<16>, f64, f32> = FluidState::blank(3, 4);
        payload.apply(&mut restored).unwrap();

        assert_eq!(CheckpointPayload::capture(&restored), payload);
        assert_eq!(restored.render(), state.render());
        assert_eq!(restored.p.get(1, 1), Fixed32::<16>::from_f64(3.25));
        assert_eq!(restored.tick, 42);
        assert_eq!(restored.ut, 10);
        assert_eq!(restored.next_bits(), {
            let mut again: FluidState<Fixed32<16>, f64, f32> = FluidState::blank(3, 4);
            again.reseed_and_replay(1);
            again.next_bits()
        });
    }

    #[test]
    fn apply_rejects_mismatched_shapes() {
        let state: FluidState<f64, f64, f64> =
            FluidState::from_field_str("####\n#  #\n####").unwrap();
        let payload = CheckpointPayload::capture(&state);
        let mut bigger: FluidState<f64, f64, f64> = FluidState::blank(4, 4);
        assert!(payload.apply(&mut bigger).is_err());
    }

    #[test]
    fn file_form_round_trips() {
        let state: FluidState<f64, f64, f64> =
            FluidState::from_field_str("####\n# .#\n####").unwrap();
        let header = CheckpointHeader {
            types: ScalarTriple::splat(ScalarType::Double),
            rows: state.rows,
            cols: state.cols,
        };
        let payload = CheckpointPayload::capture(&state);

        let mut buffer = Vec::new();
        write(&mut buffer, &header, &payload).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let (parsed_header, parsed_payload) = parse(&text).unwrap();
        assert_eq!(parsed_header, header);
        assert_eq!(parsed_payload, payload);
    }
}
