//! Maps configured scalar type names onto compiled engine instantiations.
//!
//! The engine is monomorphised per scalar type, so only a registry of
//! compiled-in types can be named at runtime. The registry mirrors a
//! compile-time type list: fast-fixed names normalise to their storage
//! width first, and anything outside the list is a configuration error
//! rather than a gap in the numeric tower.

use std::fs;
use std::path::Path;

use crate::checkpoint;
use crate::compute::{FluidEngine, Simulator};
use crate::error::SimError;
use crate::schema::{ConfigError, ScalarType, SimConfig};

/// Compiled-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegistryKey {
    F32,
    F64,
    Fx32q16,
    Fx64q16,
}

fn registry_key(ty: ScalarType) -> Result<RegistryKey, ConfigError> {
    match ty {
        ScalarType::Float => Ok(RegistryKey::F32),
        ScalarType::Double => Ok(RegistryKey::F64),
        ScalarType::Fixed { .. } | ScalarType::FastFixed { .. } => {
            match (ty.storage_bits(), ty.frac_bits()) {
                (Some(32), Some(16)) => Ok(RegistryKey::Fx32q16),
                (Some(64), Some(16)) => Ok(RegistryKey::Fx64q16),
                _ => Err(ConfigError::UnsupportedScalarType(ty)),
            }
        }
    }
}

macro_rules! with_scalar {
    ($key:expr, $ty:ident, $body:expr) => {
        match $key {
            RegistryKey::F32 => {
                type $ty = f32;
                $body
            }
            RegistryKey::F64 => {
                type $ty = f64;
                $body
            }
            RegistryKey::Fx32q16 => {
                type $ty = crate::numeric::Fixed32<16>;
                $body
            }
            RegistryKey::Fx64q16 => {
                type $ty = crate::numeric::Fixed64<16>;
                $body
            }
        }
    };
}

/// Build a fresh engine from a run configuration.
pub fn build_engine(config: &SimConfig) -> Result<Box<dyn Simulator>, SimError> {
    config.validate()?;
    let text = fs::read_to_string(&config.field_path)?;
    let triple = config.triple();
    let p_key = registry_key(config.p_type)?;
    let v_key = registry_key(config.v_type)?;
    let vf_key = registry_key(config.vf_type)?;
    with_scalar!(p_key, P, with_scalar!(v_key, V, with_scalar!(vf_key, Vf, {
        let engine =
            FluidEngine::<P, V, Vf>::from_field_str(&text, triple, config.num_threads)?;
        Ok(Box::new(engine) as Box<dyn Simulator>)
    })))
}

/// Restore an engine from a checkpoint file, choosing the concrete types
/// from its header.
pub fn load_checkpoint(path: &Path, num_threads: usize) -> Result<Box<dyn Simulator>, SimError> {
    let text = fs::read_to_string(path)?;
    let (header, payload) = checkpoint::parse(&text)?;
    let p_key = registry_key(header.types.p)?;
    let v_key = registry_key(header.types.v)?;
    let vf_key = registry_key(header.types.vf)?;
    with_scalar!(p_key, P, with_scalar!(v_key, V, with_scalar!(vf_key, Vf, {
        let engine = FluidEngine::<P, V, Vf>::from_checkpoint(&header, &payload, num_threads)?;
        Ok(Box::new(engine) as Box<dyn Simulator>)
    })))
}
