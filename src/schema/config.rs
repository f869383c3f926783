//! Driver configuration and its validation errors.

use std::path::PathBuf;

use super::types::{ScalarTriple, ScalarType};

/// Configuration for a fresh simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Scalar type of the pressure field.
    pub p_type: ScalarType,
    /// Scalar type of the velocity field.
    pub v_type: ScalarType,
    /// Scalar type of the velocity-flow field.
    pub vf_type: ScalarType,
    /// Path to the field file to load.
    pub field_path: PathBuf,
    /// Worker count for the parallel flow phase.
    pub num_threads: usize,
}

impl SimConfig {
    #[inline]
    pub fn triple(&self) -> ScalarTriple {
        ScalarTriple::new(self.p_type, self.v_type, self.vf_type)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_threads == 0 {
            return Err(ConfigError::InvalidWorkerCount { workers: 0, cols: 0 });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown scalar type: {0}")]
    UnknownScalarType(String),
    #[error("invalid fixed-point spec: {bits} bits with {frac} fractional bits")]
    InvalidScalarSpec { bits: u32, frac: u32 },
    #[error("scalar type {0} is not in the compiled registry")]
    UnsupportedScalarType(ScalarType),
    #[error("{workers} workers cannot partition {cols} columns")]
    InvalidWorkerCount { workers: usize, cols: usize },
    #[error("exactly one of --field-path and --load-path must be given")]
    ConflictingModes,
    #[error("missing required argument {0}")]
    MissingArgument(&'static str),
    #[error("unexpected argument {0}")]
    UnexpectedArgument(String),
    #[error("invalid value for {arg}: {value}")]
    InvalidArgument { arg: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimConfig {
        SimConfig {
            p_type: ScalarType::Double,
            v_type: ScalarType::Double,
            vf_type: ScalarType::Double,
            field_path: PathBuf::from("field.txt"),
            num_threads: 1,
        }
    }

    #[test]
    fn accepts_a_plain_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_zero_workers() {
        let mut cfg = config();
        cfg.num_threads = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidWorkerCount { .. })
        ));
    }
}
