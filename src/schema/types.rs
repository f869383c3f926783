//! Scalar type names as they appear on the command line and in checkpoint
//! headers.

use std::fmt;
use std::str::FromStr;

use super::config::ConfigError;

/// A configured scalar type.
///
/// `FIXED(N, K)` stores exactly `N` bits; `FAST_FIXED(N, K)` rounds the
/// storage up to the next machine width, which also moves the wrap-around
/// point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Float,
    Double,
    Fixed { bits: u32, frac: u32 },
    FastFixed { bits: u32, frac: u32 },
}

impl ScalarType {
    /// Width of the integer that actually backs a fixed-point value.
    /// `None` for the float types.
    pub fn storage_bits(self) -> Option<u32> {
        match self {
            ScalarType::Float | ScalarType::Double => None,
            ScalarType::Fixed { bits, .. } => Some(bits),
            ScalarType::FastFixed { bits, .. } => Some(match bits {
                0..=8 => 8,
                9..=16 => 16,
                17..=32 => 32,
                _ => 64,
            }),
        }
    }

    pub fn frac_bits(self) -> Option<u32> {
        match self {
            ScalarType::Float | ScalarType::Double => None,
            ScalarType::Fixed { frac, .. } | ScalarType::FastFixed { frac, .. } => Some(frac),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::Float => write!(f, "FLOAT"),
            ScalarType::Double => write!(f, "DOUBLE"),
            ScalarType::Fixed { bits, frac } => write!(f, "FIXED({bits},{frac})"),
            ScalarType::FastFixed { bits, frac } => write!(f, "FAST_FIXED({bits},{frac})"),
        }
    }
}

impl FromStr for ScalarType {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, ConfigError> {
        let input = input.trim();
        match input {
            "FLOAT" => return Ok(ScalarType::Float),
            "DOUBLE" => return Ok(ScalarType::Double),
            _ => {}
        }

        let (fast, body) = if let Some(rest) = input.strip_prefix("FAST_FIXED") {
            (true, rest)
        } else if let Some(rest) = input.strip_prefix("FIXED") {
            (false, rest)
        } else {
            return Err(ConfigError::UnknownScalarType(input.to_string()));
        };

        let body = body
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| ConfigError::UnknownScalarType(input.to_string()))?;
        let (bits, frac) = body
            .split_once(',')
            .ok_or_else(|| ConfigError::UnknownScalarType(input.to_string()))?;
        let bits: u32 = bits
            .trim()
            .parse()
            .map_err(|_| ConfigError::UnknownScalarType(input.to_string()))?;
        let frac: u32 = frac
            .trim()
            .parse()
            .map_err(|_| ConfigError::UnknownScalarType(input.to_string()))?;

        if bits == 0 || bits > 64 || frac >= bits {
            return Err(ConfigError::InvalidScalarSpec { bits, frac });
        }
        if !fast && ![8, 16, 32, 64].contains(&bits) {
            return Err(ConfigError::InvalidScalarSpec { bits, frac });
        }

        Ok(if fast {
            ScalarType::FastFixed { bits, frac }
        } else {
            ScalarType::Fixed { bits, frac }
        })
    }
}

/// The three scalar types an engine instantiation is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarTriple {
    pub p: ScalarType,
    pub v: ScalarType,
    pub vf: ScalarType,
}

impl ScalarTriple {
    pub fn new(p: ScalarType, v: ScalarType, vf: ScalarType) -> Self {
        Self { p, v, vf }
    }

    /// The same type in all three positions.
    pub fn splat(ty: ScalarType) -> Self {
        Self { p: ty, v: ty, vf: ty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_four_forms() {
        assert_eq!("DOUBLE".parse::<ScalarType>().unwrap(), ScalarType::Double);
        assert_eq!("FLOAT".parse::<ScalarType>().unwrap(), ScalarType::Float);
        assert_eq!(
            "FIXED(32,16)".parse::<ScalarType>().unwrap(),
            ScalarType::Fixed { bits: 32, frac: 16 }
        );
        assert_eq!(
            "FAST_FIXED(25, 11)".parse::<ScalarType>().unwrap(),
            ScalarType::FastFixed { bits: 25, frac: 11 }
        );
    }

    #[test]
    fn display_round_trips() {
        for ty in [
            ScalarType::Float,
            ScalarType::Double,
            ScalarType::Fixed { bits: 64, frac: 16 },
            ScalarType::FastFixed { bits: 40, frac: 8 },
        ] {
            assert_eq!(ty.to_string().parse::<ScalarType>().unwrap(), ty);
        }
    }

    #[test]
    fn rejects_malformed_names() {
        assert!("INT".parse::<ScalarType>().is_err());
        assert!("FIXED(32)".parse::<ScalarType>().is_err());
        assert!("FIXED(32,16".parse::<ScalarType>().is_err());
        assert!("FIXED(a,b)".parse::<ScalarType>().is_err());
    }

    #[test]
    fn rejects_invalid_specs() {
        // Strict FIXED allows only machine widths.
        assert!("FIXED(24,8)".parse::<ScalarType>().is_err());
        // The fraction must leave at least one integer bit.
        assert!("FIXED(32,32)".parse::<ScalarType>().is_err());
        assert!("FAST_FIXED(65,16)".parse::<ScalarType>().is_err());
    }

    #[test]
    fn fast_fixed_rounds_storage_up() {
        let ty = "FAST_FIXED(25,11)".parse::<ScalarType>().unwrap();
        assert_eq!(ty.storage_bits(), Some(32));
        let ty = "FAST_FIXED(33,16)".parse::<ScalarType>().unwrap();
        assert_eq!(ty.storage_bits(), Some(64));
        let ty = "FIXED(16,8)".parse::<ScalarType>().unwrap();
        assert_eq!(ty.storage_bits(), Some(16));
    }
}
