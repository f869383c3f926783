//! Native floating-point scalars.

use super::{Exact, Scalar};

impl Scalar for f64 {
    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    #[inline]
    fn from_int(value: i64) -> Self {
        value as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn random01(bits: u32) -> Self {
        bits as f64 / 4_294_967_296.0
    }

    fn to_exact(self) -> Exact {
        if self == 0.0 {
            return Exact { raw: 0, frac: 0 };
        }
        debug_assert!(self.is_finite(), "non-finite scalar in conversion");
        let bits = self.to_bits();
        let sign = if bits >> 63 == 1 { -1i128 } else { 1 };
        let biased = ((bits >> 52) & 0x7ff) as i32;
        let mantissa = (bits & ((1u64 << 52) - 1)) as i128;
        let (raw, exp) = if biased == 0 {
            (mantissa, -1074)
        } else {
            (mantissa | (1 << 52), biased - 1075)
        };
        Exact { raw: sign * raw, frac: -exp }
    }

    #[inline]
    fn from_exact(exact: Exact) -> Self {
        exact.raw as f64 * 2f64.powi(-exact.frac)
    }

    #[inline]
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

impl Scalar for f32 {
    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    #[inline]
    fn from_int(value: i64) -> Self {
        value as f32
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn random01(bits: u32) -> Self {
        // Keep 24 bits so the result is exactly representable below 1.0.
        (bits >> 8) as f32 / 16_777_216.0
    }

    #[inline]
    fn to_exact(self) -> Exact {
        (self as f64).to_exact()
    }

    #[inline]
    fn from_exact(exact: Exact) -> Self {
        f64::from_exact(exact) as f32
    }

    #[inline]
    fn to_bits(self) -> u64 {
        f32::to_bits(self) as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_decomposition_round_trips() {
        for &v in &[0.0, 1.0, -2.5, 0.01, 1e-10, 123456.789, -1e12] {
            let e = v.to_exact();
            assert_eq!(f64::from_exact(e), v);
        }
    }

    #[test]
    fn random01_endpoints() {
        assert_eq!(f64::random01(0), 0.0);
        assert!(f64::random01(u32::MAX) < 1.0);
        assert_eq!(f32::random01(0), 0.0);
        assert!(f32::random01(u32::MAX) < 1.0);
    }

    #[test]
    fn bit_round_trip() {
        for &v in &[0.0f64, -0.0, 1.5, f64::MIN_POSITIVE] {
            assert_eq!(f64::from_bits(Scalar::to_bits(v)).to_bits(), v.to_bits());
        }
        let v = 1.25f32;
        assert_eq!(<f32 as Scalar>::from_bits(Scalar::to_bits(v)), v);
    }

    proptest! {
        #[test]
        fn random01_stays_in_unit_interval(bits in any::<u32>()) {
            let a = f64::random01(bits);
            prop_assert!((0.0..1.0).contains(&a));
            let b = f32::random01(bits);
            prop_assert!((0.0..1.0).contains(&b));
        }

        #[test]
        fn exact_round_trip_any_normal(v in -1e12f64..1e12) {
            prop_assert_eq!(f64::from_exact(v.to_exact()), v);
        }
    }
}
