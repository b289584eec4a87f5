//! Numeric precision abstraction

use nalgebra::RealField;

use crate::execution::Dtype;

/// Points closer than this are coincident, in every precision
pub const COINCIDENT_DISTANCE: f64 = 1e-6;

/// Floating point scalar the descriptor engine can run in.
///
/// Implemented for `f32` and `f64`. Every backend is generic over this trait,
/// so the same two-pass algorithm is instantiated once per precision.
pub trait Real: RealField + Copy + Default {
    /// Runtime tag matching this precision
    const DTYPE: Dtype;

    /// Convert from an `f64` literal or value (rounding for `f32`)
    fn cast_f64(value: f64) -> Self;

    /// Widen to `f64`
    fn as_f64(self) -> f64;

    /// Distances at or below this value are treated as coincident points
    #[inline]
    fn distance_epsilon() -> Self {
        Self::cast_f64(COINCIDENT_DISTANCE)
    }

    /// Convert a count to this precision
    fn from_count(count: usize) -> Self {
        Self::cast_f64(count as f64)
    }
}

impl Real for f32 {
    const DTYPE: Dtype = Dtype::Float32;

    #[inline]
    fn cast_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Real for f64 {
    const DTYPE: Dtype = Dtype::Float64;

    #[inline]
    fn cast_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_tags() {
        assert_eq!(<f32 as Real>::DTYPE, Dtype::Float32);
        assert_eq!(<f64 as Real>::DTYPE, Dtype::Float64);
    }

    #[test]
    fn test_casts() {
        assert_eq!(<f32 as Real>::cast_f64(0.5), 0.5f32);
        assert_eq!(<f64 as Real>::from_count(7), 7.0);
        assert!(<f32 as Real>::distance_epsilon() > 0.0);
        assert_eq!(
            <f32 as Real>::distance_epsilon() as f64,
            <f64 as Real>::distance_epsilon() as f32 as f64
        );
    }
}
