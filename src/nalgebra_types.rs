pub use nalgebra::base::dimension::*;
pub use nalgebra::base::*;
pub use nalgebra::*;
pub use num_traits::float::Float;
pub use num_traits::identities::{One, Zero};

// RealField gives us from_f64 but only as an Option, and no finite max.
// The octree needs a few constants of its own in every precision.
pub trait FloatField: RealField + Copy {
    fn half() -> Self;
    fn two() -> Self;
    fn as_f64(self) -> f64;
    fn frm_f64(x: f64) -> Self;

    /// Largest finite value. Rays use it as an unbounded upper limit.
    fn max_finite() -> Self;

    /// Stand-in for an infinite ray parameter. Small enough that the sum of
    /// two of them is still finite.
    fn huge() -> Self {
        Self::max_finite() * Self::half() * Self::half()
    }
}

impl FloatField for f32 {
    fn half() -> f32 {
        0.5f32
    }

    fn two() -> f32 {
        2.0f32
    }

    fn as_f64(self) -> f64 {
        self as f64
    }

    fn frm_f64(x: f64) -> f32 {
        x as f32
    }

    fn max_finite() -> f32 {
        f32::MAX
    }
}

impl FloatField for f64 {
    fn half() -> f64 {
        0.5
    }

    fn two() -> f64 {
        2.0
    }

    fn as_f64(self) -> f64 {
        self
    }

    fn frm_f64(x: f64) -> f64 {
        x
    }

    fn max_finite() -> f64 {
        f64::MAX
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn huge_sums_stay_finite() {
        assert!((f32::huge() + f32::huge()).is_finite());
        assert!((f64::huge() + f64::huge()).is_finite());
        assert!(-f64::huge() < f64::huge());
    }

    #[test]
    fn round_trip_f32() {
        assert_eq!(f32::frm_f64(0.25).as_f64(), 0.25);
        assert_eq!(f32::two() * f32::half(), 1.0);
    }
}
