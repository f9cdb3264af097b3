use crate::nalgebra_types::*;

/// A half line `origin + t * direction` restricted to `t_min <= t < t_max`.
///
/// The direction does not need to be normalized. Intersection callbacks may
/// lower `t_max` while a query is running to cut off farther candidates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray<T: FloatField> {
    pub origin: SVector<T, 3>,
    pub direction: SVector<T, 3>,
    pub t_min: T,
    pub t_max: T,
}

impl<T: FloatField> Ray<T> {
    /// A ray starting at `origin` with no upper limit.
    pub fn new(origin: SVector<T, 3>, direction: SVector<T, 3>) -> Ray<T> {
        Ray::with_interval(origin, direction, T::zero(), T::max_finite())
    }

    pub fn with_interval(
        origin: SVector<T, 3>,
        direction: SVector<T, 3>,
        t_min: T,
        t_max: T,
    ) -> Ray<T> {
        Ray {
            origin,
            direction,
            t_min,
            t_max,
        }
    }

    pub fn at(&self, t: T) -> SVector<T, 3> {
        self.origin + self.direction * t
    }

    /// One bit per axis, set when the direction is negative along that axis.
    /// Matches the octant bit layout, so `octant ^ mask` mirrors a child index
    /// into the ray's front-to-back order.
    pub fn negative_octant_mask(&self) -> u8 {
        (0..3).fold(0u8, |mask, axis| {
            if self.direction[axis] < T::zero() {
                mask | (1 << axis)
            } else {
                mask
            }
        })
    }
}
