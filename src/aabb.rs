use crate::nalgebra_types::*;
use crate::ray::Ray;

/// Axis aligned box given by its two corners.
/// A box may be flat or a single point, but `min` never exceeds `max`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AABB<T: RealField, const D: usize> {
    min: SVector<T, D>,
    max: SVector<T, D>,
}

/// The three dimensional boxes that objects are indexed by.
pub type BoundingBox<T> = AABB<T, 3>;

impl<T: FloatField, const D: usize> AABB<T, D> {
    pub fn from_points(min: SVector<T, D>, max: SVector<T, D>) -> AABB<T, D> {
        AABB { min, max }
    }

    pub fn from_point(c: SVector<T, D>) -> AABB<T, D> {
        AABB { min: c, max: c }
    }

    /// An inverted box that any point or box can be added to.
    pub fn blank() -> AABB<T, D> {
        AABB {
            min: SVector::<T, D>::from_element(T::max_finite()),
            max: SVector::<T, D>::from_element(-T::max_finite()),
        }
    }

    pub fn min(&self) -> &SVector<T, D> {
        &self.min
    }

    pub fn max(&self) -> &SVector<T, D> {
        &self.max
    }

    pub fn mut_add_point(&mut self, p: &SVector<T, D>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn mut_add_aabb(&mut self, other: &AABB<T, D>) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Finite corners and `min <= max` on every axis.
    pub fn is_valid(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|c| c.is_finite()) && self.min <= self.max
    }

    /// Inclusive: a box sharing a face with `self` is still contained.
    pub fn contains_aabb(&self, other: &AABB<T, D>) -> bool {
        other.min >= self.min && other.max <= self.max
    }

    /// The part of `self` inside `other`. Only meaningful when they overlap.
    pub fn clipped_to(&self, other: &AABB<T, D>) -> AABB<T, D> {
        AABB {
            min: self.min.sup(&other.min),
            max: self.max.inf(&other.max),
        }
    }

    pub fn unite<'a, I: Iterator<Item = &'a AABB<T, D>>>(iter: I) -> AABB<T, D> {
        iter.fold(AABB::blank(), |mut a, b| {
            a.mut_add_aabb(b);
            a
        })
    }

    /// Return the size of the Box.
    pub fn diagonal(&self) -> SVector<T, D> {
        self.max - self.min
    }

    pub fn max_extent(&self) -> T {
        self.diagonal().max()
    }

    pub fn average_extent(&self) -> T {
        self.diagonal().sum() / T::frm_f64(D as f64)
    }
}

impl<T: FloatField> AABB<T, 3> {
    /// Slab test. Returns the parametric range of `ray` inside the box,
    /// limited to the ray's own `[t_min, t_max)`, or `None` when that range
    /// is empty. Touching a box in a single point does not count.
    pub fn ray_interval(&self, ray: &Ray<T>) -> Option<(T, T)> {
        let mut enter = ray.t_min;
        let mut exit = ray.t_max;
        for axis in 0..3 {
            let o = ray.origin[axis];
            let d = ray.direction[axis];
            if d == T::zero() {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = T::one() / d;
            let mut near = (self.min[axis] - o) * inv;
            let mut far = (self.max[axis] - o) * inv;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            enter = enter.max(near);
            exit = exit.min(far);
        }
        (enter < exit).then_some((enter, exit))
    }
}
