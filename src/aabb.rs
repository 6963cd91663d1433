//! Axis Aligned Bounding Boxes.

use std::ops::Index;

use crate::utils::{fast_max, fast_min};
use crate::{Point3, Real, Vector3};

/// Index of the X axis. Used to access `Vector3`/`Point3` structs via index.
pub const X_AXIS: usize = 0;

/// Index of the Y axis. Used to access `Vector3`/`Point3` structs via index.
pub const Y_AXIS: usize = 1;

/// Index of the Z axis. Used to access `Vector3`/`Point3` structs via index.
pub const Z_AXIS: usize = 2;

/// [`Aabb`] struct.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    /// Minimum coordinates.
    pub min: Point3,

    /// Maximum coordinates.
    pub max: Point3,
}

/// A trait implemented by things which can be bounded by an [`Aabb`].
pub trait Bounded {
    /// Returns the [`Aabb`] bounding `self`.
    fn aabb(&self) -> Aabb;
}

impl Aabb {
    /// Creates a new [`Aabb`] with the given bounds.
    pub fn with_bounds(min: Point3, max: Point3) -> Aabb {
        Aabb { min, max }
    }

    /// Creates a new empty [`Aabb`]. Joining it with any other box yields
    /// that box unchanged.
    pub fn empty() -> Aabb {
        Aabb {
            min: Point3::new(Real::INFINITY, Real::INFINITY, Real::INFINITY),
            max: Point3::new(Real::NEG_INFINITY, Real::NEG_INFINITY, Real::NEG_INFINITY),
        }
    }

    /// Returns true if the [`Aabb`] contains no points.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Returns true if all bounds are finite. Empty boxes are not valid;
    /// producers are expected to hand the builder non-degenerate geometry.
    pub fn is_valid(&self) -> bool {
        self.min.iter().all(|c| c.is_finite()) && self.max.iter().all(|c| c.is_finite())
    }

    /// Returns true if the [`Point3`] is inside the [`Aabb`].
    pub fn contains(&self, p: &Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns true if `other` is fully inside this [`Aabb`], allowing a
    /// slack of `epsilon` on every face.
    pub fn approx_contains_aabb_eps(&self, other: &Aabb, epsilon: Real) -> bool {
        (0..3).all(|axis| {
            other.min[axis] >= self.min[axis] - epsilon
                && other.max[axis] <= self.max[axis] + epsilon
        })
    }

    /// Returns a new minimal [`Aabb`] which contains both this [`Aabb`] and
    /// `other`.
    pub fn join(&self, other: &Aabb) -> Aabb {
        Aabb::with_bounds(
            Point3::new(
                fast_min(self.min.x, other.min.x),
                fast_min(self.min.y, other.min.y),
                fast_min(self.min.z, other.min.z),
            ),
            Point3::new(
                fast_max(self.max.x, other.max.x),
                fast_max(self.max.y, other.max.y),
                fast_max(self.max.z, other.max.z),
            ),
        )
    }

    /// Joins `other` into this [`Aabb`] in place.
    pub fn join_mut(&mut self, other: &Aabb) {
        *self = self.join(other);
    }

    /// Returns a new minimal [`Aabb`] which contains both this [`Aabb`] and
    /// the [`Point3`] `other`.
    pub fn grow(&self, other: &Point3) -> Aabb {
        Aabb::with_bounds(
            Point3::new(
                fast_min(self.min.x, other.x),
                fast_min(self.min.y, other.y),
                fast_min(self.min.z, other.z),
            ),
            Point3::new(
                fast_max(self.max.x, other.x),
                fast_max(self.max.y, other.y),
                fast_max(self.max.z, other.z),
            ),
        )
    }

    /// Returns the size of this [`Aabb`] in all three dimensions.
    pub fn size(&self) -> Vector3 {
        self.max - self.min
    }

    /// Returns the center point of the [`Aabb`].
    pub fn center(&self) -> Point3 {
        self.min + (self.size() / 2.0)
    }

    /// Returns the total surface area of this [`Aabb`].
    pub fn surface_area(&self) -> Real {
        let size = self.size();
        2.0 * (size.x * size.y + size.x * size.z + size.y * size.z)
    }

    /// Returns the volume of this [`Aabb`].
    pub fn volume(&self) -> Real {
        let size = self.size();
        size.x * size.y * size.z
    }

    /// Returns the axis along which the [`Aabb`] is stretched the most.
    pub fn largest_axis(&self) -> usize {
        let size = self.size();
        if size.x > size.y && size.x > size.z {
            X_AXIS
        } else if size.y > size.z {
            Y_AXIS
        } else {
            Z_AXIS
        }
    }
}

impl Default for Aabb {
    fn default() -> Aabb {
        Aabb::empty()
    }
}

/// Make [`Aabb`]s indexable. `aabb[0]` gives a reference to the minimum bound.
/// All other indices return a reference to the maximum bound.
impl Index<usize> for Aabb {
    type Output = Point3;

    fn index(&self, index: usize) -> &Point3 {
        if index == 0 {
            &self.min
        } else {
            &self.max
        }
    }
}

/// Implementation of [`Bounded`] for [`Aabb`] itself.
impl Bounded for Aabb {
    fn aabb(&self) -> Aabb {
        *self
    }
}

/// Implementation of [`Bounded`] for single points.
impl Bounded for Point3 {
    fn aabb(&self) -> Aabb {
        Aabb::with_bounds(*self, *self)
    }
}
