//! This module defines a Ray structure and intersection algorithms
//! for axis aligned bounding boxes and triangles.

use crate::aabb::Aabb;
use crate::utils::{fast_max, fast_min};
use crate::{Point3, Real, Vector3, EPSILON};

/// A struct which defines a ray and some of its cached values.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The ray origin.
    pub origin: Point3,

    /// The ray direction (normalized).
    pub direction: Vector3,

    /// Inverse (1/x) ray direction. Cached for use in [`Aabb`] intersections.
    /// Zero direction components map to a large finite value of the same sign
    /// so the slab arithmetic never folds a NaN into its min/max chain.
    pub inv_direction: Vector3,

    /// Per-axis direction sign; `1` where the direction component is
    /// negative. Encodes the ray octant for front-to-back child ordering.
    sign: [u32; 3],
}

/// A struct which is returned by the [`Ray::intersects_triangle()`] method.
pub struct Intersection {
    /// Distance from the ray origin to the intersection point.
    pub distance: Real,

    /// U coordinate of the intersection.
    pub u: Real,

    /// V coordinate of the intersection.
    pub v: Real,
}

impl Intersection {
    /// Constructs an [`Intersection`]. `distance` should be set to positive
    /// infinity, if the intersection does not occur.
    pub fn new(distance: Real, u: Real, v: Real) -> Intersection {
        Intersection { distance, u, v }
    }
}

/// Reciprocal that stays finite for zero (and subnormal) inputs.
#[inline(always)]
fn safe_inverse(x: Real) -> Real {
    let inv = 1.0 / x;
    if inv.is_finite() {
        inv
    } else {
        Real::MAX.copysign(x)
    }
}

impl Ray {
    /// Creates a new [`Ray`] from an `origin` and a `direction`.
    /// `direction` will be normalized.
    ///
    /// # Examples
    /// ```
    /// use sweep_bvh::ray::Ray;
    /// use sweep_bvh::{Point3, Vector3};
    ///
    /// let origin = Point3::new(0.0, 0.0, 0.0);
    /// let direction = Vector3::new(1.0, 0.0, 0.0);
    /// let ray = Ray::new(origin, direction);
    ///
    /// assert_eq!(ray.origin, origin);
    /// assert_eq!(ray.direction, direction);
    /// ```
    pub fn new(origin: Point3, direction: Vector3) -> Ray {
        let direction = direction.normalize();
        Ray {
            origin,
            direction,
            inv_direction: direction.map(safe_inverse),
            sign: [
                (direction.x < 0.0) as u32,
                (direction.y < 0.0) as u32,
                (direction.z < 0.0) as u32,
            ],
        }
    }

    /// Returns `1` if the direction component along `axis` is negative,
    /// `0` otherwise.
    #[inline(always)]
    pub fn sign(&self, axis: usize) -> u32 {
        self.sign[axis]
    }

    /// Tests the intersection of this [`Ray`] with an [`Aabb`] using the slab
    /// method. Returns the entry and exit distances, with the entry distance
    /// clamped at zero for rays starting inside the box, or [`None`] when the
    /// box is missed entirely or lies behind the origin.
    ///
    /// # Examples
    /// ```
    /// use sweep_bvh::aabb::Aabb;
    /// use sweep_bvh::ray::Ray;
    /// use sweep_bvh::{Point3, Vector3};
    ///
    /// let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
    /// let aabb = Aabb::with_bounds(Point3::new(99.0, -1.0, -1.0), Point3::new(100.0, 1.0, 1.0));
    ///
    /// let (entry, exit) = ray.intersection_distances_for_aabb(&aabb).unwrap();
    /// assert_eq!(entry, 99.0);
    /// assert_eq!(exit, 100.0);
    /// ```
    pub fn intersection_distances_for_aabb(&self, aabb: &Aabb) -> Option<(Real, Real)> {
        let mut entry_distance: Real = 0.0;
        let mut exit_distance = Real::INFINITY;

        for axis in 0..3 {
            let t1 = (aabb.min[axis] - self.origin[axis]) * self.inv_direction[axis];
            let t2 = (aabb.max[axis] - self.origin[axis]) * self.inv_direction[axis];

            entry_distance = fast_max(entry_distance, fast_min(t1, t2));
            exit_distance = fast_min(exit_distance, fast_max(t1, t2));
        }

        if entry_distance <= exit_distance {
            Some((entry_distance, exit_distance))
        } else {
            None
        }
    }

    /// Tests the intersection of this [`Ray`] with an [`Aabb`].
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.intersection_distances_for_aabb(aabb).is_some()
    }

    /// Implementation of the
    /// [Möller-Trumbore triangle/ray intersection algorithm](https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm).
    /// Returns the distance to the intersection, as well as
    /// the u and v coordinates of the intersection.
    /// The distance is set to +INFINITY if the ray does not intersect the
    /// triangle. Both faces are tested; backfaces are not culled, since
    /// shadow rays through closed meshes must see them.
    #[allow(clippy::many_single_char_names)]
    pub fn intersects_triangle(&self, a: &Point3, b: &Point3, c: &Point3) -> Intersection {
        let a_to_b = *b - *a;
        let a_to_c = *c - *a;

        // Begin calculating determinant - also used to calculate u parameter
        // u_vec lies in view plane
        // length of a_to_c in view_plane = |u_vec| = |a_to_c|*sin(a_to_c, dir)
        let u_vec = self.direction.cross(&a_to_c);

        // If determinant is near zero, ray lies in plane of triangle
        // The determinant corresponds to the parallelepiped volume:
        // det = 0 => [dir, a_to_b, a_to_c] not linearly independant
        let det = a_to_b.dot(&u_vec);
        if det.abs() < EPSILON {
            return Intersection::new(Real::INFINITY, 0.0, 0.0);
        }

        let inv_det = 1.0 / det;

        // Vector from point a to ray origin
        let a_to_origin = self.origin - *a;

        // Calculate u parameter
        let u = a_to_origin.dot(&u_vec) * inv_det;

        // Test bounds: u < 0 || u > 1 => outside of triangle
        if !(0.0..=1.0).contains(&u) {
            return Intersection::new(Real::INFINITY, u, 0.0);
        }

        // Prepare to test v parameter
        let v_vec = a_to_origin.cross(&a_to_b);

        // Calculate v parameter and test bound
        let v = self.direction.dot(&v_vec) * inv_det;
        // The intersection lies outside of the triangle
        if v < 0.0 || u + v > 1.0 {
            return Intersection::new(Real::INFINITY, u, v);
        }

        let dist = a_to_c.dot(&v_vec) * inv_det;

        if dist > EPSILON {
            Intersection::new(dist, u, v)
        } else {
            Intersection::new(Real::INFINITY, u, v)
        }
    }
}
