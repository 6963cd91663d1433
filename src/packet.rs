//! 8-wide ray packets in SoA form, together with the SIMD intersection
//! routines used by packet traversal. Built on the [`wide`] crate.

use wide::{f32x8, i32x8, CmpGe, CmpGt, CmpLe, CmpLt};

use crate::aabb::Aabb;
use crate::ray::Ray;
use crate::{Point3, Real, EPSILON};

/// Number of rays in a packet.
pub const PACKET_SIZE: usize = 8;

/// Lane mask value with all 8 lanes set.
const ALL_LANES: i32 = 0xFF;

/// A bundle of 8 rays sharing one BVH walk. Components are stored axis-major
/// so every intersection test runs on whole registers.
#[derive(Debug, Clone, Copy)]
pub struct RayPacket8 {
    /// Ray origins, one register per axis.
    pub origin: [f32x8; 3],

    /// Ray directions, one register per axis.
    pub direction: [f32x8; 3],

    /// Cached inverse directions, one register per axis.
    pub inv_direction: [f32x8; 3],

    /// Per-axis sign masks of the direction registers. Lane `i` is set when
    /// ray `i` points in the negative direction along the axis.
    sign_mask: [i32; 3],
}

/// A struct which is returned by the [`RayPacket8::intersects_triangle()`]
/// method. Lanes which miss carry a distance of +INFINITY.
pub struct Intersection8 {
    /// Distance from each ray origin to its intersection point.
    pub distance: f32x8,

    /// U coordinates of the intersections.
    pub u: f32x8,

    /// V coordinates of the intersections.
    pub v: f32x8,
}

/// Per-lane hit state for packet traversal. Distances double as the maximum
/// search distance, exactly like the scalar [`HitPoint`].
///
/// [`HitPoint`]: ../bvh/struct.HitPoint.html
#[derive(Debug, Clone, Copy)]
pub struct HitPacket8 {
    /// Per-lane distance to the closest hit found so far.
    pub distance: f32x8,

    /// Per-lane U coordinate of the closest hit.
    pub u: f32x8,

    /// Per-lane V coordinate of the closest hit.
    pub v: f32x8,

    /// Per-lane primitive index of the closest hit, `-1` for no hit.
    pub prim_index: i32x8,

    /// Per-lane object id of the closest hit, `-1` for no hit.
    pub object_id: i32x8,
}

impl RayPacket8 {
    /// Gathers 8 scalar [`Ray`]s into a packet.
    pub fn new(rays: &[Ray; PACKET_SIZE]) -> RayPacket8 {
        let mut origin = [f32x8::ZERO; 3];
        let mut direction = [f32x8::ZERO; 3];
        let mut inv_direction = [f32x8::ZERO; 3];

        for axis in 0..3 {
            let mut o = [0.0; PACKET_SIZE];
            let mut d = [0.0; PACKET_SIZE];
            let mut inv = [0.0; PACKET_SIZE];
            for lane in 0..PACKET_SIZE {
                o[lane] = rays[lane].origin[axis];
                d[lane] = rays[lane].direction[axis];
                inv[lane] = rays[lane].inv_direction[axis];
            }
            origin[axis] = f32x8::from(o);
            direction[axis] = f32x8::from(d);
            inv_direction[axis] = f32x8::from(inv);
        }

        let sign_mask = [
            direction[0].cmp_lt(f32x8::ZERO).move_mask(),
            direction[1].cmp_lt(f32x8::ZERO).move_mask(),
            direction[2].cmp_lt(f32x8::ZERO).move_mask(),
        ];

        RayPacket8 {
            origin,
            direction,
            inv_direction,
            sign_mask,
        }
    }

    /// Returns the shared direction sign along `axis` when all 8 rays agree
    /// (`0` for positive, `1` for negative), or [`None`] for mixed octants.
    /// Mixed octants forfeit front-to-back child ordering; both children must
    /// be visited.
    #[inline(always)]
    pub fn coherent_sign(&self, axis: usize) -> Option<u32> {
        match self.sign_mask[axis] {
            0 => Some(0),
            ALL_LANES => Some(1),
            _ => None,
        }
    }

    /// Slab test of all 8 rays against one [`Aabb`]. Returns a lane mask of
    /// the rays whose entry distance falls within `[0, max_distance]` for
    /// their lane.
    pub fn intersects_aabb(&self, aabb: &Aabb, max_distance: f32x8) -> f32x8 {
        let mut entry_distance = f32x8::ZERO;
        let mut exit_distance = max_distance;

        for axis in 0..3 {
            let t1 = (f32x8::splat(aabb.min[axis]) - self.origin[axis]) * self.inv_direction[axis];
            let t2 = (f32x8::splat(aabb.max[axis]) - self.origin[axis]) * self.inv_direction[axis];

            entry_distance = entry_distance.fast_max(t1.fast_min(t2));
            exit_distance = exit_distance.fast_min(t1.fast_max(t2));
        }

        entry_distance.cmp_le(exit_distance)
    }

    /// 8-wide Möller-Trumbore intersection of all rays against one triangle.
    /// Both faces are tested, matching the scalar routine.
    pub fn intersects_triangle(&self, a: &Point3, b: &Point3, c: &Point3) -> Intersection8 {
        let a_to_b = splat3(&(*b - *a).into());
        let a_to_c = splat3(&(*c - *a).into());

        let u_vec = cross(&self.direction, &a_to_c);
        let det = dot(&a_to_b, &u_vec);

        // Degenerate lanes divide by ~zero here; the epsilon test on the
        // determinant masks them out below, and NaN comparisons are false.
        let inv_det = f32x8::ONE / det;

        let a_to_origin = [
            self.origin[0] - f32x8::splat(a.x),
            self.origin[1] - f32x8::splat(a.y),
            self.origin[2] - f32x8::splat(a.z),
        ];

        let u = dot(&a_to_origin, &u_vec) * inv_det;
        let v_vec = cross(&a_to_origin, &a_to_b);
        let v = dot(&self.direction, &v_vec) * inv_det;
        let dist = dot(&a_to_c, &v_vec) * inv_det;

        let epsilon = f32x8::splat(EPSILON);
        let mask = det.abs().cmp_ge(epsilon)
            & u.cmp_ge(f32x8::ZERO)
            & u.cmp_le(f32x8::ONE)
            & v.cmp_ge(f32x8::ZERO)
            & (u + v).cmp_le(f32x8::ONE)
            & dist.cmp_gt(epsilon);

        Intersection8 {
            distance: mask.blend(dist, f32x8::splat(Real::INFINITY)),
            u,
            v,
        }
    }
}

impl HitPacket8 {
    /// Creates a packet hit state with all lanes at the "no hit" sentinel.
    pub fn new() -> HitPacket8 {
        HitPacket8::with_max_distances(f32x8::splat(Real::INFINITY))
    }

    /// Creates a packet hit state whose per-lane search range is capped at
    /// `max_distances`.
    pub fn with_max_distances(max_distances: f32x8) -> HitPacket8 {
        HitPacket8 {
            distance: max_distances,
            u: f32x8::ZERO,
            v: f32x8::ZERO,
            prim_index: i32x8::splat(-1),
            object_id: i32x8::splat(-1),
        }
    }

    /// Merges an intersection result into the hit state for every lane set
    /// in `mask`. Float fields use register blends; the id fields go through
    /// a per-lane update driven by the movemask.
    pub fn store(&mut self, mask: f32x8, intersection: &Intersection8, prim_index: u32, object_id: u32) {
        let lanes = mask.move_mask();
        if lanes == 0 {
            return;
        }

        self.distance = mask.blend(intersection.distance, self.distance);
        self.u = mask.blend(intersection.u, self.u);
        self.v = mask.blend(intersection.v, self.v);

        let mut prim = self.prim_index.to_array();
        let mut object = self.object_id.to_array();
        for lane in 0..PACKET_SIZE {
            if lanes & (1 << lane) != 0 {
                prim[lane] = prim_index as i32;
                object[lane] = object_id as i32;
            }
        }
        self.prim_index = i32x8::from(prim);
        self.object_id = i32x8::from(object);
    }
}

impl Default for HitPacket8 {
    fn default() -> HitPacket8 {
        HitPacket8::new()
    }
}

#[inline(always)]
fn splat3(v: &[Real; 3]) -> [f32x8; 3] {
    [f32x8::splat(v[0]), f32x8::splat(v[1]), f32x8::splat(v[2])]
}

#[inline(always)]
fn cross(a: &[f32x8; 3], b: &[f32x8; 3]) -> [f32x8; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline(always)]
fn dot(a: &[f32x8; 3], b: &[f32x8; 3]) -> f32x8 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
