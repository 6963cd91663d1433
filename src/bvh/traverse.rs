//! Traversal drivers for the flat [`Bvh`].
//!
//! The tree does not know what its primitives are. Concrete containers such
//! as [`TriangleMesh`] implement [`Traversable`] (and optionally
//! [`PacketTraversable`]) and the drivers here call back into them whenever a
//! leaf survives the bounding box tests.
//!
//! [`Bvh`]: struct.Bvh.html
//! [`TriangleMesh`]: ../mesh/struct.TriangleMesh.html

use crate::aabb::Aabb;
use crate::bvh::tree::{Bvh, BvhNode};
use crate::packet::{HitPacket8, RayPacket8};
use crate::ray::Ray;
use crate::Real;

/// Marker for "no primitive" and "no object" in hit records.
pub const INVALID_ID: u32 = u32::MAX;

/// The closest intersection found so far. Doubles as the traversal's pruning
/// state: nodes and primitives farther than `distance` are skipped.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HitPoint {
    /// Distance along the ray. Starts at the search limit and only ever
    /// shrinks.
    pub distance: Real,

    /// Barycentric / parametric coordinates of the hit on the primitive.
    pub u: Real,
    pub v: Real,

    /// Slot of the hit primitive in the reordered primitive arrays, or
    /// [`INVALID_ID`] while nothing was hit.
    pub prim_index: u32,

    /// Identifier of the container the primitive belongs to, passed through
    /// from the traversal call.
    pub object_id: u32,
}

impl HitPoint {
    /// Creates a miss with an unbounded search distance.
    pub fn new() -> HitPoint {
        HitPoint::with_max_distance(Real::INFINITY)
    }

    /// Creates a miss that only accepts hits closer than `max_distance`.
    /// Shadow rays use this to stop at the light source.
    pub fn with_max_distance(max_distance: Real) -> HitPoint {
        HitPoint {
            distance: max_distance,
            u: 0.0,
            v: 0.0,
            prim_index: INVALID_ID,
            object_id: INVALID_ID,
        }
    }

    /// Returns true if any primitive was hit.
    pub fn is_hit(&self) -> bool {
        self.prim_index != INVALID_ID
    }
}

impl Default for HitPoint {
    fn default() -> HitPoint {
        HitPoint::new()
    }
}

/// A primitive container a [`Bvh`] can traverse with single rays.
///
/// Implementations receive leaf nodes whose bounding boxes passed the ray
/// test. The primitive slots of a leaf are
/// `node.child_index .. node.child_index + node.num_leaves` in the
/// container's reordered arrays.
///
/// [`Bvh`]: struct.Bvh.html
pub trait Traversable {
    /// Intersects `ray` against every primitive of `node`, updating `hit`
    /// for every strictly closer intersection.
    fn intersect_leaf(&self, ray: &Ray, object_id: u32, node: &BvhNode, hit: &mut HitPoint);

    /// Occlusion variant: returns true as soon as any primitive of `node`
    /// intersects `ray` closer than `hit.distance`. Implementations need not
    /// find the closest such primitive.
    fn intersect_leaf_shadow(&self, ray: &Ray, node: &BvhNode, hit: &mut HitPoint) -> bool;
}

/// A primitive container a [`Bvh`] can traverse with 8-wide ray packets.
///
/// [`Bvh`]: struct.Bvh.html
pub trait PacketTraversable {
    /// Intersects all 8 rays of `packet` against every primitive of `node`,
    /// updating the lanes of `hit` that found a strictly closer intersection.
    fn intersect_leaf_packet(
        &self,
        packet: &RayPacket8,
        object_id: u32,
        node: &BvhNode,
        hit: &mut HitPacket8,
    );
}

#[inline(always)]
fn hits_within(ray: &Ray, aabb: &Aabb, max_distance: Real) -> bool {
    matches!(
        ray.intersection_distances_for_aabb(aabb),
        Some((entry, _)) if entry <= max_distance
    )
}

fn stack_capacity(max_depth: u32) -> usize {
    // One pending sibling per level is the worst case; a little slack avoids
    // reallocation for shallow trees.
    (max_depth as usize + 1).max(16)
}

impl Bvh {
    /// Finds the closest intersection of `ray` with the primitives of
    /// `object`, no farther than `hit.distance` on entry.
    ///
    /// Children are visited front-to-back using the node's split axis and the
    /// ray's direction sign on it, so the near child can tighten
    /// `hit.distance` before the far child's box is tested. An unbuilt tree
    /// leaves `hit` untouched.
    pub fn traverse<T: Traversable>(&self, ray: &Ray, object_id: u32, object: &T, hit: &mut HitPoint) {
        let nodes = self.nodes();
        if nodes.is_empty() || !hits_within(ray, &nodes[0].aabb, hit.distance) {
            return;
        }

        let mut stack: Vec<u32> = Vec::with_capacity(stack_capacity(self.max_depth));
        stack.push(0);

        while let Some(node_index) = stack.pop() {
            let node = &nodes[node_index as usize];

            if node.is_leaf() {
                object.intersect_leaf(ray, object_id, node, hit);
                continue;
            }

            let near_offset = ray.sign(node.split_axis as usize);
            let near = node.child_index + near_offset;
            let far = node.child_index + 1 - near_offset;

            // Far child first so the near child is popped first.
            if hits_within(ray, &nodes[far as usize].aabb, hit.distance) {
                stack.push(far);
            }
            if hits_within(ray, &nodes[near as usize].aabb, hit.distance) {
                stack.push(near);
            }
        }
    }

    /// Returns true if any primitive of `object` blocks `ray` within
    /// `hit.distance`. Traversal stops at the first qualifying intersection;
    /// child order is not significant for a boolean answer, so no
    /// front-to-back sorting is done.
    pub fn traverse_shadow<T: Traversable>(&self, ray: &Ray, object: &T, hit: &mut HitPoint) -> bool {
        let nodes = self.nodes();
        if nodes.is_empty() || !hits_within(ray, &nodes[0].aabb, hit.distance) {
            return false;
        }

        let mut stack: Vec<u32> = Vec::with_capacity(stack_capacity(self.max_depth));
        stack.push(0);

        while let Some(node_index) = stack.pop() {
            let node = &nodes[node_index as usize];

            if node.is_leaf() {
                if object.intersect_leaf_shadow(ray, node, hit) {
                    return true;
                }
                continue;
            }

            for child in node.child_index..node.child_index + 2 {
                if hits_within(ray, &nodes[child as usize].aabb, hit.distance) {
                    stack.push(child);
                }
            }
        }

        false
    }

    /// Finds, per lane, the closest intersection of the 8 rays of `packet`
    /// with the primitives of `object`.
    ///
    /// A node is visited if its box test passes for at least one lane that
    /// could still be improved. Front-to-back ordering is applied only when
    /// all 8 lanes agree on the direction sign along the split axis;
    /// otherwise no order is front-to-back for every lane and the children
    /// are visited as stored.
    pub fn traverse_packet<T: PacketTraversable>(
        &self,
        packet: &RayPacket8,
        object_id: u32,
        object: &T,
        hit: &mut HitPacket8,
    ) {
        let nodes = self.nodes();
        if nodes.is_empty() || packet.intersects_aabb(&nodes[0].aabb, hit.distance).move_mask() == 0
        {
            return;
        }

        let mut stack: Vec<u32> = Vec::with_capacity(stack_capacity(self.max_depth));
        stack.push(0);

        while let Some(node_index) = stack.pop() {
            let node = &nodes[node_index as usize];

            if node.is_leaf() {
                object.intersect_leaf_packet(packet, object_id, node, hit);
                continue;
            }

            let near_offset = packet
                .coherent_sign(node.split_axis as usize)
                .unwrap_or(0);
            let near = node.child_index + near_offset;
            let far = node.child_index + 1 - near_offset;

            if packet
                .intersects_aabb(&nodes[far as usize].aabb, hit.distance)
                .move_mask()
                != 0
            {
                stack.push(far);
            }
            if packet
                .intersects_aabb(&nodes[near as usize].aabb, hit.distance)
                .move_mask()
                != 0
            {
                stack.push(near);
            }
        }
    }
}
