//! Common utilities shared by unit tests.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::aabb::Aabb;
use crate::bvh::{Bvh, BvhBuildParams, BvhBuilder, BvhNode, HitPoint, Traversable};
use crate::mesh::Triangle;
use crate::ray::Ray;
use crate::{Point3, Vector3, EPSILON};

/// A vector represented as a tuple, for testing.
pub type TupleVec = (f32, f32, f32);

/// Routes `log` output to the test harness; run with `RUST_LOG=debug` to see
/// the builder's diagnostics. Safe to call from every test.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Generates a random vector with a small position and tight spread.
pub fn tuplevec_small_strategy() -> impl Strategy<Value = TupleVec> {
    (
        -10.0..10.0f32,
        -10.0..10.0f32,
        -10.0..10.0f32,
    )
}

/// Generates a random vector with a wider spread.
pub fn tuplevec_large_strategy() -> impl Strategy<Value = TupleVec> {
    (
        -100.0..100.0f32,
        -100.0..100.0f32,
        -100.0..100.0f32,
    )
}

/// Convert a `TupleVec` to a [`Point3`].
pub fn tuple_to_point(tpl: &TupleVec) -> Point3 {
    Point3::new(tpl.0, tpl.1, tpl.2)
}

/// Convert a `TupleVec` to a [`Vector3`].
pub fn tuple_to_vector(tpl: &TupleVec) -> Vector3 {
    Vector3::new(tpl.0, tpl.1, tpl.2)
}

/// `count` unit boxes centered at `x = 0, 1, 2, ...` on the x axis.
pub fn unit_boxes_along_x(count: usize) -> Vec<Aabb> {
    let offset = Vector3::new(0.5, 0.5, 0.5);
    (0..count)
        .map(|i| {
            let center = Point3::new(i as f32, 0.0, 0.0);
            Aabb::with_bounds(center - offset, center + offset)
        })
        .collect()
}

/// `count` seeded random boxes with sides up to 4 units, spread over a
/// 200-unit cube.
pub fn random_boxes(seed: u64, count: usize) -> Vec<Aabb> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let min = Point3::new(
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
            );
            let size = Vector3::new(
                rng.random_range(0.1..4.0),
                rng.random_range(0.1..4.0),
                rng.random_range(0.1..4.0),
            );
            Aabb::with_bounds(min, min + size)
        })
        .collect()
}

/// A bumpy `count` x `count` triangulated height field over `[0, count]` in
/// x and z, with cells alternating between y = 0 and y = 0.5.
pub fn triangle_grid(count: usize) -> Vec<Triangle> {
    let mut triangles = Vec::with_capacity(count * count * 2);
    for i in 0..count {
        for j in 0..count {
            let y = ((i + j) % 2) as f32 * 0.5;
            let (x0, x1) = (i as f32, i as f32 + 1.0);
            let (z0, z1) = (j as f32, j as f32 + 1.0);

            let v00 = Point3::new(x0, y, z0);
            let v10 = Point3::new(x1, y, z0);
            let v01 = Point3::new(x0, y, z1);
            let v11 = Point3::new(x1, y, z1);

            triangles.push(Triangle::new(v00, v10, v11));
            triangles.push(Triangle::new(v00, v11, v01));
        }
    }
    triangles
}

/// Checks every structural invariant of a built tree:
///
/// - `order` is a bijection over the input indices,
/// - every leaf slot is covered by exactly one leaf node,
/// - leaf sizes are in `1..=max_leaf_size`,
/// - every node's box contains its children's boxes (leaf primitives
///   included),
/// - internal nodes store two contiguous children.
pub fn check_bvh_invariants(bvh: &Bvh, boxes: &[Aabb], order: &[u32], max_leaf_size: u32) {
    let count = boxes.len();
    assert_eq!(order.len(), count);

    if count == 0 {
        assert!(bvh.nodes().is_empty());
        return;
    }
    assert_eq!(bvh.num_leaves() as usize, count);
    assert!(!bvh.nodes().is_empty());

    let mut seen = vec![false; count];
    for &original in order {
        assert!(!seen[original as usize], "duplicate index in leaves order");
        seen[original as usize] = true;
    }

    let mut covered = vec![false; count];
    let mut stack = vec![0u32];
    while let Some(node_index) = stack.pop() {
        let node: &BvhNode = &bvh.nodes()[node_index as usize];

        if node.is_leaf() {
            assert!(node.num_leaves >= 1);
            assert!(node.num_leaves <= max_leaf_size.max(1));
            for slot in node.child_index..node.child_index + node.num_leaves {
                assert!(!covered[slot as usize], "leaf slot covered twice");
                covered[slot as usize] = true;

                let primitive = &boxes[order[slot as usize] as usize];
                assert!(
                    node.aabb.approx_contains_aabb_eps(primitive, EPSILON),
                    "leaf box does not contain its primitive"
                );
            }
        } else {
            assert!((node.split_axis as usize) < 3);
            for child in node.child_index..node.child_index + 2 {
                let child_node = &bvh.nodes()[child as usize];
                assert!(
                    node.aabb.approx_contains_aabb_eps(&child_node.aabb, EPSILON),
                    "parent box does not contain child box"
                );
                stack.push(child);
            }
        }
    }

    assert!(covered.iter().all(|&c| c), "a leaf slot was never emitted");
}

/// A set of boxes treated as primitives in their own right, with hits
/// reported at the slab entry distance. Keeps traversal tests independent of
/// the triangle code.
pub struct BoxSet {
    /// The boxes in leaf order.
    pub boxes: Vec<Aabb>,

    /// The tree built over the boxes.
    pub bvh: Bvh,
}

impl BoxSet {
    /// Builds a [`BoxSet`] with default build parameters.
    pub fn build(boxes: Vec<Aabb>) -> BoxSet {
        let mut bvh = Bvh::new();
        let order = BvhBuilder::new(&mut bvh)
            .build(&boxes, &BvhBuildParams::default())
            .unwrap();
        let boxes = order.iter().map(|&i| boxes[i as usize]).collect();
        BoxSet { boxes, bvh }
    }
}

impl Traversable for BoxSet {
    fn intersect_leaf(&self, ray: &Ray, object_id: u32, node: &BvhNode, hit: &mut HitPoint) {
        for slot in node.child_index..node.child_index + node.num_leaves {
            if let Some((entry, _)) = ray.intersection_distances_for_aabb(&self.boxes[slot as usize])
            {
                if entry < hit.distance {
                    hit.distance = entry;
                    hit.prim_index = slot;
                    hit.object_id = object_id;
                }
            }
        }
    }

    fn intersect_leaf_shadow(&self, ray: &Ray, node: &BvhNode, hit: &mut HitPoint) -> bool {
        for slot in node.child_index..node.child_index + node.num_leaves {
            if let Some((entry, _)) = ray.intersection_distances_for_aabb(&self.boxes[slot as usize])
            {
                if entry < hit.distance {
                    hit.distance = entry;
                    hit.prim_index = slot;
                    return true;
                }
            }
        }
        false
    }
}

impl crate::bvh::PacketTraversable for BoxSet {
    fn intersect_leaf_packet(
        &self,
        packet: &crate::packet::RayPacket8,
        object_id: u32,
        node: &BvhNode,
        hit: &mut crate::packet::HitPacket8,
    ) {
        use wide::{f32x8, CmpLe, CmpLt};

        for slot in node.child_index..node.child_index + node.num_leaves {
            let aabb = &self.boxes[slot as usize];
            // Entry distance per lane, mirroring the scalar slab test.
            let mut entry = f32x8::ZERO;
            let mut exit = f32x8::splat(f32::INFINITY);
            for axis in 0..3 {
                let t1 = (f32x8::splat(aabb.min[axis]) - packet.origin[axis])
                    * packet.inv_direction[axis];
                let t2 = (f32x8::splat(aabb.max[axis]) - packet.origin[axis])
                    * packet.inv_direction[axis];
                entry = entry.fast_max(t1.fast_min(t2));
                exit = exit.fast_min(t1.fast_max(t2));
            }

            let mask = entry.cmp_le(exit) & entry.cmp_lt(hit.distance);
            let intersection = crate::packet::Intersection8 {
                distance: entry,
                u: f32x8::ZERO,
                v: f32x8::ZERO,
            };
            hit.store(mask, &intersection, slot, object_id);
        }
    }
}
