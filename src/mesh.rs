//! An indexed soup of triangles behind a [`Bvh`], the crate's reference
//! [`Traversable`] container.
//!
//! [`Bvh`]: bvh/struct.Bvh.html
//! [`Traversable`]: bvh/trait.Traversable.html

use wide::CmpLt;

use crate::aabb::{Aabb, Bounded};
use crate::bvh::{
    BuildError, Bvh, BvhBuildParams, BvhBuilder, BvhNode, HitPoint, PacketTraversable, Traversable,
};
use crate::packet::{HitPacket8, RayPacket8};
use crate::ray::Ray;
use crate::{Point3, Real};

/// A single triangle.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Triangle {
    pub a: Point3,
    pub b: Point3,
    pub c: Point3,
}

impl Triangle {
    /// Creates a new [`Triangle`] from the given vertices.
    pub fn new(a: Point3, b: Point3, c: Point3) -> Triangle {
        Triangle { a, b, c }
    }
}

impl Bounded for Triangle {
    fn aabb(&self) -> Aabb {
        Aabb::empty().grow(&self.a).grow(&self.b).grow(&self.c)
    }
}

/// A triangle mesh with a [`Bvh`] built over it.
///
/// Construction reorders the triangles into the builder's leaf order, so leaf
/// primitive ranges index the internal array directly and hit records report
/// slots in that order. Callers keeping per-triangle attributes (normals,
/// UVs, material ids) must apply the same permutation, available from
/// [`TriangleMesh::new`].
///
/// [`Bvh`]: bvh/struct.Bvh.html
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    triangles: Vec<Triangle>,
    bvh: Bvh,
}

impl TriangleMesh {
    /// Builds a mesh over `triangles`. Returns the mesh and the leaf order
    /// permutation: entry `i` is the index the triangle now in slot `i` had
    /// in the input.
    pub fn new(
        triangles: Vec<Triangle>,
        params: &BvhBuildParams,
    ) -> Result<(TriangleMesh, Vec<u32>), BuildError> {
        let boxes: Vec<Aabb> = triangles.iter().map(Bounded::aabb).collect();

        let mut bvh = Bvh::new();
        let order = BvhBuilder::new(&mut bvh).build(&boxes, params)?;

        let triangles = order.iter().map(|&i| triangles[i as usize]).collect();
        Ok((TriangleMesh { triangles, bvh }, order))
    }

    /// The triangles in leaf order.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// The tree built over the triangles.
    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    /// Finds the closest triangle intersection along `ray`, no farther than
    /// `hit.distance` on entry. `object_id` is copied into the hit record
    /// verbatim.
    pub fn intersect(&self, ray: &Ray, object_id: u32, hit: &mut HitPoint) {
        self.bvh.traverse(ray, object_id, self, hit);
    }

    /// Returns true if any triangle blocks `ray` within `max_distance`.
    pub fn occluded(&self, ray: &Ray, max_distance: Real) -> bool {
        let mut hit = HitPoint::with_max_distance(max_distance);
        self.bvh.traverse_shadow(ray, self, &mut hit)
    }

    /// Packet counterpart of [`intersect`], resolving all 8 lanes in one
    /// tree walk.
    ///
    /// [`intersect`]: #method.intersect
    pub fn intersect_packet(&self, packet: &RayPacket8, object_id: u32, hit: &mut HitPacket8) {
        self.bvh.traverse_packet(packet, object_id, self, hit);
    }
}

impl Traversable for TriangleMesh {
    fn intersect_leaf(&self, ray: &Ray, object_id: u32, node: &BvhNode, hit: &mut HitPoint) {
        for slot in node.child_index..node.child_index + node.num_leaves {
            let triangle = &self.triangles[slot as usize];
            let intersection = ray.intersects_triangle(&triangle.a, &triangle.b, &triangle.c);

            // Strictly closer, so misses (infinite distance) never overwrite
            // and ties keep the first hit found.
            if intersection.distance < hit.distance {
                hit.distance = intersection.distance;
                hit.u = intersection.u;
                hit.v = intersection.v;
                hit.prim_index = slot;
                hit.object_id = object_id;
            }
        }
    }

    fn intersect_leaf_shadow(&self, ray: &Ray, node: &BvhNode, hit: &mut HitPoint) -> bool {
        for slot in node.child_index..node.child_index + node.num_leaves {
            let triangle = &self.triangles[slot as usize];
            let intersection = ray.intersects_triangle(&triangle.a, &triangle.b, &triangle.c);

            if intersection.distance < hit.distance {
                hit.distance = intersection.distance;
                hit.prim_index = slot;
                return true;
            }
        }
        false
    }
}

impl PacketTraversable for TriangleMesh {
    fn intersect_leaf_packet(
        &self,
        packet: &RayPacket8,
        object_id: u32,
        node: &BvhNode,
        hit: &mut HitPacket8,
    ) {
        for slot in node.child_index..node.child_index + node.num_leaves {
            let triangle = &self.triangles[slot as usize];
            let intersection = packet.intersects_triangle(&triangle.a, &triangle.b, &triangle.c);

            let mask = intersection.distance.cmp_lt(hit.distance);
            hit.store(mask, &intersection, slot, object_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use float_eq::assert_float_eq;
    use proptest::prelude::*;

    use crate::bvh::{BvhBuildParams, HitPoint};
    use crate::mesh::{Triangle, TriangleMesh};
    use crate::packet::{HitPacket8, RayPacket8, PACKET_SIZE};
    use crate::ray::Ray;
    use crate::testbase::{triangle_grid, tuple_to_point, tuplevec_small_strategy};
    use crate::{Point3, Vector3};

    fn build(triangles: Vec<Triangle>) -> (TriangleMesh, Vec<u32>) {
        TriangleMesh::new(triangles, &BvhBuildParams::default()).unwrap()
    }

    /// A unit quad in the plane z = 5, made of two triangles.
    fn quad_at_z5() -> Vec<Triangle> {
        let v00 = Point3::new(-1.0, -1.0, 5.0);
        let v10 = Point3::new(1.0, -1.0, 5.0);
        let v01 = Point3::new(-1.0, 1.0, 5.0);
        let v11 = Point3::new(1.0, 1.0, 5.0);
        vec![Triangle::new(v00, v10, v11), Triangle::new(v00, v11, v01)]
    }

    #[test]
    /// A ray through the quad reports the plane distance and a slot within
    /// the mesh.
    fn test_intersect_quad() {
        let (mesh, order) = build(quad_at_z5());
        assert_eq!(order.len(), 2);

        let ray = Ray::new(Point3::new(0.1, 0.2, 0.0), Vector3::new(0.0, 0.0, 1.0));
        let mut hit = HitPoint::new();
        mesh.intersect(&ray, 42, &mut hit);

        assert!(hit.is_hit());
        assert_float_eq!(hit.distance, 5.0, ulps <= 4);
        assert!((hit.prim_index as usize) < mesh.triangles().len());
        assert_eq!(hit.object_id, 42);
    }

    #[test]
    /// With two stacked quads, the nearer one wins regardless of build order.
    fn test_intersect_nearest_quad() {
        let mut triangles = quad_at_z5();
        let far: Vec<Triangle> = quad_at_z5()
            .iter()
            .map(|t| {
                let lift = Vector3::new(0.0, 0.0, 4.0);
                Triangle::new(t.a + lift, t.b + lift, t.c + lift)
            })
            .collect();
        triangles.extend(far);

        let (mesh, _) = build(triangles);
        let ray = Ray::new(Point3::new(0.0, 0.1, 0.0), Vector3::new(0.0, 0.0, 1.0));
        let mut hit = HitPoint::new();
        mesh.intersect(&ray, 0, &mut hit);

        assert!(hit.is_hit());
        assert_float_eq!(hit.distance, 5.0, ulps <= 4);
    }

    #[test]
    /// Occlusion honors the search distance.
    fn test_occluded() {
        let (mesh, _) = build(quad_at_z5());
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0));

        assert!(mesh.occluded(&ray, 10.0));
        assert!(!mesh.occluded(&ray, 4.0));

        let miss = Ray::new(Point3::new(5.0, 5.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(!mesh.occluded(&miss, 100.0));
    }

    #[test]
    /// An empty mesh builds and never hits anything.
    fn test_empty_mesh() {
        let (mesh, order) = build(Vec::new());
        assert!(order.is_empty());

        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
        let mut hit = HitPoint::new();
        mesh.intersect(&ray, 0, &mut hit);
        assert!(!hit.is_hit());
        assert!(!mesh.occluded(&ray, 100.0));
    }

    #[test]
    /// The permutation returned by the build maps input triangles onto their
    /// final slots.
    fn test_permutation_maps_input_to_slots() {
        let triangles = triangle_grid(6);
        let (mesh, order) = build(triangles.clone());

        assert_eq!(order.len(), triangles.len());
        for (slot, &original) in order.iter().enumerate() {
            assert_eq!(mesh.triangles()[slot], triangles[original as usize]);
        }
    }

    #[test]
    /// Packet intersection agrees lane by lane with scalar intersection over
    /// a grid of triangles.
    fn test_packet_matches_scalar() {
        let (mesh, _) = build(triangle_grid(8));

        let rays: [Ray; PACKET_SIZE] = std::array::from_fn(|lane| {
            Ray::new(
                Point3::new(lane as f32 * 0.9 + 0.3, 10.0, lane as f32 * 0.7 + 0.2),
                Vector3::new(0.0, -1.0, 0.0),
            )
        });
        let packet = RayPacket8::new(&rays);

        let mut packet_hit = HitPacket8::new();
        mesh.intersect_packet(&packet, 9, &mut packet_hit);

        let distances = packet_hit.distance.to_array();
        let prims = packet_hit.prim_index.to_array();
        let objects = packet_hit.object_id.to_array();
        for (lane, ray) in rays.iter().enumerate() {
            let mut scalar = HitPoint::new();
            mesh.intersect(ray, 9, &mut scalar);

            if scalar.is_hit() {
                assert_float_eq!(distances[lane], scalar.distance, ulps <= 8);
                assert_eq!(prims[lane], scalar.prim_index as i32, "lane {lane}");
                assert_eq!(objects[lane], 9, "lane {lane}");
            } else {
                assert_eq!(distances[lane], f32::INFINITY, "lane {lane}");
                assert_eq!(prims[lane], -1, "lane {lane}");
            }
        }
    }

    proptest! {
        /// Traversing with the tree finds exactly what brute force over all
        /// triangles finds.
        #[test]
        fn test_intersect_matches_brute_force(origin in tuplevec_small_strategy()) {
            let (mesh, _) = build(triangle_grid(10));
            let origin = tuple_to_point(&origin) + Vector3::new(5.0, 20.0, 5.0);
            let ray = Ray::new(origin, Point3::new(5.0, 0.0, 5.0) - origin);

            let mut hit = HitPoint::new();
            mesh.intersect(&ray, 0, &mut hit);

            let mut best = f32::INFINITY;
            for triangle in mesh.triangles() {
                let intersection = ray.intersects_triangle(&triangle.a, &triangle.b, &triangle.c);
                if intersection.distance < best {
                    best = intersection.distance;
                }
            }

            assert_eq!(hit.distance, best);
            assert_eq!(hit.is_hit(), best.is_finite());
        }
    }
}
