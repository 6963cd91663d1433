//! The flat [`Bvh`] tree and its diagnostic statistics.
//!
//! [`Bvh`]: struct.Bvh.html

use crate::aabb::Aabb;
use crate::Real;

/// One node of a [`Bvh`], either internal or a leaf. The two variants share
/// one struct so the tree stays a flat, cache-friendly array:
///
/// - internal: `num_leaves == 0`, `child_index` is the index of the first of
///   two contiguously stored children and `split_axis` is the axis the
///   builder partitioned along,
/// - leaf: `num_leaves > 0`, `child_index` is the first slot of this leaf's
///   primitives in the reordered primitive arrays.
///
/// [`Bvh`]: struct.Bvh.html
#[derive(Debug, Copy, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BvhNode {
    /// Bounding box of everything under this node.
    pub aabb: Aabb,

    /// First child node index, or first primitive slot for leaves.
    pub child_index: u32,

    /// Number of primitives in this leaf; `0` marks an internal node.
    pub num_leaves: u32,

    /// Axis this node was split along. Meaningful for internal nodes only;
    /// traversal uses it together with the ray octant for front-to-back
    /// child ordering.
    pub split_axis: u8,
}

impl BvhNode {
    /// Returns true if this node is a leaf.
    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.num_leaves > 0
    }
}

/// Diagnostic summary of a built [`Bvh`], produced by
/// [`Bvh::calculate_stats`]. Used for tuning the maximum leaf size; nothing
/// consumes it programmatically.
///
/// [`Bvh`]: struct.Bvh.html
/// [`Bvh::calculate_stats`]: struct.Bvh.html#method.calculate_stats
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BvhStats {
    /// Deepest node of the tree, root at depth 0.
    pub max_depth: u32,

    /// Sum of the surface areas of all node boxes.
    pub total_nodes_area: Real,

    /// Sum of the volumes of all node boxes.
    pub total_nodes_volume: Real,

    /// Histogram of leaf sizes; entry `i` counts the leaves holding `i`
    /// primitives. Entry 0 is always zero.
    pub leaves_count_histogram: Vec<u32>,
}

/// The bounding volume hierarchy: a flat array of [`BvhNode`]s with node 0 as
/// the root, plus the primitive count it was built over. Rebuilt from scratch
/// on every build; traversal never mutates it, so a built tree may be shared
/// freely between rendering threads.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bvh {
    pub(crate) nodes: Vec<BvhNode>,
    pub(crate) num_leaves: u32,
    pub(crate) max_depth: u32,
}

impl Bvh {
    /// Creates an empty, unbuilt [`Bvh`].
    pub fn new() -> Bvh {
        Bvh::default()
    }

    /// Returns the node array. Empty until a build succeeds; callers must
    /// check before walking the tree.
    #[inline(always)]
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Number of primitives this tree was built over.
    pub fn num_leaves(&self) -> u32 {
        self.num_leaves
    }

    /// Depth of the deepest leaf, recorded during the build. Used to size
    /// traversal stacks.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Walks the whole tree once and gathers [`BvhStats`]. Diagnostic only.
    pub fn calculate_stats(&self) -> BvhStats {
        let mut stats = BvhStats::default();
        if self.nodes.is_empty() {
            return stats;
        }

        let mut stack: Vec<(u32, u32)> = Vec::with_capacity(self.max_depth as usize + 1);
        stack.push((0, 0));

        while let Some((node_index, depth)) = stack.pop() {
            let node = &self.nodes[node_index as usize];

            stats.max_depth = stats.max_depth.max(depth);
            stats.total_nodes_area += node.aabb.surface_area();
            stats.total_nodes_volume += node.aabb.volume();

            if node.is_leaf() {
                let size = node.num_leaves as usize;
                if stats.leaves_count_histogram.len() <= size {
                    stats.leaves_count_histogram.resize(size + 1, 0);
                }
                stats.leaves_count_histogram[size] += 1;
            } else {
                stack.push((node.child_index, depth + 1));
                stack.push((node.child_index + 1, depth + 1));
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use crate::bvh::{Bvh, BvhBuildParams, BvhBuilder};
    use crate::testbase::unit_boxes_along_x;

    #[test]
    /// Stats of an unbuilt tree are all-zero.
    fn test_stats_of_empty_tree() {
        let bvh = Bvh::new();
        let stats = bvh.calculate_stats();
        assert_eq!(stats.max_depth, 0);
        assert_eq!(stats.total_nodes_area, 0.0);
        assert!(stats.leaves_count_histogram.is_empty());
    }

    #[test]
    /// The histogram must account for every primitive exactly once and never
    /// record a leaf larger than configured.
    fn test_stats_histogram_accounts_for_all_leaves() {
        let boxes = unit_boxes_along_x(21);
        let mut bvh = Bvh::new();
        let params = BvhBuildParams::default();
        BvhBuilder::new(&mut bvh).build(&boxes, &params).unwrap();

        let stats = bvh.calculate_stats();
        assert!(stats.max_depth >= 1);
        assert!(stats.max_depth <= bvh.max_depth());
        assert!(stats.total_nodes_area > 0.0);

        let mut total = 0u32;
        for (size, count) in stats.leaves_count_histogram.iter().enumerate() {
            assert!(size as u32 <= params.max_leaf_size || *count == 0);
            total += *count * size as u32;
        }
        assert_eq!(stats.leaves_count_histogram[0], 0);
        assert_eq!(total, 21);
    }
}
