//! The sweep-SAH [`BvhBuilder`].
//!
//! The builder consumes one bounding box per primitive and produces the flat
//! [`Bvh`] node array plus a permutation of the primitive indices. Splits are
//! never refused: any range larger than the configured leaf size is split,
//! and the heuristic only chooses the axis and position. Recursion is
//! replaced by an explicit work stack, so pathological inputs cannot
//! overflow the call stack.
//!
//! [`Bvh`]: struct.Bvh.html
//! [`BvhBuilder`]: struct.BvhBuilder.html

use std::cmp::Ordering;
use std::collections::TryReserveError;
use std::time::Instant;

use log::{debug, info};
use thiserror::Error;

use crate::aabb::Aabb;
use crate::bvh::tree::{Bvh, BvhNode};
use crate::Real;

/// Cost metric used to rate split candidates.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SplitHeuristic {
    /// Rate children by bounding box surface area (the classic SAH).
    #[default]
    SurfaceArea,

    /// Rate children by bounding box volume.
    Volume,
}

/// Read-only configuration for one build.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BvhBuildParams {
    /// Largest number of primitives a leaf may hold. Values below 1 are
    /// clamped to 1.
    pub max_leaf_size: u32,

    /// Cost metric for split selection.
    pub heuristic: SplitHeuristic,
}

impl Default for BvhBuildParams {
    fn default() -> BvhBuildParams {
        BvhBuildParams {
            max_leaf_size: 2,
            heuristic: SplitHeuristic::SurfaceArea,
        }
    }
}

/// The only failure mode of a build: the node array or one of the scratch
/// buffers could not be reserved. Callers treat this as fatal for the asset
/// being loaded; there is nothing to retry.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Storage reservation failed.
    #[error("failed to reserve BVH storage: {0}")]
    Storage(#[from] TryReserveError),
}

/// One pending range of the partitioning, popped LIFO off the work stack.
struct WorkSet {
    /// Bounding box of every primitive in the range.
    aabb: Aabb,

    /// Range `[begin, end)` into the shared index array.
    begin: usize,
    end: usize,

    /// Depth of the node, root at 0.
    depth: u32,

    /// Axis the range is already sorted by, if any; lets a child skip one of
    /// the three sorts.
    sorted_by: Option<usize>,

    /// Index of the node this range will fill in.
    node: u32,
}

/// The best split found by the sweep, together with the child boxes the
/// sweep already computed for it.
struct SplitCandidate {
    axis: usize,
    split: usize,
    left_aabb: Aabb,
    right_aabb: Aabb,
}

/// Builds a [`Bvh`] over a slice of per-primitive bounding boxes.
///
/// One builder instance performs exactly one build; its scratch state does
/// not outlive the [`build`] call.
///
/// [`Bvh`]: struct.Bvh.html
/// [`build`]: #method.build
pub struct BvhBuilder<'a> {
    target: &'a mut Bvh,
}

impl<'a> BvhBuilder<'a> {
    /// Creates a builder targeting `target`. A successful build replaces the
    /// tree's previous contents entirely.
    pub fn new(target: &'a mut Bvh) -> BvhBuilder<'a> {
        BvhBuilder { target }
    }

    /// Runs the build. `leaf_boxes[i]` must bound the primitive the caller
    /// knows as `i`; boxes are expected to be finite (checked in debug
    /// builds only).
    ///
    /// Returns the leaves order: entry `i` is the original index of the
    /// primitive now living in slot `i` of the leaf order. The caller must
    /// apply this permutation to every per-primitive array it owns.
    ///
    /// Building over an empty slice produces an empty tree and an empty
    /// permutation; traversing such a tree visits nothing.
    pub fn build(
        self,
        leaf_boxes: &[Aabb],
        params: &BvhBuildParams,
    ) -> Result<Vec<u32>, BuildError> {
        let num_leaves = leaf_boxes.len();
        let max_leaf_size = params.max_leaf_size.max(1) as usize;
        assert!(num_leaves < (u32::MAX / 2) as usize);

        self.target.nodes.clear();
        self.target.num_leaves = num_leaves as u32;
        self.target.max_depth = 0;

        if num_leaves == 0 {
            info!("skipped building a BVH over empty input");
            return Ok(Vec::new());
        }

        debug_assert!(
            leaf_boxes.iter().all(Aabb::is_valid),
            "input boxes must be finite"
        );

        let started = Instant::now();

        // Reservations are the only fallible step; a binary tree over
        // `num_leaves` primitives can never exceed `2 * num_leaves` nodes.
        self.target.nodes.try_reserve(2 * num_leaves)?;
        let mut leaves_order: Vec<u32> = Vec::new();
        leaves_order.try_reserve_exact(num_leaves)?;
        leaves_order.resize(num_leaves, 0);
        let mut indices: Vec<u32> = Vec::new();
        indices.try_reserve_exact(num_leaves)?;
        indices.extend(0..num_leaves as u32);
        let mut left_boxes: Vec<Aabb> = Vec::new();
        left_boxes.try_reserve_exact(num_leaves)?;
        left_boxes.resize(num_leaves, Aabb::empty());
        let mut right_boxes: Vec<Aabb> = Vec::new();
        right_boxes.try_reserve_exact(num_leaves)?;
        right_boxes.resize(num_leaves, Aabb::empty());
        let mut axis_order: [Vec<u32>; 3] = Default::default();
        for order in &mut axis_order {
            order.try_reserve_exact(num_leaves)?;
        }

        let mut overall = Aabb::empty();
        for aabb in leaf_boxes {
            overall.join_mut(aabb);
        }
        info!(
            "building BVH: num leaves = {}, overall box = [{:?}, {:?}]",
            num_leaves, overall.min, overall.max
        );

        self.target.nodes.push(BvhNode::default());

        let mut work_stack = vec![WorkSet {
            aabb: overall,
            begin: 0,
            end: num_leaves,
            depth: 0,
            sorted_by: None,
            node: 0,
        }];
        let mut num_generated_leaves = 0usize;

        while let Some(work_set) = work_stack.pop() {
            let count = work_set.end - work_set.begin;
            debug_assert!(count > 0);
            self.target.max_depth = self.target.max_depth.max(work_set.depth);

            if count <= max_leaf_size {
                let first_slot = num_generated_leaves;
                leaves_order[first_slot..first_slot + count]
                    .copy_from_slice(&indices[work_set.begin..work_set.end]);
                num_generated_leaves += count;

                self.target.nodes[work_set.node as usize] = BvhNode {
                    aabb: work_set.aabb,
                    child_index: first_slot as u32,
                    num_leaves: count as u32,
                    split_axis: 0,
                };
                continue;
            }

            // Candidate orders per axis; an already-sorted axis is reused.
            for (axis, order) in axis_order.iter_mut().enumerate() {
                order.clear();
                order.extend_from_slice(&indices[work_set.begin..work_set.end]);
                if work_set.sorted_by != Some(axis) {
                    sort_by_center(leaf_boxes, order, axis);
                }
            }

            let best = find_best_split(
                leaf_boxes,
                &axis_order,
                params.heuristic,
                &mut left_boxes,
                &mut right_boxes,
            );

            indices[work_set.begin..work_set.end].copy_from_slice(&axis_order[best.axis]);

            let child_index = self.target.nodes.len() as u32;
            self.target.nodes.push(BvhNode::default());
            self.target.nodes.push(BvhNode::default());
            self.target.nodes[work_set.node as usize] = BvhNode {
                aabb: work_set.aabb,
                child_index,
                num_leaves: 0,
                split_axis: best.axis as u8,
            };

            let middle = work_set.begin + best.split;
            work_stack.push(WorkSet {
                aabb: best.right_aabb,
                begin: middle,
                end: work_set.end,
                depth: work_set.depth + 1,
                sorted_by: Some(best.axis),
                node: child_index + 1,
            });
            work_stack.push(WorkSet {
                aabb: best.left_aabb,
                begin: work_set.begin,
                end: middle,
                depth: work_set.depth + 1,
                sorted_by: Some(best.axis),
                node: child_index,
            });
        }

        debug_assert_eq!(num_generated_leaves, num_leaves);
        debug_assert!(self.target.nodes.len() <= 2 * num_leaves);

        info!(
            "finished BVH build in {:.3} ms (num nodes = {}, max depth = {})",
            started.elapsed().as_secs_f64() * 1000.0,
            self.target.nodes.len(),
            self.target.max_depth,
        );
        debug!("BVH stats: {:?}", self.target.calculate_stats());

        Ok(leaves_order)
    }
}

/// Sorts `order` by box center along `axis`, ties broken by primitive index
/// so builds stay reproducible for coincident boxes.
fn sort_by_center(leaf_boxes: &[Aabb], order: &mut [u32], axis: usize) {
    order.sort_unstable_by(|&a, &b| {
        // min + max along the axis is twice the center; the factor drops out
        // of the comparison.
        let center_a = leaf_boxes[a as usize].min[axis] + leaf_boxes[a as usize].max[axis];
        let center_b = leaf_boxes[b as usize].min[axis] + leaf_boxes[b as usize].max[axis];
        center_a
            .partial_cmp(&center_b)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });
}

fn metric(aabb: &Aabb, heuristic: SplitHeuristic) -> Real {
    match heuristic {
        SplitHeuristic::SurfaceArea => aabb.surface_area(),
        SplitHeuristic::Volume => aabb.volume(),
    }
}

/// Sweeps every split position on every axis, maintaining prefix and suffix
/// bounding boxes incrementally, and returns the cheapest candidate.
/// Cost ties keep the first candidate found (axis-major, position-minor).
fn find_best_split(
    leaf_boxes: &[Aabb],
    axis_order: &[Vec<u32>; 3],
    heuristic: SplitHeuristic,
    left_boxes: &mut [Aabb],
    right_boxes: &mut [Aabb],
) -> SplitCandidate {
    let count = axis_order[0].len();
    let mut best_cost = Real::INFINITY;
    let mut best = SplitCandidate {
        axis: 0,
        split: count / 2,
        left_aabb: Aabb::empty(),
        right_aabb: Aabb::empty(),
    };

    for (axis, order) in axis_order.iter().enumerate() {
        // Left child box for every possible split position.
        let mut accumulated = Aabb::empty();
        for (i, &leaf) in order.iter().enumerate() {
            accumulated.join_mut(&leaf_boxes[leaf as usize]);
            left_boxes[i] = accumulated;
        }

        // Right child box for every possible split position.
        let mut accumulated = Aabb::empty();
        for i in (0..count).rev() {
            accumulated.join_mut(&leaf_boxes[order[i] as usize]);
            right_boxes[i] = accumulated;
        }

        if axis == 0 {
            // Seed with a middle split so the children keep real boxes even
            // when every candidate's cost overflows to infinity and the
            // comparisons below never fire.
            best.left_aabb = left_boxes[best.split - 1];
            best.right_aabb = right_boxes[best.split];
        }

        for split in 1..count {
            let left = &left_boxes[split - 1];
            let right = &right_boxes[split];
            let cost = split as Real * metric(left, heuristic)
                + (count - split) as Real * metric(right, heuristic);

            if cost < best_cost {
                best_cost = cost;
                best = SplitCandidate {
                    axis,
                    split,
                    left_aabb: *left,
                    right_aabb: *right,
                };
            }
        }
    }

    best
}
