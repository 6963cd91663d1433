//! This module exports the flat [`Bvh`] tree, the sweep-SAH [`BvhBuilder`]
//! and the generic traversal drivers.
//!
//! [`Bvh`]: struct.Bvh.html
//! [`BvhBuilder`]: struct.BvhBuilder.html

mod builder;
mod traverse;
mod tree;

pub use builder::{BuildError, BvhBuildParams, BvhBuilder, SplitHeuristic};
pub use traverse::{HitPoint, PacketTraversable, Traversable, INVALID_ID};
pub use tree::{Bvh, BvhNode, BvhStats};
