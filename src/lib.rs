//! A crate which exports rays, axis-aligned bounding boxes, and a binary
//! bounding volume hierarchy built with a sweep surface area heuristic.
//!
//! ## About
//!
//! This crate accelerates ray/primitive intersection queries in offline CPU
//! ray tracers. The [`Bvh`] is stored as a flat array of nodes where every
//! leaf references a contiguous range of primitives, so the builder also
//! returns a permutation of the input primitives which the caller applies to
//! its own per-primitive arrays (triangle indices, materials, and so on).
//! Traversal is generic over a small leaf-callback trait, which lets a
//! top-level scene of objects and a per-mesh triangle hierarchy share the
//! same drivers. Besides the single-ray nearest-hit and shadow (any-hit)
//! drivers there is an 8-wide packet driver built on [`wide`].
//!
//! [`Bvh`]: bvh/struct.Bvh.html
//!
//! ## Example
//!
//! ```
//! use sweep_bvh::aabb::Aabb;
//! use sweep_bvh::bvh::{Bvh, BvhBuildParams, BvhBuilder};
//! use sweep_bvh::{Point3, Vector3};
//!
//! let mut boxes = Vec::new();
//! for i in 0..1000u32 {
//!     let position = Point3::new(i as f32, 0.0, 0.0);
//!     let offset = Vector3::new(0.4, 0.4, 0.4);
//!     boxes.push(Aabb::with_bounds(position - offset, position + offset));
//! }
//!
//! let mut bvh = Bvh::new();
//! let order = BvhBuilder::new(&mut bvh)
//!     .build(&boxes, &BvhBuildParams::default())
//!     .unwrap();
//! assert_eq!(order.len(), boxes.len());
//! ```
//!
//! ## Features
//!
//! - `serde` (default **disabled**) - adds `Serialize` and `Deserialize`
//!   implementations for the value types

/// Float type used by this crate.
pub type Real = f32;

/// Point math type used by this crate. Type alias for [`nalgebra::Point3`].
pub type Point3 = nalgebra::Point3<Real>;

/// Vector math type used by this crate. Type alias for [`nalgebra::Vector3`].
pub type Vector3 = nalgebra::Vector3<Real>;

/// A minimal floating value used as a lower bound in intersection tests.
pub const EPSILON: Real = 0.00001;

pub mod aabb;
pub mod bvh;
pub mod mesh;
pub mod packet;
pub mod ray;
mod utils;

#[cfg(test)]
mod testbase;
