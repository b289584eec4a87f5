//! # pointfeat algorithms
//!
//! Neighbor search, normal estimation and Fast Point Feature Histogram
//! computation on top of `pointfeat-core`.
//!
//! The descriptor engine runs in two passes. The first pass computes a
//! Simplified Point Feature (SPF) histogram for every point of the cloud, the
//! second pass combines each requested point's SPF with the distance-weighted
//! SPFs of its neighbors. Both passes run on an [`ExecutionBackend`]; the
//! sequential and parallel backends live here, the GPU backend in
//! `pointfeat-gpu`.

pub mod features;
pub mod legacy;
pub mod nearest_neighbor;
pub mod normals;

// Re-export commonly used items
pub use features::*;
pub use nearest_neighbor::*;
pub use normals::*;
