//! Core data structures and traits for pointfeat
//!
//! This crate provides the fundamental types shared by the feature descriptor
//! engine: oriented points and point clouds, search policies, execution
//! selectors, the descriptor matrix and the error type.

pub mod error;
pub mod execution;
pub mod feature;
pub mod point;
pub mod point_cloud;
pub mod real;
pub mod search;
pub mod traits;

pub use error::*;
pub use execution::*;
pub use feature::*;
pub use point::*;
pub use point_cloud::*;
pub use real::*;
pub use search::*;
pub use traits::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix3, Point3, Vector3};
