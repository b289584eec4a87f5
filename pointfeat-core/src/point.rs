//! Point types and related functionality

use nalgebra::{Point3, Scalar, Vector3};
use serde::{Deserialize, Serialize};

use crate::real::Real;

/// A 3D point with single precision coordinates
pub type Point3f = Point3<f32>;

/// A 3D point with double precision coordinates
pub type Point3d = Point3<f64>;

/// A 3D vector with single precision components
pub type Vector3f = Vector3<f32>;

/// A 3D vector with double precision components
pub type Vector3d = Vector3<f64>;

/// A point with its surface normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct NormalPoint3<T: Scalar> {
    pub position: Point3<T>,
    pub normal: Vector3<T>,
}

/// Single precision oriented point
pub type NormalPoint3f = NormalPoint3<f32>;

/// Double precision oriented point
pub type NormalPoint3d = NormalPoint3<f64>;

impl<T: Real> NormalPoint3<T> {
    pub fn new(position: Point3<T>, normal: Vector3<T>) -> Self {
        Self { position, normal }
    }

    /// Convert to another precision
    pub fn cast<U: Real>(&self) -> NormalPoint3<U> {
        NormalPoint3 {
            position: self.position.map(|c| U::cast_f64(c.as_f64())),
            normal: self.normal.map(|c| U::cast_f64(c.as_f64())),
        }
    }
}

impl<T: Real> Default for NormalPoint3<T> {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            normal: Vector3::z(),
        }
    }
}
