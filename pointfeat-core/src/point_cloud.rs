//! Point cloud data structures and functionality

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::Index;

use crate::error::{Error, Result};
use crate::point::*;
use crate::real::Real;

/// Allowed deviation of a normal's length from 1
pub const NORMAL_LENGTH_TOLERANCE: f64 = 1e-3;

/// A generic point cloud container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloud<T> {
    pub points: Vec<T>,
}

/// A point cloud with single precision points
pub type PointCloud3f = PointCloud<Point3f>;

/// A point cloud with double precision points
pub type PointCloud3d = PointCloud<Point3d>;

/// A single precision point cloud with normal vectors
pub type NormalPointCloud3f = PointCloud<NormalPoint3f>;

/// A double precision point cloud with normal vectors
pub type NormalPointCloud3d = PointCloud<NormalPoint3d>;

impl<T> PointCloud<T> {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<T>) -> Self {
        Self { points }
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a point to the cloud
    pub fn push(&mut self, point: T) {
        self.points.push(point);
    }

    /// Get an iterator over the points
    pub fn iter(&self) -> std::slice::Iter<T> {
        self.points.iter()
    }
}

impl<T: Clone> PointCloud<T> {
    /// Keep every `every_k`-th point, starting with the first one
    pub fn uniform_down_sample(&self, every_k: usize) -> Result<Self> {
        if every_k == 0 {
            return Err(Error::InvalidData(
                "down-sample stride must be positive".to_string(),
            ));
        }
        Ok(Self {
            points: self.points.iter().step_by(every_k).cloned().collect(),
        })
    }
}

impl<T> Default for PointCloud<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for PointCloud<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<'a, T> IntoIterator for &'a PointCloud<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<T> FromIterator<T> for PointCloud<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            points: Vec::from_iter(iter),
        }
    }
}

impl<T: Real> PointCloud<Point3<T>> {
    /// Attach normals to the positions of this cloud
    pub fn with_normals(&self, normals: &[Vector3<T>]) -> Result<PointCloud<NormalPoint3<T>>> {
        PointCloud::from_positions_and_normals(&self.points, normals)
    }

    /// Convert to another precision
    pub fn cast<U: Real>(&self) -> PointCloud<Point3<U>> {
        self.points
            .iter()
            .map(|p| p.map(|c| U::cast_f64(c.as_f64())))
            .collect()
    }
}

impl<T: Real> PointCloud<NormalPoint3<T>> {
    /// Build an oriented cloud from separate position and normal arrays
    pub fn from_positions_and_normals(
        positions: &[Point3<T>],
        normals: &[Vector3<T>],
    ) -> Result<Self> {
        if positions.len() != normals.len() {
            return Err(Error::DimensionMismatch {
                positions: positions.len(),
                normals: normals.len(),
            });
        }
        Ok(positions
            .iter()
            .zip(normals)
            .map(|(position, normal)| NormalPoint3::new(*position, *normal))
            .collect())
    }

    /// Copy out the positions
    pub fn positions(&self) -> Vec<Point3<T>> {
        self.points.iter().map(|p| p.position).collect()
    }

    /// Copy out the normals
    pub fn normals(&self) -> Vec<Vector3<T>> {
        self.points.iter().map(|p| p.normal).collect()
    }

    /// Convert to another precision
    pub fn cast<U: Real>(&self) -> PointCloud<NormalPoint3<U>> {
        self.points.iter().map(NormalPoint3::cast).collect()
    }

    /// Check that positions are finite and normals are unit length
    pub fn validate(&self) -> Result<()> {
        let tolerance = NORMAL_LENGTH_TOLERANCE;
        for (index, point) in self.points.iter().enumerate() {
            if !point.position.iter().all(|c| c.as_f64().is_finite()) {
                return Err(Error::InvalidData(format!(
                    "position at index {} is not finite",
                    index
                )));
            }
            let length = point.normal.norm().as_f64();
            if !length.is_finite() || (length - 1.0).abs() > tolerance {
                return Err(Error::InvalidNormal { index });
            }
        }
        Ok(())
    }
}
