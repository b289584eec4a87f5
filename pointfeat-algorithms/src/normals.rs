//! Normal estimation algorithms

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use rayon::prelude::*;

use pointfeat_core::{NearestNeighborSearch, NormalPoint3, PointCloud, Real, Result, SearchPolicy};

use crate::nearest_neighbor::KdTree;

/// Neighborhoods smaller than this keep the default `+z` normal
const MIN_NEIGHBORS: usize = 3;

/// Neighbor count used by [`estimate_normals_default`]
pub const DEFAULT_NORMAL_NEIGHBORS: usize = 30;

/// Unit normal of the plane best fitting `neighbors` (least-variance direction)
fn fit_normal<T: Real>(points: &[Point3<T>], neighbors: &[usize]) -> Vector3<T> {
    if neighbors.len() < MIN_NEIGHBORS {
        return Vector3::z();
    }

    let count = T::from_count(neighbors.len());
    let centroid = neighbors
        .iter()
        .fold(Vector3::zeros(), |sum: Vector3<T>, &i| sum + points[i].coords)
        / count;

    let mut covariance = Matrix3::zeros();
    for &i in neighbors {
        let deviation = points[i].coords - centroid;
        covariance += deviation * deviation.transpose();
    }
    covariance /= count;

    let eigen = SymmetricEigen::new(covariance);
    let mut smallest = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] < eigen.eigenvalues[smallest] {
            smallest = i;
        }
    }

    let normal: Vector3<T> = eigen.eigenvectors.column(smallest).into_owned();
    let length = normal.norm();
    if !(length.as_f64() > 0.0) || !length.as_f64().is_finite() {
        return Vector3::z();
    }
    let normal = normal / length;

    // Orient toward +z
    if normal.z < T::zero() {
        -normal
    } else {
        normal
    }
}

/// Estimate unit normals by local plane fitting
///
/// For each point the covariance of its neighborhood is decomposed and the
/// eigenvector of the smallest eigenvalue is used as normal, flipped to point
/// toward `+z`. Points with fewer than three neighbors get `(0, 0, 1)`.
///
/// # Example
/// ```rust
/// use pointfeat_core::{Point3d, PointCloud, SearchPolicy};
/// use pointfeat_algorithms::estimate_normals;
///
/// fn main() -> pointfeat_core::Result<()> {
///     let cloud: PointCloud<Point3d> = (0..25)
///         .map(|i| Point3d::new((i % 5) as f64, (i / 5) as f64, 0.0))
///         .collect();
///     let oriented = estimate_normals(&cloud, &SearchPolicy::knn(8))?;
///     assert!((oriented[12].normal.z - 1.0).abs() < 1e-9);
///     Ok(())
/// }
/// ```
pub fn estimate_normals<T: Real>(
    cloud: &PointCloud<Point3<T>>,
    policy: &SearchPolicy<T>,
) -> Result<PointCloud<NormalPoint3<T>>> {
    policy.validate()?;
    if cloud.is_empty() {
        return Ok(PointCloud::new());
    }

    let kdtree = KdTree::new(&cloud.points);
    let normals: Vec<Vector3<T>> = cloud
        .points
        .par_iter()
        .enumerate()
        .map(|(index, point)| {
            let neighborhood = kdtree.search(index, point, policy);
            fit_normal(&cloud.points, &neighborhood.indices)
        })
        .collect();

    cloud.with_normals(&normals)
}

/// Estimate normals from the 30 nearest neighbors of each point
pub fn estimate_normals_default<T: Real>(
    cloud: &PointCloud<Point3<T>>,
) -> Result<PointCloud<NormalPoint3<T>>> {
    estimate_normals(cloud, &SearchPolicy::knn(DEFAULT_NORMAL_NEIGHBORS))
}
