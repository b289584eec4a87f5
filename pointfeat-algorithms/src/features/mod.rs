//! Fast Point Feature Histogram (FPFH) descriptors
//!
//! The computation runs in two passes over a shared [`NeighborTable`]:
//!
//! 1. [`ExecutionBackend::run_spf_pass`] computes the SPF histogram of every
//!    point of the cloud, producing an [`SpfTable`].
//! 2. [`ExecutionBackend::run_aggregation_pass`] reads the completed table and
//!    emits one FPFH row per requested point.
//!
//! The first pass always covers the whole cloud, even when only a subset of
//! rows is requested, because a requested point's neighbors can be any point.
//!
//! # Example
//! ```rust
//! use pointfeat_core::{NormalPoint3d, Point3d, PointCloud, SearchPolicy, Vector3d};
//! use pointfeat_algorithms::{compute_fpfh_feature, SequentialBackend, ExecutionBackend};
//!
//! fn main() -> pointfeat_core::Result<()> {
//!     let cloud: PointCloud<NormalPoint3d> = (0..20)
//!         .map(|i| NormalPoint3d::new(
//!             Point3d::new((i % 5) as f64 * 0.1, (i / 5) as f64 * 0.1, 0.0),
//!             Vector3d::z(),
//!         ))
//!         .collect();
//!
//!     let features = SequentialBackend.compute(&cloud, &SearchPolicy::knn(6), None)?;
//!     assert_eq!(features.nrows(), 20);
//!
//!     let subset = compute_fpfh_feature(
//!         &cloud,
//!         &SearchPolicy::hybrid(0.25, 8),
//!         "parallel".parse()?,
//!         Some(&[0, 7]),
//!     )?;
//!     assert_eq!(subset.nrows(), 2);
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod backend;
pub mod pair;
pub mod spf;

pub use aggregate::{aggregate_row, validate_aggregation};
pub use backend::{cpu_backend, ExecutionBackend, ParallelBackend, SequentialBackend};
pub use pair::{bin_index, compute_pair_features, PairFeatures};
pub use spf::{compute_spf, SpfTable, HISTOGRAM_SCALE};

use std::time::Instant;

use pointfeat_core::{
    Device, Error, FeatureMatrix, NormalPoint3, PointCloud, Real, Result, SearchPolicy,
};

/// Fail-fast checks run before any work starts
pub fn validate_request<T: Real>(
    cloud: &PointCloud<NormalPoint3<T>>,
    policy: &SearchPolicy<T>,
    indices: Option<&[usize]>,
) -> Result<()> {
    policy.validate()?;
    cloud.validate()?;
    if let Some(indices) = indices {
        if let Some(&index) = indices.iter().find(|&&index| index >= cloud.len()) {
            return Err(Error::IndexOutOfRange {
                index,
                len: cloud.len(),
            });
        }
    }
    Ok(())
}

/// Strided index subset covering roughly `ratio` of `len` points
///
/// Uses a step of `floor(1 / ratio)` starting at index 0, so `ratio = 1.0`
/// selects every point.
pub fn subset_from_ratio(len: usize, ratio: f64) -> Result<Vec<usize>> {
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(Error::InvalidData(format!(
            "index ratio must be in (0, 1], got {}",
            ratio
        )));
    }
    let step = ((1.0 / ratio).floor() as usize).max(1);
    Ok((0..len).step_by(step).collect())
}

/// Compute FPFH descriptors with an explicit backend
pub fn compute_fpfh_feature_with<T: Real, B: ExecutionBackend<T> + ?Sized>(
    backend: &B,
    cloud: &PointCloud<NormalPoint3<T>>,
    policy: &SearchPolicy<T>,
    indices: Option<&[usize]>,
) -> Result<FeatureMatrix<T>> {
    let start = Instant::now();
    let features = backend.compute(cloud, policy, indices)?;
    log::info!(
        "FPFH [{} / {}] {} points -> {} rows in {:?}",
        backend.name(),
        T::DTYPE,
        cloud.len(),
        features.nrows(),
        start.elapsed()
    );
    Ok(features)
}

/// Compute FPFH descriptors on a CPU device
///
/// `Device::Accelerated` is rejected with `Error::Unsupported`; the umbrella
/// crate dispatches it to the GPU backend.
pub fn compute_fpfh_feature<T: Real>(
    cloud: &PointCloud<NormalPoint3<T>>,
    policy: &SearchPolicy<T>,
    device: Device,
    indices: Option<&[usize]>,
) -> Result<FeatureMatrix<T>> {
    let backend = cpu_backend::<T>(device)?;
    compute_fpfh_feature_with(backend.as_ref(), cloud, policy, indices)
}
