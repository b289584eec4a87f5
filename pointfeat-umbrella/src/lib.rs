//! # pointfeat
//!
//! Fast Point Feature Histogram (FPFH) descriptors for 3D point clouds.
//!
//! This is the umbrella crate that provides convenient access to all pointfeat
//! functionality, and the one place where a runtime [`ExecutionContext`]
//! (device and precision) is turned into a concrete backend.
//!
//! ## Quick Start
//!
//! ```rust
//! use pointfeat::prelude::*;
//!
//! fn main() -> pointfeat::Result<()> {
//!     let cloud: PointCloud<Point3d> = (0..400)
//!         .map(|i| {
//!             let (x, y) = ((i % 20) as f64 * 0.05, (i / 20) as f64 * 0.05);
//!             Point3d::new(x, y, 0.1 * (3.0 * x).sin())
//!         })
//!         .collect();
//!     let oriented = estimate_normals(&cloud, &SearchPolicy::knn(16))?;
//!
//!     let context = ExecutionContext::new("parallel".parse()?, Dtype::Float32);
//!     let policy = SearchPolicy::hybrid(0.15, 30);
//!     let features = compute_fpfh_feature(&oriented, &policy, &context, None)?;
//!     assert_eq!(features.nrows(), 400);
//!     assert_eq!(features.dtype(), Dtype::Float32);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: core data structures and the CPU backends
//! - `gpu`: GPU backend for `gpu`, `gpu:N` and `cuda:N` devices
//! - `all`: Enables all features

use serde::{Deserialize, Serialize};

// Re-export core functionality
pub use pointfeat_core::*;

// Re-export sub-crates
pub use pointfeat_algorithms as algorithms;

#[cfg(feature = "gpu")]
pub use pointfeat_gpu as gpu;

use pointfeat_algorithms::{compute_fpfh_feature_with, cpu_backend, ExecutionBackend};

/// Descriptor matrix in the precision it was computed in
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureTable {
    F32(FeatureMatrix<f32>),
    F64(FeatureMatrix<f64>),
}

impl FeatureTable {
    pub fn dtype(&self) -> Dtype {
        match self {
            FeatureTable::F32(_) => Dtype::Float32,
            FeatureTable::F64(_) => Dtype::Float64,
        }
    }

    pub fn nrows(&self) -> usize {
        match self {
            FeatureTable::F32(m) => m.nrows(),
            FeatureTable::F64(m) => m.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        HISTOGRAM_DIM
    }

    pub fn as_f32(&self) -> Option<&FeatureMatrix<f32>> {
        match self {
            FeatureTable::F32(m) => Some(m),
            FeatureTable::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<&FeatureMatrix<f64>> {
        match self {
            FeatureTable::F32(_) => None,
            FeatureTable::F64(m) => Some(m),
        }
    }

    /// Widen to double precision
    pub fn to_f64(&self) -> FeatureMatrix<f64> {
        match self {
            FeatureTable::F32(m) => m.cast(),
            FeatureTable::F64(m) => m.clone(),
        }
    }

    /// Largest element-wise difference after widening both tables
    pub fn max_abs_diff(&self, other: &FeatureTable) -> Option<f64> {
        self.to_f64().max_abs_diff(&other.to_f64())
    }
}

/// Backend for any device this build supports
pub fn backend<T: Real>(device: Device) -> Result<Box<dyn ExecutionBackend<T> + Send + Sync>> {
    match device {
        Device::Accelerated { ordinal } => accelerated_backend(ordinal),
        _ => cpu_backend(device),
    }
}

#[cfg(feature = "gpu")]
fn accelerated_backend<T: Real>(
    ordinal: usize,
) -> Result<Box<dyn ExecutionBackend<T> + Send + Sync>> {
    Ok(Box::new(pointfeat_gpu::AcceleratedBackend::new(ordinal)?))
}

#[cfg(not(feature = "gpu"))]
fn accelerated_backend<T: Real>(
    ordinal: usize,
) -> Result<Box<dyn ExecutionBackend<T> + Send + Sync>> {
    Err(Error::Unsupported(format!(
        "device 'gpu:{}' requires the `gpu` feature",
        ordinal
    )))
}

/// Compute FPFH descriptors in the precision `T` on `device`
pub fn compute_fpfh_feature_as<T: Real>(
    cloud: &PointCloud<NormalPoint3<T>>,
    policy: &SearchPolicy<T>,
    device: Device,
    indices: Option<&[usize]>,
) -> Result<FeatureMatrix<T>> {
    let backend = backend::<T>(device)?;
    compute_fpfh_feature_with(backend.as_ref(), cloud, policy, indices)
}

/// Compute FPFH descriptors with a runtime device and precision
///
/// The cloud and policy are converted to `context.dtype` before the
/// computation starts. Returns one 33-bin row per requested index, or per
/// point when `indices` is `None`.
pub fn compute_fpfh_feature<P: Real>(
    cloud: &PointCloud<NormalPoint3<P>>,
    policy: &SearchPolicy<P>,
    context: &ExecutionContext,
    indices: Option<&[usize]>,
) -> Result<FeatureTable> {
    log::debug!("FPFH request on {}", context);
    match context.dtype {
        Dtype::Float32 => compute_fpfh_feature_as(
            &cloud.cast::<f32>(),
            &policy.cast::<f32>(),
            context.device,
            indices,
        )
        .map(FeatureTable::F32),
        Dtype::Float64 => compute_fpfh_feature_as(
            &cloud.cast::<f64>(),
            &policy.cast::<f64>(),
            context.device,
            indices,
        )
        .map(FeatureTable::F64),
    }
}

/// Serializable description of one descriptor computation
///
/// ```rust
/// use pointfeat::{Device, Dtype, FeatureRequest, SearchPolicy};
///
/// let request: FeatureRequest = serde_json::from_str(
///     r#"{"policy": {"type": "hybrid", "radius": 0.02, "max_nn": 50},
///         "context": {"device": "sequential", "dtype": "float64"}}"#,
/// ).unwrap();
/// assert_eq!(request.policy, SearchPolicy::hybrid(0.02, 50));
/// assert_eq!(request.context.device, Device::Sequential);
/// assert_eq!(request.context.dtype, Dtype::Float64);
/// assert!(request.indices.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRequest {
    pub policy: SearchPolicy<f64>,
    #[serde(default)]
    pub context: ExecutionContext,
    #[serde(default)]
    pub indices: Option<Vec<usize>>,
}

impl FeatureRequest {
    pub fn new(policy: SearchPolicy<f64>) -> Self {
        Self {
            policy,
            context: ExecutionContext::default(),
            indices: None,
        }
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_indices(mut self, indices: Vec<usize>) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Run the request on `cloud`
    pub fn compute<P: Real>(&self, cloud: &PointCloud<NormalPoint3<P>>) -> Result<FeatureTable> {
        compute_fpfh_feature(
            cloud,
            &self.policy.cast::<P>(),
            &self.context,
            self.indices.as_deref(),
        )
    }
}

/// Convenient imports for common use cases
pub mod prelude {
    pub use pointfeat_core::*;

    pub use pointfeat_algorithms::{
        estimate_normals, estimate_normals_default, subset_from_ratio, ExecutionBackend,
        ParallelBackend, SequentialBackend,
    };

    #[cfg(feature = "gpu")]
    pub use pointfeat_gpu::AcceleratedBackend;

    pub use crate::{compute_fpfh_feature, compute_fpfh_feature_as, FeatureRequest, FeatureTable};
}
