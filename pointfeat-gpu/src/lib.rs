//! # pointfeat GPU
//!
//! GPU-accelerated FPFH computation using WGPU.
//!
//! [`AcceleratedBackend`] implements the same two-pass algorithm as the CPU
//! backends of `pointfeat-algorithms`: neighborhoods are found on the CPU,
//! then the SPF pass and the aggregation pass each run as one compute shader
//! dispatch. Shaders work in single precision.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pointfeat_algorithms::ExecutionBackend;
//! use pointfeat_core::{NormalPoint3f, PointCloud, SearchPolicy};
//! use pointfeat_gpu::AcceleratedBackend;
//!
//! fn example(cloud: &PointCloud<NormalPoint3f>) -> pointfeat_core::Result<()> {
//!     let backend = AcceleratedBackend::new(0)?;
//!     let features = backend.compute(cloud, &SearchPolicy::hybrid(0.05, 30), None)?;
//!     println!("{} descriptors", features.nrows());
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod fpfh;

// Re-export commonly used items
pub use device::{dispatch_dimensions, GpuContext, WORKGROUP_SIZE};
pub use fpfh::AcceleratedBackend;
