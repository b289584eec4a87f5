//! Execution backends for the two-pass descriptor computation

use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use pointfeat_core::{
    Device, Error, FeatureMatrix, Histogram, NearestNeighborSearch, Neighborhood, NormalPoint3,
    PointCloud, Real, Result, SearchPolicy,
};

use super::aggregate::{aggregate_row, validate_aggregation};
use super::spf::{compute_spf, SpfTable};
use super::validate_request;
use crate::nearest_neighbor::{KdTree, NeighborTable};

/// Strategy running the neighbor search and both descriptor passes
///
/// Implementations differ only in where the work runs; results agree up to
/// floating point rounding.
pub trait ExecutionBackend<T: Real> {
    /// Short name used in logs
    fn name(&self) -> String;

    /// Neighborhood of every point in the cloud, self first
    fn build_neighbor_table(
        &self,
        cloud: &PointCloud<NormalPoint3<T>>,
        policy: &SearchPolicy<T>,
    ) -> Result<NeighborTable<T>>;

    /// First pass: SPF histogram of every point in the cloud
    fn run_spf_pass(
        &self,
        cloud: &PointCloud<NormalPoint3<T>>,
        neighbors: &NeighborTable<T>,
    ) -> Result<SpfTable<T>>;

    /// Second pass: one FPFH row per entry of `rows`, in that order
    ///
    /// Rows outside the neighbor table are `Error::IndexOutOfRange`.
    fn run_aggregation_pass(
        &self,
        neighbors: &NeighborTable<T>,
        spf: &SpfTable<T>,
        rows: &[usize],
    ) -> Result<FeatureMatrix<T>>;

    /// Validate the request and run the full pipeline
    fn compute(
        &self,
        cloud: &PointCloud<NormalPoint3<T>>,
        policy: &SearchPolicy<T>,
        indices: Option<&[usize]>,
    ) -> Result<FeatureMatrix<T>> {
        validate_request(cloud, policy, indices)?;

        let rows: Vec<usize> = match indices {
            Some(indices) => indices.to_vec(),
            None => (0..cloud.len()).collect(),
        };
        if cloud.is_empty() || rows.is_empty() {
            return Ok(FeatureMatrix::zeros(rows.len()));
        }

        let start = Instant::now();
        let neighbors = self.build_neighbor_table(cloud, policy)?;
        log::debug!(
            "[{}] neighbor search: {:?}, {:.2} neighbors per point",
            self.name(),
            start.elapsed(),
            neighbors.average_neighbors()
        );

        let start = Instant::now();
        let spf = self.run_spf_pass(cloud, &neighbors)?;
        log::debug!("[{}] SPF pass over {} points: {:?}", self.name(), spf.len(), start.elapsed());

        let start = Instant::now();
        let features = self.run_aggregation_pass(&neighbors, &spf, &rows)?;
        log::debug!(
            "[{}] aggregation pass over {} rows: {:?}",
            self.name(),
            features.nrows(),
            start.elapsed()
        );

        Ok(features)
    }
}

/// Single-threaded reference backend
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialBackend;

impl SequentialBackend {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Real> ExecutionBackend<T> for SequentialBackend {
    fn name(&self) -> String {
        "sequential".to_string()
    }

    fn build_neighbor_table(
        &self,
        cloud: &PointCloud<NormalPoint3<T>>,
        policy: &SearchPolicy<T>,
    ) -> Result<NeighborTable<T>> {
        let positions = cloud.positions();
        let kdtree = KdTree::new(&positions);
        let neighborhoods: Vec<Neighborhood<T>> = positions
            .iter()
            .enumerate()
            .map(|(index, point)| kdtree.search(index, point, policy))
            .collect();
        Ok(NeighborTable::from_neighborhoods(neighborhoods))
    }

    fn run_spf_pass(
        &self,
        cloud: &PointCloud<NormalPoint3<T>>,
        neighbors: &NeighborTable<T>,
    ) -> Result<SpfTable<T>> {
        let histograms: Vec<Histogram<T>> = (0..cloud.len())
            .map(|index| compute_spf(index, &cloud.points, neighbors.neighbors(index).0))
            .collect();
        SpfTable::materialize(histograms, neighbors.len())
    }

    fn run_aggregation_pass(
        &self,
        neighbors: &NeighborTable<T>,
        spf: &SpfTable<T>,
        rows: &[usize],
    ) -> Result<FeatureMatrix<T>> {
        validate_aggregation(neighbors, spf, rows)?;
        let rows: Vec<Histogram<T>> = rows
            .iter()
            .map(|&index| {
                let (indices, distances) = neighbors.neighbors(index);
                aggregate_row(index, indices, distances, spf)
            })
            .collect();
        Ok(FeatureMatrix::from_rows(rows))
    }
}

/// Multi-threaded CPU backend built on rayon
///
/// One task per point for the neighbor search and the SPF pass, one task per
/// output row for aggregation. Without an explicit thread count the global
/// rayon pool is used.
pub struct ParallelBackend {
    threads: Option<usize>,
    pool: Option<ThreadPool>,
}

impl std::fmt::Debug for ParallelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelBackend")
            .field("threads", &self.threads)
            .finish()
    }
}

impl Default for ParallelBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelBackend {
    /// Backend on the global rayon pool
    pub fn new() -> Self {
        Self {
            threads: None,
            pool: None,
        }
    }

    /// Backend on a dedicated pool of `num_threads` threads
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(Error::InvalidData("thread count must be positive".to_string()));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("pointfeat-{}", index))
            .build()
            .map_err(|e| Error::Algorithm(format!("Failed to create thread pool: {}", e)))?;
        Ok(Self {
            threads: Some(num_threads),
            pool: Some(pool),
        })
    }

    /// Number of worker threads the backend runs on
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl<T: Real> ExecutionBackend<T> for ParallelBackend {
    fn name(&self) -> String {
        match self.threads {
            Some(n) => format!("parallel:{}", n),
            None => "parallel".to_string(),
        }
    }

    fn build_neighbor_table(
        &self,
        cloud: &PointCloud<NormalPoint3<T>>,
        policy: &SearchPolicy<T>,
    ) -> Result<NeighborTable<T>> {
        let positions = cloud.positions();
        let kdtree = KdTree::new(&positions);
        let neighborhoods: Vec<Neighborhood<T>> = self.install(|| {
            positions
                .par_iter()
                .enumerate()
                .map(|(index, point)| kdtree.search(index, point, policy))
                .collect()
        });
        Ok(NeighborTable::from_neighborhoods(neighborhoods))
    }

    fn run_spf_pass(
        &self,
        cloud: &PointCloud<NormalPoint3<T>>,
        neighbors: &NeighborTable<T>,
    ) -> Result<SpfTable<T>> {
        let histograms: Vec<Histogram<T>> = self.install(|| {
            (0..cloud.len())
                .into_par_iter()
                .map(|index| compute_spf(index, &cloud.points, neighbors.neighbors(index).0))
                .collect()
        });
        SpfTable::materialize(histograms, neighbors.len())
    }

    fn run_aggregation_pass(
        &self,
        neighbors: &NeighborTable<T>,
        spf: &SpfTable<T>,
        rows: &[usize],
    ) -> Result<FeatureMatrix<T>> {
        validate_aggregation(neighbors, spf, rows)?;
        let rows: Vec<Histogram<T>> = self.install(|| {
            rows.par_iter()
                .map(|&index| {
                    let (indices, distances) = neighbors.neighbors(index);
                    aggregate_row(index, indices, distances, spf)
                })
                .collect()
        });
        Ok(FeatureMatrix::from_rows(rows))
    }
}

/// CPU backend for a device selector
///
/// The GPU backend lives in `pointfeat-gpu`; asking for it here is an error.
pub fn cpu_backend<T: Real>(device: Device) -> Result<Box<dyn ExecutionBackend<T> + Send + Sync>> {
    match device {
        Device::Sequential => Ok(Box::new(SequentialBackend::new())),
        Device::Parallel { threads: None } => Ok(Box::new(ParallelBackend::new())),
        Device::Parallel { threads: Some(n) } => Ok(Box::new(ParallelBackend::with_threads(n)?)),
        Device::Accelerated { .. } => Err(Error::Unsupported(format!(
            "device '{}' is not a CPU device",
            device
        ))),
    }
}
