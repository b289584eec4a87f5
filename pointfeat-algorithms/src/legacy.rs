//! Single-entry double precision FPFH path
//!
//! Kept alongside the backend engine as a reference for benchmarks: it works
//! only in `f64`, always uses rayon, and does not share a neighbor table
//! between passes. The tree is queried once for the SPF pass and again for
//! every aggregated row.

use rayon::prelude::*;

use pointfeat_core::{
    FeatureMatrix, Histogram, NearestNeighborSearch, NormalPoint3d, PointCloud, Result,
    SearchPolicy,
};

use crate::features::{aggregate_row, compute_spf, validate_request, SpfTable};
use crate::nearest_neighbor::KdTree;

/// Compute FPFH descriptors in double precision on the global rayon pool
pub fn compute_fpfh_feature(
    cloud: &PointCloud<NormalPoint3d>,
    policy: &SearchPolicy<f64>,
    indices: Option<&[usize]>,
) -> Result<FeatureMatrix<f64>> {
    validate_request(cloud, policy, indices)?;

    let rows: Vec<usize> = match indices {
        Some(indices) => indices.to_vec(),
        None => (0..cloud.len()).collect(),
    };
    if cloud.is_empty() || rows.is_empty() {
        return Ok(FeatureMatrix::zeros(rows.len()));
    }

    let positions = cloud.positions();
    let kdtree = KdTree::new(&positions);

    let neighborhoods: Vec<_> = positions
        .par_iter()
        .enumerate()
        .map(|(index, point)| kdtree.search(index, point, policy))
        .collect();
    let histograms: Vec<Histogram<f64>> = neighborhoods
        .par_iter()
        .enumerate()
        .map(|(index, neighborhood)| compute_spf(index, &cloud.points, &neighborhood.indices))
        .collect();
    let spf = SpfTable::materialize(histograms, cloud.len())?;

    let features: Vec<Histogram<f64>> = rows
        .par_iter()
        .map(|&index| {
            let neighborhood = kdtree.search(index, &positions[index], policy);
            aggregate_row(index, &neighborhood.indices, &neighborhood.distances, &spf)
        })
        .collect();

    Ok(FeatureMatrix::from_rows(features))
}
