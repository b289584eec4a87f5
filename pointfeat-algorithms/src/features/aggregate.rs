//! Second pass: distance-weighted combination of neighbor SPFs

use pointfeat_core::{Error, Histogram, Real, Result};

use super::spf::SpfTable;
use crate::nearest_neighbor::NeighborTable;

/// Check that `rows` can be aggregated from `neighbors` and `spf`
///
/// The SPF table must cover every row of the neighbor table, and every
/// requested row must exist.
pub fn validate_aggregation<T: Real>(
    neighbors: &NeighborTable<T>,
    spf: &SpfTable<T>,
    rows: &[usize],
) -> Result<()> {
    if spf.len() != neighbors.len() {
        return Err(Error::Algorithm(format!(
            "SPF table has {} histograms for {} neighborhoods",
            spf.len(),
            neighbors.len()
        )));
    }
    if let Some(&index) = rows.iter().find(|&&index| index >= neighbors.len()) {
        return Err(Error::IndexOutOfRange {
            index,
            len: neighbors.len(),
        });
    }
    Ok(())
}

/// FPFH row of point `index`
///
/// `FPFH(p) = SPF(p) + (1/k) * sum(SPF(q) / dist(p, q))` over the k non-self
/// neighbors farther than [`Real::distance_epsilon`]. Coincident neighbors
/// are skipped and not counted, like coincident pairs in the first pass.
pub fn aggregate_row<T: Real>(
    index: usize,
    neighbors: &[usize],
    distances: &[T],
    spf: &SpfTable<T>,
) -> Histogram<T> {
    let mut row = *spf.histogram(index);
    let mut weighted = [T::zero(); pointfeat_core::HISTOGRAM_DIM];
    let epsilon = T::distance_epsilon();
    let mut count = 0usize;

    for (&neighbor_index, &distance) in neighbors.iter().zip(distances).skip(1) {
        if neighbor_index == index || distance <= epsilon {
            continue;
        }
        let inv_distance = T::one() / distance;
        for (acc, &value) in weighted.iter_mut().zip(spf.histogram(neighbor_index)) {
            *acc += value * inv_distance;
        }
        count += 1;
    }

    if count > 0 {
        let inv_count = T::one() / T::from_count(count);
        for (out, acc) in row.iter_mut().zip(weighted) {
            *out += acc * inv_count;
        }
    }

    row
}
