//! First pass: Simplified Point Feature histograms

use pointfeat_core::{
    zero_histogram, Error, Histogram, NormalPoint3, Real, Result, HISTOGRAM_NUM_BINS,
};

use super::pair::compute_pair_features;

/// Scale of one histogram block after normalization
pub const HISTOGRAM_SCALE: f64 = 100.0;

/// SPF histogram of point `index` over its neighborhood
///
/// `neighbors[0]` is the point itself and is skipped, as is any other entry
/// pointing back at `index`. Each valid pair adds `100 / valid_pairs` to one
/// bin of each block; a point without valid pairs gets an all-zero histogram.
pub fn compute_spf<T: Real>(
    index: usize,
    points: &[NormalPoint3<T>],
    neighbors: &[usize],
) -> Histogram<T> {
    let mut histogram = zero_histogram::<T>();
    let point = &points[index];
    let mut valid_pairs = 0usize;

    for &neighbor_index in neighbors.iter().skip(1) {
        if neighbor_index == index {
            continue;
        }
        let neighbor = &points[neighbor_index];
        let Some(features) = compute_pair_features(
            &point.position,
            &point.normal,
            &neighbor.position,
            &neighbor.normal,
        ) else {
            continue;
        };

        for (block, bin) in features.bins().into_iter().enumerate() {
            histogram[block * HISTOGRAM_NUM_BINS + bin] += T::one();
        }
        valid_pairs += 1;
    }

    if valid_pairs > 0 {
        let increment = T::cast_f64(HISTOGRAM_SCALE) / T::from_count(valid_pairs);
        for value in histogram.iter_mut() {
            *value *= increment;
        }
    }

    histogram
}

fn is_spf_histogram<T: Real>(histogram: &Histogram<T>) -> bool {
    if !histogram.iter().all(|v| v.as_f64().is_finite() && v.as_f64() >= 0.0) {
        return false;
    }
    let tolerance = HISTOGRAM_SCALE * 1e-3;
    let mut sums = histogram
        .chunks(HISTOGRAM_NUM_BINS)
        .map(|block| block.iter().map(|v| v.as_f64()).sum::<f64>());
    let Some(first) = sums.next() else {
        return false;
    };
    let empty = first == 0.0;
    if !empty && (first - HISTOGRAM_SCALE).abs() > tolerance {
        return false;
    }
    sums.all(|sum| if empty { sum == 0.0 } else { (sum - HISTOGRAM_SCALE).abs() <= tolerance })
}

/// Completed first-pass result: one SPF histogram for every point of the cloud
///
/// The aggregation pass only accepts this type. The CPU passes build it
/// directly; backends in other crates go through [`SpfTable::from_device_pass`],
/// which rejects anything a first pass could not have produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SpfTable<T> {
    histograms: Vec<Histogram<T>>,
}

impl<T: Real> SpfTable<T> {
    /// Wrap per-point histograms produced by a first pass over `num_points`
    pub(crate) fn materialize(histograms: Vec<Histogram<T>>, num_points: usize) -> Result<Self> {
        if histograms.len() != num_points {
            return Err(Error::Algorithm(format!(
                "first pass produced {} histograms for {} points",
                histograms.len(),
                num_points
            )));
        }
        Ok(Self { histograms })
    }

    /// Wrap histograms read back from a device-side first pass
    ///
    /// Every histogram must be finite and non-negative, with all three blocks
    /// summing to either zero or [`HISTOGRAM_SCALE`].
    #[doc(hidden)]
    pub fn from_device_pass(histograms: Vec<Histogram<T>>, num_points: usize) -> Result<Self> {
        for (index, histogram) in histograms.iter().enumerate() {
            if !is_spf_histogram(histogram) {
                return Err(Error::Algorithm(format!(
                    "first pass produced an invalid histogram for point {}",
                    index
                )));
            }
        }
        Self::materialize(histograms, num_points)
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    pub fn histogram(&self, index: usize) -> &Histogram<T> {
        &self.histograms[index]
    }

    pub fn histograms(&self) -> &[Histogram<T>] {
        &self.histograms
    }
}
