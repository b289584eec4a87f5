//! Histogram descriptor storage

use ndarray::Array2;

use crate::real::Real;

/// Bins per angular feature
pub const HISTOGRAM_NUM_BINS: usize = 11;

/// Number of angular features
pub const HISTOGRAM_NUM_FEATURES: usize = 3;

/// Total descriptor width
pub const HISTOGRAM_DIM: usize = HISTOGRAM_NUM_BINS * HISTOGRAM_NUM_FEATURES;

/// One 33-bin descriptor: three concatenated blocks of 11 bins
pub type Histogram<T> = [T; HISTOGRAM_DIM];

/// All-zero histogram
pub fn zero_histogram<T: Real>() -> Histogram<T> {
    [T::zero(); HISTOGRAM_DIM]
}

/// Descriptor table with one 33-bin row per requested point
///
/// Rows follow the order of the input cloud, or of the index subset when one
/// was supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix<T> {
    rows: Vec<Histogram<T>>,
}

impl<T: Real> FeatureMatrix<T> {
    pub fn from_rows(rows: Vec<Histogram<T>>) -> Self {
        Self { rows }
    }

    /// Build from a flat row-major buffer of `n * HISTOGRAM_DIM` values
    pub fn from_flat(values: &[T]) -> Option<Self> {
        if values.len() % HISTOGRAM_DIM != 0 {
            return None;
        }
        let rows = values
            .chunks_exact(HISTOGRAM_DIM)
            .map(|chunk| {
                let mut row = zero_histogram();
                row.copy_from_slice(chunk);
                row
            })
            .collect();
        Some(Self { rows })
    }

    pub fn zeros(nrows: usize) -> Self {
        Self {
            rows: vec![zero_histogram(); nrows],
        }
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        HISTOGRAM_DIM
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&Histogram<T>> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[Histogram<T>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Histogram<T>> {
        self.rows
    }

    /// Copy into an `nrows x 33` ndarray
    pub fn to_array2(&self) -> Array2<T> {
        Array2::from_shape_fn((self.rows.len(), HISTOGRAM_DIM), |(r, c)| self.rows[r][c])
    }

    /// Convert to another precision
    pub fn cast<U: Real>(&self) -> FeatureMatrix<U> {
        FeatureMatrix {
            rows: self
                .rows
                .iter()
                .map(|row| row.map(|v| U::cast_f64(v.as_f64())))
                .collect(),
        }
    }

    /// Largest element-wise absolute difference, `None` when shapes differ
    pub fn max_abs_diff(&self, other: &FeatureMatrix<T>) -> Option<f64> {
        if self.nrows() != other.nrows() {
            return None;
        }
        let max = self
            .rows
            .iter()
            .zip(&other.rows)
            .flat_map(|(a, b)| a.iter().zip(b.iter()))
            .map(|(a, b)| (a.as_f64() - b.as_f64()).abs())
            .fold(0.0, f64::max);
        Some(max)
    }

    /// True when every value is finite
    pub fn is_finite(&self) -> bool {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .all(|v| v.as_f64().is_finite())
    }
}
