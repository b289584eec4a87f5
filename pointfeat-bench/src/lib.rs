//! Shared fixtures for the FPFH benchmarks
//!
//! The fixture is a synthetic closed surface about the size of a scanned
//! small object, sampled densely enough that a 0.01 radius holds a few dozen
//! neighbors. It is down-sampled by 3 and gets estimated normals, mirroring
//! how a scanned cloud would be prepared.

use std::fmt;

use pointfeat::algorithms::{estimate_normals_default, subset_from_ratio};
use pointfeat::{NormalPoint3d, Point3d, PointCloud, SearchPolicy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Points sampled before down-sampling
pub const FIXTURE_POINTS: usize = 36_000;

/// Stride of the uniform down-sampling applied to the raw samples
pub const DOWN_SAMPLE_EVERY: usize = 3;

/// Seed of the fixture generator
pub const FIXTURE_SEED: u64 = 0x5eed_f9f4;

/// Random samples of a lumpy sphere of radius ~0.08
pub fn synthetic_surface(num_points: usize, seed: u64) -> PointCloud<Point3d> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..num_points)
        .map(|_| {
            let z: f64 = rng.gen_range(-1.0..1.0);
            let azimuth: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
            let ring = (1.0 - z * z).sqrt();
            let bump = 1.0 + 0.15 * (3.0 * azimuth).sin() * (2.0 * z).cos();
            let radius = 0.08 * bump;
            Point3d::new(
                radius * ring * azimuth.cos(),
                radius * ring * azimuth.sin(),
                radius * z,
            )
        })
        .collect()
}

/// Down-sampled surface with estimated normals
pub fn fixture_with(num_points: usize) -> anyhow::Result<PointCloud<NormalPoint3d>> {
    let raw = synthetic_surface(num_points, FIXTURE_SEED);
    let sampled = raw.uniform_down_sample(DOWN_SAMPLE_EVERY)?;
    Ok(estimate_normals_default(&sampled)?)
}

/// Benchmark fixture at full size
pub fn fixture() -> anyhow::Result<PointCloud<NormalPoint3d>> {
    fixture_with(FIXTURE_POINTS)
}

/// One benchmarked parameter combination
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchCase {
    pub max_nn: Option<usize>,
    pub radius: Option<f64>,
    /// Fraction of points to describe; `None` describes every point
    pub ratio_indices: Option<f64>,
    /// Whether the label shows the subset ratio
    pub with_indices: bool,
}

impl BenchCase {
    const fn new(max_nn: Option<usize>, radius: Option<f64>) -> Self {
        Self {
            max_nn,
            radius,
            ratio_indices: None,
            with_indices: false,
        }
    }

    const fn indexed(ratio_indices: Option<f64>) -> Self {
        Self {
            max_nn: Some(50),
            radius: Some(0.02),
            ratio_indices,
            with_indices: true,
        }
    }

    pub fn policy(&self) -> pointfeat::Result<SearchPolicy<f64>> {
        SearchPolicy::from_options(self.max_nn, self.radius)
    }

    /// Requested rows for a cloud of `len` points
    pub fn indices(&self, len: usize) -> pointfeat::Result<Option<Vec<usize>>> {
        self.ratio_indices
            .map(|ratio| subset_from_ratio(len, ratio))
            .transpose()
    }
}

impl fmt::Display for BenchCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.with_indices {
            let ratio = match self.ratio_indices {
                Some(ratio) => format!("{}", ratio),
                None => "null".to_string(),
            };
            return write!(
                f,
                "Hybrid Indices[{} | {} | {}]",
                self.radius.unwrap_or_default(),
                self.max_nn.unwrap_or_default(),
                ratio
            );
        }
        match (self.max_nn, self.radius) {
            (Some(max_nn), Some(radius)) => write!(f, "Hybrid[{} | {}]", radius, max_nn),
            (Some(k), None) => write!(f, "KNN[{}]", k),
            (None, Some(radius)) => write!(f, "Radius[{}]", radius),
            (None, None) => write!(f, "Invalid"),
        }
    }
}

/// Parameter combinations measured for every implementation and device
pub fn capture_cases() -> Vec<BenchCase> {
    vec![
        BenchCase::new(Some(100), Some(0.01)),
        BenchCase::new(Some(50), Some(0.02)),
        BenchCase::new(Some(100), Some(0.02)),
        BenchCase::new(Some(50), None),
        BenchCase::new(Some(100), None),
        BenchCase::new(None, Some(0.01)),
        BenchCase::new(None, Some(0.02)),
        BenchCase::indexed(None),
        BenchCase::indexed(Some(0.0001)),
        BenchCase::indexed(Some(0.001)),
        BenchCase::indexed(Some(0.01)),
        BenchCase::indexed(Some(0.1)),
        BenchCase::indexed(Some(1.0)),
    ]
}
